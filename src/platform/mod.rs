//! Seams toward the external collaborators: the storage engine that owns the
//! device graph, and the progress sink that renders phase milestones.

use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use capstan_api::{
    primitives::bytes::ByteCount,
    status::{Action, InfeasibleReason},
};

pub mod offline;

/// The low-level storage engine. It owns the actual device graph and knows
/// how to compute and execute filesystem operations; the orchestration core
/// only calls into it and consumes its results.
pub trait StorageEngine: Send {
    /// Take a fresh point-in-time view of the storage hardware.
    fn probe(&self) -> Result<DeviceSnapshot, anyhow::Error>;

    /// Decide where each requested block device lands on the probed
    /// hardware, or reject the request set with a structured reason. A
    /// rejection is an answer, not a failure; errors are reserved for the
    /// engine itself breaking.
    fn plan(
        &self,
        snapshot: &DeviceSnapshot,
        requests: &[PlacementRequest],
    ) -> Result<PlanOutcome, anyhow::Error>;

    /// Execute one storage action. Runs to completion or failure; there is
    /// no cancellation once started.
    fn execute(&self, action: &Action) -> Result<(), anyhow::Error>;
}

/// The engine's point-in-time view of the storage hardware. The
/// orchestration core treats it as input data only: it is handed back to
/// the engine's planning primitive, never mutated.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceSnapshot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<ProbedDisk>,
}

/// One probed disk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProbedDisk {
    pub path: PathBuf,
    pub capacity: ByteCount,
    pub free: ByteCount,
}

/// One block device the proposal needs carved out of the hardware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementRequest {
    /// Deterministic identifier of the request, echoed in action ids.
    pub id: String,

    /// Smallest acceptable size.
    pub size: ByteCount,

    /// Pin the request to a specific device instead of letting the engine
    /// choose one.
    pub device: Option<PathBuf>,
}

/// The engine's answer to a placement request set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanOutcome {
    /// One placement per request, in request order.
    Placements(Vec<Placement>),

    /// The request set cannot be satisfied on this hardware.
    Rejected(InfeasibleReason),
}

/// Where one requested block device lands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub disk: PathBuf,
}

/// Receives coarse phase milestones. The sink decides how to render them;
/// the core only reports phase names and step counts.
pub trait ProgressSink: Send {
    /// Begin a phase of `steps` steps; `description` names the first step.
    fn start_phase(&mut self, steps: usize, description: &str);

    /// Advance to the next step of the current phase.
    fn next_step(&mut self, description: &str);
}

/// Progress sink that reports milestones through the log.
#[derive(Debug, Default)]
pub struct LogProgress {
    step: usize,
    total: usize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn start_phase(&mut self, steps: usize, description: &str) {
        self.step = 1;
        self.total = steps;
        info!("[1/{}] {description}", self.total);
    }

    fn next_step(&mut self, description: &str) {
        self.step += 1;
        info!("[{}/{}] {description}", self.step, self.total);
    }
}
