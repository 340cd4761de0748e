//! Engine orchestration: the storage manager that drives the probe,
//! propose and install phases for one installation run.

use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use capstan_api::{
    config::{ConversionRegistry, StorageConfig},
    error::{
        CapstanError, CapstanResultExt, InternalError, InvalidInputError, ReportError,
        ServicingError,
    },
    status::{ManagerStatus, Proposal},
};

use crate::platform::{DeviceSnapshot, ProgressSink, StorageEngine};

pub mod actions;
pub mod proposal;

pub use actions::ActionsTracker;
pub use proposal::ProposalCalculator;

/// Coordinates one installation run: holds the desired configuration, the
/// engine handle, the last probed snapshot, the current proposal and the
/// actions tracker.
///
/// One value owns one run. Phase operations take `&mut self`, so a later
/// phase cannot begin while an earlier one is in flight; observers hold the
/// tracker through [`Self::tracker`] and poll it concurrently. The value is
/// discarded and rebuilt for a new run, never reset implicitly.
pub struct StorageManager {
    engine: Box<dyn StorageEngine>,
    registry: ConversionRegistry,
    config: StorageConfig,
    snapshot: Option<DeviceSnapshot>,
    proposal: Option<Proposal>,
    tracker: Arc<ActionsTracker>,
}

impl StorageManager {
    pub fn new(engine: Box<dyn StorageEngine>, registry: ConversionRegistry) -> Self {
        Self {
            engine,
            registry,
            config: StorageConfig::default(),
            snapshot: None,
            proposal: None,
            tracker: Arc::new(ActionsTracker::new()),
        }
    }

    /// Parse a client document through the conversion registry and replace
    /// the held configuration. The previous proposal stays in place until a
    /// new calculation completes.
    pub fn load_wire_config(&mut self, document: &Value) -> Result<(), CapstanError> {
        let config = StorageConfig::parse(&self.registry, document)
            .map_err(|e| CapstanError::new(InvalidInputError::ConvertStorageConfig(e)))?;
        config
            .validate()
            .map_err(|e| CapstanError::new(InvalidInputError::InvalidStorageConfig(e)))?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Wire-format document of the held configuration, for remote callers.
    /// The model only holds sections that came through validated paths, so a
    /// conversion failure here is an internal invariant violation, not a
    /// user error.
    pub fn wire_config(&self) -> Result<Value, CapstanError> {
        self.config
            .serialize(&self.registry)
            .map_err(|e| CapstanError::new(InternalError::SerializeStorageConfig(e)))
    }

    pub fn registry(&self) -> &ConversionRegistry {
        &self.registry
    }

    /// The current proposal, if a calculation has completed.
    pub fn proposal(&self) -> Option<&Proposal> {
        self.proposal.as_ref()
    }

    /// Explicitly drop the current proposal and its tracked actions.
    pub fn reset_proposal(&mut self) {
        self.proposal = None;
        self.tracker.clear();
    }

    /// Shared handle to the actions tracker, for observers polling action
    /// states while a phase runs.
    pub fn tracker(&self) -> Arc<ActionsTracker> {
        Arc::clone(&self.tracker)
    }

    /// Probe the storage devices and calculate a proposal for the held
    /// configuration.
    ///
    /// A failure while probing or calculating is surfaced to the caller and
    /// leaves the previous snapshot and proposal untouched; re-probing is
    /// the caller's decision.
    pub fn probe(&mut self, progress: &mut dyn ProgressSink) -> Result<(), CapstanError> {
        info!("Probing storage and calculating proposal");
        progress.start_phase(2, "Probing storage devices");
        let snapshot = self
            .engine
            .probe()
            .structured(ServicingError::ProbeDevices)?;

        progress.next_step("Calculating storage proposal");
        let proposal = ProposalCalculator::new(self.engine.as_ref())
            .calculate(&self.config, &snapshot)
            .message("Step 'Probe' failed while calculating the proposal")?;

        self.snapshot = Some(snapshot);
        self.set_proposal(proposal);
        Ok(())
    }

    /// Recalculate the proposal against the last probed snapshot, e.g.
    /// after the configuration was replaced.
    pub fn propose(&mut self, progress: &mut dyn ProgressSink) -> Result<(), CapstanError> {
        let snapshot = self
            .snapshot
            .as_ref()
            .structured(ServicingError::NoDeviceSnapshot)?;

        progress.start_phase(1, "Calculating storage proposal");
        let proposal =
            ProposalCalculator::new(self.engine.as_ref()).calculate(&self.config, snapshot)?;
        self.set_proposal(proposal);
        Ok(())
    }

    /// Execute the current proposal's actions, in proposal order.
    ///
    /// Requires a feasible proposal. The first action failure stops further
    /// execution, leaves the remaining actions pending, and is surfaced
    /// naming the failed action; the failure is also recorded in the
    /// tracker, where observers see it.
    pub fn install(&mut self, progress: &mut dyn ProgressSink) -> Result<(), CapstanError> {
        info!("Starting step 'Install'");
        let proposal = self
            .proposal
            .as_ref()
            .filter(|p| p.is_feasible())
            .structured(ServicingError::NoFeasibleProposal)?;
        self.tracker.load(proposal)?;

        let actions = proposal.actions.clone();
        for (i, action) in actions.iter().enumerate() {
            debug!("Executing action '{}'", action.id);
            if i == 0 {
                progress.start_phase(actions.len(), &action.description);
            } else {
                progress.next_step(&action.description);
            }
            self.tracker.mark_running(&action.id)?;
            match self.engine.execute(action) {
                Ok(()) => self.tracker.mark_done(&action.id)?,
                Err(e) => {
                    self.tracker.mark_failed(&action.id, &format!("{e:#}"))?;
                    return Err(e).structured(ServicingError::ExecuteAction {
                        action_id: action.id.clone(),
                    });
                }
            }
        }
        info!("Finished step 'Install'");
        Ok(())
    }

    /// Point-in-time status for remote observers: proposal feasibility plus
    /// the action list. Action states come from the tracker once an install
    /// has loaded it, and from the proposal before that.
    pub fn status(&self) -> ManagerStatus {
        let tracked = self.tracker.snapshot();
        ManagerStatus {
            proposal: self.proposal.as_ref().map(|p| p.feasibility.clone()),
            actions: if tracked.is_empty() {
                self.proposal
                    .as_ref()
                    .map(|p| p.actions.clone())
                    .unwrap_or_default()
            } else {
                tracked
            },
        }
    }

    fn set_proposal(&mut self, proposal: Proposal) {
        // Actions tracked for a previous proposal no longer correspond to
        // anything installable.
        self.tracker.clear();
        self.proposal = Some(proposal);
    }
}
