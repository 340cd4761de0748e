use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::{primitives::bytes::ByteCount, ActionId};

/// Outcome of calculating a storage proposal for one configuration against
/// one device snapshot. An infeasible proposal carries a structured reason
/// and an empty action list, never a partial one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Proposal {
    pub feasibility: Feasibility,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl Proposal {
    pub fn feasible(actions: Vec<Action>) -> Self {
        Self {
            feasibility: Feasibility::Feasible,
            actions,
        }
    }

    pub fn infeasible(reason: InfeasibleReason) -> Self {
        Self {
            feasibility: Feasibility::Infeasible { reason },
            actions: Vec::new(),
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.feasibility == Feasibility::Feasible
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub enum Feasibility {
    /// The configuration can be realized on the probed devices.
    Feasible,

    /// No action sequence satisfies the configuration on the probed devices.
    Infeasible { reason: InfeasibleReason },
}

/// Why a proposal could not be calculated. Reported to the caller; the user
/// recovers by changing the configuration, not by retrying.
#[derive(thiserror::Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InfeasibleReason {
    #[error("No storage devices were found")]
    NoDevices,

    #[error("No device has enough free space for '{id}': needed {needed}, largest available {available}")]
    InsufficientSpace {
        id: String,
        needed: ByteCount,
        available: ByteCount,
    },

    #[error("Requested device '{device}' was not found")]
    MissingDevice { device: String },
}

/// One atomic storage operation derived from a proposal.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Action {
    pub id: ActionId,

    pub kind: ActionKind,

    /// Human-readable summary, suitable for progress display.
    pub description: String,

    /// Identifier of the action that must complete before this one may
    /// start. Prerequisites always appear earlier in the proposal's list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<ActionId>,

    #[serde(default)]
    pub state: ActionState,
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, IntoStaticStr)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[strum(serialize_all = "kebab-case")]
pub enum ActionKind {
    CreatePartition,
    CreateEncryption,
    CreateFilesystem,
}

/// Execution state of one action. Transitions are
/// `pending -> running -> {done | failed}`; terminal states do not
/// transition further.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, IntoStaticStr)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[strum(serialize_all = "kebab-case")]
pub enum ActionState {
    #[default]
    Pending,
    Running,
    Done,
    Failed {
        reason: String,
    },
}

impl ActionState {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Done | ActionState::Failed { .. })
    }
}

/// Point-in-time view of the storage manager, as exposed to remote callers.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManagerStatus {
    /// Feasibility of the current proposal, absent before the first probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<Feasibility>,

    /// Actions of the current proposal with their execution states.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}
