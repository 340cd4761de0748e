//! Tracks the actions of the last loaded proposal through execution.
//!
//! The tracker is the one surface designed for concurrent read access: an
//! observer may poll [`ActionsTracker::snapshot`] while the install phase
//! drives transitions, and always sees a consistent point-in-time copy.

use std::sync::Mutex;

use log::debug;

use capstan_api::{
    error::{CapstanError, InternalError, ReportError, ServicingError},
    status::{Action, ActionState, Proposal},
    ActionId,
};

#[derive(Debug, Default)]
pub struct ActionsTracker {
    actions: Mutex<Vec<Action>>,
}

impl ActionsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked list with the proposal's actions, all pending.
    pub fn load(&self, proposal: &Proposal) -> Result<(), CapstanError> {
        if !proposal.is_feasible() {
            return Err(CapstanError::new(ServicingError::NoFeasibleProposal));
        }

        let mut actions = proposal.actions.clone();
        for action in &mut actions {
            action.state = ActionState::Pending;
        }
        debug!("Tracking {} storage actions", actions.len());
        *self.actions.lock().unwrap() = actions;
        Ok(())
    }

    /// Drop all tracked actions, e.g. because a new proposal replaced the
    /// one they were derived from.
    pub fn clear(&self) {
        self.actions.lock().unwrap().clear();
    }

    pub fn mark_running(&self, action_id: &ActionId) -> Result<(), CapstanError> {
        self.transition(action_id, ActionState::Running)
    }

    pub fn mark_done(&self, action_id: &ActionId) -> Result<(), CapstanError> {
        self.transition(action_id, ActionState::Done)
    }

    pub fn mark_failed(&self, action_id: &ActionId, reason: &str) -> Result<(), CapstanError> {
        self.transition(
            action_id,
            ActionState::Failed {
                reason: reason.to_owned(),
            },
        )
    }

    /// A consistent point-in-time copy of the tracked actions. Safe to call
    /// concurrently with transitions.
    pub fn snapshot(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    fn transition(&self, action_id: &ActionId, to: ActionState) -> Result<(), CapstanError> {
        let mut actions = self.actions.lock().unwrap();
        let action = actions
            .iter_mut()
            .find(|a| &a.id == action_id)
            .structured(InternalError::UnknownAction {
                action_id: action_id.clone(),
            })?;

        let legal = matches!(
            (&action.state, &to),
            (ActionState::Pending, ActionState::Running)
                | (ActionState::Running, ActionState::Done)
                | (ActionState::Running, ActionState::Failed { .. })
        );
        if !legal {
            return Err(CapstanError::new(InternalError::InvalidTransition {
                action_id: action_id.clone(),
                from: action.state.name().to_owned(),
                to: to.name().to_owned(),
            }));
        }

        debug!(
            "Action '{action_id}': {} -> {}",
            action.state.name(),
            to.name()
        );
        action.state = to;
        Ok(())
    }
}
