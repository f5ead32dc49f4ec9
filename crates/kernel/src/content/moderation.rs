//! Moderation state machine.
//!
//! | From      | Requested | Action     |
//! |-----------|-----------|------------|
//! | Approval  | Active    | approve    |
//! | Active    | Approval  | disapprove |
//! | Suspended | Approval  | disapprove |
//!
//! Every other request, including one equal to the current status, is a
//! no-op. Disapproving a suspended entity lifts the suspension; both
//! disapprove rows share one action.

use std::collections::BTreeMap;

use anyhow::Result;
use contenthub_sdk::types::{ChangeSet, EntityId, ModerationStatus};
use serde::Serialize;

/// Side-effecting action a handler performs for a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Disapprove,
}

impl ModerationAction {
    /// Status the entity has after the action.
    pub fn target(self) -> ModerationStatus {
        match self {
            Self::Approve => ModerationStatus::Active,
            Self::Disapprove => ModerationStatus::Approval,
        }
    }
}

/// Decide what to do when `requested` is asked for an entity in `current`.
pub fn plan_transition(
    current: ModerationStatus,
    requested: ModerationStatus,
) -> Option<ModerationAction> {
    use contenthub_sdk::types::ModerationStatus::{Active, Approval, Suspended};

    match (current, requested) {
        (Approval, Active) => Some(ModerationAction::Approve),
        (Active, Approval) | (Suspended, Approval) => Some(ModerationAction::Disapprove),
        _ => None,
    }
}

/// Per-id outcome of an `update_info` batch.
///
/// Failures are best-effort: one failing id never rolls back the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Ids whose status transitioned, with the action taken.
    pub applied: BTreeMap<EntityId, ModerationAction>,
    /// Ids whose flag was changed, with the new value.
    pub flagged: BTreeMap<EntityId, bool>,
    /// Ids for which the request was a no-op.
    pub unchanged: Vec<EntityId>,
    /// Ids without a record.
    pub missing: Vec<EntityId>,
    /// Ids the store failed on, with the error message.
    pub failed: BTreeMap<EntityId, String>,
}

impl UpdateReport {
    /// True when no id failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record_failure(&mut self, id: EntityId, error: &anyhow::Error) {
        self.failed.insert(id, format!("{error:#}"));
    }
}

/// Run a change set through the transition table.
///
/// `current` looks up an entity's status (`None` when it does not exist);
/// `apply` performs an action and persists its result.
pub fn apply_changes<L, A>(changes: &ChangeSet, mut current: L, mut apply: A) -> UpdateReport
where
    L: FnMut(EntityId) -> Result<Option<ModerationStatus>>,
    A: FnMut(EntityId, ModerationAction) -> Result<()>,
{
    let mut report = UpdateReport::default();

    for (&id, change) in changes {
        let status = match current(id) {
            Ok(Some(status)) => status,
            Ok(None) => {
                report.missing.push(id);
                continue;
            }
            Err(e) => {
                report.record_failure(id, &e);
                continue;
            }
        };

        match plan_transition(status, change.status) {
            Some(action) => match apply(id, action) {
                Ok(()) => {
                    report.applied.insert(id, action);
                }
                Err(e) => report.record_failure(id, &e),
            },
            None => report.unchanged.push(id),
        }
    }

    report
}
