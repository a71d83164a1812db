// Per-record lifecycle: locked -> active -> done
//
// `done` is terminal. Every event that would move a completed module
// backwards is swallowed, which is what keeps completed work from regressing
// when a predecessor is completed again or a successor is re-provisioned.

use chrono::{DateTime, Utc};
use statig::prelude::*;

use super::types::{ProgressRecord, ProgressStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Hydrate the machine to a stored status; timestamps are left alone
    Restore { status: ProgressStatus },
    /// Make the module workable
    Provision { at: DateTime<Utc> },
    /// Finish the module
    Complete { at: DateTime<Utc> },
}

/// Record after an event has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transitioned {
    pub record: ProgressRecord,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct ModuleLifecycle {
    record: ProgressRecord,
    changed: bool,
}

impl ModuleLifecycle {
    pub fn new(record: ProgressRecord) -> Self {
        Self {
            record,
            changed: false,
        }
    }

    /// Restore `record` into the machine, feed it `event`, and report the result.
    pub fn apply(record: ProgressRecord, event: &LifecycleEvent) -> Transitioned {
        let stored = record.status;
        let mut machine = Self::new(record).state_machine();
        machine.handle(&LifecycleEvent::Restore { status: stored });
        machine.handle(event);

        let context = machine.inner();
        Transitioned {
            record: context.record.clone(),
            changed: context.changed,
        }
    }
}

#[state_machine(initial = "State::locked()")]
impl ModuleLifecycle {
    #[state]
    fn locked(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Restore {
                status: ProgressStatus::Active,
            } => Transition(State::active()),
            LifecycleEvent::Restore {
                status: ProgressStatus::Done,
            } => Transition(State::done()),
            LifecycleEvent::Provision { at } => {
                self.record.status = ProgressStatus::Active;
                self.record.started_at.get_or_insert(*at);
                self.changed = true;
                tracing::debug!(
                    user_id = %self.record.user_id,
                    module_id = %self.record.module_id,
                    "Module provisioned"
                );
                Transition(State::active())
            }
            _ => Handled,
        }
    }

    #[state]
    fn active(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Complete { at } => {
                self.record.status = ProgressStatus::Done;
                self.record.completed_at = Some(*at);
                self.changed = true;
                tracing::debug!(
                    user_id = %self.record.user_id,
                    module_id = %self.record.module_id,
                    "Module completed"
                );
                Transition(State::done())
            }
            LifecycleEvent::Provision { at } => {
                if self.record.started_at.is_none() {
                    self.record.started_at = Some(*at);
                    self.changed = true;
                }
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn done(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        if !matches!(event, LifecycleEvent::Restore { .. }) {
            tracing::debug!(
                user_id = %self.record.user_id,
                module_id = %self.record.module_id,
                event = ?event,
                "Ignoring event for completed module"
            );
        }
        Handled
    }
}
