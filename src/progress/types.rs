// Core types for per-user module progression

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::ModuleId;

/// Opaque, stable user identifier supplied by the identity source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank ids never resolve to a user context
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Status of one module for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Done,
    Active,
    Locked,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Active => "active",
            Self::Locked => "locked",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(Self::Done),
            "active" => Ok(Self::Active),
            "locked" => Ok(Self::Locked),
            other => Err(format!("unknown progress status '{other}'")),
        }
    }
}

/// Stored relationship between one user and one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub module_id: ModuleId,
    pub status: ProgressStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// A not-yet-stored record for a module the user has not reached
    pub fn locked(user_id: UserId, module_id: ModuleId) -> Self {
        Self {
            user_id,
            module_id,
            status: ProgressStatus::Locked,
            started_at: None,
            completed_at: None,
        }
    }
}

/// One row of the read-only projection handed to rendering clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleView {
    pub module_id: ModuleId,
    pub sequence_position: i64,
    pub title: String,
    pub description: String,
    pub status: ProgressStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Effective status of every catalog module for a user, in catalog order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusProjection {
    pub user_id: UserId,
    pub modules: Vec<ModuleView>,
}

impl StatusProjection {
    pub fn status_of(&self, module_id: &ModuleId) -> Option<ProgressStatus> {
        self.view(module_id).map(|v| v.status)
    }

    pub fn view(&self, module_id: &ModuleId) -> Option<&ModuleView> {
        self.modules.iter().find(|v| &v.module_id == module_id)
    }

    /// The first module the user can work on right now
    pub fn current(&self) -> Option<&ModuleView> {
        self.modules
            .iter()
            .find(|v| v.status == ProgressStatus::Active)
    }

    pub fn completed_count(&self) -> usize {
        self.modules
            .iter()
            .filter(|v| v.status == ProgressStatus::Done)
            .count()
    }

    pub fn is_finished(&self) -> bool {
        !self.modules.is_empty() && self.completed_count() == self.modules.len()
    }

    /// True when the `done` modules form an unbroken prefix of catalog order
    pub fn is_prefix_consistent(&self) -> bool {
        let done = self.completed_count();
        self.modules[..done]
            .iter()
            .all(|v| v.status == ProgressStatus::Done)
    }
}

/// Why a completion request did not change anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No record exists and the module is not the catalog head
    NotStarted,
    Locked,
    AlreadyDone,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("module has not been started"),
            Self::Locked => f.write_str("module is locked"),
            Self::AlreadyDone => f.write_str("module is already done"),
        }
    }
}

/// Result of a completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Advanced {
        completed: ModuleId,
        /// Successor moved into `active`, if one exists and was not already done
        provisioned: Option<ModuleId>,
    },
    Skipped { reason: SkipReason },
}

impl CompletionOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

/// Answer to "may this user open this module?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum ModuleAccess {
    Open(ModuleView),
    Completed(ModuleView),
    NotYetAvailable {
        module_id: ModuleId,
        /// Earliest preceding module that is not done
        blocked_by: Option<ModuleId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: &str, status: ProgressStatus) -> ModuleView {
        ModuleView {
            module_id: ModuleId::from(id),
            sequence_position: 0,
            title: id.to_string(),
            description: String::new(),
            status,
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [ProgressStatus::Done, ProgressStatus::Active, ProgressStatus::Locked] {
            assert_eq!(status.as_str().parse::<ProgressStatus>().unwrap(), status);
        }
        assert!("finished".parse::<ProgressStatus>().is_err());
    }

    #[test]
    fn test_prefix_consistency() {
        use ProgressStatus::*;

        let good = StatusProjection {
            user_id: UserId::from("u"),
            modules: vec![view("a", Done), view("b", Active), view("c", Locked)],
        };
        assert!(good.is_prefix_consistent());
        assert_eq!(good.current().unwrap().module_id.as_str(), "b");

        let gap = StatusProjection {
            user_id: UserId::from("u"),
            modules: vec![view("a", Active), view("b", Done), view("c", Locked)],
        };
        assert!(!gap.is_prefix_consistent());
    }

    #[test]
    fn test_blank_user() {
        assert!(UserId::from("  ").is_blank());
        assert!(!UserId::from("user-1").is_blank());
    }
}
