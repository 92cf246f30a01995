use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StatusError;

/// Lifecycle status of a single project unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Blocked,
    Completed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Blocked => "Blocked",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not Started" => Ok(Self::NotStarted),
            "In Progress" => Ok(Self::InProgress),
            "Blocked" => Ok(Self::Blocked),
            "Completed" => Ok(Self::Completed),
            _ => Err(StatusError::InvalidStatus {
                kind: "unit",
                value: s.to_string(),
            }),
        }
    }
}

/// Project health derived from its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    Running,
    Completed,
    Blocked,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a project's status from its unit statuses.
///
/// Rules are checked in priority order:
///
/// | Units                        | Result        |
/// |------------------------------|---------------|
/// | none                         | `NotStarted`  |
/// | any `InProgress`             | `Running`     |
/// | all `Completed`              | `Completed`   |
/// | any `Blocked`                | `Blocked`     |
/// | otherwise                    | `NotStarted`  |
///
/// An in-progress unit outranks a blocked one.
pub fn aggregate_project_status<I>(unit_statuses: I) -> ProjectStatus
where
    I: IntoIterator<Item = UnitStatus>,
{
    let mut seen_any = false;
    let mut all_completed = true;
    let mut any_blocked = false;

    for status in unit_statuses {
        seen_any = true;
        match status {
            UnitStatus::InProgress => return ProjectStatus::Running,
            UnitStatus::Completed => {}
            UnitStatus::Blocked => {
                all_completed = false;
                any_blocked = true;
            }
            UnitStatus::NotStarted => all_completed = false,
        }
    }

    if !seen_any {
        ProjectStatus::NotStarted
    } else if all_completed {
        ProjectStatus::Completed
    } else if any_blocked {
        ProjectStatus::Blocked
    } else {
        ProjectStatus::NotStarted
    }
}

/// Aggregate from stored status strings, failing closed.
///
/// Unrecognised values count as `NotStarted` and are logged.
pub fn aggregate_stored_units<S: AsRef<str>>(unit_statuses: &[S]) -> ProjectStatus {
    aggregate_project_status(unit_statuses.iter().map(|raw| {
        raw.as_ref().parse::<UnitStatus>().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "treating unit with unknown status as not started");
            UnitStatus::NotStarted
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use UnitStatus::*;

    #[test]
    fn test_unit_status_strings_match_storage() {
        assert_eq!(NotStarted.as_str(), "Not Started");
        assert_eq!("In Progress".parse::<UnitStatus>().unwrap(), InProgress);
        assert_eq!(
            serde_json::to_string(&NotStarted).unwrap(),
            "\"Not Started\""
        );
        assert_eq!(
            serde_json::from_str::<UnitStatus>("\"In Progress\"").unwrap(),
            InProgress
        );
    }

    #[test]
    fn test_unit_status_rejects_unknown() {
        assert!(matches!(
            "in_progress".parse::<UnitStatus>(),
            Err(StatusError::InvalidStatus { kind: "unit", .. })
        ));
    }

    #[test]
    fn test_empty_is_not_started() {
        assert_eq!(aggregate_project_status(Vec::<UnitStatus>::new()), ProjectStatus::NotStarted);
    }

    #[test]
    fn test_in_progress_dominates_blocked() {
        assert_eq!(aggregate_project_status([Blocked, InProgress]), ProjectStatus::Running);
        assert_eq!(aggregate_project_status([InProgress, Blocked]), ProjectStatus::Running);
    }

    #[test]
    fn test_all_completed() {
        assert_eq!(aggregate_project_status([Completed, Completed]), ProjectStatus::Completed);
        assert_eq!(aggregate_project_status([Completed]), ProjectStatus::Completed);
    }

    #[test]
    fn test_blocked_beats_not_started() {
        assert_eq!(aggregate_project_status([Blocked, NotStarted]), ProjectStatus::Blocked);
        assert_eq!(aggregate_project_status([Completed, Blocked]), ProjectStatus::Blocked);
    }

    #[test]
    fn test_partially_completed_is_not_started() {
        assert_eq!(aggregate_project_status([Completed, NotStarted]), ProjectStatus::NotStarted);
    }

    #[test]
    fn test_stored_units_fail_closed() {
        assert_eq!(aggregate_stored_units(&["Completed", "Paused"]), ProjectStatus::NotStarted);
        assert_eq!(aggregate_stored_units(&["bogus", "In Progress"]), ProjectStatus::Running);
        assert_eq!(aggregate_stored_units::<&str>(&[]), ProjectStatus::NotStarted);
    }
}
