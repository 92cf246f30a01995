use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::date_math::{days_between, parse_calendar_date};
use crate::errors::StatusError;

/// Tasks due within this many days (inclusive) are flagged as due soon.
pub const DUE_SOON_DAYS: i64 = 2;

/// Lifecycle status of a task as entered by users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "overdue" => Ok(Self::Overdue),
            _ => Err(StatusError::InvalidStatus {
                kind: "task",
                value: s.to_string(),
            }),
        }
    }
}

/// Due-date derived classification of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UrgencyLabel {
    Completed,
    Overdue,
    DueSoon,
    Normal,
}

impl UrgencyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Overdue => "overdue",
            Self::DueSoon => "due-soon",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for UrgencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a task by status and due date relative to `today`.
///
/// A completed task is `Completed` whatever its due date. Otherwise the
/// number of days left decides: negative is `Overdue`, up to
/// [`DUE_SOON_DAYS`] is `DueSoon`, anything later is `Normal`.
pub fn classify_task_urgency(status: TaskStatus, due_date: NaiveDate, today: NaiveDate) -> UrgencyLabel {
    if status == TaskStatus::Completed {
        return UrgencyLabel::Completed;
    }
    let days_left = days_between(today, due_date);
    if days_left < 0 {
        UrgencyLabel::Overdue
    } else if days_left <= DUE_SOON_DAYS {
        UrgencyLabel::DueSoon
    } else {
        UrgencyLabel::Normal
    }
}

/// Classify a task from its stored string fields, failing closed.
///
/// An unknown status or unparseable due date yields `Normal` and a warning.
/// The status is checked first, so a completed task with a broken date is
/// still reported as `Completed`.
pub fn classify_stored_task(status: &str, due_date: &str, today: NaiveDate) -> UrgencyLabel {
    let status = match status.parse::<TaskStatus>() {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(error = %e, "treating task with unknown status as normal");
            return UrgencyLabel::Normal;
        }
    };
    if status == TaskStatus::Completed {
        return UrgencyLabel::Completed;
    }
    match parse_calendar_date(due_date) {
        Ok(due) => classify_task_urgency(status, due, today),
        Err(e) => {
            tracing::warn!(error = %e, "treating task with invalid due date as normal");
            UrgencyLabel::Normal
        }
    }
}

/// Whether a task belongs in the due-task digest.
///
/// Completed tasks never do; tasks manually marked overdue always do;
/// otherwise anything due within [`DUE_SOON_DAYS`] or already past.
pub fn needs_attention(status: TaskStatus, due_date: NaiveDate, today: NaiveDate) -> bool {
    match status {
        TaskStatus::Completed => false,
        TaskStatus::Overdue => true,
        _ => days_between(today, due_date) <= DUE_SOON_DAYS,
    }
}
