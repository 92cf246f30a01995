//! How long a project has been running.
//!
//! Age is counted in whole calendar days from the project's start date to
//! `today`, never negative, and bucketed for display.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::date_math::{days_between, parse_calendar_date};

/// Upper bound (inclusive) of the `Week` band.
pub const WEEK_DAYS: i64 = 7;
/// Upper bound (inclusive) of the `Month` band.
pub const MONTH_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeBand {
    /// Starts today, or in the future.
    New,
    Week,
    Month,
    Long,
}

impl AgeBand {
    pub fn from_days(days: i64) -> Self {
        match days {
            i64::MIN..=0 => Self::New,
            1..=WEEK_DAYS => Self::Week,
            _ if days <= MONTH_DAYS => Self::Month,
            _ => Self::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Week => "week",
            Self::Month => "month",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Days since `start`, clamped at zero for projects that have not begun.
pub fn project_age_days(start: NaiveDate, today: NaiveDate) -> i64 {
    days_between(start, today).max(0)
}

/// Age from a stored start date. An unparseable date counts as zero days.
pub fn stored_project_age(start: &str, today: NaiveDate) -> i64 {
    match parse_calendar_date(start) {
        Ok(start) => project_age_days(start, today),
        Err(e) => {
            tracing::warn!(error = %e, "treating project with invalid start date as new");
            0
        }
    }
}
