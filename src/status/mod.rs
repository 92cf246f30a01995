//! Derived-status engine.
//!
//! Pure functions that compute health indicators from stored data. Nothing
//! here is persisted; callers re-evaluate on every read.
//!
//! | Module      | Responsibility                                           |
//! |-------------|----------------------------------------------------------|
//! | `date_math` | Calendar-date parsing and signed day differences         |
//! | `urgency`   | `TaskStatus` + due date → `UrgencyLabel`                 |
//! | `aggregate` | Unit statuses → `ProjectStatus`                          |
//! | `age`       | Days since a project started → `AgeBand`                 |
//! | `clock`     | `Clock` trait supplying "today"                          |

pub mod age;
pub mod aggregate;
pub mod clock;
pub mod date_math;
pub mod urgency;

pub use age::{AgeBand, project_age_days, stored_project_age};
pub use aggregate::{ProjectStatus, UnitStatus, aggregate_project_status, aggregate_stored_units};
pub use clock::{Clock, FixedClock, SystemClock};
pub use date_math::{days_between, format_calendar_date, parse_calendar_date};
pub use urgency::{
    DUE_SOON_DAYS, TaskStatus, UrgencyLabel, classify_stored_task, classify_task_urgency,
    needs_attention,
};
