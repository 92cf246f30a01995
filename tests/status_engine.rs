//! Behavioural tests for the derived-status engine through the public API.

use chrono::{Duration, NaiveDate};
use jobstatus::status::{
    DUE_SOON_DAYS, ProjectStatus, TaskStatus, UnitStatus, UrgencyLabel, aggregate_project_status,
    classify_stored_task, classify_task_urgency, days_between, parse_calendar_date,
};

const OPEN_STATUSES: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Overdue];

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn today() -> NaiveDate {
    d(2024, 3, 10)
}

// =============================================================================
// Urgency
// =============================================================================

#[test]
fn every_past_date_is_overdue_for_open_tasks() {
    for status in OPEN_STATUSES {
        for back in [1, 2, 30, 365, 3650] {
            let due = today() - Duration::days(back);
            assert_eq!(
                classify_task_urgency(status, due, today()),
                UrgencyLabel::Overdue,
                "{status} due {back} day(s) ago"
            );
        }
    }
}

#[test]
fn today_through_two_days_out_is_due_soon() {
    for status in OPEN_STATUSES {
        for ahead in 0..=DUE_SOON_DAYS {
            let due = today() + Duration::days(ahead);
            assert_eq!(classify_task_urgency(status, due, today()), UrgencyLabel::DueSoon);
        }
        let later = today() + Duration::days(DUE_SOON_DAYS + 1);
        assert_eq!(classify_task_urgency(status, later, today()), UrgencyLabel::Normal);
    }
}

#[test]
fn completed_wins_over_any_due_date() {
    for due in [d(1999, 1, 1), today(), d(2099, 12, 31)] {
        assert_eq!(
            classify_task_urgency(TaskStatus::Completed, due, today()),
            UrgencyLabel::Completed
        );
    }
}

#[test]
fn urgency_is_recomputed_as_the_day_moves() {
    let due = d(2024, 3, 15);
    let status = TaskStatus::Pending;
    assert_eq!(classify_task_urgency(status, due, d(2024, 3, 1)), UrgencyLabel::Normal);
    assert_eq!(classify_task_urgency(status, due, d(2024, 3, 13)), UrgencyLabel::DueSoon);
    assert_eq!(classify_task_urgency(status, due, d(2024, 3, 15)), UrgencyLabel::DueSoon);
    assert_eq!(classify_task_urgency(status, due, d(2024, 3, 16)), UrgencyLabel::Overdue);
}

#[test]
fn due_soon_window_crosses_month_and_leap_day() {
    assert_eq!(
        classify_task_urgency(TaskStatus::Pending, d(2024, 3, 1), d(2024, 2, 28)),
        UrgencyLabel::DueSoon
    );
    assert_eq!(days_between(d(2024, 2, 28), d(2024, 3, 1)), 2);
    assert_eq!(days_between(d(2023, 2, 28), d(2023, 3, 1)), 1);
}

// =============================================================================
// Aggregation
// =============================================================================

#[test]
fn aggregation_rules() {
    use UnitStatus::*;
    assert_eq!(aggregate_project_status(Vec::<UnitStatus>::new()), ProjectStatus::NotStarted);
    assert_eq!(aggregate_project_status([InProgress, Blocked]), ProjectStatus::Running);
    assert_eq!(aggregate_project_status([Completed, Completed]), ProjectStatus::Completed);
    assert_eq!(aggregate_project_status([Blocked, NotStarted]), ProjectStatus::Blocked);
}

#[test]
fn aggregation_ignores_unit_order() {
    use UnitStatus::*;
    let units = [Completed, Blocked, NotStarted, Completed];
    let mut reversed = units;
    reversed.reverse();
    assert_eq!(aggregate_project_status(units), aggregate_project_status(reversed));
    assert_eq!(aggregate_project_status(units), ProjectStatus::Blocked);
}

// =============================================================================
// Dates
// =============================================================================

#[test]
fn calendar_date_ignores_time_and_offset() {
    let expected = today();
    for raw in [
        "2024-03-10",
        " 2024-03-10 ",
        "2024-03-10T00:00:00.000Z",
        "2024-03-10T23:59:59-08:00",
        "2024-03-10 18:30:00",
    ] {
        assert_eq!(parse_calendar_date(raw).unwrap(), expected, "{raw}");
    }
}

#[test]
fn invalid_dates_are_rejected() {
    for raw in ["", "10/03/2024", "2024-13-01", "2023-02-29", "soon"] {
        assert!(parse_calendar_date(raw).is_err(), "{raw}");
    }
}

// =============================================================================
// End-to-end example
// =============================================================================

#[test]
fn board_example_for_2024_03_10() {
    let cases = [
        ("A", "pending", "2024-03-09", UrgencyLabel::Overdue),
        ("B", "pending", "2024-03-11", UrgencyLabel::DueSoon),
        ("C", "pending", "2024-04-01", UrgencyLabel::Normal),
        ("D", "completed", "2024-01-01", UrgencyLabel::Completed),
    ];
    for (name, status, due, expected) in cases {
        assert_eq!(classify_stored_task(status, due, today()), expected, "task {name}");
    }
}

#[test]
fn stored_values_fail_closed() {
    assert_eq!(classify_stored_task("archived", "2024-03-01", today()), UrgencyLabel::Normal);
    assert_eq!(classify_stored_task("pending", "not a date", today()), UrgencyLabel::Normal);
    assert_eq!(classify_stored_task("completed", "not a date", today()), UrgencyLabel::Completed);
}
