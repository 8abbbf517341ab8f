use chrono::{DateTime, TimeZone, Utc};
use cronwork_core::{CronEvaluator, ScheduleError};

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

#[test]
fn standard_cron_expressions() {
    let evaluator = CronEvaluator::utc();

    let cases = [
        // every minute
        ("* * * * *", at(2026, 3, 1, 10, 0, 0), true),
        ("* * * * *", at(2026, 3, 1, 10, 5, 45), true),
        // specific minute
        ("30 * * * *", at(2026, 3, 1, 10, 30, 0), true),
        ("30 * * * *", at(2026, 3, 1, 10, 31, 0), false),
        // hourly
        ("0 * * * *", at(2026, 3, 1, 11, 0, 0), true),
        ("0 * * * *", at(2026, 3, 1, 11, 1, 0), false),
        // daily
        ("30 14 * * *", at(2026, 3, 1, 14, 30, 0), true),
        ("30 14 * * *", at(2026, 3, 1, 14, 31, 0), false),
        // steps
        ("*/5 * * * *", at(2026, 3, 1, 10, 0, 0), true),
        ("*/5 * * * *", at(2026, 3, 1, 10, 5, 0), true),
        ("*/5 * * * *", at(2026, 3, 1, 10, 4, 0), false),
        // ranges
        ("0 1-3 * * *", at(2026, 3, 1, 1, 0, 0), true),
        ("0 1-3 * * *", at(2026, 3, 1, 2, 0, 0), true),
        ("0 1-3 * * *", at(2026, 3, 1, 4, 0, 0), false),
        // lists
        ("0,30 * * * *", at(2026, 3, 1, 10, 0, 0), true),
        ("0,30 * * * *", at(2026, 3, 1, 10, 15, 0), false),
        // weekly (2026-03-01 is a Sunday)
        ("0 0 * * 0", at(2026, 3, 1, 0, 0, 0), true),
        ("0 0 * * 0", at(2026, 3, 2, 0, 0, 0), false),
        // monthly
        ("0 0 1 * *", at(2026, 3, 1, 0, 0, 0), true),
        // quarterly
        ("0 0 1 1,4,7,10 *", at(2026, 1, 1, 0, 0, 0), true),
        ("0 0 1 1,4,7,10 *", at(2026, 3, 1, 0, 0, 0), false),
    ];

    for (expression, instant, expected) in cases {
        assert_eq!(
            evaluator.is_due(expression, instant).unwrap(),
            expected,
            "'{expression}' at {instant}"
        );
    }
}

#[test]
fn seconds_are_evaluated_before_and_conjunctively_with_minutes() {
    let evaluator = CronEvaluator::utc();

    let cases = [
        ("* * * * * *", at(2026, 3, 1, 10, 0, 5), true),
        ("30 * * * * *", at(2026, 3, 1, 10, 0, 30), true),
        ("30 * * * * *", at(2026, 3, 1, 10, 0, 31), false),
        ("*/2 * * * * *", at(2026, 3, 1, 10, 0, 0), true),
        ("*/2 * * * * *", at(2026, 3, 1, 10, 0, 2), true),
        ("*/2 * * * * *", at(2026, 3, 1, 10, 0, 3), false),
        ("0 0 10 * * *", at(2026, 3, 1, 10, 0, 0), true),
        // seconds match but the minute field misses
        ("0 30 * * * *", at(2026, 3, 1, 10, 0, 0), false),
    ];

    for (expression, instant, expected) in cases {
        assert_eq!(
            evaluator.is_due(expression, instant).unwrap(),
            expected,
            "'{expression}' at {instant}"
        );
    }
}

#[test]
fn minute_match_ignores_seconds_in_five_field_form() {
    let evaluator = CronEvaluator::utc();
    assert!(evaluator
        .is_due("30 * * * *", at(2026, 3, 1, 10, 30, 59))
        .unwrap());
}

#[test]
fn timezone_conversion_happens_before_matching() {
    let tokyo = CronEvaluator::new(chrono_tz::Asia::Tokyo);
    let now_utc = at(2026, 3, 1, 14, 30, 0);

    // 14:30 UTC is 23:30 in Tokyo.
    assert!(tokyo.is_due("30 23 * * *", now_utc).unwrap());
    assert!(!tokyo.is_due("30 14 * * *", now_utc).unwrap());

    let utc = CronEvaluator::utc();
    assert!(!utc.is_due("30 23 * * *", now_utc).unwrap());
}

#[test]
fn malformed_expressions_name_the_offending_field() {
    let evaluator = CronEvaluator::utc();
    let instant = at(2026, 3, 1, 10, 0, 0);

    match evaluator.is_due("* * * *", instant) {
        Err(ScheduleError::Format { field, .. }) => assert_eq!(field, "field count"),
        other => panic!("expected format error, got {other:?}"),
    }

    match evaluator.is_due("61 * * * *", instant) {
        Err(ScheduleError::Format { field, .. }) => assert_eq!(field, "minute"),
        other => panic!("expected format error, got {other:?}"),
    }

    match evaluator.is_due("* 25 * * *", instant) {
        Err(ScheduleError::Format { field, .. }) => assert_eq!(field, "hour"),
        other => panic!("expected format error, got {other:?}"),
    }

    match evaluator.is_due("99 * * * * *", instant) {
        Err(ScheduleError::Format { field, .. }) => assert_eq!(field, "second"),
        other => panic!("expected format error, got {other:?}"),
    }

    // A bad list part fails even at instants where another part matches.
    let matching_minute = at(2026, 3, 1, 10, 5, 0);
    match evaluator.is_due("5,99 * * * *", matching_minute) {
        Err(ScheduleError::Format { field, .. }) => assert_eq!(field, "minute"),
        other => panic!("expected format error, got {other:?}"),
    }
}

#[test]
fn next_run_advances_to_the_following_match() {
    let evaluator = CronEvaluator::utc();

    let next = evaluator
        .next_run_after("0 0 * * *", at(2026, 3, 1, 10, 15, 30))
        .unwrap();
    assert_eq!(next, at(2026, 3, 2, 0, 0, 0));

    let next = evaluator
        .next_run_after("*/5 * * * *", at(2026, 3, 1, 10, 1, 0))
        .unwrap();
    assert_eq!(next, at(2026, 3, 1, 10, 5, 0));

    // strictly after: an exact match at `from` moves to the next window
    let next = evaluator
        .next_run_after("*/5 * * * *", at(2026, 3, 1, 10, 5, 0))
        .unwrap();
    assert_eq!(next, at(2026, 3, 1, 10, 10, 0));
}

#[test]
fn next_run_respects_the_configured_zone() {
    let tokyo = CronEvaluator::new(chrono_tz::Asia::Tokyo);

    // Tokyo 23:30 is 14:30 UTC.
    let next = tokyo
        .next_run_after("30 23 * * *", at(2026, 3, 1, 10, 0, 0))
        .unwrap();
    assert_eq!(next, at(2026, 3, 1, 14, 30, 0));
}

#[test]
fn next_run_on_six_field_form_uses_trailing_fields() {
    let evaluator = CronEvaluator::utc();
    let next = evaluator
        .next_run_after("*/30 0 0 * * *", at(2026, 3, 1, 10, 0, 0))
        .unwrap();
    assert_eq!(next, at(2026, 3, 2, 0, 0, 0));
}
