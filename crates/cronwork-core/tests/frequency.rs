use cronwork_core::{CronPosition, Task, splice_into_position};

#[test]
fn every_minute_mapping() {
    let mut task = Task::command("foo");
    task.every_minute();
    assert_eq!(task.expression, "* * * * *");
}

#[test]
fn daily_maps_to_midnight() {
    let mut task = Task::command("foo");
    task.daily();
    assert_eq!(task.expression, "0 0 * * *");
}

#[test]
fn hourly_maps_to_minute_zero() {
    let mut task = Task::command("foo");
    task.hourly();
    assert_eq!(task.expression, "0 * * * *");
}

#[test]
fn at_sets_minute_and_hour() {
    let mut task = Task::command("foo");
    task.at("14:30");
    assert_eq!(task.expression, "30 14 * * *");
}

#[test]
fn weekdays_touch_only_the_weekday_field() {
    let mut task = Task::command("foo");
    task.weekdays();
    assert_eq!(task.expression, "* * * * 1-5");
}

#[test]
fn weekly_on_combines_time_and_days() {
    let mut task = Task::command("foo");
    task.weekly_on(&[1, 3], "08:15");
    assert_eq!(task.expression, "15 8 * * 1,3");
}

#[test]
fn mondays_shorthand() {
    let mut task = Task::command("foo");
    task.mondays();
    assert_eq!(task.expression, "0 0 * * 1");
}

#[test]
fn sub_minute_builders_emit_six_fields() {
    let mut task = Task::command("foo");
    task.every_thirty_seconds();
    assert_eq!(task.expression, "*/30 * * * * *");

    task.every_second();
    assert_eq!(task.expression, "* * * * * *");
}

#[test]
fn hourly_at_accepts_lists() {
    let mut task = Task::command("foo");
    task.hourly_at(&[0, 15, 45]);
    assert_eq!(task.expression, "0,15,45 * * * *");
}

#[test]
fn monthly_on_and_yearly_on() {
    let mut task = Task::command("foo");
    task.monthly_on(15, "06:00");
    assert_eq!(task.expression, "0 6 15 * *");

    task.yearly_on(4, 2, "01:30");
    assert_eq!(task.expression, "30 1 2 4 *");
}

#[test]
fn builders_preserve_a_six_field_layout() {
    let mut task = Task::command("foo");
    task.every_second().at("09:45");
    assert_eq!(task.expression, "* 45 9 * * *");

    task.weekdays();
    assert_eq!(task.expression, "* 45 9 * * 1-5");
}

// The splice table covers every logical position under both layouts; this is
// where the off-by-one risk lives.
#[test]
fn splice_table_five_field_layout() {
    let base = "0 1 2 3 4";
    let cases = [
        (CronPosition::Minute, "9 1 2 3 4"),
        (CronPosition::Hour, "0 9 2 3 4"),
        (CronPosition::DayOfMonth, "0 1 9 3 4"),
        (CronPosition::Month, "0 1 2 9 4"),
        (CronPosition::DayOfWeek, "0 1 2 3 9"),
    ];

    for (position, expected) in cases {
        assert_eq!(splice_into_position(base, position, "9"), expected);
    }
}

#[test]
fn splice_table_six_field_layout() {
    let base = "30 0 1 2 3 4";
    let cases = [
        (CronPosition::Minute, "30 9 1 2 3 4"),
        (CronPosition::Hour, "30 0 9 2 3 4"),
        (CronPosition::DayOfMonth, "30 0 1 9 3 4"),
        (CronPosition::Month, "30 0 1 2 9 4"),
        (CronPosition::DayOfWeek, "30 0 1 2 3 9"),
    ];

    for (position, expected) in cases {
        assert_eq!(splice_into_position(base, position, "9"), expected);
    }
}

#[test]
fn splice_leaves_unsupported_layouts_unchanged() {
    assert_eq!(
        splice_into_position("* * *", CronPosition::Minute, "9"),
        "* * *"
    );
}
