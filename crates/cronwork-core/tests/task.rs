use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use cronwork_core::{
    CronEvaluator, InvocationError, InvocationRegistry, ScheduleError, Task, TaskAction,
    TaskOutcome, TaskRecord,
};
use serde_json::{Value, json};

#[test]
fn identical_command_strings_share_an_id() {
    let task1 = Task::command("echo same");
    let task2 = Task::command("echo same");
    assert_eq!(task1.id, task2.id);
}

#[test]
fn different_command_strings_get_different_ids() {
    let task1 = Task::command("echo hello");
    let task2 = Task::command("echo world");
    assert_ne!(task1.id, task2.id);
}

#[test]
fn callable_ids_are_process_unique() {
    let task1 = Task::call(|| Ok(Value::Null), None);
    let task2 = Task::call(|| Ok(Value::Null), None);
    assert!(task1.id.starts_with("closure-"));
    assert_ne!(task1.id, task2.id);
}

#[test]
fn explicit_name_overrides_the_fingerprint() {
    let task = Task::new(
        TaskAction::Command("echo x".into()),
        "* * * * *",
        Some("reports"),
    );
    assert_eq!(task.id, "reports");
}

#[tokio::test]
async fn shell_command_captures_output_and_exit_code() {
    let registry = InvocationRegistry::new();
    let task = Task::command("echo \"monkeys\"");

    let outcome = task.execute(&registry).await.unwrap();
    match outcome {
        TaskOutcome::Command {
            output,
            error,
            exit_code,
        } => {
            assert_eq!(output, "monkeys");
            assert_eq!(error, "");
            assert_eq!(exit_code, 0);
        }
        other => panic!("expected command outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn nonzero_exit_reports_through_the_envelope_without_raising() {
    let registry = InvocationRegistry::new();
    let failures = Arc::new(Mutex::new(Vec::new()));

    let mut task = Task::command("exit 3");
    let seen = failures.clone();
    task.on_failure(move |error| seen.lock().unwrap().push(error.to_string()));

    let outcome = task.execute(&registry).await.unwrap();
    assert_eq!(outcome.exit_code(), 3);
    assert!(!outcome.is_success());

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("status 3"));
}

#[tokio::test]
async fn callback_order_on_success_is_before_success_after() {
    let registry = InvocationRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut task = Task::call(|| Ok(json!("result")), None);
    let o = order.clone();
    task.on_start(move || {
        o.lock().unwrap().push("before");
        Ok(())
    });
    let o = order.clone();
    task.on_success(move |outcome| {
        assert_eq!(*outcome, TaskOutcome::Value(json!("result")));
        o.lock().unwrap().push("success");
    });
    let o = order.clone();
    task.after(move || o.lock().unwrap().push("after"));
    task.set_metadata("foo", json!("bar"));

    task.execute(&registry).await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["before", "success", "after"]);
    assert_eq!(task.metadata["foo"], json!("bar"));
}

#[tokio::test]
async fn callback_order_on_failure_is_before_failure_after_and_error_propagates() {
    let registry = InvocationRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut task = Task::call(|| Err(ScheduleError::Execution("fail".into())), None);
    let o = order.clone();
    task.on_start(move || {
        o.lock().unwrap().push("before");
        Ok(())
    });
    let o = order.clone();
    task.on_success(move |_| o.lock().unwrap().push("success"));
    let o = order.clone();
    task.on_failure(move |error| {
        assert!(error.to_string().contains("fail"));
        o.lock().unwrap().push("failure");
    });
    let o = order.clone();
    task.after(move || o.lock().unwrap().push("after"));

    let result = task.execute(&registry).await;
    assert!(result.is_err());

    assert_eq!(*order.lock().unwrap(), vec!["before", "failure", "after"]);
}

#[tokio::test]
async fn before_callback_failure_propagates_like_an_execution_failure() {
    let registry = InvocationRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let executed = Arc::new(Mutex::new(false));
    let ran = executed.clone();
    let mut task = Task::call(
        move || {
            *ran.lock().unwrap() = true;
            Ok(Value::Null)
        },
        None,
    );

    let o = order.clone();
    task.on_start(move || {
        o.lock().unwrap().push("before");
        Err(ScheduleError::Execution("hook broke".into()))
    });
    let o = order.clone();
    task.on_failure(move |_| o.lock().unwrap().push("failure"));
    let o = order.clone();
    task.after(move || o.lock().unwrap().push("after"));

    let result = task.execute(&registry).await;
    assert!(result.is_err());
    assert!(!*executed.lock().unwrap());
    assert_eq!(*order.lock().unwrap(), vec!["before", "failure", "after"]);
}

#[tokio::test]
async fn invocation_runs_through_the_registry() {
    let mut registry = InvocationRegistry::new();
    registry.register("math", "sum", |args| {
        let total: i64 = args.iter().filter_map(Value::as_i64).sum();
        Ok(json!(total))
    });

    let task = Task::invocation("math", "sum", json!([5, 10]));
    let outcome = task.execute(&registry).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Value(json!(15)));
}

#[tokio::test]
async fn invocation_error_shapes_are_distinct() {
    let mut registry = InvocationRegistry::new();
    registry.register("math", "sum", |_| Ok(Value::Null));

    let unknown_target = Task::invocation("missing", "sum", json!([]));
    match unknown_target.execute(&registry).await {
        Err(ScheduleError::Invocation(InvocationError::UnknownTarget { target })) => {
            assert_eq!(target, "missing");
        }
        other => panic!("expected unknown target, got {other:?}"),
    }

    let unknown_method = Task::invocation("math", "product", json!([]));
    match unknown_method.execute(&registry).await {
        Err(ScheduleError::Invocation(InvocationError::UnknownMethod { method, .. })) => {
            assert_eq!(method, "product");
        }
        other => panic!("expected unknown method, got {other:?}"),
    }

    let bad_args = Task::invocation("math", "sum", json!(5));
    match bad_args.execute(&registry).await {
        Err(ScheduleError::Invocation(InvocationError::InvalidArgs { .. })) => {}
        other => panic!("expected invalid args, got {other:?}"),
    }
}

#[test]
fn due_check_is_suppressed_within_the_same_minute_window() {
    let evaluator = CronEvaluator::utc();
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 30).unwrap();

    let mut task = Task::command("echo x");
    assert!(task.is_due(&evaluator, now).unwrap());

    task.mark_as_run(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 5).unwrap());
    assert!(!task.is_due(&evaluator, now).unwrap());

    let next_minute = Utc.with_ymd_and_hms(2026, 3, 1, 10, 1, 0).unwrap();
    assert!(task.is_due(&evaluator, next_minute).unwrap());
}

#[test]
fn six_field_expressions_suppress_at_second_granularity() {
    let evaluator = CronEvaluator::utc();
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 30).unwrap();

    let mut task = Task::command("echo x");
    task.cron("* * * * * *");

    task.mark_as_run(now);
    assert!(!task.is_due(&evaluator, now).unwrap());

    let next_second = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 31).unwrap();
    assert!(task.is_due(&evaluator, next_second).unwrap());
}

#[test]
fn records_round_trip_identity_and_configuration() {
    let mut task = Task::invocation("reports", "rebuild", json!(["daily"]));
    task.every_five_minutes()
        .tag("reports")
        .on_one_server(true)
        .ttl(120);

    let record = TaskRecord::try_from(&task).unwrap();
    let json = serde_json::to_string(&record).unwrap();
    let decoded: TaskRecord = serde_json::from_str(&json).unwrap();
    let restored = Task::from(decoded);

    assert_eq!(restored.id, task.id);
    assert_eq!(restored.expression, "*/5 * * * *");
    assert_eq!(restored.tags, vec!["reports".to_string()]);
    assert!(restored.without_overlapping);
    assert!(restored.on_one_server);
    assert_eq!(restored.ttl, 120);
}

#[test]
fn callable_tasks_are_not_portable() {
    let task = Task::call(|| Ok(Value::Null), Some("local-only"));
    match TaskRecord::try_from(&task) {
        Err(ScheduleError::NonPortableAction(id)) => assert_eq!(id, "local-only"),
        other => panic!("expected non-portable error, got {other:?}"),
    }
}
