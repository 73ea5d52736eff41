use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use scheduler_core::config::ClockConfig;
use scheduler_core::events::{EventKind, RecordingListener, SchedulerEvent};
use scheduler_core::models::{Task, TaskState};
use scheduler_core::time::FixedClock;
use scheduler_core::traits::{LockProvider, TaskScheduler, Transport};
use scheduler_core::SchedulerError;
use scheduler_dispatcher::scheduler::SCHEDULE_LOCK_PREFIX;
use scheduler_dispatcher::Scheduler;
use scheduler_infrastructure::{InMemoryLockProvider, InMemoryMessageBus, InMemoryTransport};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
}

/// 时钟固定在 2024-01-01 10:00 UTC 的调度器
fn scheduler() -> (Scheduler, Arc<FixedClock>, Arc<InMemoryTransport>) {
    let clock = Arc::new(FixedClock::new(at(10, 0)));
    let transport = Arc::new(InMemoryTransport::default());
    let scheduler = Scheduler::new("UTC", transport.clone())
        .unwrap()
        .with_clock(clock.clone());
    (scheduler, clock, transport)
}

#[tokio::test]
async fn test_due_tasks_follow_cron_expressions() {
    let (scheduler, _clock, _transport) = scheduler();
    scheduler
        .schedule(Task::null("every-five").with_expression("*/5 * * * *"))
        .await
        .unwrap();
    scheduler
        .schedule(Task::null("hourly").with_expression("0 * * * *"))
        .await
        .unwrap();

    let mut due = scheduler.get_due_tasks(at(10, 0)).await.unwrap().names();
    due.sort();
    assert_eq!(due, vec!["every-five", "hourly"]);

    assert_eq!(
        scheduler.get_due_tasks(at(10, 5)).await.unwrap().names(),
        vec!["every-five"]
    );
    assert!(scheduler.get_due_tasks(at(10, 7)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_task_timezone_is_used_for_matching() {
    let (scheduler, _clock, _transport) = scheduler();
    scheduler
        .schedule(
            Task::null("morning-report")
                .with_expression("0 18 * * *")
                .with_timezone("+08:00"),
        )
        .await
        .unwrap();

    assert_eq!(scheduler.get_due_tasks(at(10, 0)).await.unwrap().len(), 1);
    assert!(scheduler.get_due_tasks(at(18, 0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_execution_window() {
    let (scheduler, _clock, _transport) = scheduler();
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    scheduler
        .schedule(Task::null("later").with_execution_window(Some(start), None))
        .await
        .unwrap();

    assert!(scheduler.get_due_tasks(at(10, 0)).await.unwrap().is_empty());
    assert_eq!(
        scheduler.next_due_date("later", at(10, 0)).await.unwrap(),
        Some(start)
    );

    let end = at(10, 30);
    scheduler
        .schedule(Task::null("closing").with_execution_window(None, Some(end)))
        .await
        .unwrap();
    assert_eq!(
        scheduler.get_due_tasks(at(10, 29)).await.unwrap().names(),
        vec!["closing"]
    );
    assert!(scheduler.get_due_tasks(at(10, 30)).await.unwrap().is_empty());
    assert_eq!(scheduler.next_due_date("closing", at(10, 29)).await.unwrap(), None);
}

#[tokio::test]
async fn test_paused_tasks_are_still_listed() {
    let (scheduler, _clock, _transport) = scheduler();
    scheduler.schedule(Task::null("foo")).await.unwrap();
    scheduler.pause("foo").await.unwrap();

    let due = scheduler.get_due_tasks(at(10, 0)).await.unwrap();
    assert_eq!(due.names(), vec!["foo"]);
    assert_eq!(due.get("foo").unwrap().state, TaskState::Paused);

    scheduler.resume("foo").await.unwrap();
    assert!(scheduler.get_tasks().await.unwrap().get("foo").unwrap().is_enabled());
}

#[tokio::test]
async fn test_schedule_fills_scheduling_fields_and_emits_events() {
    let (scheduler, _clock, transport) = scheduler();
    let listener = Arc::new(RecordingListener::all());
    scheduler.events().subscribe(listener.clone());

    scheduler.schedule(Task::null("foo").with_timezone("")).await.unwrap();
    let stored = transport.get("foo").await.unwrap();
    assert_eq!(stored.scheduled_at, Some(at(10, 0)));
    assert_eq!(stored.arrival_time, Some(at(10, 0)));
    assert_eq!(stored.timezone, "UTC");

    let err = scheduler.schedule(Task::null("foo")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Transport(_)));

    scheduler.unschedule("foo").await.unwrap();
    assert_eq!(
        listener.kinds(),
        vec![EventKind::TaskScheduled, EventKind::TaskUnscheduled]
    );
}

#[tokio::test]
async fn test_failing_post_scheduling_hook_unschedules_task() {
    let (scheduler, _clock, transport) = scheduler();
    let err = scheduler
        .schedule(Task::null("foo").after_scheduling(|_| false))
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::MiddlewareFailed { .. }));
    assert!(transport.get("foo").await.unwrap_err().is_not_found());

    let err = scheduler
        .schedule(Task::null("bar").before_scheduling(|_| false))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::MiddlewareFailed { .. }));
    assert_eq!(transport.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reboot_keeps_only_reboot_tasks() {
    let (scheduler, _clock, _transport) = scheduler();
    let listener = Arc::new(RecordingListener::new(vec![EventKind::SchedulerRebooted]));
    scheduler.events().subscribe(listener.clone());

    scheduler
        .schedule(Task::null("warmup").with_expression("@reboot"))
        .await
        .unwrap();
    scheduler.schedule(Task::null("minutely")).await.unwrap();

    // @reboot 任务不会出现在到期列表中
    assert_eq!(
        scheduler.get_due_tasks(at(10, 0)).await.unwrap().names(),
        vec!["minutely"]
    );

    scheduler.reboot().await.unwrap();
    assert_eq!(scheduler.get_tasks().await.unwrap().names(), vec!["warmup"]);
    assert!(matches!(
        listener.events().as_slice(),
        [SchedulerEvent::SchedulerRebooted { tasks }] if tasks == &vec!["warmup".to_string()]
    ));
    assert_eq!(scheduler.next_due_date("warmup", at(10, 0)).await.unwrap(), None);
}

#[tokio::test]
async fn test_schedule_lock_prevents_concurrent_scheduling() {
    let lock = Arc::new(InMemoryLockProvider::default());
    let (scheduler, _clock, transport) = scheduler();
    let scheduler = scheduler.with_lock_provider(lock.clone());

    let key = format!("{SCHEDULE_LOCK_PREFIX}foo");
    assert!(lock.acquire(&key).await.unwrap());
    let err = scheduler.schedule(Task::null("foo")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::LockUnavailable(_)));
    assert_eq!(transport.count().await.unwrap(), 0);

    lock.release(&key).await.unwrap();
    scheduler.schedule(Task::null("foo")).await.unwrap();
    assert!(!lock.is_acquired(&key).await.unwrap());
}

#[tokio::test]
async fn test_clock_drift_fails_fast() {
    let (scheduler, clock, _transport) = scheduler();
    let scheduler = scheduler.with_clock_config(&ClockConfig {
        max_backward_skew_ms: 1000,
        max_drift_secs: Some(3600),
    });
    scheduler.schedule(Task::null("foo")).await.unwrap();

    let err = scheduler
        .get_due_tasks(at(10, 0) - Duration::seconds(2))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::ClockDriftExceeded { .. }));
    assert!(scheduler.get_due_tasks(at(12, 0)).await.is_err());

    clock.advance(Duration::hours(2));
    assert!(matches!(
        scheduler.schedule(Task::null("bar")).await,
        Err(SchedulerError::ClockDriftExceeded { .. })
    ));
}

#[tokio::test]
async fn test_queued_tasks_go_through_the_bus() {
    let bus = Arc::new(InMemoryMessageBus::default());
    let (scheduler, _clock, transport) = scheduler();
    let scheduler = scheduler.with_message_bus(bus.clone());

    scheduler.schedule(Task::null("async").queued()).await.unwrap();
    scheduler.schedule(Task::null("sync")).await.unwrap();
    assert_eq!(transport.list().await.unwrap().names(), vec!["sync"]);

    assert_eq!(bus.drain(&scheduler).await.unwrap(), 1);
    let stored = transport.get("async").await.unwrap();
    assert_eq!(stored.scheduled_at, Some(at(10, 0)));
}

#[tokio::test]
async fn test_yield_reschedules_task() {
    let bus = Arc::new(InMemoryMessageBus::default());
    let (scheduler, clock, transport) = scheduler();
    let scheduler = scheduler.with_message_bus(bus.clone());
    scheduler.schedule(Task::null("foo")).await.unwrap();

    clock.advance(Duration::seconds(30));
    scheduler.yield_task("foo", false).await.unwrap();
    let yielded = transport.get("foo").await.unwrap();
    assert_eq!(yielded.scheduled_at, Some(at(10, 0) + Duration::seconds(30)));

    clock.advance(Duration::seconds(10));
    scheduler.yield_task("foo", true).await.unwrap();
    assert_eq!(transport.get("foo").await.unwrap().scheduled_at, yielded.scheduled_at);

    bus.drain(&scheduler).await.unwrap();
    assert_eq!(
        transport.get("foo").await.unwrap().scheduled_at,
        Some(at(10, 0) + Duration::seconds(40))
    );
}

#[tokio::test]
async fn test_update_and_missing_tasks() {
    let (scheduler, _clock, transport) = scheduler();
    scheduler.schedule(Task::null("foo")).await.unwrap();

    let mut task = transport.get("foo").await.unwrap();
    task.expression = "0 0 * * *".to_string();
    scheduler.update("foo", task).await.unwrap();
    assert!(scheduler.get_due_tasks(at(10, 0)).await.unwrap().is_empty());
    assert_eq!(
        scheduler.next_due_date("foo", at(10, 0)).await.unwrap(),
        Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
    );

    assert!(scheduler.pause("missing").await.unwrap_err().is_not_found());
    assert!(scheduler.unschedule("missing").await.unwrap_err().is_not_found());
    assert!(scheduler.next_due_date("missing", at(10, 0)).await.is_err());
}
