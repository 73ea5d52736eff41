use std::sync::Arc;

use scheduler_core::models::{Task, TaskState};
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerError, TransportError};
use scheduler_infrastructure::{
    FailoverTransport, FilesystemTransport, InMemoryTransport, TransportFactory,
};

/// 创建带时间戳的任务, 便于按调度顺序断言
fn scheduled(name: &str, offset_secs: i64) -> Task {
    let mut task = Task::null(name).with_expression("* * * * *");
    task.scheduled_at = Some(chrono::Utc::now() + chrono::Duration::seconds(offset_secs));
    task
}

#[tokio::test]
async fn test_failover_from_memory_to_filesystem_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let dsn = format!(
        "failover://(fs://{} || memory://first_in_first_out)",
        dir.path().display()
    );

    let transport = TransportFactory::create(&dsn).unwrap();
    transport.create(scheduled("backup", 0)).await.unwrap();
    transport.pause("backup").await.unwrap();

    // 新实例从同一个目录读取
    let reopened = TransportFactory::create(&dsn).unwrap();
    let task = reopened.get("backup").await.unwrap();
    assert_eq!(task.state, TaskState::Paused);
    assert_eq!(task.expression, "* * * * *");
}

#[tokio::test]
async fn test_failover_reports_not_found_from_every_transport() {
    let transport = FailoverTransport::new(
        vec![
            Arc::new(InMemoryTransport::default()),
            Arc::new(InMemoryTransport::default()),
        ],
        TransportConfiguration::new(),
    );

    match transport.get("missing").await {
        Err(SchedulerError::Transport(TransportError::AllTransportsFailed { causes, .. })) => {
            assert_eq!(causes.len(), 2);
            assert!(causes.iter().all(|cause| cause.starts_with("memory")));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn test_execution_mode_from_dsn_orders_listing() {
    let transport = TransportFactory::create("memory://first_in_last_out").unwrap();
    transport.create(scheduled("first", 0)).await.unwrap();
    transport.create(scheduled("second", 10)).await.unwrap();
    transport.create(scheduled("third", 20)).await.unwrap();

    let names = transport.list().await.unwrap().names();
    assert_eq!(names, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn test_round_robin_spreads_tasks_over_directories() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let dsn = format!(
        "roundrobin://(fs://{} && fs://{})",
        first.path().display(),
        second.path().display()
    );
    let transport = TransportFactory::create(&dsn).unwrap();

    for name in ["a", "b", "c", "d"] {
        transport.create(Task::null(name)).await.unwrap();
    }

    let left = FilesystemTransport::new(first.path(), TransportConfiguration::new()).unwrap();
    let right = FilesystemTransport::new(second.path(), TransportConfiguration::new()).unwrap();
    assert_eq!(left.count().await.unwrap(), 2);
    assert_eq!(right.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_long_tail_balances_uneven_stores() {
    let transport = TransportFactory::create("longtail://(memory://fifo <> memory://fifo)").unwrap();
    for index in 0..6 {
        transport.create(Task::null(format!("task-{index}"))).await.unwrap();
    }

    // 每次写入最空的存储, 两边最终各 3 个; list 只读其中一个
    assert_eq!(transport.list().await.unwrap().len(), 3);
}
