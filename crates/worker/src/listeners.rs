//! worker 的停止条件和任务日志
//!
//! 停止条件都通过事件里的 `WorkerControl` 请求停止, 在两个任务之间生效.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use scheduler_core::events::{EventEnvelope, EventKind, EventListener, SchedulerEvent};
use scheduler_core::models::WorkerControl;

/// 执行指定数量的任务后停止
#[derive(Debug)]
pub struct StopWorkerOnTaskLimit {
    maximum: u64,
    consumed: AtomicU64,
}

impl StopWorkerOnTaskLimit {
    pub fn new(maximum: u64) -> Self {
        Self {
            maximum,
            consumed: AtomicU64::new(0),
        }
    }
}

impl EventListener for StopWorkerOnTaskLimit {
    fn subscribed_events(&self) -> Vec<EventKind> {
        vec![EventKind::WorkerRunning]
    }

    fn on_event(&self, envelope: &EventEnvelope) {
        let SchedulerEvent::WorkerRunning { worker, idle: false } = &envelope.event else {
            return;
        };
        let consumed = self.consumed.fetch_add(1, Ordering::SeqCst) + 1;
        if consumed >= self.maximum {
            info!(worker = worker.id(), count = consumed, "已达到任务数量上限, 停止 worker");
            worker.stop();
        }
    }
}

/// 失败次数达到上限后停止
#[derive(Debug)]
pub struct StopWorkerOnFailureLimit {
    maximum: u64,
    failed: AtomicU64,
}

impl StopWorkerOnFailureLimit {
    pub fn new(maximum: u64) -> Self {
        Self {
            maximum,
            failed: AtomicU64::new(0),
        }
    }
}

impl EventListener for StopWorkerOnFailureLimit {
    fn subscribed_events(&self) -> Vec<EventKind> {
        vec![EventKind::TaskFailed, EventKind::WorkerRunning]
    }

    fn on_event(&self, envelope: &EventEnvelope) {
        match &envelope.event {
            SchedulerEvent::TaskFailed { .. } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            SchedulerEvent::WorkerRunning { worker, .. } => {
                if self.failed.load(Ordering::SeqCst) >= self.maximum {
                    self.failed.store(0, Ordering::SeqCst);
                    info!(worker = worker.id(), limit = self.maximum, "已达到失败次数上限, 停止 worker");
                    worker.stop();
                }
            }
            _ => {}
        }
    }
}

/// 从第一次启动开始计时, 超过时长后停止
#[derive(Debug)]
pub struct StopWorkerOnTimeLimit {
    limit: Duration,
    deadline: Mutex<Option<Instant>>,
}

impl StopWorkerOnTimeLimit {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            deadline: Mutex::new(None),
        }
    }
}

impl EventListener for StopWorkerOnTimeLimit {
    fn subscribed_events(&self) -> Vec<EventKind> {
        vec![
            EventKind::WorkerStarted,
            EventKind::WorkerRestarted,
            EventKind::WorkerRunning,
        ]
    }

    fn on_event(&self, envelope: &EventEnvelope) {
        let mut deadline = self
            .deadline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match &envelope.event {
            SchedulerEvent::WorkerStarted { .. } => {
                deadline.get_or_insert_with(|| Instant::now() + self.limit);
            }
            SchedulerEvent::WorkerRestarted { .. } => *deadline = None,
            SchedulerEvent::WorkerRunning { worker, .. } => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    info!(
                        worker = worker.id(),
                        limit_secs = self.limit.as_secs(),
                        last_executed_task = ?worker.last_executed_task(),
                        "已达到运行时长上限, 停止 worker"
                    );
                    worker.stop();
                }
            }
            _ => {}
        }
    }
}

/// 以日志记录任务生命周期
#[derive(Debug, Default)]
pub struct TaskLoggerListener;

impl EventListener for TaskLoggerListener {
    fn subscribed_events(&self) -> Vec<EventKind> {
        vec![
            EventKind::TaskScheduled,
            EventKind::TaskUnscheduled,
            EventKind::TaskExecuted,
            EventKind::TaskFailed,
            EventKind::SchedulerRebooted,
        ]
    }

    fn on_event(&self, envelope: &EventEnvelope) {
        let event_id = envelope.event_id;
        match &envelope.event {
            SchedulerEvent::TaskScheduled { task } => info!(%event_id, task = %task, "任务已调度"),
            SchedulerEvent::TaskUnscheduled { task } => info!(%event_id, task = %task, "任务已移除"),
            SchedulerEvent::TaskExecuted { task, output, worker } => {
                info!(%event_id, task = %task, output = ?output, worker = worker.id(), "任务已执行")
            }
            SchedulerEvent::TaskFailed { task, reason, worker } => {
                warn!(%event_id, task = %task, reason = %reason, worker = worker.id(), "任务执行失败")
            }
            SchedulerEvent::SchedulerRebooted { tasks } => info!(%event_id, tasks = ?tasks, "调度器已重启"),
            _ => {}
        }
    }
}

/// 收到 Ctrl+C 或 SIGTERM 后请求停止 worker
pub fn stop_on_signal(control: WorkerControl) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!(worker = control.id(), "收到停止信号, 当前任务完成后停止 worker");
        control.stop();
    })
}

/// 等待关闭信号
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "安装Ctrl+C信号处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "安装SIGTERM信号处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到Ctrl+C信号"),
        _ = terminate => info!("收到SIGTERM信号"),
    }
}
