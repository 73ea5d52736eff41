use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

/// Worker状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerState {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "STOPPING")]
    Stopping,
    #[serde(rename = "STOPPED")]
    Stopped,
}

impl WorkerState {
    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Running => 1,
            WorkerState::Stopping => 2,
            WorkerState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

#[derive(Debug)]
struct WorkerShared {
    id: String,
    state: AtomicU8,
    should_stop: AtomicBool,
    executed_tasks: AtomicUsize,
    failed_tasks: AtomicUsize,
    last_executed_task: Mutex<Option<String>>,
    wake: Notify,
}

/// Worker 的共享控制句柄
///
/// 事件监听器和信号处理通过它请求停止; 停止是协作式的, 只在两个任务之间生效.
#[derive(Debug, Clone)]
pub struct WorkerControl {
    shared: Arc<WorkerShared>,
}

impl WorkerControl {
    pub fn new() -> Self {
        Self::with_id(format!("worker-{}", Uuid::new_v4()))
    }

    pub fn with_id<S: Into<String>>(id: S) -> Self {
        Self {
            shared: Arc::new(WorkerShared {
                id: id.into(),
                state: AtomicU8::new(WorkerState::Stopped.as_u8()),
                should_stop: AtomicBool::new(false),
                executed_tasks: AtomicUsize::new(0),
                failed_tasks: AtomicUsize::new(0),
                last_executed_task: Mutex::new(None),
                wake: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: WorkerState) {
        self.shared.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// 请求停止
    pub fn stop(&self) {
        self.shared.should_stop.store(true, Ordering::SeqCst);
        if matches!(self.state(), WorkerState::Idle | WorkerState::Running) {
            self.set_state(WorkerState::Stopping);
        }
        self.shared.wake.notify_waiters();
    }

    pub fn should_stop(&self) -> bool {
        self.shared.should_stop.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// 清除停止请求和计数器
    pub fn reset(&self) {
        self.shared.should_stop.store(false, Ordering::SeqCst);
        self.shared.executed_tasks.store(0, Ordering::SeqCst);
        self.shared.failed_tasks.store(0, Ordering::SeqCst);
    }

    pub fn executed_tasks(&self) -> usize {
        self.shared.executed_tasks.load(Ordering::SeqCst)
    }

    pub fn record_executed(&self, name: &str) {
        self.shared.executed_tasks.fetch_add(1, Ordering::SeqCst);
        self.set_last_executed_task(name);
    }

    pub fn failed_tasks(&self) -> usize {
        self.shared.failed_tasks.load(Ordering::SeqCst)
    }

    pub fn record_failure(&self) {
        self.shared.failed_tasks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn last_executed_task(&self) -> Option<String> {
        self.shared
            .last_executed_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_last_executed_task(&self, name: &str) {
        let mut last = self
            .shared
            .last_executed_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(name.to_string());
    }

    /// 等待 `stop()` 唤醒
    pub async fn stopped(&self) {
        let notified = self.shared.wake.notified();
        if self.should_stop() {
            return;
        }
        notified.await;
    }
}

impl Default for WorkerControl {
    fn default() -> Self {
        Self::new()
    }
}
