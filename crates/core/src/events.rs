use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{OutputKind, WorkerControl};

/// 事件类型, 监听器按类型订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TaskScheduled,
    TaskUnscheduled,
    TaskExecuting,
    TaskExecuted,
    TaskFailed,
    SchedulerRebooted,
    WorkerStarted,
    WorkerRunning,
    WorkerStopped,
    WorkerRestarted,
    WorkerForked,
    WorkerPaused,
}

/// 生命周期事件
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    TaskScheduled {
        task: String,
    },
    TaskUnscheduled {
        task: String,
    },
    TaskExecuting {
        task: String,
        worker: WorkerControl,
    },
    TaskExecuted {
        task: String,
        output: OutputKind,
        worker: WorkerControl,
    },
    TaskFailed {
        task: String,
        reason: String,
        worker: WorkerControl,
    },
    SchedulerRebooted {
        tasks: Vec<String>,
    },
    WorkerStarted {
        worker: WorkerControl,
    },
    /// 每处理完一个任务触发一次, 一轮没有可执行任务时 `idle` 为真
    WorkerRunning {
        worker: WorkerControl,
        idle: bool,
    },
    WorkerStopped {
        worker: WorkerControl,
    },
    WorkerRestarted {
        worker: WorkerControl,
    },
    WorkerForked {
        worker: WorkerControl,
        fork: WorkerControl,
    },
    WorkerPaused {
        worker: WorkerControl,
    },
}

impl SchedulerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SchedulerEvent::TaskScheduled { .. } => EventKind::TaskScheduled,
            SchedulerEvent::TaskUnscheduled { .. } => EventKind::TaskUnscheduled,
            SchedulerEvent::TaskExecuting { .. } => EventKind::TaskExecuting,
            SchedulerEvent::TaskExecuted { .. } => EventKind::TaskExecuted,
            SchedulerEvent::TaskFailed { .. } => EventKind::TaskFailed,
            SchedulerEvent::SchedulerRebooted { .. } => EventKind::SchedulerRebooted,
            SchedulerEvent::WorkerStarted { .. } => EventKind::WorkerStarted,
            SchedulerEvent::WorkerRunning { .. } => EventKind::WorkerRunning,
            SchedulerEvent::WorkerStopped { .. } => EventKind::WorkerStopped,
            SchedulerEvent::WorkerRestarted { .. } => EventKind::WorkerRestarted,
            SchedulerEvent::WorkerForked { .. } => EventKind::WorkerForked,
            SchedulerEvent::WorkerPaused { .. } => EventKind::WorkerPaused,
        }
    }
}

/// 事件信封, 附带唯一ID和发生时间
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: SchedulerEvent,
}

/// 事件监听器, 同步调用
pub trait EventListener: Send + Sync {
    fn subscribed_events(&self) -> Vec<EventKind>;

    fn on_event(&self, envelope: &EventEnvelope);
}

type ListenerMap = HashMap<EventKind, Vec<Arc<dyn EventListener>>>;

/// 按事件类型维护的监听器列表
///
/// 监听器按注册顺序同步调用. 没有注册任何监听器时等同于空实现.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<ListenerMap>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for kind in listener.subscribed_events() {
            listeners.entry(kind).or_default().push(Arc::clone(&listener));
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn dispatch(&self, event: SchedulerEvent) {
        let kind = event.kind();
        // 复制一份列表, 监听器内部可以继续注册或派发
        let targets: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if targets.is_empty() {
            return;
        }

        let envelope = EventEnvelope {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event,
        };
        debug!(event = ?kind, listeners = targets.len(), "派发事件");
        for listener in targets {
            listener.on_event(&envelope);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("EventDispatcher")
            .field("event_kinds", &listeners.len())
            .finish()
    }
}

/// 把事件记录下来, 测试用
#[derive(Debug, Default)]
pub struct RecordingListener {
    kinds: Vec<EventKind>,
    events: std::sync::Mutex<Vec<SchedulerEvent>>,
}

impl RecordingListener {
    pub fn new(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds,
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// 订阅全部事件
    pub fn all() -> Self {
        Self::new(vec![
            EventKind::TaskScheduled,
            EventKind::TaskUnscheduled,
            EventKind::TaskExecuting,
            EventKind::TaskExecuted,
            EventKind::TaskFailed,
            EventKind::SchedulerRebooted,
            EventKind::WorkerStarted,
            EventKind::WorkerRunning,
            EventKind::WorkerStopped,
            EventKind::WorkerRestarted,
            EventKind::WorkerForked,
            EventKind::WorkerPaused,
        ])
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(SchedulerEvent::kind).collect()
    }
}

impl EventListener for RecordingListener {
    fn subscribed_events(&self) -> Vec<EventKind> {
        self.kinds.clone()
    }

    fn on_event(&self, envelope: &EventEnvelope) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(envelope.event.clone());
    }
}
