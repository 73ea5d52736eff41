use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use scheduler_core::models::{Task, TaskList};
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerResult, TransportError};

/// 所有操作都失败的存储, 记录被调用的次数
pub(crate) struct BrokenTransport {
    configuration: TransportConfiguration,
    pub calls: AtomicUsize,
}

impl BrokenTransport {
    fn fail<T>(&self) -> SchedulerResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::backend("down").into())
    }
}

#[async_trait]
impl Transport for BrokenTransport {
    async fn list(&self) -> SchedulerResult<TaskList> {
        self.fail()
    }
    async fn get(&self, _name: &str) -> SchedulerResult<Task> {
        self.fail()
    }
    async fn create(&self, _task: Task) -> SchedulerResult<()> {
        self.fail()
    }
    async fn update(&self, _name: &str, _task: Task) -> SchedulerResult<()> {
        self.fail()
    }
    async fn pause(&self, _name: &str) -> SchedulerResult<()> {
        self.fail()
    }
    async fn resume(&self, _name: &str) -> SchedulerResult<()> {
        self.fail()
    }
    async fn delete(&self, _name: &str) -> SchedulerResult<()> {
        self.fail()
    }
    async fn clear(&self) -> SchedulerResult<()> {
        self.fail()
    }
    fn configuration(&self) -> &TransportConfiguration {
        &self.configuration
    }
    fn name(&self) -> &str {
        "broken"
    }
}

pub(crate) fn broken_transport() -> Arc<BrokenTransport> {
    Arc::new(BrokenTransport {
        configuration: TransportConfiguration::new(),
        calls: AtomicUsize::new(0),
    })
}

pub(crate) fn broken() -> Arc<dyn Transport> {
    broken_transport()
}
