use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use scheduler_core::models::{Task, TaskList};
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerResult, TransportError};

/// 长尾存储
///
/// 每次调用前统计各存储的任务数, 交给任务最少的存储处理.
/// 任务数相同时保持声明顺序, 统计失败的存储排在最后.
pub struct LongTailTransport {
    transports: Vec<Arc<dyn Transport>>,
    configuration: TransportConfiguration,
}

impl LongTailTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>, configuration: TransportConfiguration) -> Self {
        Self {
            transports,
            configuration,
        }
    }

    async fn select(&self) -> SchedulerResult<Arc<dyn Transport>> {
        let mut loads = Vec::with_capacity(self.transports.len());
        for transport in &self.transports {
            let count = transport.count().await.unwrap_or_else(|err| {
                warn!(transport = transport.name(), error = %err, "无法统计存储任务数");
                usize::MAX
            });
            loads.push((count, transport));
        }
        loads.sort_by_key(|(count, _)| *count);

        loads
            .first()
            .map(|(_, transport)| Arc::clone(transport))
            .ok_or_else(|| TransportError::NoTransportConfigured.into())
    }

    async fn execute<T, F, Fut>(&self, operation: &str, f: F) -> SchedulerResult<T>
    where
        F: FnOnce(Arc<dyn Transport>) -> Fut,
        Fut: Future<Output = SchedulerResult<T>>,
    {
        let transport = self.select().await?;
        debug!(transport = transport.name(), operation, "选择负载最低的存储");
        f(transport).await
    }
}

#[async_trait]
impl Transport for LongTailTransport {
    async fn list(&self) -> SchedulerResult<TaskList> {
        self.execute("list", |t| async move { t.list().await }).await
    }

    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.execute("get", |t| async move { t.get(name).await }).await
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        self.execute("create", |t| async move { t.create(task).await }).await
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.execute("update", |t| async move { t.update(name, task).await })
            .await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.execute("pause", |t| async move { t.pause(name).await }).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.execute("resume", |t| async move { t.resume(name).await }).await
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.execute("delete", |t| async move { t.delete(name).await }).await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.execute("clear", |t| async move { t.clear().await }).await
    }

    async fn count(&self) -> SchedulerResult<usize> {
        self.execute("count", |t| async move { t.count().await }).await
    }

    fn configuration(&self) -> &TransportConfiguration {
        &self.configuration
    }

    fn name(&self) -> &str {
        "long_tail"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::broken;
    use crate::transport::InMemoryTransport;

    #[tokio::test]
    async fn test_prefers_least_loaded_transport() {
        let busy = Arc::new(InMemoryTransport::default());
        busy.create(Task::null("existing")).await.unwrap();
        let idle = Arc::new(InMemoryTransport::default());

        let transport = LongTailTransport::new(
            vec![busy.clone(), idle.clone()],
            TransportConfiguration::new(),
        );
        transport.create(Task::null("foo")).await.unwrap();
        assert!(idle.get("foo").await.is_ok());

        // 两边各一个任务时选择第一个
        transport.create(Task::null("bar")).await.unwrap();
        assert!(busy.get("bar").await.is_ok());
    }

    #[tokio::test]
    async fn test_skips_transports_that_cannot_count() {
        let healthy = Arc::new(InMemoryTransport::default());
        let transport = LongTailTransport::new(
            vec![broken(), healthy.clone()],
            TransportConfiguration::new(),
        );

        transport.create(Task::null("foo")).await.unwrap();
        assert_eq!(healthy.count().await.unwrap(), 1);
    }
}
