use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use scheduler_core::models::{Task, TaskList};
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerResult, TransportError};

/// 轮询存储
///
/// 每次调用交给下一个内部存储处理, 失败时直接返回错误, 不会换一个存储重试.
pub struct RoundRobinTransport {
    transports: Vec<Arc<dyn Transport>>,
    configuration: TransportConfiguration,
    next: AtomicUsize,
}

impl RoundRobinTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>, configuration: TransportConfiguration) -> Self {
        Self {
            transports,
            configuration,
            next: AtomicUsize::new(0),
        }
    }

    fn select(&self) -> SchedulerResult<&Arc<dyn Transport>> {
        if self.transports.is_empty() {
            return Err(TransportError::NoTransportConfigured.into());
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.transports.len();
        Ok(&self.transports[index])
    }

    async fn execute<T, F, Fut>(&self, operation: &str, f: F) -> SchedulerResult<T>
    where
        F: FnOnce(Arc<dyn Transport>) -> Fut,
        Fut: Future<Output = SchedulerResult<T>>,
    {
        let transport = self.select()?;
        debug!(transport = transport.name(), operation, "轮询选择存储");
        f(Arc::clone(transport)).await
    }
}

#[async_trait]
impl Transport for RoundRobinTransport {
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
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::broken_transport;
    use crate::transport::InMemoryTransport;

    #[tokio::test]
    async fn test_rotates_between_transports() {
        let first = Arc::new(InMemoryTransport::default());
        let second = Arc::new(InMemoryTransport::default());
        let transport = RoundRobinTransport::new(
            vec![first.clone(), second.clone()],
            TransportConfiguration::new(),
        );

        transport.create(Task::null("foo")).await.unwrap();
        transport.create(Task::null("bar")).await.unwrap();

        assert_eq!(first.list().await.unwrap().names(), vec!["foo"]);
        assert_eq!(second.list().await.unwrap().names(), vec!["bar"]);
    }

    #[tokio::test]
    async fn test_does_not_retry_on_failure() {
        let broken = broken_transport();
        let healthy = Arc::new(InMemoryTransport::default());
        let transport = RoundRobinTransport::new(
            vec![broken.clone(), healthy.clone()],
            TransportConfiguration::new(),
        );

        assert!(transport.create(Task::null("foo")).await.is_err());
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.count().await.unwrap(), 0);

        transport.create(Task::null("foo")).await.unwrap();
        assert_eq!(healthy.count().await.unwrap(), 1);
    }
}
