use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use scheduler_core::models::{Task, TaskList};
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerError, SchedulerResult};

type TransportInitializer = dyn Fn() -> SchedulerResult<Arc<dyn Transport>> + Send + Sync;

/// 延迟初始化的存储
///
/// 第一次调用时才构造内部存储, 之后所有调用都委托给同一个实例.
/// 构造失败不会被缓存, 下一次调用会重新尝试.
pub struct LazyTransport {
    initializer: Box<TransportInitializer>,
    inner: OnceCell<Arc<dyn Transport>>,
    configuration: TransportConfiguration,
}

impl LazyTransport {
    pub fn new<F>(initializer: F, configuration: TransportConfiguration) -> Self
    where
        F: Fn() -> SchedulerResult<Arc<dyn Transport>> + Send + Sync + 'static,
    {
        Self {
            initializer: Box::new(initializer),
            inner: OnceCell::new(),
            configuration,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized()
    }

    async fn inner(&self) -> SchedulerResult<&Arc<dyn Transport>> {
        self.inner
            .get_or_try_init(|| async {
                let transport = (self.initializer)()?;
                info!(transport = transport.name(), "延迟存储已初始化");
                Ok::<_, SchedulerError>(transport)
            })
            .await
    }
}

#[async_trait]
impl Transport for LazyTransport {
    async fn list(&self) -> SchedulerResult<TaskList> {
        self.inner().await?.list().await
    }

    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.inner().await?.get(name).await
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        self.inner().await?.create(task).await
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.inner().await?.update(name, task).await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.inner().await?.pause(name).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.inner().await?.resume(name).await
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.inner().await?.delete(name).await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.inner().await?.clear().await
    }

    async fn count(&self) -> SchedulerResult<usize> {
        self.inner().await?.count().await
    }

    fn configuration(&self) -> &TransportConfiguration {
        &self.configuration
    }

    fn name(&self) -> &str {
        "lazy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_initializes_once_on_first_use() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let transport = LazyTransport::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(InMemoryTransport::default()) as Arc<dyn Transport>)
            },
            TransportConfiguration::new(),
        );

        assert!(!transport.is_initialized());
        assert_eq!(built.load(Ordering::SeqCst), 0);

        transport.create(Task::null("foo")).await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().name, "foo");
        assert!(transport.is_initialized());
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let transport = LazyTransport::new(
            move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SchedulerError::config_error("not yet"))
                } else {
                    Ok(Arc::new(InMemoryTransport::default()) as Arc<dyn Transport>)
                }
            },
            TransportConfiguration::new(),
        );

        assert!(transport.list().await.is_err());
        assert!(transport.list().await.unwrap().is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
