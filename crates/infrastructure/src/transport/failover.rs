use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use scheduler_core::models::{Task, TaskList};
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerResult, TransportError};

/// 故障转移存储
///
/// 按顺序尝试内部存储, 返回第一个成功的结果. 失败的存储只在本次调用内跳过,
/// 下一次调用仍从第一个开始, 因此每次调用最多访问每个存储一次.
pub struct FailoverTransport {
    transports: Vec<Arc<dyn Transport>>,
    configuration: TransportConfiguration,
}

impl FailoverTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>, configuration: TransportConfiguration) -> Self {
        Self {
            transports,
            configuration,
        }
    }

    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    async fn execute<T, F, Fut>(&self, operation: &str, f: F) -> SchedulerResult<T>
    where
        F: Fn(Arc<dyn Transport>) -> Fut,
        Fut: Future<Output = SchedulerResult<T>>,
    {
        if self.transports.is_empty() {
            return Err(TransportError::NoTransportConfigured.into());
        }

        let mut causes = Vec::with_capacity(self.transports.len());
        for transport in &self.transports {
            match f(Arc::clone(transport)).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(transport = transport.name(), operation, error = %err, "存储执行失败, 尝试下一个");
                    causes.push(format!("{}: {err}", transport.name()));
                }
            }
        }

        Err(TransportError::AllTransportsFailed {
            operation: operation.to_string(),
            causes,
        }
        .into())
    }
}

#[async_trait]
impl Transport for FailoverTransport {
    async fn list(&self) -> SchedulerResult<TaskList> {
        self.execute("list", |t| async move { t.list().await }).await
    }

    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.execute("get", |t| async move { t.get(name).await }).await
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        self.execute("create", |t| {
            let task = task.clone();
            async move { t.create(task).await }
        })
        .await
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.execute("update", |t| {
            let task = task.clone();
            async move { t.update(name, task).await }
        })
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
        "failover"
    }
}
