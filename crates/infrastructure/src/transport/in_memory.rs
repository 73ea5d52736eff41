use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use scheduler_core::models::{Task, TaskList};
use scheduler_core::policy::SchedulePolicyOrchestrator;
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerResult, TransportError};

use super::{ensure_same_name, pause_task, resume_task, sort_by_execution_mode};

/// 内存存储
///
/// 进程内有效, 重启后任务丢失. 所有修改都在同一把写锁内完成,
/// 因此 `create` 的存在检查与插入是原子的.
pub struct InMemoryTransport {
    tasks: RwLock<TaskList>,
    configuration: TransportConfiguration,
    orchestrator: Arc<SchedulePolicyOrchestrator>,
}

impl InMemoryTransport {
    pub fn new(configuration: TransportConfiguration) -> Self {
        Self::with_orchestrator(configuration, Arc::new(SchedulePolicyOrchestrator::default()))
    }

    pub fn with_orchestrator(
        configuration: TransportConfiguration,
        orchestrator: Arc<SchedulePolicyOrchestrator>,
    ) -> Self {
        Self {
            tasks: RwLock::new(TaskList::new()),
            configuration,
            orchestrator,
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(TransportConfiguration::default())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn list(&self) -> SchedulerResult<TaskList> {
        let tasks = self.tasks.read().await.clone();
        sort_by_execution_mode(&self.orchestrator, &self.configuration, tasks)
    }

    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.tasks
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::not_found(name).into())
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.has(&task.name) {
            return Err(TransportError::already_exists(&task.name).into());
        }
        debug!(task = %task.name, transport = "memory", "写入任务");
        tasks.add(task);
        Ok(())
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        ensure_same_name(name, &task)?;
        let mut tasks = self.tasks.write().await;
        let existing = tasks
            .get_mut(name)
            .ok_or_else(|| TransportError::not_found(name))?;
        *existing = task;
        Ok(())
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| TransportError::not_found(name))?;
        pause_task(task)
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| TransportError::not_found(name))?;
        resume_task(task)
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.tasks
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TransportError::not_found(name).into())
    }

    async fn clear(&self) -> SchedulerResult<()> {
        *self.tasks.write().await = TaskList::new();
        Ok(())
    }

    async fn count(&self) -> SchedulerResult<usize> {
        Ok(self.tasks.read().await.len())
    }

    fn configuration(&self) -> &TransportConfiguration {
        &self.configuration
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::models::TaskState;
    use scheduler_core::traits::EXECUTION_MODE_KEY;
    use scheduler_core::SchedulerError;

    #[tokio::test]
    async fn test_crud() {
        let transport = InMemoryTransport::default();
        transport.create(Task::null("foo")).await.unwrap();

        let err = transport.create(Task::null("foo")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Transport(TransportError::AlreadyExists { .. })));

        let updated = Task::null("foo").with_priority(10);
        transport.update("foo", updated).await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().priority, 10);

        assert_eq!(transport.count().await.unwrap(), 1);
        transport.delete("foo").await.unwrap();
        assert!(transport.get("foo").await.unwrap_err().is_not_found());
        assert!(transport.delete("foo").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_rejects_missing_and_renamed_tasks() {
        let transport = InMemoryTransport::default();
        assert!(transport.update("foo", Task::null("foo")).await.unwrap_err().is_not_found());

        transport.create(Task::null("foo")).await.unwrap();
        assert!(matches!(
            transport.update("foo", Task::null("bar")).await,
            Err(SchedulerError::InvalidTask(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let transport = InMemoryTransport::default();
        transport.create(Task::null("foo")).await.unwrap();

        transport.pause("foo").await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().state, TaskState::Paused);
        assert!(transport.pause("foo").await.is_err());

        transport.resume("foo").await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().state, TaskState::Enabled);
        assert!(transport.resume("foo").await.is_err());
        assert!(transport.pause("bar").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_execution_mode() {
        let configuration = TransportConfiguration::new();
        configuration.update(EXECUTION_MODE_KEY, "idle");
        let transport = InMemoryTransport::new(configuration);

        transport.create(Task::null("low").with_priority(10)).await.unwrap();
        transport.create(Task::null("high").with_priority(-10)).await.unwrap();

        assert_eq!(transport.list().await.unwrap().names(), vec!["high", "low"]);

        transport.clear().await.unwrap();
        assert!(transport.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_execution_mode_fails_listing() {
        let configuration = TransportConfiguration::new();
        configuration.update(EXECUTION_MODE_KEY, "lottery");
        let transport = InMemoryTransport::new(configuration);
        transport.create(Task::null("foo")).await.unwrap();

        assert!(matches!(
            transport.list().await,
            Err(SchedulerError::UnknownPolicy(ref policy)) if policy == "lottery"
        ));
    }
}
