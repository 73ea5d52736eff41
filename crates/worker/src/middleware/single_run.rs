use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use scheduler_core::models::{Task, TaskState, WorkerControl};
use scheduler_core::traits::{Middleware, PostExecutionMiddleware, TaskScheduler};
use scheduler_core::{SchedulerResult, TransportError};

/// 只执行一次的任务
///
/// 执行完成后暂停 `single_run` 任务, 删除 `delete_after_execute` 任务.
/// 执行器声明为 `INCOMPLETE`/`TO_RETRY` 的任务保持原样.
pub struct SingleRunTaskMiddleware {
    scheduler: Arc<dyn TaskScheduler>,
}

impl SingleRunTaskMiddleware {
    pub const NAME: &'static str = "single_run";

    pub fn new(scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self { scheduler }
    }
}

impl Middleware for SingleRunTaskMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> Option<i32> {
        Some(15)
    }

    fn is_required(&self) -> bool {
        true
    }
}

#[async_trait]
impl PostExecutionMiddleware for SingleRunTaskMiddleware {
    async fn post_execute(&self, task: &mut Task, _worker: &WorkerControl) -> SchedulerResult<()> {
        if task.execution_state.is_some_and(|state| state.is_deferred()) {
            return Ok(());
        }

        if task.delete_after_execute {
            info!(task = %task.name, "任务执行后删除");
            return match self.scheduler.unschedule(&task.name).await {
                Err(err) if err.is_not_found() => Ok(()),
                result => result,
            };
        }

        if !task.single_run {
            return Ok(());
        }

        info!(task = %task.name, "单次任务执行完成, 暂停任务");
        task.state = TaskState::Paused;
        match self.scheduler.pause(&task.name).await {
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) if matches!(err.transport_error(), Some(TransportError::AlreadyPaused { .. })) => Ok(()),
            result => result,
        }
    }
}
