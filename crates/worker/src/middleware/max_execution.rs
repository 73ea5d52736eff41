use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use scheduler_core::models::{Task, WorkerControl};
use scheduler_core::traits::{Middleware, PostExecutionMiddleware, PreExecutionMiddleware};
use scheduler_core::{SchedulerError, SchedulerResult};

/// 按任务名称限制执行次数
///
/// 执行前检查是否还有剩余次数, 执行后扣减. 计数只保存在当前进程.
#[derive(Debug, Default)]
pub struct MaxExecutionMiddleware {
    consumed: Mutex<HashMap<String, u32>>,
}

impl MaxExecutionMiddleware {
    pub const NAME: &'static str = "max_execution";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn consumed(&self, name: &str) -> u32 {
        self.consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset(&self, name: &str) {
        self.consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name);
    }

    fn exceeded(task: &Task, max: u32) -> SchedulerError {
        warn!(task = %task.name, max_executions = max, "任务执行次数已达上限");
        SchedulerError::middleware(
            Self::NAME,
            format!("任务 \"{}\" 的执行次数已达上限 {max}", task.name),
        )
    }
}

impl Middleware for MaxExecutionMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> Option<i32> {
        Some(5)
    }
}

#[async_trait]
impl PreExecutionMiddleware for MaxExecutionMiddleware {
    async fn pre_execute(&self, task: &mut Task) -> SchedulerResult<()> {
        let Some(max) = task.max_executions else {
            return Ok(());
        };
        if self.consumed(&task.name) >= max {
            return Err(Self::exceeded(task, max));
        }
        Ok(())
    }
}

#[async_trait]
impl PostExecutionMiddleware for MaxExecutionMiddleware {
    async fn post_execute(&self, task: &mut Task, _worker: &WorkerControl) -> SchedulerResult<()> {
        let Some(max) = task.max_executions else {
            return Ok(());
        };
        let consumed = {
            let mut consumed = self
                .consumed
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let count = consumed.entry(task.name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if consumed > max {
            return Err(Self::exceeded(task, max));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_executions_beyond_the_limit() {
        let middleware = MaxExecutionMiddleware::new();
        let worker = WorkerControl::new();
        let mut task = Task::null("foo").with_max_executions(2);

        for _ in 0..2 {
            middleware.pre_execute(&mut task).await.unwrap();
            middleware.post_execute(&mut task, &worker).await.unwrap();
        }
        assert_eq!(middleware.consumed("foo"), 2);
        assert!(middleware.pre_execute(&mut task).await.is_err());

        middleware.reset("foo");
        assert!(middleware.pre_execute(&mut task).await.is_ok());
    }

    #[tokio::test]
    async fn unlimited_tasks_are_not_counted() {
        let middleware = MaxExecutionMiddleware::new();
        let mut task = Task::null("bar");
        middleware
            .post_execute(&mut task, &WorkerControl::new())
            .await
            .unwrap();
        assert_eq!(middleware.consumed("bar"), 0);
    }
}
