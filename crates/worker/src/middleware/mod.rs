//! 执行阶段的中间件
//!
//! 优先级和失败规则与调度阶段一致: 某个中间件失败后, 同一阶段只有
//! `is_required` 的中间件继续执行, 最后返回第一个错误.

pub mod max_execution;
pub mod single_run;
pub mod task_lock_bag;
pub mod task_update;

use std::sync::Arc;

use tracing::warn;

use scheduler_core::models::{Task, WorkerControl};
use scheduler_core::traits::{
    middleware_error, sort_by_priority, PostExecutionMiddleware, PreExecutionMiddleware,
};
use scheduler_core::{SchedulerError, SchedulerResult};

pub use max_execution::MaxExecutionMiddleware;
pub use single_run::SingleRunTaskMiddleware;
pub use task_lock_bag::TaskLockBagMiddleware;
pub use task_update::TaskUpdateMiddleware;

#[derive(Default, Clone)]
pub struct WorkerMiddlewareStack {
    pre_execution: Vec<Arc<dyn PreExecutionMiddleware>>,
    post_execution: Vec<Arc<dyn PostExecutionMiddleware>>,
}

impl WorkerMiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pre_execution(mut self, middleware: Arc<dyn PreExecutionMiddleware>) -> Self {
        self.pre_execution.push(middleware);
        sort_by_priority(&mut self.pre_execution);
        self
    }

    pub fn with_post_execution(mut self, middleware: Arc<dyn PostExecutionMiddleware>) -> Self {
        self.post_execution.push(middleware);
        sort_by_priority(&mut self.post_execution);
        self
    }

    /// 同时注册两个阶段
    pub fn with_middleware<M>(self, middleware: Arc<M>) -> Self
    where
        M: PreExecutionMiddleware + PostExecutionMiddleware + 'static,
    {
        self.with_pre_execution(middleware.clone())
            .with_post_execution(middleware)
    }

    /// 合并另一个栈, 结果仍按优先级排序
    pub fn merge(mut self, other: WorkerMiddlewareStack) -> Self {
        self.pre_execution.extend(other.pre_execution);
        self.post_execution.extend(other.post_execution);
        sort_by_priority(&mut self.pre_execution);
        sort_by_priority(&mut self.post_execution);
        self
    }

    pub fn pre_execution_names(&self) -> Vec<&str> {
        self.pre_execution.iter().map(|m| m.name()).collect()
    }

    pub fn post_execution_names(&self) -> Vec<&str> {
        self.post_execution.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.pre_execution.len() + self.post_execution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn run_pre_execution(&self, task: &mut Task) -> SchedulerResult<()> {
        let mut failure: Option<SchedulerError> = None;
        for middleware in &self.pre_execution {
            if failure.is_some() && !middleware.is_required() {
                continue;
            }
            if let Err(err) = middleware.pre_execute(task).await {
                warn!(middleware = middleware.name(), task = %task.name, error = %err, "执行前中间件失败");
                failure.get_or_insert(middleware_error(middleware.name(), err));
            }
        }
        failure.map_or(Ok(()), Err)
    }

    pub async fn run_post_execution(
        &self,
        task: &mut Task,
        worker: &WorkerControl,
    ) -> SchedulerResult<()> {
        let mut failure: Option<SchedulerError> = None;
        for middleware in &self.post_execution {
            if failure.is_some() && !middleware.is_required() {
                continue;
            }
            if let Err(err) = middleware.post_execute(task, worker).await {
                warn!(middleware = middleware.name(), task = %task.name, error = %err, "执行后中间件失败");
                failure.get_or_insert(middleware_error(middleware.name(), err));
            }
        }
        failure.map_or(Ok(()), Err)
    }
}
