use std::sync::Arc;

use tracing::warn;

use scheduler_core::models::Task;
use scheduler_core::traits::{
    middleware_error, sort_by_priority, PostSchedulingMiddleware, PreSchedulingMiddleware,
};
use scheduler_core::{SchedulerError, SchedulerResult};

/// 调度阶段的中间件栈
///
/// 每次注册后按优先级重新排序. 某个中间件失败后, 同一阶段只有
/// `is_required` 的中间件会继续执行, 最后返回第一个错误.
#[derive(Default, Clone)]
pub struct SchedulerMiddlewareStack {
    pre_scheduling: Vec<Arc<dyn PreSchedulingMiddleware>>,
    post_scheduling: Vec<Arc<dyn PostSchedulingMiddleware>>,
}

impl SchedulerMiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pre_scheduling(mut self, middleware: Arc<dyn PreSchedulingMiddleware>) -> Self {
        self.pre_scheduling.push(middleware);
        sort_by_priority(&mut self.pre_scheduling);
        self
    }

    pub fn with_post_scheduling(mut self, middleware: Arc<dyn PostSchedulingMiddleware>) -> Self {
        self.post_scheduling.push(middleware);
        sort_by_priority(&mut self.post_scheduling);
        self
    }

    /// 同时注册两个阶段
    pub fn with_middleware<M>(self, middleware: Arc<M>) -> Self
    where
        M: PreSchedulingMiddleware + PostSchedulingMiddleware + 'static,
    {
        self.with_pre_scheduling(middleware.clone())
            .with_post_scheduling(middleware)
    }

    pub fn len(&self) -> usize {
        self.pre_scheduling.len() + self.post_scheduling.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn run_pre_scheduling(&self, task: &mut Task) -> SchedulerResult<()> {
        let mut failure: Option<SchedulerError> = None;
        for middleware in &self.pre_scheduling {
            if failure.is_some() && !middleware.is_required() {
                continue;
            }
            if let Err(err) = middleware.pre_scheduling(task).await {
                warn!(middleware = middleware.name(), task = %task.name, error = %err, "调度前中间件执行失败");
                failure.get_or_insert(middleware_error(middleware.name(), err));
            }
        }
        failure.map_or(Ok(()), Err)
    }

    pub async fn run_post_scheduling(&self, task: &Task) -> SchedulerResult<()> {
        let mut failure: Option<SchedulerError> = None;
        for middleware in &self.post_scheduling {
            if failure.is_some() && !middleware.is_required() {
                continue;
            }
            if let Err(err) = middleware.post_scheduling(task).await {
                warn!(middleware = middleware.name(), task = %task.name, error = %err, "调度后中间件执行失败");
                failure.get_or_insert(middleware_error(middleware.name(), err));
            }
        }
        failure.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scheduler_core::traits::Middleware;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        priority: Option<i32>,
        required: bool,
        fail: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> Option<i32> {
            self.priority
        }

        fn is_required(&self) -> bool {
            self.required
        }
    }

    #[async_trait]
    impl PreSchedulingMiddleware for Recording {
        async fn pre_scheduling(&self, _task: &mut Task) -> SchedulerResult<()> {
            self.calls.lock().unwrap().push(self.name);
            if self.fail {
                Err(SchedulerError::Internal("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn recording(
        name: &'static str,
        priority: Option<i32>,
        required: bool,
        fail: bool,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<Recording> {
        Arc::new(Recording {
            name,
            priority,
            required,
            fail,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn required_middleware_runs_after_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stack = SchedulerMiddlewareStack::new()
            .with_pre_scheduling(recording("optional", Some(20), false, false, &calls))
            .with_pre_scheduling(recording("required", None, true, false, &calls))
            .with_pre_scheduling(recording("failing", Some(1), false, true, &calls));

        let mut task = Task::null("foo");
        let err = stack.run_pre_scheduling(&mut task).await.unwrap_err();

        assert!(matches!(err, SchedulerError::MiddlewareFailed { ref middleware, .. } if middleware == "failing"));
        assert_eq!(*calls.lock().unwrap(), vec!["failing", "required"]);
    }

    #[tokio::test]
    async fn empty_stack_passes() {
        let stack = SchedulerMiddlewareStack::new();
        assert!(stack.is_empty());
        assert!(stack.run_post_scheduling(&Task::null("foo")).await.is_ok());
    }
}
