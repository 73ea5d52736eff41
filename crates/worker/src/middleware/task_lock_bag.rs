use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use scheduler_core::models::{Task, WorkerControl};
use scheduler_core::traits::{LockProvider, Middleware, PostExecutionMiddleware};
use scheduler_core::SchedulerResult;

/// 释放 worker 在取任务时获取的访问锁, 总是最后执行
pub struct TaskLockBagMiddleware {
    lock: Arc<dyn LockProvider>,
}

impl TaskLockBagMiddleware {
    pub const NAME: &'static str = "task_lock_bag";

    pub fn new(lock: Arc<dyn LockProvider>) -> Self {
        Self { lock }
    }
}

impl Middleware for TaskLockBagMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_required(&self) -> bool {
        true
    }
}

#[async_trait]
impl PostExecutionMiddleware for TaskLockBagMiddleware {
    async fn post_execute(&self, task: &mut Task, _worker: &WorkerControl) -> SchedulerResult<()> {
        let Some(bag) = task.access_lock_bag.take() else {
            return Ok(());
        };
        debug!(task = %task.name, lock = %bag.key, "释放任务访问锁");
        self.lock.release(&bag.key).await
    }
}
