use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use scheduler_core::models::{Task, WorkerControl};
use scheduler_core::traits::{Middleware, PostExecutionMiddleware, TaskScheduler};
use scheduler_core::SchedulerResult;

/// 把执行结果写回存储
///
/// 先重新读取存储中的任务, 只覆盖执行相关的字段, 执行期间对任务状态
/// 的修改 (例如暂停) 保持不变. 同名任务的读改写按名称串行.
/// 已经不在存储中的任务 (链式任务的子任务, 或者执行期间被移除的任务) 直接跳过.
pub struct TaskUpdateMiddleware {
    scheduler: Arc<dyn TaskScheduler>,
    guards: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TaskUpdateMiddleware {
    pub const NAME: &'static str = "task_update";

    pub fn new(scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            scheduler,
            guards: Mutex::new(HashMap::new()),
        }
    }

    fn guard(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.guards
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

/// 执行产生的字段, 调度策略保存在任务上的优先级也随之写回
fn merge_execution(stored: &mut Task, executed: &Task) {
    stored.execution_state = executed.execution_state;
    stored.last_execution = executed.last_execution;
    stored.arrival_time = executed.arrival_time;
    stored.execution_start_time = executed.execution_start_time;
    stored.execution_end_time = executed.execution_end_time;
    stored.execution_absolute_deadline = executed.execution_absolute_deadline;
    stored.execution_computation_time = executed.execution_computation_time;
    stored.execution_memory_usage = executed.execution_memory_usage;
    stored.stored_output = executed.stored_output.clone();
    stored.priority = executed.priority;
}

impl Middleware for TaskUpdateMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> Option<i32> {
        Some(10)
    }

    fn is_required(&self) -> bool {
        true
    }
}

#[async_trait]
impl PostExecutionMiddleware for TaskUpdateMiddleware {
    async fn post_execute(&self, task: &mut Task, _worker: &WorkerControl) -> SchedulerResult<()> {
        let guard = self.guard(&task.name);
        let _serialized = guard.lock().await;

        let mut stored = match self.scheduler.get_task(&task.name).await {
            Ok(stored) => stored,
            Err(err) if err.is_not_found() => {
                debug!(task = %task.name, "任务不在存储中, 跳过回写");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        merge_execution(&mut stored, task);
        task.state = stored.state;

        match self.scheduler.update(&task.name, stored).await {
            Err(err) if err.is_not_found() => {
                debug!(task = %task.name, "任务不在存储中, 跳过回写");
                Ok(())
            }
            result => result,
        }
    }
}
