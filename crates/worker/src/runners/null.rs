use async_trait::async_trait;

use scheduler_core::models::{Output, Task, TaskKind};
use scheduler_core::SchedulerResult;

use super::Runner;
use crate::worker::Worker;

/// 空任务, 直接成功
#[derive(Debug, Default, Clone)]
pub struct NullRunner;

#[async_trait]
impl Runner for NullRunner {
    fn name(&self) -> &str {
        "null"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Null)
    }

    async fn run(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<Output> {
        Ok(Output::success(task, None::<String>))
    }
}
