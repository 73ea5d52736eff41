use async_trait::async_trait;
use tracing::{info, warn};

use scheduler_core::models::{Output, Task, TaskKind, TaskList};
use scheduler_core::SchedulerResult;

use super::Runner;
use crate::worker::Worker;

/// 链式任务
///
/// 在派生出的 worker 中按顺序执行子任务, 任一子任务失败则整体失败.
#[derive(Debug, Default, Clone)]
pub struct ChainedRunner;

#[async_trait]
impl Runner for ChainedRunner {
    fn name(&self) -> &str {
        "chained"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Chained(_))
    }

    async fn run(&self, task: &mut Task, worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Chained(chained) = &task.kind else {
            return Ok(Output::error(task, Some("不是 chained 任务")));
        };
        let children: TaskList = chained.tasks.iter().cloned().collect();
        if children.is_empty() {
            return Ok(Output::success(task, None::<String>));
        }

        info!(task = %task.name, children = ?children.names(), "执行链式任务");
        let fork = worker.fork();
        let result = fork.execute(children).await;
        fork.stop();
        result?;

        let failed: Vec<String> = fork
            .failed_tasks()
            .iter()
            .map(|failed| format!("{}: {}", failed.name(), failed.reason))
            .collect();
        if failed.is_empty() {
            return Ok(Output::success(task, None::<String>));
        }

        warn!(task = %task.name, failed = ?failed, "链式任务的子任务失败");
        Ok(Output::error(
            task,
            Some(format!("子任务执行失败: {}", failed.join("; "))),
        ))
    }
}
