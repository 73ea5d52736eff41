//! 任务存储实现
//!
//! 基础存储 (内存, 文件系统) 和组合存储 (故障转移, 轮询, 长尾, 延迟初始化).
//! 组合存储本身也实现 `Transport`, 可以任意嵌套.

pub mod dsn;
pub mod factory;
pub mod failover;
pub mod filesystem;
pub mod in_memory;
pub mod lazy;
pub mod long_tail;
pub mod round_robin;

#[cfg(test)]
pub(crate) mod testing;

use scheduler_core::models::{Task, TaskList, TaskState};
use scheduler_core::policy::SchedulePolicyOrchestrator;
use scheduler_core::traits::TransportConfiguration;
use scheduler_core::{SchedulerResult, TransportError};

pub use dsn::Dsn;
pub use factory::TransportFactory;
pub use failover::FailoverTransport;
pub use filesystem::FilesystemTransport;
pub use in_memory::InMemoryTransport;
pub use lazy::LazyTransport;
pub use long_tail::LongTailTransport;
pub use round_robin::RoundRobinTransport;

/// 暂停任务, 只允许 ENABLED -> PAUSED
pub(crate) fn pause_task(task: &mut Task) -> SchedulerResult<()> {
    match task.state {
        TaskState::Enabled => {
            task.state = TaskState::Paused;
            Ok(())
        }
        TaskState::Paused => Err(TransportError::AlreadyPaused {
            name: task.name.clone(),
        }
        .into()),
        TaskState::Undefined => Err(invalid_transition(task, TaskState::Paused)),
    }
}

/// 恢复任务, 只允许 PAUSED -> ENABLED
pub(crate) fn resume_task(task: &mut Task) -> SchedulerResult<()> {
    match task.state {
        TaskState::Paused => {
            task.state = TaskState::Enabled;
            Ok(())
        }
        TaskState::Enabled => Err(TransportError::AlreadyEnabled {
            name: task.name.clone(),
        }
        .into()),
        TaskState::Undefined => Err(invalid_transition(task, TaskState::Enabled)),
    }
}

fn invalid_transition(task: &Task, to: TaskState) -> scheduler_core::SchedulerError {
    TransportError::InvalidStateTransition {
        name: task.name.clone(),
        from: task.state.to_string(),
        to: to.to_string(),
    }
    .into()
}

/// 更新时不允许改名
pub(crate) fn ensure_same_name(name: &str, task: &Task) -> SchedulerResult<()> {
    if task.name != name {
        return Err(scheduler_core::SchedulerError::InvalidTask(format!(
            "不能通过更新把任务 \"{name}\" 改名为 \"{}\"",
            task.name
        )));
    }
    Ok(())
}

/// 按存储配置中的执行模式排序
pub(crate) fn sort_by_execution_mode(
    orchestrator: &SchedulePolicyOrchestrator,
    configuration: &TransportConfiguration,
    tasks: TaskList,
) -> SchedulerResult<TaskList> {
    orchestrator.sort(&configuration.execution_mode(), tasks)
}
