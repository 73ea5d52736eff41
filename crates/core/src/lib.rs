//! 调度系统的核心类型
//!
//! 任务模型, 错误, 配置, 事件, 调度策略以及调度端和执行端共享的扩展接口.

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod time;
pub mod traits;

pub use errors::*;
pub use events::{EventDispatcher, EventEnvelope, EventKind, EventListener, SchedulerEvent};
pub use models::{
    ExecutionState, FailedTask, Output, OutputKind, Task, TaskKind, TaskList, TaskState,
    WorkerControl, WorkerState,
};
pub use policy::{SchedulePolicy, SchedulePolicyOrchestrator};
pub use time::{Clock, SystemClock};

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
