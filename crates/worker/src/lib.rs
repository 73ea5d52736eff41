//! 执行端
//!
//! worker 循环, 执行阶段的中间件, 各类型任务的执行器以及停止条件.

pub mod configuration;
pub mod listeners;
pub mod middleware;
pub mod runners;
pub mod tracker;
pub mod worker;

pub use configuration::WorkerConfiguration;
pub use listeners::{
    StopWorkerOnFailureLimit, StopWorkerOnTaskLimit, StopWorkerOnTimeLimit, TaskLoggerListener,
};
pub use middleware::WorkerMiddlewareStack;
pub use runners::{Runner, RunnerContext, RunnerRegistry};
pub use tracker::TaskExecutionTracker;
pub use worker::{Worker, WorkerBuilder};
