//! 调度端
//!
//! 表达式解析, 调度器以及调度阶段的中间件.

pub mod expression;
pub mod middleware;
pub mod scheduler;
pub mod task_builder;

pub use expression::{CronExpression, Expression, ExpressionResolver};
pub use middleware::SchedulerMiddlewareStack;
pub use scheduler::Scheduler;
pub use task_builder::TaskBuilder;
