//! # 数据模型
//!
//! 调度系统的核心数据结构: 任务及其各类型负载, 按名称去重的任务列表,
//! 附加在任务上的锁/通知数据, 执行结果, 以及 worker 的共享控制句柄.
//!
//! 所有可持久化的模型都实现了 `serde` 序列化, 存储层以 JSON 保存任务.
//! 进程内的回调和钩子不参与序列化.
//!
//! ```rust
//! use scheduler_core::models::{Task, TaskKind, TaskList};
//!
//! let mut list = TaskList::new();
//! list.add(Task::null("heartbeat"));
//! list.add(Task::new("report", TaskKind::http("https://example.com/report")).with_expression("0 8 * * *"));
//!
//! assert_eq!(list.names(), vec!["heartbeat", "report"]);
//! ```

pub mod bags;
pub mod output;
pub mod task;
pub mod task_kind;
pub mod task_list;
pub mod worker;

pub use bags::*;
pub use output::*;
pub use task::*;
pub use task_kind::*;
pub use task_list::*;
pub use worker::*;
