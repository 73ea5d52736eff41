//! 任务执行器
//!
//! 每种任务类型对应一个执行器. worker 通过 `RunnerRegistry` 查找执行器,
//! 必须恰好有一个执行器声明支持该任务, 否则视为配置错误.

pub mod callback;
pub mod chained;
pub mod command;
pub mod http;
pub mod messenger;
pub mod notification;
pub mod null;
pub mod shell;

use std::sync::Arc;

use async_trait::async_trait;

use scheduler_core::models::{Output, Task};
use scheduler_core::traits::{MessageBus, Notifier};
use scheduler_core::{SchedulerError, SchedulerResult};

use crate::worker::Worker;

pub use callback::{CallbackRegistry, CallbackRunner};
pub use chained::ChainedRunner;
pub use command::{CommandHandler, CommandRegistry, CommandRunner};
pub use http::HttpRunner;
pub use messenger::MessengerRunner;
pub use notification::NotificationRunner;
pub use null::NullRunner;
pub use shell::ShellRunner;

/// 任务执行器
///
/// `run` 返回的错误不会离开 worker 循环, 会被转换成失败的输出.
#[async_trait]
pub trait Runner: Send + Sync {
    fn name(&self) -> &str;

    fn support(&self, task: &Task) -> bool;

    async fn run(&self, task: &mut Task, worker: &Worker) -> SchedulerResult<Output>;
}

/// 内置执行器依赖的外部组件
#[derive(Clone, Default)]
pub struct RunnerContext {
    pub bus: Option<Arc<dyn MessageBus>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub commands: CommandRegistry,
    pub callbacks: CallbackRegistry,
    pub http_client: Option<reqwest::Client>,
}

#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: Vec<Arc<dyn Runner>>,
}

impl RunnerRegistry {
    pub fn new(runners: Vec<Arc<dyn Runner>>) -> Self {
        Self { runners }
    }

    /// 注册全部八种内置执行器
    pub fn builtin(context: RunnerContext) -> Self {
        let http = context
            .http_client
            .map_or_else(HttpRunner::new, HttpRunner::with_client);

        Self::new(vec![
            Arc::new(NullRunner),
            Arc::new(ShellRunner),
            Arc::new(http),
            Arc::new(CommandRunner::new(context.commands)),
            Arc::new(CallbackRunner::new(context.callbacks)),
            Arc::new(MessengerRunner::new(context.bus)),
            Arc::new(NotificationRunner::new(context.notifier)),
            Arc::new(ChainedRunner),
        ])
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runners.push(runner);
        self
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.runners.iter().map(|runner| runner.name().to_string()).collect()
    }

    /// 查找唯一支持该任务的执行器
    pub fn find(&self, task: &Task) -> SchedulerResult<Arc<dyn Runner>> {
        let matching: Vec<&Arc<dyn Runner>> = self
            .runners
            .iter()
            .filter(|runner| runner.support(task))
            .collect();

        match matching.as_slice() {
            [runner] => Ok(Arc::clone(runner)),
            [] => Err(SchedulerError::NoRunnerFound {
                task: task.name.clone(),
            }),
            many => Err(SchedulerError::AmbiguousRunner {
                task: task.name.clone(),
                count: many.len(),
            }),
        }
    }
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("runners", &self.names())
            .finish()
    }
}
