use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use scheduler_core::models::{Callback, LocalCallback, Output, Task, TaskKind};
use scheduler_core::{SchedulerError, SchedulerResult};

use super::Runner;
use crate::worker::Worker;

/// 具名回调, 按 `target::method` 注册
///
/// 具名回调可以持久化, 进程重启后由这里重新找到对应的闭包.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: Arc<RwLock<HashMap<String, LocalCallback>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(target: &str, method: &str) -> String {
        format!("{target}::{method}")
    }

    pub fn register<F>(&self, target: &str, method: &str, callback: F)
    where
        F: Fn(&[Value]) -> Result<Option<String>, String> + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(Self::key(target, method), LocalCallback::new(callback));
    }

    pub fn get(&self, target: &str, method: &str) -> Option<LocalCallback> {
        self.callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&Self::key(target, method))
            .cloned()
    }
}

#[derive(Clone, Default)]
pub struct CallbackRunner {
    callbacks: CallbackRegistry,
}

impl CallbackRunner {
    pub fn new(callbacks: CallbackRegistry) -> Self {
        Self { callbacks }
    }

    fn resolve(&self, task: &Task, callback: &Callback) -> SchedulerResult<LocalCallback> {
        match callback {
            Callback::Local(local) => Ok(local.clone()),
            Callback::Named { target, method } => {
                self.callbacks
                    .get(target, method)
                    .ok_or_else(|| SchedulerError::RunnerFailed {
                        task: task.name.clone(),
                        message: format!("回调 {target}::{method} 未注册"),
                    })
            }
        }
    }
}

#[async_trait]
impl Runner for CallbackRunner {
    fn name(&self) -> &str {
        "callback"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Callback(_))
    }

    async fn run(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Callback(payload) = &task.kind else {
            return Ok(Output::error(task, Some("不是 callback 任务")));
        };

        let callback = self.resolve(task, &payload.callback)?;
        debug!(task = %task.name, arguments = payload.arguments.len(), "执行回调任务");
        match callback.call(&payload.arguments) {
            Ok(body) => Ok(Output::success(task, body)),
            Err(message) => Ok(Output::error(task, Some(message))),
        }
    }
}
