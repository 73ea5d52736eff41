use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::info;

use scheduler_core::models::{Output, Task, TaskKind};
use scheduler_core::{SchedulerError, SchedulerResult};

use super::Runner;
use crate::worker::Worker;

/// 进程内命令, 参数为位置参数和选项, 返回命令输出或错误信息
pub type CommandHandler =
    Arc<dyn Fn(&[String], &BTreeMap<String, String>) -> Result<String, String> + Send + Sync>;

/// 可以被 command 任务调用的进程内命令
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Arc<RwLock<HashMap<String, CommandHandler>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S, F>(&self, name: S, handler: F)
    where
        S: Into<String>,
        F: Fn(&[String], &BTreeMap<String, String>) -> Result<String, String>
            + Send
            + Sync
            + 'static,
    {
        self.commands
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<CommandHandler> {
        self.commands
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[derive(Clone, Default)]
pub struct CommandRunner {
    commands: CommandRegistry,
}

impl CommandRunner {
    pub fn new(commands: CommandRegistry) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl Runner for CommandRunner {
    fn name(&self) -> &str {
        "command"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Command(_))
    }

    async fn run(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Command(command) = &task.kind else {
            return Ok(Output::error(task, Some("不是 command 任务")));
        };

        let handler = self
            .commands
            .get(&command.command)
            .ok_or_else(|| SchedulerError::RunnerFailed {
                task: task.name.clone(),
                message: format!("命令 \"{}\" 不存在", command.command),
            })?;

        info!(task = %task.name, command = %command.command, "执行命令任务");
        match handler(&command.arguments, &command.options) {
            Ok(body) => Ok(Output::success(task, Some(body))),
            Err(message) => Ok(Output::error(task, Some(message))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_commands_sorted() {
        let registry = CommandRegistry::new();
        registry.register("cache:clear", |_, _| Ok(String::new()));
        registry.register("app:report", |arguments, _| Ok(arguments.join(",")));

        assert_eq!(registry.names(), vec!["app:report", "cache:clear"]);
        let handler = registry.get("app:report").unwrap();
        assert_eq!(handler(&["a".into(), "b".into()], &BTreeMap::new()).unwrap(), "a,b");
        assert!(registry.get("missing").is_none());
    }
}
