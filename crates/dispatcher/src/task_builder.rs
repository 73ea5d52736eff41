use tracing::debug;

use scheduler_core::config::TaskDefinition;
use scheduler_core::models::{Task, TaskState};
use scheduler_core::SchedulerResult;

use crate::expression::ExpressionResolver;

/// 把配置中的任务定义转换为任务
#[derive(Clone, Default)]
pub struct TaskBuilder {
    resolver: ExpressionResolver,
    default_timezone: Option<String>,
}

impl TaskBuilder {
    pub fn new(resolver: ExpressionResolver) -> Self {
        Self {
            resolver,
            default_timezone: None,
        }
    }

    /// 定义中没有时区时使用的时区
    pub fn with_default_timezone<S: Into<String>>(mut self, timezone: S) -> Self {
        self.default_timezone = Some(timezone.into());
        self
    }

    pub fn build(&self, definition: &TaskDefinition) -> SchedulerResult<Task> {
        let mut task = Task::new(definition.name.clone(), definition.kind.clone());

        if let Some(timezone) = definition
            .timezone
            .clone()
            .or_else(|| self.default_timezone.clone())
        {
            task.timezone = timezone;
        }
        if let Some(expression) = &definition.expression {
            task.expression = self.resolver.resolve(expression, &task.timezone)?;
        }

        task.description = definition.description.clone();
        task.tags = definition.tags.clone();
        task.priority = definition.priority.unwrap_or_default();
        task.nice = definition.nice;
        task.max_executions = definition.max_executions;
        task.max_duration = definition.max_duration;
        task.max_retries = definition.max_retries;
        task.execution_delay = definition.execution_delay;
        task.execution_relative_deadline = definition.execution_relative_deadline;
        task.single_run = definition.single_run;
        task.delete_after_execute = definition.delete_after_execute;
        task.queued = definition.queued;
        task.background = definition.background;
        task.output = definition.output || definition.output_to_store;
        task.output_to_store = definition.output_to_store;
        if definition.paused {
            task.state = TaskState::Paused;
        }

        task.validate()?;
        debug!(task = %task.name, kind = task.type_name(), expression = %task.expression, "根据配置构建任务");
        Ok(task)
    }

    pub fn build_all(&self, definitions: &[TaskDefinition]) -> SchedulerResult<Vec<Task>> {
        definitions.iter().map(|definition| self.build(definition)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::config::AppConfig;
    use scheduler_core::models::TaskKind;
    use scheduler_core::SchedulerError;

    #[test]
    fn builds_tasks_from_configuration() {
        let config = AppConfig::from_toml(
            r#"
[[tasks]]
name = "backup"
expression = "@daily"
priority = 5
single_run = true

[tasks.kind]
type = "shell"
command = ["tar", "czf", "/tmp/backup.tgz", "/srv"]

[[tasks]]
name = "report"
timezone = "+08:00"
expression = "0 9 * * 1-5"
paused = true
"#,
        )
        .unwrap();

        let builder = TaskBuilder::default().with_default_timezone("UTC");
        let tasks = builder.build_all(&config.tasks).unwrap();

        assert_eq!(tasks[0].expression, "0 0 * * *");
        assert_eq!(tasks[0].priority, 5);
        assert!(tasks[0].single_run);
        assert!(matches!(tasks[0].kind, TaskKind::Shell(_)));
        assert_eq!(tasks[0].timezone, "UTC");

        assert_eq!(tasks[1].timezone, "+08:00");
        assert_eq!(tasks[1].state, TaskState::Paused);
        assert_eq!(tasks[1].kind, TaskKind::Null);
    }

    #[test]
    fn rejects_invalid_definitions() {
        let definition = TaskDefinition {
            expression: Some("whenever".to_string()),
            ..serde_json::from_str::<TaskDefinition>(r#"{"name":"foo"}"#).unwrap()
        };
        let err = TaskBuilder::default().build(&definition).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidExpression { .. }));

        let definition = TaskDefinition {
            priority: Some(5000),
            ..serde_json::from_str::<TaskDefinition>(r#"{"name":"bar"}"#).unwrap()
        };
        assert!(TaskBuilder::default().build(&definition).is_err());
    }
}
