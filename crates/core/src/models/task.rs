use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SchedulerError};
use crate::models::bags::{AccessLockBag, NotificationTaskBag};
use crate::models::task_kind::TaskKind;

pub const MIN_PRIORITY: i32 = -1000;
pub const MAX_PRIORITY: i32 = 1000;
pub const MIN_NICE: i32 = -20;
pub const MAX_NICE: i32 = 19;
pub const DEFAULT_EXPRESSION: &str = "* * * * *";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// 任务生命周期状态
///
/// 只允许 `Enabled` 与 `Paused` 之间互相切换, `Undefined` 只能在创建时出现.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    #[default]
    #[serde(rename = "ENABLED")]
    Enabled,
    #[serde(rename = "PAUSED")]
    Paused,
    #[serde(rename = "UNDEFINED")]
    Undefined,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Enabled => "ENABLED",
            TaskState::Paused => "PAUSED",
            TaskState::Undefined => "UNDEFINED",
        };
        f.write_str(s)
    }
}

/// 单次执行的状态, 每次执行前重置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCEED")]
    Succeed,
    #[serde(rename = "ERRORED")]
    Errored,
    #[serde(rename = "INCOMPLETE")]
    Incomplete,
    #[serde(rename = "TO_RETRY")]
    ToRetry,
}

impl ExecutionState {
    /// 由执行器自行声明的状态, worker 不会覆盖
    pub fn is_deferred(&self) -> bool {
        matches!(self, ExecutionState::Incomplete | ExecutionState::ToRetry)
    }
}

pub type TaskHook = Arc<dyn Fn(&Task) -> bool + Send + Sync>;

/// 进程内的任务钩子, 返回 `false` 表示失败. 不参与序列化和比较.
#[derive(Clone, Default)]
pub struct TaskHooks {
    pub before_scheduling: Option<TaskHook>,
    pub after_scheduling: Option<TaskHook>,
    pub before_executing: Option<TaskHook>,
    pub after_executing: Option<TaskHook>,
}

impl TaskHooks {
    pub fn is_empty(&self) -> bool {
        self.before_scheduling.is_none()
            && self.after_scheduling.is_none()
            && self.before_executing.is_none()
            && self.after_executing.is_none()
    }
}

impl fmt::Debug for TaskHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHooks")
            .field("before_scheduling", &self.before_scheduling.is_some())
            .field("after_scheduling", &self.after_scheduling.is_some())
            .field("before_executing", &self.before_executing.is_some())
            .field("after_executing", &self.after_executing.is_some())
            .finish()
    }
}

impl PartialEq for TaskHooks {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// 任务调度相关的通知
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskNotifications {
    pub before_scheduling: Option<NotificationTaskBag>,
    pub after_scheduling: Option<NotificationTaskBag>,
    pub before_executing: Option<NotificationTaskBag>,
    pub after_executing: Option<NotificationTaskBag>,
}

fn default_expression() -> String {
    DEFAULT_EXPRESSION.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_true() -> bool {
    true
}

/// 任务定义
///
/// 调度的基本单元. `name` 在同一个存储内唯一, 创建后不可修改;
/// `kind` 决定由哪个执行器处理以及执行所需的参数.
///
/// ```rust
/// use scheduler_core::models::{Task, TaskKind, TaskState};
///
/// let task = Task::new("backup", TaskKind::shell(["tar", "czf", "/tmp/b.tgz", "/srv"]))
///     .with_expression("0 2 * * *")
///     .with_priority(10);
///
/// assert_eq!(task.state, TaskState::Enabled);
/// assert!(task.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub name: String,
    pub kind: TaskKind,
    #[serde(default = "default_expression")]
    pub expression: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub state: TaskState,
    pub execution_state: Option<ExecutionState>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub priority: i32,
    pub nice: Option<i32>,
    pub max_executions: Option<u32>,
    /// 秒
    pub max_duration: Option<f64>,
    pub max_retries: Option<u32>,
    /// 执行前等待的微秒数
    pub execution_delay: Option<u64>,
    /// 秒
    pub execution_relative_deadline: Option<i64>,
    pub execution_absolute_deadline: Option<DateTime<Utc>>,

    pub execution_start_date: Option<DateTime<Utc>>,
    pub execution_end_date: Option<DateTime<Utc>>,

    pub scheduled_at: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub execution_start_time: Option<DateTime<Utc>>,
    pub execution_end_time: Option<DateTime<Utc>>,
    pub last_execution: Option<DateTime<Utc>>,
    /// 毫秒
    pub execution_computation_time: Option<f64>,
    /// 字节
    #[serde(default)]
    pub execution_memory_usage: u64,

    #[serde(default)]
    pub single_run: bool,
    #[serde(default)]
    pub delete_after_execute: bool,
    #[serde(default)]
    pub queued: bool,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub output_to_store: bool,
    #[serde(default = "default_true")]
    pub tracked: bool,
    pub stored_output: Option<String>,

    pub access_lock_bag: Option<AccessLockBag>,
    #[serde(default)]
    pub notifications: TaskNotifications,

    #[serde(skip)]
    pub hooks: TaskHooks,
}

impl Task {
    pub fn new<S: Into<String>>(name: S, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
            expression: default_expression(),
            timezone: default_timezone(),
            state: TaskState::Enabled,
            execution_state: None,
            description: None,
            tags: Vec::new(),
            priority: 0,
            nice: None,
            max_executions: None,
            max_duration: None,
            max_retries: None,
            execution_delay: None,
            execution_relative_deadline: None,
            execution_absolute_deadline: None,
            execution_start_date: None,
            execution_end_date: None,
            scheduled_at: None,
            arrival_time: None,
            execution_start_time: None,
            execution_end_time: None,
            last_execution: None,
            execution_computation_time: None,
            execution_memory_usage: 0,
            single_run: false,
            delete_after_execute: false,
            queued: false,
            background: false,
            output: false,
            output_to_store: false,
            tracked: true,
            stored_output: None,
            access_lock_bag: None,
            notifications: TaskNotifications::default(),
            hooks: TaskHooks::default(),
        }
    }

    /// 不做任何事情的任务
    pub fn null<S: Into<String>>(name: S) -> Self {
        Self::new(name, TaskKind::Null)
    }

    pub fn with_expression<S: Into<String>>(mut self, expression: S) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn with_timezone<S: Into<String>>(mut self, timezone: S) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_nice(mut self, nice: i32) -> Self {
        self.nice = Some(nice);
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_executions(mut self, max: u32) -> Self {
        self.max_executions = Some(max);
        self
    }

    pub fn with_max_duration(mut self, seconds: f64) -> Self {
        self.max_duration = Some(seconds);
        self
    }

    pub fn with_execution_window(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.execution_start_date = start;
        self.execution_end_date = end;
        self
    }

    pub fn with_execution_delay(mut self, micros: u64) -> Self {
        self.execution_delay = Some(micros);
        self
    }

    pub fn with_relative_deadline(mut self, seconds: i64) -> Self {
        self.execution_relative_deadline = Some(seconds);
        self
    }

    pub fn single_run(mut self) -> Self {
        self.single_run = true;
        self
    }

    pub fn delete_after_execute(mut self) -> Self {
        self.delete_after_execute = true;
        self
    }

    pub fn queued(mut self) -> Self {
        self.queued = true;
        self
    }

    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn with_output(mut self, to_store: bool) -> Self {
        self.output = true;
        self.output_to_store = to_store;
        self
    }

    pub fn with_notifications(mut self, notifications: TaskNotifications) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn before_scheduling<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Task) -> bool + Send + Sync + 'static,
    {
        self.hooks.before_scheduling = Some(Arc::new(hook));
        self
    }

    pub fn after_scheduling<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Task) -> bool + Send + Sync + 'static,
    {
        self.hooks.after_scheduling = Some(Arc::new(hook));
        self
    }

    pub fn before_executing<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Task) -> bool + Send + Sync + 'static,
    {
        self.hooks.before_executing = Some(Arc::new(hook));
        self
    }

    pub fn after_executing<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Task) -> bool + Send + Sync + 'static,
    {
        self.hooks.after_executing = Some(Arc::new(hook));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.state == TaskState::Enabled
    }

    pub fn is_paused(&self) -> bool {
        self.state == TaskState::Paused
    }

    /// 任务类型名称, 与序列化时的 `type` 字段一致
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// 检查字段取值范围
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::InvalidTask("任务名称不能为空".to_string()));
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(SchedulerError::InvalidTask(format!(
                "任务名称 \"{}\" 不能包含路径分隔符",
                self.name
            )));
        }
        if self.expression.trim().is_empty() {
            return Err(SchedulerError::InvalidTask(format!(
                "任务 \"{}\" 的表达式不能为空",
                self.name
            )));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(SchedulerError::InvalidTask(format!(
                "任务 \"{}\" 的优先级 {} 超出范围 [{MIN_PRIORITY}, {MAX_PRIORITY}]",
                self.name, self.priority
            )));
        }
        if let Some(nice) = self.nice {
            if !(MIN_NICE..=MAX_NICE).contains(&nice) {
                return Err(SchedulerError::InvalidTask(format!(
                    "任务 \"{}\" 的 nice 值 {nice} 超出范围 [{MIN_NICE}, {MAX_NICE}]",
                    self.name
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.execution_start_date, self.execution_end_date) {
            if start >= end {
                return Err(SchedulerError::InvalidTask(format!(
                    "任务 \"{}\" 的执行窗口无效: 开始时间必须早于结束时间",
                    self.name
                )));
            }
        }
        if let TaskKind::Chained(chained) = &self.kind {
            for child in &chained.tasks {
                child.validate()?;
            }
        }
        Ok(())
    }

    /// 写入外部存储前的检查, 进程内回调无法跨越序列化边界
    pub fn ensure_serializable(&self) -> Result<()> {
        self.kind.ensure_serializable(&self.name)
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        self.ensure_serializable()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// `now` 是否落在执行窗口内: 开始时间闭区间, 结束时间开区间
    pub fn is_within_execution_window(&self, now: DateTime<Utc>) -> bool {
        match (self.execution_start_date, self.execution_end_date) {
            (Some(start), Some(end)) => start <= now && now < end,
            (Some(start), None) => start <= now,
            (None, Some(end)) => now < end,
            (None, None) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task_kind::{Callback, CallbackPayload, ChainedPayload};
    use chrono::TimeZone;

    #[test]
    fn defaults() {
        let task = Task::null("foo");
        assert_eq!(task.expression, "* * * * *");
        assert_eq!(task.timezone, "UTC");
        assert_eq!(task.state, TaskState::Enabled);
        assert!(task.tracked);
        assert!(task.execution_state.is_none());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(Task::null("foo").with_priority(1001).validate().is_err());
        assert!(Task::null("foo").with_priority(-1000).validate().is_ok());
        assert!(Task::null("foo").with_nice(20).validate().is_err());
        assert!(Task::null("foo").with_nice(-20).validate().is_ok());
        assert!(Task::null("").validate().is_err());
        assert!(Task::null("a/b").validate().is_err());
    }

    #[test]
    fn execution_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let task = Task::null("foo").with_execution_window(Some(start), Some(end));

        assert!(task.is_within_execution_window(start));
        assert!(!task.is_within_execution_window(end));
        assert!(!task.is_within_execution_window(start - chrono::Duration::seconds(1)));

        let only_end = Task::null("bar").with_execution_window(None, Some(end));
        assert!(only_end.is_within_execution_window(start));
        assert!(!only_end.is_within_execution_window(end));
    }

    #[test]
    fn json_round_trip_keeps_payload() {
        let task = Task::new(
            "chain",
            TaskKind::Chained(ChainedPayload {
                tasks: vec![
                    Task::new("ls", TaskKind::shell(["ls", "-al"])),
                    Task::new(
                        "cb",
                        TaskKind::Callback(CallbackPayload {
                            callback: Callback::named("reports", "daily"),
                            arguments: vec![serde_json::json!(1)],
                        }),
                    ),
                ],
            }),
        )
        .with_expression("*/5 * * * *")
        .with_state(TaskState::Paused);

        let json = task.to_json().unwrap();
        let restored = Task::from_json(&json).unwrap();
        assert_eq!(restored, task);
    }

    #[test]
    fn local_callbacks_are_not_serializable() {
        let task = Task::new(
            "local",
            TaskKind::Callback(CallbackPayload {
                callback: Callback::local(|_| Ok(None)),
                arguments: vec![],
            }),
        );

        let err = task.to_json().unwrap_err();
        assert!(matches!(err, SchedulerError::NotSerializable { .. }));
    }
}
