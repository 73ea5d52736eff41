use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, SchedulerError};
use crate::models::bags::{Notification, Recipient};
use crate::models::task::Task;

fn default_shell_timeout() -> f64 {
    60.0
}

fn default_http_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellPayload {
    pub command: Vec<String>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    /// 秒, 超时后进程会被终止
    #[serde(default = "default_shell_timeout")]
    pub timeout_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpPayload {
    pub url: String,
    #[serde(default = "default_http_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandPayload {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

pub type CallbackFn = dyn Fn(&[Value]) -> std::result::Result<Option<String>, String> + Send + Sync;

/// 进程内闭包, 只在当前进程有效
#[derive(Clone)]
pub struct LocalCallback(Arc<CallbackFn>);

impl LocalCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Option<String>, String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, arguments: &[Value]) -> std::result::Result<Option<String>, String> {
        (self.0)(arguments)
    }
}

impl fmt::Debug for LocalCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LocalCallback(..)")
    }
}

impl PartialEq for LocalCallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// 回调引用
///
/// `Named` 可以序列化, 由执行端的回调注册表重新解析;
/// `Local` 携带闭包, 任何写入外部存储的路径都会以 `NotSerializable` 拒绝它.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Callback {
    Named { target: String, method: String },
    #[serde(skip)]
    Local(LocalCallback),
}

impl Callback {
    pub fn named<T: Into<String>, M: Into<String>>(target: T, method: M) -> Self {
        Self::Named {
            target: target.into(),
            method: method.into(),
        }
    }

    pub fn local<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Option<String>, String> + Send + Sync + 'static,
    {
        Self::Local(LocalCallback::new(f))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackPayload {
    pub callback: Callback,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessengerPayload {
    pub message: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub notification: Notification,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainedPayload {
    pub tasks: Vec<Task>,
}

/// 任务类型, 决定执行器和执行参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Null,
    Shell(ShellPayload),
    Http(HttpPayload),
    Command(CommandPayload),
    Callback(CallbackPayload),
    Messenger(MessengerPayload),
    Notification(NotificationPayload),
    Chained(ChainedPayload),
}

impl TaskKind {
    pub fn shell<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TaskKind::Shell(ShellPayload {
            command: command.into_iter().map(Into::into).collect(),
            cwd: None,
            environment_variables: BTreeMap::new(),
            timeout_secs: default_shell_timeout(),
        })
    }

    pub fn http<S: Into<String>>(url: S) -> Self {
        TaskKind::Http(HttpPayload {
            url: url.into(),
            method: default_http_method(),
            headers: BTreeMap::new(),
            body: None,
            timeout_secs: None,
        })
    }

    pub fn command<S: Into<String>>(command: S, arguments: Vec<String>) -> Self {
        TaskKind::Command(CommandPayload {
            command: command.into(),
            arguments,
            options: BTreeMap::new(),
        })
    }

    pub fn chained(tasks: Vec<Task>) -> Self {
        TaskKind::Chained(ChainedPayload { tasks })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TaskKind::Null => "null",
            TaskKind::Shell(_) => "shell",
            TaskKind::Http(_) => "http",
            TaskKind::Command(_) => "command",
            TaskKind::Callback(_) => "callback",
            TaskKind::Messenger(_) => "messenger",
            TaskKind::Notification(_) => "notification",
            TaskKind::Chained(_) => "chained",
        }
    }

    pub(crate) fn ensure_serializable(&self, task_name: &str) -> Result<()> {
        match self {
            TaskKind::Callback(CallbackPayload {
                callback: Callback::Local(_),
                ..
            }) => Err(SchedulerError::NotSerializable {
                task: task_name.to_string(),
                reason: "进程内回调无法写入外部存储, 请改用具名回调".to_string(),
            }),
            TaskKind::Chained(chained) => chained
                .tasks
                .iter()
                .try_for_each(|child| child.ensure_serializable()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_type_tag_matches_type_name() {
        let kinds = vec![
            TaskKind::Null,
            TaskKind::shell(["echo", "hi"]),
            TaskKind::http("https://example.com"),
            TaskKind::command("cache:clear", vec![]),
            TaskKind::Messenger(MessengerPayload {
                message: serde_json::json!({"id": 1}),
            }),
        ];

        for kind in kinds {
            let value = serde_json::to_value(&kind).unwrap();
            assert_eq!(value["type"], kind.type_name());
        }
    }

    #[test]
    fn shell_defaults_when_deserialized() {
        let kind: TaskKind =
            serde_json::from_str(r#"{"type":"shell","command":["ls"]}"#).unwrap();
        match kind {
            TaskKind::Shell(shell) => {
                assert_eq!(shell.timeout_secs, 60.0);
                assert!(shell.cwd.is_none());
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn nested_local_callback_is_rejected() {
        let inner = Task::new(
            "inner",
            TaskKind::Callback(CallbackPayload {
                callback: Callback::local(|_| Ok(Some("ok".into()))),
                arguments: vec![],
            }),
        );
        let chained = TaskKind::chained(vec![inner]);
        assert!(chained.ensure_serializable("outer").is_err());
    }
}
