use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::task::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputKind {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "ERROR")]
    Error,
}

/// 执行器返回的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Output {
    pub task_name: String,
    pub body: Option<String>,
    pub kind: OutputKind,
}

impl Output {
    pub fn success<S: Into<String>>(task: &Task, body: Option<S>) -> Self {
        Self {
            task_name: task.name.clone(),
            body: body.map(Into::into),
            kind: OutputKind::Success,
        }
    }

    pub fn error<S: Into<String>>(task: &Task, body: Option<S>) -> Self {
        Self {
            task_name: task.name.clone(),
            body: body.map(Into::into),
            kind: OutputKind::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutputKind::Success
    }
}

/// 执行失败的任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedTask {
    pub task: Task,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl FailedTask {
    pub fn new<S: Into<String>>(task: Task, reason: S) -> Self {
        Self {
            task,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.task.name
    }
}
