use serde::{Deserialize, Serialize};

use crate::models::TaskKind;

/// 配置文件中的 `[[tasks]]` 条目
///
/// ```toml
/// [[tasks]]
/// name = "backup"
/// expression = "@daily"
///
/// [tasks.kind]
/// type = "shell"
/// command = ["tar", "czf", "/tmp/backup.tgz", "/srv"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: TaskKind,
    pub expression: Option<String>,
    pub timezone: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub priority: Option<i32>,
    pub nice: Option<i32>,
    pub max_executions: Option<u32>,
    pub max_duration: Option<f64>,
    pub max_retries: Option<u32>,
    pub execution_delay: Option<u64>,
    pub execution_relative_deadline: Option<i64>,
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
    #[serde(default)]
    pub paused: bool,
}
