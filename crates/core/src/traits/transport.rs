use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::models::{Task, TaskList};
use crate::SchedulerResult;

pub const EXECUTION_MODE_KEY: &str = "execution_mode";
pub const DEFAULT_EXECUTION_MODE: &str = "first_in_first_out";

/// 存储配置
///
/// 构造存储时解析一次的键值表, 之后只读, 除非显式调用 `update`.
/// 克隆出的副本共享同一份数据.
#[derive(Debug, Clone)]
pub struct TransportConfiguration {
    values: Arc<RwLock<BTreeMap<String, String>>>,
}

impl TransportConfiguration {
    pub fn new() -> Self {
        Self::from_options(BTreeMap::new())
    }

    pub fn from_options(mut options: BTreeMap<String, String>) -> Self {
        options
            .entry(EXECUTION_MODE_KEY.to_string())
            .or_insert_with(|| DEFAULT_EXECUTION_MODE.to_string());
        Self {
            values: Arc::new(RwLock::new(options)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    pub fn get_or<S: Into<String>>(&self, key: &str, default: S) -> String {
        self.get(key).unwrap_or_else(|| default.into())
    }

    pub fn update<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
    }

    pub fn execution_mode(&self) -> String {
        self.get_or(EXECUTION_MODE_KEY, DEFAULT_EXECUTION_MODE)
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for TransportConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

/// 任务存储接口
///
/// 所有失败都以 `SchedulerError::Transport` 返回.
/// `create` 的唯一性检查与写入必须相对后端自身的并发原语是原子的;
/// `pause`/`resume` 对已处于目标状态的任务显式报错.
#[async_trait]
pub trait Transport: Send + Sync {
    /// 全部任务, 按 `execution_mode` 对应的策略排序
    async fn list(&self) -> SchedulerResult<TaskList>;

    async fn get(&self, name: &str) -> SchedulerResult<Task>;

    async fn create(&self, task: Task) -> SchedulerResult<()>;

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;

    async fn pause(&self, name: &str) -> SchedulerResult<()>;

    async fn resume(&self, name: &str) -> SchedulerResult<()>;

    async fn delete(&self, name: &str) -> SchedulerResult<()>;

    async fn clear(&self) -> SchedulerResult<()>;

    async fn count(&self) -> SchedulerResult<usize> {
        Ok(self.list().await?.len())
    }

    fn configuration(&self) -> &TransportConfiguration;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_defaults_execution_mode() {
        let configuration = TransportConfiguration::new();
        assert_eq!(configuration.execution_mode(), "first_in_first_out");

        let shared = configuration.clone();
        shared.update(EXECUTION_MODE_KEY, "batch");
        assert_eq!(configuration.execution_mode(), "batch");
    }
}
