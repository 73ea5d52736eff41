use std::time::Duration;

use scheduler_core::config::WorkerConfig;

pub const DEFAULT_POLICY: &str = "first_in_first_out";

/// 单个 worker 的运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfiguration {
    /// 每一轮任务的排序策略
    pub policy: String,
    /// 为真时每轮结束后睡到下一分钟并继续, 否则执行一轮后返回
    pub sleep_until_next_minute: bool,
    /// 整分钟之后额外等待的时间
    pub sleep_duration_delay: Duration,
    /// 本次 `execute` 已经执行的任务数
    pub executed_tasks_count: usize,
    pub is_fork: bool,
    pub forked_from: Option<String>,
}

impl WorkerConfiguration {
    pub fn new<S: Into<String>>(policy: S) -> Self {
        Self {
            policy: policy.into(),
            ..Self::default()
        }
    }

    pub fn sleeping_until_next_minute(mut self, delay: Duration) -> Self {
        self.sleep_until_next_minute = true;
        self.sleep_duration_delay = delay;
        self
    }

    /// 派生 worker 的配置: 沿用排序策略, 只执行一轮
    pub fn fork_of(&self, parent_id: &str) -> Self {
        Self {
            policy: self.policy.clone(),
            sleep_until_next_minute: false,
            sleep_duration_delay: self.sleep_duration_delay,
            executed_tasks_count: 0,
            is_fork: true,
            forked_from: Some(parent_id.to_string()),
        }
    }
}

impl Default for WorkerConfiguration {
    fn default() -> Self {
        Self {
            policy: DEFAULT_POLICY.to_string(),
            sleep_until_next_minute: false,
            sleep_duration_delay: Duration::from_secs(1),
            executed_tasks_count: 0,
            is_fork: false,
            forked_from: None,
        }
    }
}

impl From<&WorkerConfig> for WorkerConfiguration {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            policy: config.policy.clone(),
            sleep_until_next_minute: config.sleep_until_next_minute,
            sleep_duration_delay: Duration::from_secs(config.sleep_duration_delay_secs),
            ..Self::default()
        }
    }
}
