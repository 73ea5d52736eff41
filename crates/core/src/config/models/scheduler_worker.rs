use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_TIMEZONE;
use crate::policy::SchedulePolicyOrchestrator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub timezone: String,
    pub clock: ClockConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            clock: ClockConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timezone.trim().is_empty() {
            return Err(anyhow::anyhow!("调度器时区不能为空"));
        }
        crate::time::parse_timezone(&self.timezone)
            .map_err(|e| anyhow::anyhow!("无效的调度器时区: {e}"))?;
        self.clock.validate()
    }
}

/// 时钟偏移容忍范围
///
/// 调度器初始化后, 当前时间允许比初始化时刻早 `max_backward_skew_ms`,
/// 晚 `max_drift_secs`. 上限未设置时不做限制.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub max_backward_skew_ms: u64,
    pub max_drift_secs: Option<u64>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            max_backward_skew_ms: 1000,
            max_drift_secs: None,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_drift_secs == Some(0) && self.max_backward_skew_ms == 0 {
            return Err(anyhow::anyhow!("时钟偏移范围不能为空区间"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub policy: String,
    pub sleep_until_next_minute: bool,
    pub sleep_duration_delay_secs: u64,
    /// 执行指定数量的任务后停止
    pub task_limit: Option<u64>,
    /// 失败指定次数后停止
    pub failure_limit: Option<u64>,
    /// 运行指定秒数后停止
    pub time_limit_secs: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            policy: "first_in_first_out".to_string(),
            sleep_until_next_minute: true,
            sleep_duration_delay_secs: 1,
            task_limit: None,
            failure_limit: None,
            time_limit_secs: None,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let orchestrator = SchedulePolicyOrchestrator::default();
        if !orchestrator.supports(&self.policy) {
            return Err(anyhow::anyhow!(
                "无效的调度策略: {}，支持的策略: {:?}",
                self.policy,
                orchestrator.policy_names()
            ));
        }

        if self.sleep_duration_delay_secs >= 60 {
            return Err(anyhow::anyhow!("休眠延迟必须小于60秒"));
        }

        if self.task_limit == Some(0) {
            return Err(anyhow::anyhow!("任务数量限制必须大于0"));
        }

        if self.failure_limit == Some(0) {
            return Err(anyhow::anyhow!("失败数量限制必须大于0"));
        }

        if self.time_limit_secs == Some(0) {
            return Err(anyhow::anyhow!("运行时间限制必须大于0"));
        }

        Ok(())
    }
}
