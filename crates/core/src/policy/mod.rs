//! 调度策略
//!
//! 给定策略名称和一组任务, 返回确定顺序的任务列表. 每个策略都是稳定排序,
//! 比较结果相同的任务保持输入顺序. `batch` 会修改任务优先级,
//! 状态保存在任务本身而不是编排器里.

pub mod strategies;

#[cfg(test)]
mod strategies_test;

use tracing::debug;

use crate::models::{Task, TaskList};
use crate::{SchedulerError, SchedulerResult};

pub use strategies::*;

/// 调度策略接口
pub trait SchedulePolicy: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, policy: &str) -> bool {
        self.name() == policy
    }

    /// 对任务排序, 允许修改任务上的调度字段
    fn sort(&self, tasks: Vec<Task>) -> Vec<Task>;
}

/// 策略编排器
pub struct SchedulePolicyOrchestrator {
    policies: Vec<Box<dyn SchedulePolicy>>,
}

impl SchedulePolicyOrchestrator {
    pub fn new(policies: Vec<Box<dyn SchedulePolicy>>) -> Self {
        Self { policies }
    }

    /// 空编排器, 任何排序请求都会失败
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn register(&mut self, policy: Box<dyn SchedulePolicy>) {
        self.policies.push(policy);
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn supports(&self, policy: &str) -> bool {
        self.policies.iter().any(|p| p.supports(policy))
    }

    pub fn sort(&self, policy: &str, tasks: TaskList) -> SchedulerResult<TaskList> {
        if self.policies.is_empty() {
            return Err(SchedulerError::NoPoliciesRegistered);
        }

        if tasks.is_empty() {
            return Ok(tasks);
        }

        let selected = self
            .policies
            .iter()
            .find(|p| p.supports(policy))
            .ok_or_else(|| SchedulerError::UnknownPolicy(policy.to_string()))?;

        debug!(policy = selected.name(), tasks = tasks.len(), "按策略排序任务");
        Ok(selected.sort(tasks.into_vec()).into())
    }
}

impl Default for SchedulePolicyOrchestrator {
    /// 注册全部内置策略
    fn default() -> Self {
        Self::new(vec![
            Box::new(FirstInFirstOutPolicy),
            Box::new(FirstInLastOutPolicy),
            Box::new(DeadlinePolicy),
            Box::new(ExecutionDurationPolicy),
            Box::new(IdlePolicy),
            Box::new(NicePolicy),
            Box::new(MemoryUsagePolicy),
            Box::new(BatchPolicy),
            Box::new(RoundRobinPolicy),
        ])
    }
}

impl std::fmt::Debug for SchedulePolicyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulePolicyOrchestrator")
            .field("policies", &self.policy_names())
            .finish()
    }
}
