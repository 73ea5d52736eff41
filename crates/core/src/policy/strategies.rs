use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use super::SchedulePolicy;
use crate::models::{Task, MAX_PRIORITY, MIN_PRIORITY};

fn compare_optional<T: Ord>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn scheduled_at(task: &Task) -> Option<DateTime<Utc>> {
    task.scheduled_at
}

/// 先调度的先执行
#[derive(Debug, Default, Clone)]
pub struct FirstInFirstOutPolicy;

impl SchedulePolicy for FirstInFirstOutPolicy {
    fn name(&self) -> &str {
        "first_in_first_out"
    }

    fn supports(&self, policy: &str) -> bool {
        matches!(policy, "first_in_first_out" | "fifo")
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by(|a, b| compare_optional(scheduled_at(a), scheduled_at(b)));
        tasks
    }
}

/// 后调度的先执行
#[derive(Debug, Default, Clone)]
pub struct FirstInLastOutPolicy;

impl SchedulePolicy for FirstInLastOutPolicy {
    fn name(&self) -> &str {
        "first_in_last_out"
    }

    fn supports(&self, policy: &str) -> bool {
        matches!(policy, "first_in_last_out" | "filo")
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by(|a, b| match (scheduled_at(a), scheduled_at(b)) {
            (Some(l), Some(r)) => r.cmp(&l),
            (left, right) => compare_optional(left, right),
        });
        tasks
    }
}

/// 最早截止时间优先
///
/// 有到达时间和相对截止时间的任务会先计算绝对截止时间.
#[derive(Debug, Default, Clone)]
pub struct DeadlinePolicy;

impl SchedulePolicy for DeadlinePolicy {
    fn name(&self) -> &str {
        "deadline"
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        for task in tasks.iter_mut() {
            if let (Some(arrival), Some(relative)) =
                (task.arrival_time, task.execution_relative_deadline)
            {
                task.execution_absolute_deadline = Some(arrival + Duration::seconds(relative));
            }
        }

        tasks.sort_by(|a, b| {
            compare_optional(a.execution_absolute_deadline, b.execution_absolute_deadline)
        });
        tasks
    }
}

/// 上次执行耗时短的优先
#[derive(Debug, Default, Clone)]
pub struct ExecutionDurationPolicy;

impl SchedulePolicy for ExecutionDurationPolicy {
    fn name(&self) -> &str {
        "execution_duration"
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by(|a, b| {
            let left = a.execution_computation_time.unwrap_or(0.0);
            let right = b.execution_computation_time.unwrap_or(0.0);
            left.total_cmp(&right)
        });
        tasks
    }
}

/// 优先级数值小的先执行
#[derive(Debug, Default, Clone)]
pub struct IdlePolicy;

impl SchedulePolicy for IdlePolicy {
    fn name(&self) -> &str {
        "idle"
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by_key(|task| task.priority);
        tasks
    }
}

/// 按 nice 值升序
///
/// 只比较优先级不大于 0 的任务, 正优先级任务排在后面并保持原有顺序.
#[derive(Debug, Default, Clone)]
pub struct NicePolicy;

impl SchedulePolicy for NicePolicy {
    fn name(&self) -> &str {
        "nice"
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by_key(|task| {
            if task.priority > 0 {
                (true, 0)
            } else {
                (false, task.nice.unwrap_or(0))
            }
        });
        tasks
    }
}

/// 内存占用小的优先
#[derive(Debug, Default, Clone)]
pub struct MemoryUsagePolicy;

impl SchedulePolicy for MemoryUsagePolicy {
    fn name(&self) -> &str {
        "memory_usage"
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by_key(|task| task.execution_memory_usage);
        tasks
    }
}

/// 分批执行
///
/// 每次排序都把边界内的优先级减一, 反复调用时优先级带依次被消耗.
#[derive(Debug, Default, Clone)]
pub struct BatchPolicy;

impl SchedulePolicy for BatchPolicy {
    fn name(&self) -> &str {
        "batch"
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        for task in tasks.iter_mut() {
            if task.priority > MIN_PRIORITY && task.priority < MAX_PRIORITY {
                task.priority -= 1;
            }
        }

        tasks.sort_by_key(|task| task.priority);
        tasks
    }
}

/// 轮转
///
/// 从未执行过的任务最先, 其次是上次耗时没有超过 `max_duration` 的任务,
/// 超时的任务最后. 同组内耗时短的优先.
#[derive(Debug, Default, Clone)]
pub struct RoundRobinPolicy;

impl RoundRobinPolicy {
    fn bucket(task: &Task) -> u8 {
        match (task.execution_computation_time, task.max_duration) {
            (None, _) => 0,
            (Some(elapsed), Some(max)) if elapsed > max * 1000.0 => 2,
            (Some(_), _) => 1,
        }
    }
}

impl SchedulePolicy for RoundRobinPolicy {
    fn name(&self) -> &str {
        "round_robin"
    }

    fn sort(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by(|a, b| {
            Self::bucket(a).cmp(&Self::bucket(b)).then_with(|| {
                let left = a.execution_computation_time.unwrap_or(0.0);
                let right = b.execution_computation_time.unwrap_or(0.0);
                left.total_cmp(&right)
            })
        });
        tasks
    }
}
