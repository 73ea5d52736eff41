use std::time::Instant;

use scheduler_core::models::Task;

/// 一次执行的跟踪句柄
#[derive(Debug)]
pub struct Tracking {
    started_at: Instant,
}

/// 记录任务执行耗时和执行结束时进程的内存占用
///
/// `tracked` 为假的任务不记录.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskExecutionTracker;

impl TaskExecutionTracker {
    pub fn start(&self, _task: &Task) -> Tracking {
        Tracking {
            started_at: Instant::now(),
        }
    }

    pub fn end(&self, tracking: Tracking, task: &mut Task) {
        if !task.tracked {
            return;
        }
        task.execution_computation_time = Some(tracking.started_at.elapsed().as_secs_f64() * 1000.0);
        task.execution_memory_usage = resident_memory_bytes().unwrap_or(0);
    }
}

/// 当前进程的常驻内存
#[cfg(target_os = "linux")]
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_bytes() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_computation_time_for_tracked_tasks() {
        let tracker = TaskExecutionTracker;
        let mut task = Task::null("foo");
        let tracking = tracker.start(&task);
        std::thread::sleep(std::time::Duration::from_millis(5));
        tracker.end(tracking, &mut task);

        assert!(task.execution_computation_time.unwrap() >= 5.0);
    }

    #[test]
    fn untracked_tasks_are_left_alone() {
        let tracker = TaskExecutionTracker;
        let mut task = Task::null("foo");
        task.tracked = false;
        let tracking = tracker.start(&task);
        tracker.end(tracking, &mut task);

        assert!(task.execution_computation_time.is_none());
        assert_eq!(task.execution_memory_usage, 0);
    }
}
