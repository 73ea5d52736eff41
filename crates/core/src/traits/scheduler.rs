use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use crate::models::{Task, TaskList};
use crate::SchedulerResult;

/// 调度器接口
///
/// Worker 只通过这个接口读取到期任务和回写任务状态.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// 设置调度时间和时区后写入存储
    async fn schedule(&self, task: Task) -> SchedulerResult<()>;

    async fn unschedule(&self, name: &str) -> SchedulerResult<()>;

    /// 先移除再重新调度, `asynchronous` 为真且配置了消息总线时走总线
    async fn yield_task(&self, name: &str, asynchronous: bool) -> SchedulerResult<()>;

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;

    async fn pause(&self, name: &str) -> SchedulerResult<()>;

    async fn resume(&self, name: &str) -> SchedulerResult<()>;

    async fn get_tasks(&self) -> SchedulerResult<TaskList>;

    /// 读取存储中的单个任务
    async fn get_task(&self, name: &str) -> SchedulerResult<Task>;

    /// 在 `now` 所在分钟到期且处于执行窗口内的任务
    async fn get_due_tasks(&self, now: DateTime<Utc>) -> SchedulerResult<TaskList>;

    async fn next_due_date(&self, name: &str, after: DateTime<Utc>) -> SchedulerResult<Option<DateTime<Utc>>>;

    /// 只保留 `@reboot` 任务并重新创建
    async fn reboot(&self) -> SchedulerResult<()>;

    fn timezone(&self) -> FixedOffset;

    fn now(&self) -> DateTime<Utc>;
}
