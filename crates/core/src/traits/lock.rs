use async_trait::async_trait;

use crate::SchedulerResult;

/// 建议锁
///
/// 只能阻止遵守约定的调用方重复执行, 不是跨集群的分布式锁.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// 非阻塞获取, 已被持有时返回 `false`
    async fn acquire(&self, key: &str) -> SchedulerResult<bool>;

    async fn release(&self, key: &str) -> SchedulerResult<()>;

    async fn is_acquired(&self, key: &str) -> SchedulerResult<bool>;
}
