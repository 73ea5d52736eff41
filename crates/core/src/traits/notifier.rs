use async_trait::async_trait;

use crate::models::{Notification, Recipient};
use crate::SchedulerResult;

/// 通知发送
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification, recipients: &[Recipient]) -> SchedulerResult<()>;
}

/// 只写日志的通知实现
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification, recipients: &[Recipient]) -> SchedulerResult<()> {
        tracing::info!(
            subject = %notification.subject,
            recipients = recipients.len(),
            "发送通知"
        );
        Ok(())
    }
}
