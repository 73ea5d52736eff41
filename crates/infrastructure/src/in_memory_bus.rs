use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scheduler_core::traits::{BusMessage, BusMessageHandler, MessageBus};
use scheduler_core::{SchedulerError, SchedulerResult};

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// 内存消息总线
///
/// 基于有界的 tokio channel, 队列满时 `dispatch` 等待消费端腾出空间.
/// 只有一个消费端: 要么通过 `spawn_consumer` 在后台持续消费,
/// 要么通过 `drain` 同步处理当前积压的消息.
pub struct InMemoryMessageBus {
    sender: mpsc::Sender<BusMessage>,
    receiver: Arc<Mutex<Option<mpsc::Receiver<BusMessage>>>>,
    dispatched: AtomicU64,
}

impl InMemoryMessageBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        info!(capacity, "创建内存消息总线");
        Self {
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            dispatched: AtomicU64::new(0),
        }
    }

    /// 已投递的消息总数
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// 在后台持续消费, 只能调用一次
    pub async fn spawn_consumer(
        &self,
        handler: Arc<dyn BusMessageHandler>,
    ) -> SchedulerResult<JoinHandle<()>> {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| SchedulerError::MessageBus("消息总线已经有消费者".to_string()))?;

        Ok(tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                handle(handler.as_ref(), message).await;
            }
            debug!("消息总线已关闭, 消费者退出");
        }))
    }

    /// 同步处理当前积压的消息, 返回处理的条数
    pub async fn drain(&self, handler: &dyn BusMessageHandler) -> SchedulerResult<usize> {
        let mut guard = self.receiver.lock().await;
        let receiver = guard
            .as_mut()
            .ok_or_else(|| SchedulerError::MessageBus("消息总线已由后台消费者接管".to_string()))?;

        let mut handled = 0;
        while let Ok(message) = receiver.try_recv() {
            handle(handler, message).await;
            handled += 1;
        }
        Ok(handled)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

async fn handle(handler: &dyn BusMessageHandler, message: BusMessage) {
    let kind = message_kind(&message);
    if let Err(err) = handler.handle(message).await {
        warn!(message = kind, error = %err, "消息处理失败");
    }
}

fn message_kind(message: &BusMessage) -> &'static str {
    match message {
        BusMessage::Schedule { .. } => "schedule",
        BusMessage::Yield { .. } => "yield",
        BusMessage::Payload { .. } => "payload",
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn dispatch(&self, message: BusMessage) -> SchedulerResult<()> {
        debug!(message = message_kind(&message), "投递消息");
        self.sender
            .send(message)
            .await
            .map_err(|err| SchedulerError::MessageBus(format!("消息投递失败: {err}")))?;
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
