use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Task;
use crate::SchedulerResult;

/// 通过消息总线传递的调度请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum BusMessage {
    /// 异步调度一个任务
    Schedule { task: Box<Task> },
    /// 让出任务: 先移除再重新调度
    Yield { name: String },
    /// Messenger 任务携带的业务消息
    Payload { task: String, body: serde_json::Value },
}

/// 消息总线
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn dispatch(&self, message: BusMessage) -> SchedulerResult<()>;
}

/// 消息总线的消费端
#[async_trait]
pub trait BusMessageHandler: Send + Sync {
    async fn handle(&self, message: BusMessage) -> SchedulerResult<()>;
}
