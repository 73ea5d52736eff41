use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use scheduler_core::models::{Output, Task, TaskKind};
use scheduler_core::traits::{BusMessage, MessageBus};
use scheduler_core::SchedulerResult;

use super::Runner;
use crate::worker::Worker;

/// 把任务携带的消息投递到消息总线
#[derive(Clone, Default)]
pub struct MessengerRunner {
    bus: Option<Arc<dyn MessageBus>>,
}

impl MessengerRunner {
    pub fn new(bus: Option<Arc<dyn MessageBus>>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Runner for MessengerRunner {
    fn name(&self) -> &str {
        "messenger"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Messenger(_))
    }

    async fn run(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Messenger(messenger) = &task.kind else {
            return Ok(Output::error(task, Some("不是 messenger 任务")));
        };
        let Some(bus) = &self.bus else {
            return Ok(Output::error(task, Some("未配置消息总线, 无法投递消息")));
        };

        let message = BusMessage::Payload {
            task: task.name.clone(),
            body: messenger.message.clone(),
        };
        match bus.dispatch(message).await {
            Ok(()) => {
                debug!(task = %task.name, "消息已投递");
                Ok(Output::success(task, None::<String>))
            }
            Err(err) => {
                warn!(task = %task.name, error = %err, "消息投递失败");
                Ok(Output::error(task, Some(err.to_string())))
            }
        }
    }
}
