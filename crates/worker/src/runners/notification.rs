use std::sync::Arc;

use async_trait::async_trait;

use scheduler_core::models::{Output, Task, TaskKind};
use scheduler_core::traits::Notifier;
use scheduler_core::SchedulerResult;

use super::Runner;
use crate::worker::Worker;

#[derive(Clone, Default)]
pub struct NotificationRunner {
    notifier: Option<Arc<dyn Notifier>>,
}

impl NotificationRunner {
    pub fn new(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Runner for NotificationRunner {
    fn name(&self) -> &str {
        "notification"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Notification(_))
    }

    async fn run(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Notification(payload) = &task.kind else {
            return Ok(Output::error(task, Some("不是 notification 任务")));
        };
        let Some(notifier) = &self.notifier else {
            return Ok(Output::error(task, Some("未配置通知发送器")));
        };

        match notifier.send(&payload.notification, &payload.recipients).await {
            Ok(()) => Ok(Output::success(task, None::<String>)),
            Err(err) => Ok(Output::error(task, Some(err.to_string()))),
        }
    }
}
