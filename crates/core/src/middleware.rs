//! 调度端和执行端共用的内置中间件

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::models::{NotificationTaskBag, Task, WorkerControl};
use crate::traits::{
    Middleware, Notifier, PostExecutionMiddleware, PostSchedulingMiddleware,
    PreExecutionMiddleware, PreSchedulingMiddleware,
};
use crate::{SchedulerError, SchedulerResult};

/// 调用任务上的四个钩子, 钩子返回 `false` 时中断当前阶段
#[derive(Debug, Default, Clone)]
pub struct TaskCallbackMiddleware;

impl TaskCallbackMiddleware {
    pub const NAME: &'static str = "task_callback";

    fn failed(task: &Task, phase: &str) -> SchedulerError {
        SchedulerError::middleware(
            Self::NAME,
            format!("任务 \"{}\" 的 {phase} 钩子返回失败", task.name),
        )
    }
}

impl Middleware for TaskCallbackMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> Option<i32> {
        Some(1)
    }
}

#[async_trait]
impl PreSchedulingMiddleware for TaskCallbackMiddleware {
    async fn pre_scheduling(&self, task: &mut Task) -> SchedulerResult<()> {
        match task.hooks.before_scheduling.clone() {
            Some(hook) if !hook(&*task) => Err(Self::failed(task, "before_scheduling")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PostSchedulingMiddleware for TaskCallbackMiddleware {
    async fn post_scheduling(&self, task: &Task) -> SchedulerResult<()> {
        match &task.hooks.after_scheduling {
            Some(hook) if !hook(&*task) => Err(Self::failed(task, "after_scheduling")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PreExecutionMiddleware for TaskCallbackMiddleware {
    async fn pre_execute(&self, task: &mut Task) -> SchedulerResult<()> {
        match task.hooks.before_executing.clone() {
            Some(hook) if !hook(&*task) => Err(Self::failed(task, "before_executing")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PostExecutionMiddleware for TaskCallbackMiddleware {
    async fn post_execute(&self, task: &mut Task, _worker: &WorkerControl) -> SchedulerResult<()> {
        match task.hooks.after_executing.clone() {
            Some(hook) if !hook(&*task) => Err(Self::failed(task, "after_executing")),
            _ => Ok(()),
        }
    }
}

/// 把任务上附带的通知交给 `Notifier` 发送
#[derive(Clone)]
pub struct NotifierMiddleware {
    notifier: Arc<dyn Notifier>,
}

impl NotifierMiddleware {
    pub const NAME: &'static str = "notifier";

    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    async fn notify(&self, task: &Task, bag: Option<&NotificationTaskBag>) -> SchedulerResult<()> {
        let Some(bag) = bag else {
            return Ok(());
        };
        debug!(task = %task.name, subject = %bag.notification.subject, "发送任务通知");
        self.notifier
            .send(&bag.notification, &bag.recipients)
            .await
            .map_err(|err| SchedulerError::Notification(format!("任务 \"{}\": {err}", task.name)))
    }
}

impl Middleware for NotifierMiddleware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> Option<i32> {
        Some(2)
    }
}

#[async_trait]
impl PreSchedulingMiddleware for NotifierMiddleware {
    async fn pre_scheduling(&self, task: &mut Task) -> SchedulerResult<()> {
        self.notify(task, task.notifications.before_scheduling.as_ref()).await
    }
}

#[async_trait]
impl PostSchedulingMiddleware for NotifierMiddleware {
    async fn post_scheduling(&self, task: &Task) -> SchedulerResult<()> {
        self.notify(task, task.notifications.after_scheduling.as_ref()).await
    }
}

#[async_trait]
impl PreExecutionMiddleware for NotifierMiddleware {
    async fn pre_execute(&self, task: &mut Task) -> SchedulerResult<()> {
        self.notify(task, task.notifications.before_executing.as_ref()).await
    }
}

#[async_trait]
impl PostExecutionMiddleware for NotifierMiddleware {
    async fn post_execute(&self, task: &mut Task, _worker: &WorkerControl) -> SchedulerResult<()> {
        self.notify(task, task.notifications.after_executing.as_ref()).await
    }
}
