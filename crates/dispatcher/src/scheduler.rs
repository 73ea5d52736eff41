use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::{debug, info, warn};

use scheduler_core::config::ClockConfig;
use scheduler_core::events::{EventDispatcher, SchedulerEvent};
use scheduler_core::middleware::{NotifierMiddleware, TaskCallbackMiddleware};
use scheduler_core::models::{Task, TaskList};
use scheduler_core::time::{parse_timezone, Clock, SystemClock};
use scheduler_core::traits::{
    BusMessage, BusMessageHandler, LockProvider, MessageBus, Notifier, TaskScheduler, Transport,
};
use scheduler_core::{SchedulerError, SchedulerResult};

use crate::expression::{is_reboot, CronExpression};
use crate::middleware::SchedulerMiddlewareStack;

/// 调度期间持有的锁的前缀
pub const SCHEDULE_LOCK_PREFIX: &str = "_scheduler_schedule_";

/// 任务调度器
///
/// 负责任务的调度生命周期: 写入存储, 计算到期任务, 重启恢复.
/// 时钟在初始化时记录一次, 之后每次取时间都会检查偏移是否在允许范围内.
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    middleware: SchedulerMiddlewareStack,
    events: EventDispatcher,
    bus: Option<Arc<dyn MessageBus>>,
    lock: Option<Arc<dyn LockProvider>>,
    clock: Arc<dyn Clock>,
    timezone_name: String,
    timezone: FixedOffset,
    initialized_at: DateTime<Utc>,
    max_backward_skew: Duration,
    max_drift: Option<Duration>,
}

impl Scheduler {
    pub fn new(timezone: &str, transport: Arc<dyn Transport>) -> SchedulerResult<Self> {
        let offset = parse_timezone(timezone)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let defaults = ClockConfig::default();

        Ok(Self {
            transport,
            middleware: SchedulerMiddlewareStack::new()
                .with_middleware(Arc::new(TaskCallbackMiddleware)),
            events: EventDispatcher::new(),
            bus: None,
            lock: None,
            initialized_at: clock.now(),
            clock,
            timezone_name: timezone.to_string(),
            timezone: offset,
            max_backward_skew: Duration::milliseconds(defaults.max_backward_skew_ms as i64),
            max_drift: None,
        })
    }

    /// 替换时钟, 同时重新记录初始化时间
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.initialized_at = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_clock_config(mut self, config: &ClockConfig) -> Self {
        self.max_backward_skew = Duration::milliseconds(config.max_backward_skew_ms as i64);
        self.max_drift = config
            .max_drift_secs
            .map(|secs| Duration::seconds(secs as i64));
        self
    }

    pub fn with_middleware(mut self, middleware: SchedulerMiddlewareStack) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.middleware = self
            .middleware
            .with_middleware(Arc::new(NotifierMiddleware::new(notifier)));
        self
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn with_message_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_lock_provider(mut self, lock: Arc<dyn LockProvider>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn timezone_name(&self) -> &str {
        &self.timezone_name
    }

    /// 检查给定时间相对初始化时刻的偏移
    fn ensure_synchronized(&self, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
        let drift = now - self.initialized_at;
        let too_early = drift < -self.max_backward_skew;
        let too_late = self.max_drift.is_some_and(|max| drift > max);

        if too_early || too_late {
            let micros = |d: Duration| d.num_microseconds().unwrap_or(i64::MAX);
            return Err(SchedulerError::ClockDriftExceeded {
                drift_micros: micros(drift),
                min_micros: -micros(self.max_backward_skew),
                max_micros: self.max_drift.map_or(i64::MAX, micros),
            });
        }
        Ok(now)
    }

    fn task_timezone(&self, task: &Task) -> FixedOffset {
        parse_timezone(&task.timezone).unwrap_or_else(|err| {
            warn!(task = %task.name, error = %err, "任务时区无效, 使用调度器时区");
            self.timezone
        })
    }

    async fn schedule_unlocked(&self, mut task: Task) -> SchedulerResult<()> {
        let now = self.ensure_synchronized(self.clock.now())?;
        task.scheduled_at = Some(now);
        task.arrival_time = Some(now);
        if task.timezone.trim().is_empty() {
            task.timezone = self.timezone_name.clone();
        }

        self.middleware.run_pre_scheduling(&mut task).await?;

        match &self.bus {
            Some(bus) if task.queued => {
                debug!(task = %task.name, "任务通过消息总线异步调度");
                task.ensure_serializable()?;
                bus.dispatch(BusMessage::Schedule {
                    task: Box::new(task.clone()),
                })
                .await?;
            }
            _ => self.transport.create(task.clone()).await?,
        }

        self.events.dispatch(SchedulerEvent::TaskScheduled {
            task: task.name.clone(),
        });
        info!(task = %task.name, expression = %task.expression, "任务已调度");

        if let Err(err) = self.middleware.run_post_scheduling(&task).await {
            warn!(task = %task.name, error = %err, "调度后中间件失败, 撤销调度");
            if let Err(undo) = self.unschedule(&task.name).await {
                warn!(task = %task.name, error = %undo, "撤销调度失败");
            }
            return Err(err);
        }

        Ok(())
    }
}

#[async_trait]
impl TaskScheduler for Scheduler {
    async fn schedule(&self, task: Task) -> SchedulerResult<()> {
        task.validate()?;

        let Some(lock) = &self.lock else {
            return self.schedule_unlocked(task).await;
        };

        let key = format!("{SCHEDULE_LOCK_PREFIX}{}", task.name);
        if !lock.acquire(&key).await? {
            return Err(SchedulerError::LockUnavailable(key));
        }

        let result = self.schedule_unlocked(task).await;
        if let Err(err) = lock.release(&key).await {
            warn!(lock = %key, error = %err, "释放调度锁失败");
        }
        result
    }

    async fn unschedule(&self, name: &str) -> SchedulerResult<()> {
        self.transport.delete(name).await?;
        self.events.dispatch(SchedulerEvent::TaskUnscheduled {
            task: name.to_string(),
        });
        info!(task = name, "任务已取消调度");
        Ok(())
    }

    async fn yield_task(&self, name: &str, asynchronous: bool) -> SchedulerResult<()> {
        if let (true, Some(bus)) = (asynchronous, &self.bus) {
            return bus
                .dispatch(BusMessage::Yield {
                    name: name.to_string(),
                })
                .await;
        }

        let task = self.transport.get(name).await?;
        self.unschedule(name).await?;
        self.schedule(task).await
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.transport.update(name, task).await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.transport.pause(name).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.transport.resume(name).await
    }

    async fn get_tasks(&self) -> SchedulerResult<TaskList> {
        self.transport.list().await
    }

    async fn get_task(&self, name: &str) -> SchedulerResult<Task> {
        self.transport.get(name).await
    }

    async fn get_due_tasks(&self, now: DateTime<Utc>) -> SchedulerResult<TaskList> {
        let now = self.ensure_synchronized(now)?;
        let tasks = self.transport.list().await?;

        let due = tasks.filter(|task| {
            if is_reboot(&task.expression) {
                return false;
            }
            let matched = match CronExpression::parse(&task.expression) {
                Ok(cron) => cron.matches(now, self.task_timezone(task)),
                Err(err) => {
                    warn!(task = %task.name, error = %err, "任务表达式无效, 跳过");
                    false
                }
            };
            matched && task.is_within_execution_window(now)
        });

        debug!(due = due.len(), "计算到期任务");
        Ok(due)
    }

    async fn next_due_date(
        &self,
        name: &str,
        after: DateTime<Utc>,
    ) -> SchedulerResult<Option<DateTime<Utc>>> {
        let task = self.transport.get(name).await?;
        if is_reboot(&task.expression) {
            return Ok(None);
        }

        let cron = CronExpression::parse(&task.expression)?;
        let from = match task.execution_start_date {
            Some(start) if start > after => start - Duration::seconds(1),
            _ => after,
        };
        let next = cron.next_execution_time(from, self.task_timezone(&task));
        Ok(next.filter(|next| task.execution_end_date.map_or(true, |end| *next < end)))
    }

    async fn reboot(&self) -> SchedulerResult<()> {
        let reboot_tasks = self
            .transport
            .list()
            .await?
            .filter(|task| is_reboot(&task.expression));

        self.transport.clear().await?;
        for task in reboot_tasks.iter() {
            self.transport.create(task.clone()).await?;
        }

        let names = reboot_tasks.names();
        info!(tasks = ?names, "调度器已重启");
        self.events
            .dispatch(SchedulerEvent::SchedulerRebooted { tasks: names });
        Ok(())
    }

    fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
impl BusMessageHandler for Scheduler {
    /// 处理异步调度消息. 调度前的处理已经在投递前完成, 这里只负责写入存储.
    async fn handle(&self, message: BusMessage) -> SchedulerResult<()> {
        match message {
            BusMessage::Schedule { task } => {
                debug!(task = %task.name, "消费异步调度消息");
                self.transport.create(*task).await
            }
            BusMessage::Yield { name } => self.yield_task(&name, false).await,
            BusMessage::Payload { task, .. } => {
                debug!(task = %task, "调度器忽略业务消息");
                Ok(())
            }
        }
    }
}
