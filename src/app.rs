use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use scheduler_core::config::{AppConfig, WorkerConfig};
use scheduler_core::events::EventDispatcher;
use scheduler_core::models::{TaskList, WorkerControl};
use scheduler_core::traits::{LogNotifier, Notifier, TaskScheduler, EXECUTION_MODE_KEY};
use scheduler_core::TransportError;
use scheduler_dispatcher::expression::is_reboot;
use scheduler_dispatcher::{Scheduler, TaskBuilder};
use scheduler_infrastructure::{create_lock_provider, InMemoryMessageBus, TransportFactory};
use scheduler_worker::{
    RunnerContext, RunnerRegistry, StopWorkerOnFailureLimit, StopWorkerOnTaskLimit,
    StopWorkerOnTimeLimit, TaskLoggerListener, Worker, WorkerConfiguration,
};

/// 命令行上的运行参数
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub worker_id: Option<String>,
    /// 只执行一轮后退出
    pub once: bool,
}

/// 按配置组装好的调度器和 worker
pub struct Application {
    scheduler: Arc<Scheduler>,
    worker: Worker,
    bus: Arc<InMemoryMessageBus>,
}

impl Application {
    pub async fn new(config: AppConfig, options: RunOptions) -> Result<Self> {
        let transport = TransportFactory::create(&config.transport.dsn)
            .with_context(|| format!("创建任务存储失败: {}", config.transport.dsn))?;
        if let Some(mode) = &config.transport.execution_mode {
            transport
                .configuration()
                .update(EXECUTION_MODE_KEY, mode.as_str());
        }

        let events = EventDispatcher::new();
        events.subscribe(Arc::new(TaskLoggerListener));

        let lock = create_lock_provider(&config.lock).context("创建锁失败")?;
        let bus = Arc::new(InMemoryMessageBus::default());
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

        let scheduler = Scheduler::new(&config.scheduler.timezone, transport)
            .context("创建调度器失败")?
            .with_clock_config(&config.scheduler.clock)
            .with_events(events.clone())
            .with_lock_provider(lock.clone())
            .with_message_bus(bus.clone())
            .with_notifier(notifier.clone());
        let scheduler = Arc::new(scheduler);

        register_tasks(&scheduler, &config).await?;

        let mut configuration = WorkerConfiguration::from(&config.worker);
        if options.once {
            configuration.sleep_until_next_minute = false;
        }
        subscribe_limits(&events, &config.worker, configuration.sleep_until_next_minute);

        let context = RunnerContext {
            bus: Some(bus.clone()),
            notifier: Some(notifier.clone()),
            ..RunnerContext::default()
        };
        let mut builder = Worker::builder(
            scheduler.clone(),
            RunnerRegistry::builtin(context),
            lock,
        )
        .events(events)
        .notifier(notifier)
        .configuration(configuration);
        if let Some(id) = options.worker_id {
            builder = builder.control(WorkerControl::with_id(id));
        }
        let worker = builder.build().context("创建 worker 失败")?;

        info!(worker = worker.id(), "应用初始化完成");
        Ok(Self {
            scheduler,
            worker,
            bus,
        })
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// 先执行一次 `@reboot` 任务, 然后进入 worker 循环
    ///
    /// 异步调度的消息由后台消费者写回调度器.
    pub async fn run(&self) -> Result<()> {
        let consumer = self
            .bus
            .spawn_consumer(self.scheduler.clone())
            .await
            .context("启动消息消费者失败")?;

        let result = self.execute().await;
        consumer.abort();
        result
    }

    async fn execute(&self) -> Result<()> {
        let reboot: TaskList = self
            .scheduler
            .get_tasks()
            .await?
            .filter(|task| is_reboot(&task.expression));
        if !reboot.is_empty() {
            info!(tasks = ?reboot.names(), "执行重启任务");
            let fork = self.worker.fork();
            fork.execute(reboot).await.context("执行重启任务失败")?;
        }

        self.worker
            .execute(TaskList::new())
            .await
            .context("worker 运行失败")
    }
}

/// 把配置文件中的任务写入调度器, 已存在的任务保持原样
async fn register_tasks(scheduler: &Scheduler, config: &AppConfig) -> Result<()> {
    let builder = TaskBuilder::default().with_default_timezone(config.scheduler.timezone.as_str());
    let tasks = builder.build_all(&config.tasks).context("解析任务定义失败")?;

    for task in tasks {
        let name = task.name.clone();
        match scheduler.schedule(task).await {
            Ok(()) => {}
            Err(err) if matches!(err.transport_error(), Some(TransportError::AlreadyExists { .. })) => {
                info!(task = %name, "任务已存在, 跳过");
            }
            Err(err) => return Err(err).with_context(|| format!("调度任务失败: {name}")),
        }
    }
    Ok(())
}

fn subscribe_limits(events: &EventDispatcher, worker: &WorkerConfig, looping: bool) {
    if let Some(limit) = worker.task_limit {
        events.subscribe(Arc::new(StopWorkerOnTaskLimit::new(limit)));
    }
    if let Some(limit) = worker.failure_limit {
        events.subscribe(Arc::new(StopWorkerOnFailureLimit::new(limit)));
    }
    if let Some(secs) = worker.time_limit_secs {
        events.subscribe(Arc::new(StopWorkerOnTimeLimit::new(Duration::from_secs(secs))));
    }
    let unlimited =
        worker.task_limit.is_none() && worker.failure_limit.is_none() && worker.time_limit_secs.is_none();
    if looping && unlimited {
        info!("未配置停止条件, worker 将一直运行直到收到停止信号");
    }
}
