use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Timelike;
use tracing::{debug, error, info, warn};

use scheduler_core::events::{EventDispatcher, SchedulerEvent};
use scheduler_core::middleware::{NotifierMiddleware, TaskCallbackMiddleware};
use scheduler_core::models::{
    AccessLockBag, ExecutionState, FailedTask, Output, Task, TaskList, TaskState, WorkerControl,
    WorkerState,
};
use scheduler_core::traits::{LockProvider, Notifier, TaskScheduler};
use scheduler_core::{SchedulePolicyOrchestrator, SchedulerError, SchedulerResult};

use crate::configuration::WorkerConfiguration;
use crate::middleware::{
    MaxExecutionMiddleware, SingleRunTaskMiddleware, TaskLockBagMiddleware, TaskUpdateMiddleware,
    WorkerMiddlewareStack,
};
use crate::runners::RunnerRegistry;
use crate::tracker::TaskExecutionTracker;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 主机名加进程号
fn default_worker_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{host}-{}", std::process::id())
}

pub struct WorkerBuilder {
    scheduler: Arc<dyn TaskScheduler>,
    runners: RunnerRegistry,
    lock: Arc<dyn LockProvider>,
    events: EventDispatcher,
    notifier: Option<Arc<dyn Notifier>>,
    middleware: WorkerMiddlewareStack,
    orchestrator: Option<SchedulePolicyOrchestrator>,
    configuration: WorkerConfiguration,
    control: Option<WorkerControl>,
}

impl WorkerBuilder {
    pub fn events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 额外的执行中间件, 与内置中间件一起按优先级排序
    pub fn middleware(mut self, middleware: WorkerMiddlewareStack) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn orchestrator(mut self, orchestrator: SchedulePolicyOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn configuration(mut self, configuration: WorkerConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn control(mut self, control: WorkerControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn build(self) -> SchedulerResult<Worker> {
        if self.runners.is_empty() {
            return Err(SchedulerError::config_error("没有注册任何执行器"));
        }

        let orchestrator = self.orchestrator.unwrap_or_default();
        if !orchestrator.supports(&self.configuration.policy) {
            return Err(SchedulerError::UnknownPolicy(self.configuration.policy));
        }

        let mut middleware = WorkerMiddlewareStack::new()
            .with_middleware(Arc::new(TaskCallbackMiddleware))
            .with_middleware(Arc::new(MaxExecutionMiddleware::new()))
            .with_post_execution(Arc::new(TaskUpdateMiddleware::new(Arc::clone(&self.scheduler))))
            .with_post_execution(Arc::new(SingleRunTaskMiddleware::new(Arc::clone(&self.scheduler))))
            .with_post_execution(Arc::new(TaskLockBagMiddleware::new(Arc::clone(&self.lock))));
        if let Some(notifier) = self.notifier {
            middleware = middleware.with_middleware(Arc::new(NotifierMiddleware::new(notifier)));
        }
        let middleware = middleware.merge(self.middleware);

        let control = self
            .control
            .unwrap_or_else(|| WorkerControl::with_id(default_worker_id()));
        control.set_state(WorkerState::Stopped);

        Ok(Worker {
            scheduler: self.scheduler,
            runners: Arc::new(self.runners),
            middleware,
            lock: self.lock,
            events: self.events,
            orchestrator: Arc::new(orchestrator),
            tracker: TaskExecutionTracker,
            control,
            configuration: Mutex::new(self.configuration),
            failed_tasks: Mutex::new(Vec::new()),
            last_executed_task: Mutex::new(None),
            forks: AtomicUsize::new(0),
        })
    }
}

/// 任务执行端
///
/// 每一轮取出到期任务, 按策略排序, 逐个加锁后经过中间件和执行器执行.
/// 执行器的错误只会让单个任务失败; 中间件失败会结束当前这一轮.
/// `stop()` 只在两个任务之间生效, 不会打断正在执行的任务.
pub struct Worker {
    scheduler: Arc<dyn TaskScheduler>,
    runners: Arc<RunnerRegistry>,
    middleware: WorkerMiddlewareStack,
    lock: Arc<dyn LockProvider>,
    events: EventDispatcher,
    orchestrator: Arc<SchedulePolicyOrchestrator>,
    tracker: TaskExecutionTracker,
    control: WorkerControl,
    configuration: Mutex<WorkerConfiguration>,
    failed_tasks: Mutex<Vec<FailedTask>>,
    last_executed_task: Mutex<Option<Task>>,
    forks: AtomicUsize,
}

impl Worker {
    pub fn builder(
        scheduler: Arc<dyn TaskScheduler>,
        runners: RunnerRegistry,
        lock: Arc<dyn LockProvider>,
    ) -> WorkerBuilder {
        WorkerBuilder {
            scheduler,
            runners,
            lock,
            events: EventDispatcher::new(),
            notifier: None,
            middleware: WorkerMiddlewareStack::new(),
            orchestrator: None,
            configuration: WorkerConfiguration::default(),
            control: None,
        }
    }

    pub fn id(&self) -> &str {
        self.control.id()
    }

    /// 共享的控制句柄, 监听器和信号处理通过它请求停止
    pub fn control(&self) -> &WorkerControl {
        &self.control
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn runners(&self) -> &RunnerRegistry {
        &self.runners
    }

    pub fn middleware(&self) -> &WorkerMiddlewareStack {
        &self.middleware
    }

    pub fn configuration(&self) -> WorkerConfiguration {
        locked(&self.configuration).clone()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    pub fn failed_tasks(&self) -> Vec<FailedTask> {
        locked(&self.failed_tasks).clone()
    }

    pub fn last_executed_task(&self) -> Option<Task> {
        locked(&self.last_executed_task).clone()
    }

    pub fn stop(&self) {
        info!(worker = self.id(), "请求停止 worker");
        self.control.stop();
    }

    /// 清除停止请求和失败记录, 配置保持不变
    pub fn restart(&self) {
        self.control.reset();
        self.control.set_state(WorkerState::Idle);
        locked(&self.failed_tasks).clear();
        locked(&self.configuration).executed_tasks_count = 0;

        info!(worker = self.id(), "worker 已重启");
        self.events.dispatch(SchedulerEvent::WorkerRestarted {
            worker: self.control.clone(),
        });
    }

    pub fn pause(&self) {
        if self.control.state() == WorkerState::Running {
            self.control.set_state(WorkerState::Idle);
        }
        self.events.dispatch(SchedulerEvent::WorkerPaused {
            worker: self.control.clone(),
        });
    }

    /// 派生一个共享调度器, 执行器, 中间件, 锁和监听器的 worker, 只执行一轮
    pub fn fork(&self) -> Worker {
        let number = self.forks.fetch_add(1, Ordering::SeqCst) + 1;
        let control = WorkerControl::with_id(format!("{}-fork-{number}", self.id()));
        let configuration = locked(&self.configuration).fork_of(self.id());

        let fork = Worker {
            scheduler: Arc::clone(&self.scheduler),
            runners: Arc::clone(&self.runners),
            middleware: self.middleware.clone(),
            lock: Arc::clone(&self.lock),
            events: self.events.clone(),
            orchestrator: Arc::clone(&self.orchestrator),
            tracker: self.tracker,
            control,
            configuration: Mutex::new(configuration),
            failed_tasks: Mutex::new(Vec::new()),
            last_executed_task: Mutex::new(None),
            forks: AtomicUsize::new(0),
        };

        debug!(worker = self.id(), fork = fork.id(), "派生 worker");
        self.events.dispatch(SchedulerEvent::WorkerForked {
            worker: self.control.clone(),
            fork: fork.control.clone(),
        });
        fork
    }

    /// 释放 `to_preempt` 中属于 `preempting` 的任务的访问锁, 然后在派生 worker 中执行它们
    pub async fn preempt(&self, preempting: &TaskList, to_preempt: &TaskList) -> SchedulerResult<()> {
        let tasks = to_preempt.slice(&preempting.names());
        for task in tasks.iter() {
            let key = task
                .access_lock_bag
                .as_ref()
                .map_or_else(|| AccessLockBag::key_for(&task.name), |bag| bag.key.clone());
            if let Err(err) = self.lock.release(&key).await {
                warn!(task = %task.name, error = %err, "释放被抢占任务的锁失败");
            }
        }

        let fork = self.fork();
        let result = fork.execute(tasks).await;
        fork.stop();
        result
    }

    /// 执行给定任务, 为空时执行到期任务
    ///
    /// 没有设置 `sleep_until_next_minute` 时执行一轮后返回; 否则每轮之后睡到下一分钟,
    /// 之后的每一轮都重新取到期任务, 直到 `stop()`.
    pub async fn execute(&self, tasks: TaskList) -> SchedulerResult<()> {
        locked(&self.configuration).executed_tasks_count = 0;
        self.control.set_state(WorkerState::Idle);
        info!(worker = self.id(), policy = %self.configuration().policy, "worker 已启动");
        self.events.dispatch(SchedulerEvent::WorkerStarted {
            worker: self.control.clone(),
        });

        let result = self.run_loop(tasks).await;

        self.control.set_state(WorkerState::Stopped);
        if let Err(err) = &result {
            error!(worker = self.id(), error = %err, "worker 异常结束");
        }
        info!(
            worker = self.id(),
            executed = self.configuration().executed_tasks_count,
            "worker 已停止"
        );
        self.events.dispatch(SchedulerEvent::WorkerStopped {
            worker: self.control.clone(),
        });
        result
    }

    async fn run_loop(&self, tasks: TaskList) -> SchedulerResult<()> {
        let mut pending = Some(tasks).filter(|tasks| !tasks.is_empty());

        while !self.control.should_stop() {
            let looping = self.configuration().sleep_until_next_minute;
            let batch = match pending.take() {
                Some(tasks) => tasks,
                None => match self.scheduler.get_due_tasks(self.scheduler.now()).await {
                    Ok(tasks) => tasks,
                    Err(err) if looping => {
                        warn!(worker = self.id(), error = %err, "获取到期任务失败, 等待下一轮");
                        TaskList::new()
                    }
                    Err(err) => return Err(err),
                },
            };

            if let Err(err) = self.run_tick(batch).await {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(worker = self.id(), error = %err, "本轮剩余任务未执行");
            }

            if !looping || self.control.should_stop() {
                break;
            }
            self.sleep().await;
        }
        Ok(())
    }

    async fn sleep(&self) {
        let duration = self.sleep_duration();
        debug!(worker = self.id(), seconds = duration.as_secs_f64(), "等待下一分钟");
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.control.stopped() => {}
        }
    }

    /// 距离下一个整分钟的时间加上配置的延迟
    fn sleep_duration(&self) -> Duration {
        let now = self.scheduler.now();
        let elapsed = Duration::from_secs(u64::from(now.second()))
            + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
        let delay = self.configuration().sleep_duration_delay;
        Duration::from_secs(60).saturating_sub(elapsed) + delay
    }

    fn should_execute(&self, task: &Task) -> bool {
        match task.state {
            TaskState::Enabled => true,
            TaskState::Paused => {
                info!(task = %task.name, expression = %task.expression, "任务已暂停, 跳过执行");
                false
            }
            TaskState::Undefined => {
                warn!(task = %task.name, "任务状态未定义, 跳过执行");
                false
            }
        }
    }

    /// 执行一轮. 返回错误表示本轮剩余的任务没有执行
    async fn run_tick(&self, tasks: TaskList) -> SchedulerResult<()> {
        let policy = self.configuration().policy;
        let sorted = self.orchestrator.sort(&policy, tasks)?;

        let mut executed = 0usize;
        for mut task in sorted.into_iter().filter(|task| self.should_execute(task)) {
            if self.control.should_stop() {
                break;
            }

            // 只在轮到该任务时加锁
            let key = AccessLockBag::key_for(&task.name);
            match self.lock.acquire(&key).await {
                Ok(true) => task.access_lock_bag = Some(AccessLockBag::new(key)),
                Ok(false) => {
                    info!(task = %task.name, "任务锁已被占用, 本轮跳过");
                    continue;
                }
                Err(err) => {
                    warn!(task = %task.name, error = %err, "获取任务锁失败, 本轮跳过");
                    continue;
                }
            }

            executed += 1;
            self.handle_task(task).await?;
        }

        if executed == 0 {
            self.events.dispatch(SchedulerEvent::WorkerRunning {
                worker: self.control.clone(),
                idle: true,
            });
        }
        Ok(())
    }

    async fn handle_task(&self, mut task: Task) -> SchedulerResult<()> {
        self.control.set_state(WorkerState::Running);
        let result = self.run_pipeline(&mut task).await;
        if !self.control.should_stop() {
            self.control.set_state(WorkerState::Idle);
        }

        let fatal = match result {
            Ok(output) => {
                self.control.record_executed(&task.name);
                locked(&self.configuration).executed_tasks_count += 1;
                if !output.is_success() {
                    let reason = output.body.clone().unwrap_or_else(|| "执行失败".to_string());
                    self.record_failure(&task, reason);
                }
                None
            }
            Err(err) => {
                self.control.set_last_executed_task(&task.name);
                self.record_failure(&task, err.to_string());
                matches!(err, SchedulerError::MiddlewareFailed { .. }).then_some(err)
            }
        };

        let name = task.name.clone();
        let lock_bag = task.access_lock_bag.clone();
        *locked(&self.last_executed_task) = Some(task);
        if let Some(bag) = lock_bag {
            if let Err(err) = self.lock.release(&bag.key).await {
                warn!(task = %name, lock = %bag.key, error = %err, "释放任务锁失败");
            }
        }

        self.events.dispatch(SchedulerEvent::WorkerRunning {
            worker: self.control.clone(),
            idle: false,
        });
        fatal.map_or(Ok(()), Err)
    }

    async fn run_pipeline(&self, task: &mut Task) -> SchedulerResult<Output> {
        self.middleware.run_pre_execution(task).await?;

        if let Some(delay) = task.execution_delay.filter(|delay| *delay > 0) {
            tokio::time::sleep(Duration::from_micros(delay)).await;
        }

        let runner = self.runners.find(task)?;
        task.execution_state = Some(ExecutionState::Running);
        self.events.dispatch(SchedulerEvent::TaskExecuting {
            task: task.name.clone(),
            worker: self.control.clone(),
        });

        let started_at = self.scheduler.now();
        task.arrival_time = Some(started_at);
        task.execution_start_time = Some(started_at);
        let tracking = self.tracker.start(task);

        debug!(task = %task.name, runner = runner.name(), "执行任务");
        let output = match runner.run(task, self).await {
            Ok(output) => output,
            Err(err) => {
                warn!(task = %task.name, runner = runner.name(), error = %err, "执行器返回错误");
                Output::error(task, Some(err.to_string()))
            }
        };

        self.tracker.end(tracking, task);
        let finished_at = self.scheduler.now();
        task.execution_end_time = Some(finished_at);
        task.last_execution = Some(finished_at);

        if !task.execution_state.is_some_and(|state| state.is_deferred()) {
            task.execution_state = Some(if output.is_success() {
                ExecutionState::Succeed
            } else {
                ExecutionState::Errored
            });
        }
        if task.output_to_store {
            task.stored_output = output.body.clone();
        }

        self.middleware.run_post_execution(task, &self.control).await?;

        info!(task = %task.name, output = ?output.kind, "任务执行完成");
        self.events.dispatch(SchedulerEvent::TaskExecuted {
            task: task.name.clone(),
            output: output.kind,
            worker: self.control.clone(),
        });
        Ok(output)
    }

    fn record_failure(&self, task: &Task, reason: String) {
        warn!(task = %task.name, reason = %reason, "任务执行失败");
        self.control.record_failure();
        locked(&self.failed_tasks).push(FailedTask::new(task.clone(), reason.clone()));
        self.events.dispatch(SchedulerEvent::TaskFailed {
            task: task.name.clone(),
            reason,
            worker: self.control.clone(),
        });
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id())
            .field("state", &self.control.state())
            .field("runners", &self.runners)
            .finish()
    }
}
