use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use scheduler_core::models::{ExecutionState, Output, ShellPayload, Task, TaskKind};
use scheduler_core::{SchedulerError, SchedulerResult};

use super::Runner;
use crate::worker::Worker;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shell 任务执行器
///
/// 超时后子进程会被杀掉. 后台任务启动后立即返回, 执行状态为 `INCOMPLETE`.
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

impl ShellRunner {
    fn build_command(task: &Task, shell: &ShellPayload) -> SchedulerResult<Command> {
        let (program, arguments) = shell.command.split_first().ok_or_else(|| {
            SchedulerError::RunnerFailed {
                task: task.name.clone(),
                message: "命令为空".to_string(),
            }
        })?;

        let mut command = Command::new(program);
        command.args(arguments).envs(&shell.environment_variables);
        if let Some(cwd) = &shell.cwd {
            command.current_dir(cwd);
        }
        Ok(command)
    }

    fn timeout(shell: &ShellPayload) -> Duration {
        Duration::try_from_secs_f64(shell.timeout_secs)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    fn spawn_failed(task: &Task, err: std::io::Error) -> SchedulerError {
        SchedulerError::RunnerFailed {
            task: task.name.clone(),
            message: format!("启动命令失败: {err}"),
        }
    }

    fn run_in_background(
        task: &mut Task,
        mut command: Command,
        timeout: Duration,
    ) -> SchedulerResult<Output> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| Self::spawn_failed(task, err))?;

        let name = task.name.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(Ok(status)) => debug!(task = %name, ?status, "后台命令已结束"),
                Ok(Err(err)) => warn!(task = %name, error = %err, "等待后台命令失败"),
                Err(_) => {
                    warn!(task = %name, "后台命令超时, 终止进程");
                    if let Err(err) = child.kill().await {
                        warn!(task = %name, error = %err, "终止后台命令失败");
                    }
                }
            }
        });

        task.execution_state = Some(ExecutionState::Incomplete);
        Ok(Output::success(task, Some("任务在后台运行")))
    }
}

#[async_trait]
impl Runner for ShellRunner {
    fn name(&self) -> &str {
        "shell"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Shell(_))
    }

    async fn run(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Shell(shell) = &task.kind else {
            return Ok(Output::error(task, Some("不是 shell 任务")));
        };
        let mut command = Self::build_command(task, shell)?;
        let timeout = Self::timeout(shell);

        if task.background {
            return Self::run_in_background(task, command, timeout);
        }

        info!(task = %task.name, command = ?shell.command, "执行 shell 任务");
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| Self::spawn_failed(task, err))?;

        // 超时时 future 被丢弃, kill_on_drop 负责结束子进程
        let result = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(task = %task.name, timeout_secs = timeout.as_secs_f64(), "shell 任务超时, 进程已终止");
                return Ok(Output::error(
                    task,
                    Some(format!("执行超时 ({}s)", timeout.as_secs_f64())),
                ));
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim_end().to_string();
            let body = if stderr.is_empty() {
                format!("命令执行失败, 退出状态: {}", result.status)
            } else {
                stderr
            };
            return Ok(Output::error(task, Some(body)));
        }

        let stdout = String::from_utf8_lossy(&result.stdout).trim_end().to_string();
        let body = task.output.then_some(stdout);
        Ok(Output::success(task, body))
    }
}
