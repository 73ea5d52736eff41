use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{info, warn};

use scheduler_core::models::{Output, Task, TaskKind};
use scheduler_core::SchedulerResult;

use super::Runner;
use crate::worker::Worker;

/// HTTP 任务执行器
///
/// 非 2xx 响应和请求错误都返回失败的输出, 响应体作为输出内容.
#[derive(Debug, Clone)]
pub struct HttpRunner {
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for HttpRunner {
    fn name(&self) -> &str {
        "http"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Http(_))
    }

    async fn run(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Http(http) = &task.kind else {
            return Ok(Output::error(task, Some("不是 http 任务")));
        };

        let method = match Method::from_bytes(http.method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return Ok(Output::error(
                    task,
                    Some(format!("不支持的HTTP方法: {}", http.method)),
                ))
            }
        };

        info!(task = %task.name, %method, url = %http.url, "执行HTTP任务");
        let mut request = self.client.request(method, &http.url);
        if let Some(timeout) = http
            .timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        {
            request = request.timeout(timeout);
        }
        for (key, value) in &http.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &http.body {
            request = request.body(body.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(task = %task.name, error = %err, "HTTP请求失败");
                return Ok(Output::error(task, Some(format!("HTTP请求失败: {err}"))));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|err| format!("读取响应体失败: {err}"));

        if status.is_success() {
            Ok(Output::success(task, Some(body)))
        } else {
            Ok(Output::error(
                task,
                Some(format!("HTTP请求失败, 状态码: {}\n{body}", status.as_u16())),
            ))
        }
    }
}
