use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scheduler::app::{Application, RunOptions};
use scheduler_core::config::AppConfig;
use scheduler_core::logging::{LogConfig, LogLevel, OutputFormat};
use scheduler_worker::listeners::stop_on_signal;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("scheduler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("基于 cron 表达式的任务调度与执行系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径, 未指定时依次查找默认路径"),
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .value_name("ID")
                .help("Worker ID, 默认为主机名加进程号"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .action(ArgAction::SetTrue)
                .help("只执行一轮到期任务后退出"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别, 覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式, 覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str)).with_context(|| {
        format!(
            "加载配置失败: {}",
            config_path.map_or("默认路径", String::as_str)
        )
    })?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.parse::<LogLevel>()?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = LogConfig::parse_format(format).unwrap_or_default();
    }
    init_logging(&config.logging)?;

    let options = RunOptions {
        worker_id: matches.get_one::<String>("worker-id").cloned(),
        once: matches.get_flag("once"),
    };

    info!(
        transport = %config.transport.dsn,
        policy = %config.worker.policy,
        tasks = config.tasks.len(),
        "启动任务调度系统"
    );

    let app = Application::new(config, options).await?;
    let signal_handle = stop_on_signal(app.worker().control().clone());

    let result = app.run().await;
    signal_handle.abort();

    match &result {
        Ok(()) => info!("任务调度系统已退出"),
        Err(e) => error!("任务调度系统异常退出: {e:#}"),
    }
    result
}

/// 初始化日志系统
fn init_logging(config: &LogConfig) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        OutputFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(config.include_target),
            )
            .try_init()
            .context("初始化JSON日志格式失败")?,
        OutputFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(config.include_target)
                    .with_thread_ids(config.include_thread_ids),
            )
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}
