use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use scheduler_core::policy::SchedulePolicyOrchestrator;
use scheduler_core::traits::{Transport, TransportConfiguration, EXECUTION_MODE_KEY};
use scheduler_core::{SchedulerError, SchedulerResult};

use super::filesystem::PATH_KEY;
use super::{
    Dsn, FailoverTransport, FilesystemTransport, InMemoryTransport, LazyTransport,
    LongTailTransport, RoundRobinTransport,
};

/// 根据连接串创建存储
pub struct TransportFactory;

impl TransportFactory {
    pub fn create(dsn: &str) -> SchedulerResult<Arc<dyn Transport>> {
        let dsn = Dsn::parse(dsn)?;
        info!(dsn = %dsn, "创建任务存储");
        Self::from_dsn(&dsn)
    }

    pub fn from_dsn(dsn: &Dsn) -> SchedulerResult<Arc<dyn Transport>> {
        debug!(scheme = dsn.scheme(), "构建存储");
        let configuration = Self::configuration(dsn)?;

        let transport: Arc<dyn Transport> = match dsn.scheme() {
            "memory" | "in-memory" | "in_memory" => Arc::new(InMemoryTransport::new(configuration)),
            "fs" | "file" | "filesystem" => {
                let directory = Self::filesystem_path(dsn)?;
                Arc::new(FilesystemTransport::new(directory, configuration)?)
            }
            "failover" | "fo" => {
                Arc::new(FailoverTransport::new(Self::inner(dsn)?, configuration))
            }
            "roundrobin" | "round_robin" | "rr" => {
                Arc::new(RoundRobinTransport::new(Self::inner(dsn)?, configuration))
            }
            "longtail" | "long_tail" | "lt" => {
                Arc::new(LongTailTransport::new(Self::inner(dsn)?, configuration))
            }
            "lazy" => {
                let [inner] = dsn.transports() else {
                    return Err(SchedulerError::config_error(format!(
                        "lazy 存储只能包装一个内部存储: {dsn}"
                    )));
                };
                let inner = inner.clone();
                Arc::new(LazyTransport::new(
                    move || Self::from_dsn(&inner),
                    configuration,
                ))
            }
            other => {
                return Err(SchedulerError::config_error(format!(
                    "不支持的存储类型: {other}"
                )))
            }
        };
        Ok(transport)
    }

    fn inner(dsn: &Dsn) -> SchedulerResult<Vec<Arc<dyn Transport>>> {
        if !dsn.is_composite() {
            return Err(SchedulerError::config_error(format!(
                "{} 存储需要括号内的存储列表: {dsn}",
                dsn.scheme()
            )));
        }
        dsn.transports().iter().map(Self::from_dsn).collect()
    }

    /// 查询参数作为存储配置, 内存存储的 host 部分是执行模式
    fn configuration(dsn: &Dsn) -> SchedulerResult<TransportConfiguration> {
        let mut options = dsn.options().clone();
        if matches!(dsn.scheme(), "memory" | "in-memory" | "in_memory") {
            if let Some(mode) = dsn.host() {
                options
                    .entry(EXECUTION_MODE_KEY.to_string())
                    .or_insert_with(|| mode.to_string());
            }
        }

        let configuration = TransportConfiguration::from_options(options);
        let mode = configuration.execution_mode();
        if !SchedulePolicyOrchestrator::default().supports(&mode) {
            return Err(SchedulerError::UnknownPolicy(mode));
        }
        Ok(configuration)
    }

    fn filesystem_path(dsn: &Dsn) -> SchedulerResult<PathBuf> {
        let path = match (dsn.host(), dsn.path()) {
            (Some(host), Some(path)) => format!("{host}{path}"),
            (Some(host), None) => host.to_string(),
            (None, Some(path)) => path.to_string(),
            (None, None) => dsn
                .option(PATH_KEY)
                .map(str::to_string)
                .ok_or_else(|| SchedulerError::config_error(format!("文件存储缺少目录: {dsn}")))?,
        };
        Ok(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::models::Task;

    #[tokio::test]
    async fn test_memory_transport_with_execution_mode() {
        let transport = TransportFactory::create("memory://batch").unwrap();
        assert_eq!(transport.name(), "memory");
        assert_eq!(transport.configuration().execution_mode(), "batch");

        let transport = TransportFactory::create("memory://?execution_mode=idle").unwrap();
        assert_eq!(transport.configuration().execution_mode(), "idle");
    }

    #[tokio::test]
    async fn test_filesystem_transport() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = format!("fs://{}", dir.path().display());
        let transport = TransportFactory::create(&dsn).unwrap();
        assert_eq!(transport.name(), "filesystem");

        transport.create(Task::null("foo")).await.unwrap();
        assert!(dir.path().join("foo.json").exists());
    }

    #[tokio::test]
    async fn test_composite_transports() {
        for (dsn, name) in [
            ("failover://(memory://fifo || memory://batch)", "failover"),
            ("fo://(memory://fifo)", "failover"),
            ("roundrobin://(memory://fifo && memory://batch)", "round_robin"),
            ("rr://(memory://fifo)", "round_robin"),
            ("longtail://(memory://fifo <> memory://batch)", "long_tail"),
            ("lt://(memory://fifo)", "long_tail"),
            ("lazy://(memory://fifo)", "lazy"),
        ] {
            assert_eq!(TransportFactory::create(dsn).unwrap().name(), name, "{dsn}");
        }
    }

    #[tokio::test]
    async fn test_lazy_transport_delegates() {
        let transport = TransportFactory::create("lazy://(failover://(memory://fifo))").unwrap();
        transport.create(Task::null("foo")).await.unwrap();
        assert_eq!(transport.count().await.unwrap(), 1);
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(matches!(
            TransportFactory::create("redis://localhost"),
            Err(SchedulerError::Configuration(_))
        ));
        assert!(matches!(
            TransportFactory::create("memory://lottery"),
            Err(SchedulerError::UnknownPolicy(_))
        ));
        assert!(TransportFactory::create("failover://memory").is_err());
        assert!(TransportFactory::create("lazy://(memory://fifo || memory://batch)").is_err());
    }
}
