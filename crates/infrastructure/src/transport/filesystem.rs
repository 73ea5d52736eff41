use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use scheduler_core::models::{Task, TaskList};
use scheduler_core::policy::SchedulePolicyOrchestrator;
use scheduler_core::traits::{Transport, TransportConfiguration};
use scheduler_core::{SchedulerResult, TransportError};

use super::{ensure_same_name, pause_task, resume_task, sort_by_execution_mode};

pub const PATH_KEY: &str = "path";
const EXTENSION: &str = "json";

/// 文件系统存储
///
/// 每个任务一个 `<目录>/<任务名>.json` 文件. 写入都先落到临时文件:
/// 创建时用硬链接发布 (目标已存在则失败, 保证唯一), 覆盖写用重命名.
/// 读改写操作在进程内串行执行.
pub struct FilesystemTransport {
    directory: PathBuf,
    configuration: TransportConfiguration,
    orchestrator: Arc<SchedulePolicyOrchestrator>,
    write_lock: Mutex<()>,
    staged: AtomicU64,
}

impl FilesystemTransport {
    pub fn new<P: Into<PathBuf>>(
        directory: P,
        configuration: TransportConfiguration,
    ) -> SchedulerResult<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|err| {
            TransportError::backend_with_source(
                format!("无法创建存储目录 {}", directory.display()),
                err,
            )
        })?;
        configuration.update(PATH_KEY, directory.to_string_lossy());

        Ok(Self {
            directory,
            configuration,
            orchestrator: Arc::new(SchedulePolicyOrchestrator::default()),
            write_lock: Mutex::new(()),
            staged: AtomicU64::new(0),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.{EXTENSION}"))
    }

    /// 创建用的临时文件, 进程号和序号保证并发创建互不覆盖
    fn staging_file(&self, name: &str, sequence: u64) -> PathBuf {
        self.directory.join(format!(
            ".{name}.{EXTENSION}.{}.{sequence}.new",
            std::process::id()
        ))
    }

    async fn read_task(&self, name: &str) -> SchedulerResult<Task> {
        let path = self.file_for(name);
        match fs::read_to_string(&path).await {
            Ok(content) => Task::from_json(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(TransportError::not_found(name).into())
            }
            Err(err) => Err(io_error("读取任务文件失败", &path, err)),
        }
    }

    /// 先写临时文件再重命名, 读者不会看到写了一半的文件
    async fn write_task(&self, task: &Task) -> SchedulerResult<()> {
        task.ensure_serializable()?;
        let content = task.to_json()?;
        let path = self.file_for(&task.name);
        let temporary = self.directory.join(format!(".{}.{EXTENSION}.tmp", task.name));

        fs::write(&temporary, content)
            .await
            .map_err(|err| io_error("写入临时文件失败", &temporary, err))?;
        fs::rename(&temporary, &path)
            .await
            .map_err(|err| io_error("替换任务文件失败", &path, err))
    }

    async fn task_files(&self) -> SchedulerResult<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.directory)
            .await
            .map_err(|err| io_error("读取存储目录失败", &self.directory, err))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| io_error("读取存储目录失败", &self.directory, err))?
        {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if !hidden && path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn io_error(message: &str, path: &Path, err: std::io::Error) -> scheduler_core::SchedulerError {
    TransportError::backend_with_source(format!("{message}: {}", path.display()), err).into()
}

#[async_trait]
impl Transport for FilesystemTransport {
    async fn list(&self) -> SchedulerResult<TaskList> {
        let mut tasks = TaskList::new();
        for path in self.task_files().await? {
            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                // 列目录和读取之间被删除
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(io_error("读取任务文件失败", &path, err)),
            };
            match Task::from_json(&content) {
                Ok(task) => tasks.add(task),
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "任务文件无法解析, 跳过");
                }
            }
        }
        sort_by_execution_mode(&self.orchestrator, &self.configuration, tasks)
    }

    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.read_task(name).await
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        task.ensure_serializable()?;
        let content = task.to_json()?;
        let path = self.file_for(&task.name);
        let staging = self.staging_file(&task.name, self.staged.fetch_add(1, Ordering::SeqCst));

        if let Err(err) = fs::write(&staging, content).await {
            let _ = fs::remove_file(&staging).await;
            return Err(io_error("写入临时文件失败", &staging, err));
        }

        // 硬链接不会覆盖已有文件, 读者只会看到完整的内容
        let published = fs::hard_link(&staging, &path).await;
        if let Err(err) = fs::remove_file(&staging).await {
            warn!(file = %staging.display(), error = %err, "删除临时文件失败");
        }
        match published {
            Ok(()) => {
                debug!(task = %task.name, file = %path.display(), "写入任务");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(TransportError::already_exists(&task.name).into())
            }
            Err(err) => Err(io_error("创建任务文件失败", &path, err)),
        }
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        ensure_same_name(name, &task)?;
        let _guard = self.write_lock.lock().await;
        if !fs::try_exists(self.file_for(name)).await.unwrap_or(false) {
            return Err(TransportError::not_found(name).into());
        }
        self.write_task(&task).await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut task = self.read_task(name).await?;
        pause_task(&mut task)?;
        self.write_task(&task).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut task = self.read_task(name).await?;
        resume_task(&mut task)?;
        self.write_task(&task).await
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        let path = self.file_for(name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(TransportError::not_found(name).into())
            }
            Err(err) => Err(io_error("删除任务文件失败", &path, err)),
        }
    }

    async fn clear(&self) -> SchedulerResult<()> {
        let _guard = self.write_lock.lock().await;
        for path in self.task_files().await? {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_error("删除任务文件失败", &path, err)),
            }
        }
        Ok(())
    }

    async fn count(&self) -> SchedulerResult<usize> {
        Ok(self.task_files().await?.len())
    }

    fn configuration(&self) -> &TransportConfiguration {
        &self.configuration
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::models::{Callback, CallbackPayload, TaskKind, TaskState};
    use scheduler_core::SchedulerError;

    fn transport(dir: &tempfile::TempDir) -> FilesystemTransport {
        FilesystemTransport::new(dir.path(), TransportConfiguration::new()).unwrap()
    }

    #[tokio::test]
    async fn test_tasks_survive_new_instances() {
        let dir = tempfile::tempdir().unwrap();
        transport(&dir)
            .create(Task::null("foo").with_expression("*/5 * * * *"))
            .await
            .unwrap();

        let reopened = transport(&dir);
        let task = reopened.get("foo").await.unwrap();
        assert_eq!(task.expression, "*/5 * * * *");
        assert!(dir.path().join("foo.json").exists());
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        transport.create(Task::null("foo")).await.unwrap();

        let err = transport.create(Task::null("foo")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Transport(TransportError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_task_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        // 占住第一次创建要用的临时文件, 写入失败
        std::fs::create_dir(transport.staging_file("foo", 0)).unwrap();

        let err = transport.create(Task::null("foo")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Transport(TransportError::Backend { .. })));
        assert!(!dir.path().join("foo.json").exists());
        assert!(transport.get("foo").await.unwrap_err().is_not_found());

        transport.create(Task::null("foo")).await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().name, "foo");
    }

    #[tokio::test]
    async fn test_duplicate_create_keeps_original_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        transport
            .create(Task::null("foo").with_description("first"))
            .await
            .unwrap();
        assert!(transport
            .create(Task::null("foo").with_description("second"))
            .await
            .is_err());

        assert_eq!(
            transport.get("foo").await.unwrap().description.as_deref(),
            Some("first")
        );
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_local_callbacks_are_not_serializable() {
        let dir = tempfile::tempdir().unwrap();
        let task = Task::new(
            "foo",
            TaskKind::Callback(CallbackPayload {
                callback: Callback::local(|_| Ok(None)),
                arguments: vec![],
            }),
        );

        let err = transport(&dir).create(task).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NotSerializable { .. }));
        assert!(!dir.path().join("foo.json").exists());
    }

    #[tokio::test]
    async fn test_update_pause_resume_delete() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        assert!(transport.update("foo", Task::null("foo")).await.unwrap_err().is_not_found());

        transport.create(Task::null("foo")).await.unwrap();
        transport
            .update("foo", Task::null("foo").with_description("nightly"))
            .await
            .unwrap();
        assert_eq!(
            transport.get("foo").await.unwrap().description.as_deref(),
            Some("nightly")
        );

        transport.pause("foo").await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().state, TaskState::Paused);
        assert!(transport.pause("foo").await.is_err());
        transport.resume("foo").await.unwrap();

        transport.delete("foo").await.unwrap();
        assert!(transport.delete("foo").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport(&dir);
        transport.create(Task::null("foo")).await.unwrap();
        transport.create(Task::null("bar")).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut names = transport.list().await.unwrap().names();
        names.sort();
        assert_eq!(names, vec!["bar", "foo"]);

        transport.clear().await.unwrap();
        assert!(transport.list().await.unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }
}
