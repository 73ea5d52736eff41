use serde::{Deserialize, Serialize};

/// 任务访问锁, 由 worker 在取到任务时附加, 执行结束后释放
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessLockBag {
    pub key: String,
}

impl AccessLockBag {
    pub const KEY_PREFIX: &'static str = "_scheduler_task_";

    pub fn new<S: Into<String>>(key: S) -> Self {
        Self { key: key.into() }
    }

    /// 按任务名称生成锁键
    pub fn for_task(name: &str) -> Self {
        Self::new(Self::key_for(name))
    }

    pub fn key_for(name: &str) -> String {
        format!("{}{name}", Self::KEY_PREFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    #[serde(default)]
    pub content: String,
}

impl Notification {
    pub fn new<S: Into<String>, C: Into<String>>(subject: S, content: C) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Recipient {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    pub fn email<S: Into<String>>(email: S) -> Self {
        Self {
            email: Some(email.into()),
            phone: None,
        }
    }
}

/// 附加在任务上的通知
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationTaskBag {
    pub notification: Notification,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

impl NotificationTaskBag {
    pub fn new(notification: Notification, recipients: Vec<Recipient>) -> Self {
        Self {
            notification,
            recipients,
        }
    }
}
