use std::collections::BTreeMap;
use std::fmt;

use url::Url;

use scheduler_core::{SchedulerError, SchedulerResult};

/// 组合存储的分隔符, 不同的写法含义相同
const DELIMITERS: [&str; 3] = ["||", "&&", "<>"];

/// 存储连接串
///
/// 基础形式 `scheme://host[/path][?k=v&...]`, 例如 `memory://batch` 或 `fs:///var/lib/scheduler`.
/// 组合形式把内部连接串放在括号里, 例如 `failover://(memory://fifo || fs:///tmp/a)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    scheme: String,
    host: Option<String>,
    path: Option<String>,
    options: BTreeMap<String, String>,
    transports: Vec<Dsn>,
}

impl Dsn {
    pub fn parse(input: &str) -> SchedulerResult<Self> {
        let input = input.trim();
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| invalid(input, "缺少 scheme://"))?;
        if scheme.is_empty() {
            return Err(invalid(input, "scheme 为空"));
        }
        let scheme = scheme.to_ascii_lowercase();

        if rest.starts_with('(') {
            return Self::parse_composite(input, scheme, rest);
        }

        let url = Url::parse(input).map_err(|err| invalid(input, &err.to_string()))?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .map(str::to_string);
        let path = Some(url.path())
            .filter(|path| !path.is_empty() && *path != "/")
            .map(str::to_string);

        Ok(Self {
            scheme,
            host,
            path,
            options: url.query_pairs().into_owned().collect(),
            transports: Vec::new(),
        })
    }

    fn parse_composite(input: &str, scheme: String, rest: &str) -> SchedulerResult<Self> {
        let close = matching_paren(rest).ok_or_else(|| invalid(input, "括号不匹配"))?;
        let (inner, remainder) = (&rest[1..close], &rest[close + 1..]);

        let options = match remainder.strip_prefix('?') {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None if remainder.trim().is_empty() => BTreeMap::new(),
            None => return Err(invalid(input, "括号后存在多余内容")),
        };

        let transports = split_top_level(inner)
            .into_iter()
            .map(Dsn::parse)
            .collect::<SchedulerResult<Vec<_>>>()?;
        if transports.is_empty() {
            return Err(invalid(input, "组合存储至少需要一个内部存储"));
        }

        Ok(Self {
            scheme,
            host: None,
            path: None,
            options,
            transports,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// 组合存储的内部连接串
    pub fn transports(&self) -> &[Dsn] {
        &self.transports
    }

    pub fn is_composite(&self) -> bool {
        !self.transports.is_empty()
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if self.is_composite() {
            let inner: Vec<String> = self.transports.iter().map(ToString::to_string).collect();
            write!(f, "({})", inner.join(" || "))?;
        } else {
            write!(
                f,
                "{}{}",
                self.host.as_deref().unwrap_or_default(),
                self.path.as_deref().unwrap_or_default()
            )?;
        }
        if !self.options.is_empty() {
            let query: Vec<String> = self
                .options
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, "?{}", query.join("&"))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Dsn {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn invalid(input: &str, reason: &str) -> SchedulerError {
    SchedulerError::config_error(format!("无效的存储连接串 \"{input}\": {reason}"))
}

/// `input` 以 '(' 开头, 返回与之匹配的 ')' 的位置
fn matching_paren(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// 按最外层的分隔符切分, 括号内的分隔符属于嵌套的组合存储
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut index = 0;

    while index < input.len() {
        let rest = &input[index..];
        if depth == 0 {
            if let Some(delimiter) = DELIMITERS.iter().find(|d| rest.starts_with(**d)) {
                parts.push(input[start..index].trim());
                index += delimiter.len();
                start = index;
                continue;
            }
        }

        let Some(c) = rest.chars().next() else { break };
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        index += c.len_utf8();
    }
    parts.push(input[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_dsn() {
        let dsn = Dsn::parse("memory://batch").unwrap();
        assert_eq!(dsn.scheme(), "memory");
        assert_eq!(dsn.host(), Some("batch"));
        assert_eq!(dsn.path(), None);
        assert!(!dsn.is_composite());

        let dsn = Dsn::parse("fs:///var/lib/scheduler?execution_mode=idle").unwrap();
        assert_eq!(dsn.scheme(), "fs");
        assert_eq!(dsn.host(), None);
        assert_eq!(dsn.path(), Some("/var/lib/scheduler"));
        assert_eq!(dsn.option("execution_mode"), Some("idle"));
    }

    #[test]
    fn test_composite_dsn() {
        let dsn = Dsn::parse("failover://(memory://fifo || fs:///tmp/a)").unwrap();
        assert_eq!(dsn.scheme(), "failover");
        assert!(dsn.is_composite());
        assert_eq!(dsn.transports().len(), 2);
        assert_eq!(dsn.transports()[0].host(), Some("fifo"));
        assert_eq!(dsn.transports()[1].path(), Some("/tmp/a"));

        let dsn = Dsn::parse("roundrobin://(memory://a && memory://b)?execution_mode=nice").unwrap();
        assert_eq!(dsn.transports().len(), 2);
        assert_eq!(dsn.option("execution_mode"), Some("nice"));

        let dsn = Dsn::parse("longtail://(memory://a <> memory://b <> memory://c)").unwrap();
        assert_eq!(dsn.transports().len(), 3);
    }

    #[test]
    fn test_nested_composite_dsn() {
        let dsn =
            Dsn::parse("lazy://(failover://(memory://batch || memory://idle))").unwrap();
        assert_eq!(dsn.transports().len(), 1);
        let failover = &dsn.transports()[0];
        assert_eq!(failover.scheme(), "failover");
        assert_eq!(failover.transports().len(), 2);
    }

    #[test]
    fn test_invalid_dsn() {
        for input in ["", "memory", "://batch", "failover://(memory://a", "failover://()"] {
            assert!(
                matches!(Dsn::parse(input), Err(SchedulerError::Configuration(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn test_display() {
        let dsn = Dsn::parse("failover://(memory://fifo && fs:///tmp/a)").unwrap();
        assert_eq!(dsn.to_string(), "failover://(memory://fifo || fs:///tmp/a)");
    }
}
