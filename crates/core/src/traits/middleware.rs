use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Task, WorkerControl};
use crate::{SchedulerError, SchedulerResult};

/// 中间件的公共属性
///
/// 优先级数值越小越先执行, 没有优先级的排在最后并保持注册顺序.
/// `is_required` 为真的中间件即使同一阶段前面的中间件失败也会执行.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> Option<i32> {
        None
    }

    fn is_required(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait PreSchedulingMiddleware: Middleware {
    async fn pre_scheduling(&self, task: &mut Task) -> SchedulerResult<()>;
}

#[async_trait]
pub trait PostSchedulingMiddleware: Middleware {
    async fn post_scheduling(&self, task: &Task) -> SchedulerResult<()>;
}

#[async_trait]
pub trait PreExecutionMiddleware: Middleware {
    async fn pre_execute(&self, task: &mut Task) -> SchedulerResult<()>;
}

#[async_trait]
pub trait PostExecutionMiddleware: Middleware {
    async fn post_execute(&self, task: &mut Task, worker: &WorkerControl) -> SchedulerResult<()>;
}

fn compare_priority(left: Option<i32>, right: Option<i32>) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 按优先级稳定排序
pub fn sort_by_priority<M: Middleware + ?Sized>(middleware: &mut [Arc<M>]) {
    middleware.sort_by(|left, right| compare_priority(left.priority(), right.priority()));
}

/// 统一包装中间件错误, 已经是中间件错误的保持不变
pub fn middleware_error(name: &str, err: SchedulerError) -> SchedulerError {
    match err {
        err @ SchedulerError::MiddlewareFailed { .. } => err,
        other => SchedulerError::middleware(name, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, Option<i32>);

    impl Middleware for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> Option<i32> {
            self.1
        }
    }

    #[test]
    fn unprioritized_middleware_runs_last_in_registration_order() {
        let mut list: Vec<Arc<Named>> = vec![
            Arc::new(Named("a", None)),
            Arc::new(Named("b", Some(10))),
            Arc::new(Named("c", None)),
            Arc::new(Named("d", Some(1))),
        ];
        sort_by_priority(&mut list);
        let names: Vec<&str> = list.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["d", "b", "a", "c"]);
    }
}
