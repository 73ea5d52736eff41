#[cfg(test)]
mod strategies_tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::models::{Task, TaskList};
    use crate::policy::*;
    use crate::SchedulerError;

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    fn scheduled(name: &str, offset_secs: i64) -> Task {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut task = Task::null(name);
        task.scheduled_at = Some(base + Duration::seconds(offset_secs));
        task
    }

    #[test]
    fn test_first_in_first_out() {
        let tasks = vec![scheduled("late", 2), scheduled("early", 1)];
        let sorted = FirstInFirstOutPolicy.sort(tasks);
        assert_eq!(names(&sorted), vec!["early", "late"]);
    }

    #[test]
    fn test_first_in_last_out() {
        let tasks = vec![scheduled("early", 1), scheduled("late", 2)];
        let sorted = FirstInLastOutPolicy.sort(tasks);
        assert_eq!(names(&sorted), vec!["late", "early"]);
    }

    #[test]
    fn test_deadline_computes_absolute_deadline() {
        let arrival = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut far = Task::null("far").with_relative_deadline(3600);
        far.arrival_time = Some(arrival);
        let mut near = Task::null("near").with_relative_deadline(60);
        near.arrival_time = Some(arrival);
        let none = Task::null("none");

        let sorted = DeadlinePolicy.sort(vec![none, far, near]);
        assert_eq!(names(&sorted), vec!["near", "far", "none"]);
        assert_eq!(
            sorted[0].execution_absolute_deadline,
            Some(arrival + Duration::seconds(60))
        );
    }

    #[test]
    fn test_execution_duration() {
        let mut slow = Task::null("slow");
        slow.execution_computation_time = Some(500.0);
        let mut fast = Task::null("fast");
        fast.execution_computation_time = Some(10.0);

        let sorted = ExecutionDurationPolicy.sort(vec![slow, fast]);
        assert_eq!(names(&sorted), vec!["fast", "slow"]);
    }

    #[test]
    fn test_idle_orders_by_priority() {
        let tasks = vec![
            Task::null("bar").with_priority(10),
            Task::null("foo").with_priority(-5),
        ];
        let sorted = IdlePolicy.sort(tasks);
        assert_eq!(names(&sorted), vec!["foo", "bar"]);
    }

    #[test]
    fn test_nice_only_reorders_non_positive_priorities() {
        let tasks = vec![
            Task::null("positive").with_priority(2).with_nice(-20),
            Task::null("lazy").with_nice(10),
            Task::null("eager").with_nice(-5),
        ];
        let sorted = NicePolicy.sort(tasks);
        assert_eq!(names(&sorted), vec!["eager", "lazy", "positive"]);
    }

    #[test]
    fn test_memory_usage() {
        let mut heavy = Task::null("heavy");
        heavy.execution_memory_usage = 4096;
        let mut light = Task::null("light");
        light.execution_memory_usage = 128;

        let sorted = MemoryUsagePolicy.sort(vec![heavy, light]);
        assert_eq!(names(&sorted), vec!["light", "heavy"]);
    }

    #[test]
    fn test_batch_decrements_priority() {
        let tasks = vec![
            Task::null("a").with_priority(5),
            Task::null("b").with_priority(2),
            Task::null("floor").with_priority(-1000),
        ];
        let sorted = BatchPolicy.sort(tasks);
        assert_eq!(names(&sorted), vec!["floor", "b", "a"]);
        assert_eq!(sorted[0].priority, -1000);
        assert_eq!(sorted[1].priority, 1);
        assert_eq!(sorted[2].priority, 4);

        let again = BatchPolicy.sort(sorted);
        assert_eq!(again[1].priority, 0);
    }

    #[test]
    fn test_round_robin() {
        let mut overrun = Task::null("overrun").with_max_duration(1.0);
        overrun.execution_computation_time = Some(2000.0);
        let mut quick = Task::null("quick").with_max_duration(1.0);
        quick.execution_computation_time = Some(200.0);
        let fresh = Task::null("fresh");

        let sorted = RoundRobinPolicy.sort(vec![overrun, quick, fresh]);
        assert_eq!(names(&sorted), vec!["fresh", "quick", "overrun"]);
    }

    #[test]
    fn test_orchestrator_errors() {
        let empty = SchedulePolicyOrchestrator::empty();
        let err = empty
            .sort("first_in_first_out", TaskList::from(vec![Task::null("foo")]))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NoPoliciesRegistered));

        let orchestrator = SchedulePolicyOrchestrator::default();
        assert!(orchestrator.sort("unknown", TaskList::new()).unwrap().is_empty());

        let err = orchestrator
            .sort("unknown", TaskList::from(vec![Task::null("foo")]))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownPolicy(name) if name == "unknown"));
    }

    #[test]
    fn test_orchestrator_dispatches_by_name() {
        let orchestrator = SchedulePolicyOrchestrator::default();
        assert_eq!(orchestrator.policy_names().len(), 9);

        let tasks = TaskList::from(vec![scheduled("early", 1), scheduled("late", 2)]);
        let sorted = orchestrator.sort("first_in_last_out", tasks).unwrap();
        assert_eq!(sorted.names(), vec!["late".to_string(), "early".to_string()]);

        assert!(orchestrator.supports("fifo"));
        assert!(orchestrator.supports("filo"));
        assert!(!orchestrator.supports("lifo"));
    }
}
