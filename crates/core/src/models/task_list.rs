use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::task::Task;

/// 按名称去重的有序任务集合
///
/// 插入同名任务时原位置被新任务替换, 其余任务的相对顺序不变.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Task) {
        match self.position(&task.name) {
            Some(index) => self.tasks[index] = task,
            None => self.tasks.push(task),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Task> {
        self.position(name).map(|index| self.tasks.remove(index))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Task> {
        self.tasks.iter_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.tasks.iter().map(|task| task.name.clone()).collect()
    }

    pub fn last(&self) -> Option<&Task> {
        self.tasks.last()
    }

    /// 保留满足条件的任务
    pub fn filter<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&Task) -> bool,
    {
        Self {
            tasks: self.tasks.into_iter().filter(|task| predicate(task)).collect(),
        }
    }

    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Task) -> T,
    {
        self.tasks.iter().map(f).collect()
    }

    /// 依次修改每个任务
    pub fn walk<F>(&mut self, f: F)
    where
        F: FnMut(&mut Task),
    {
        self.tasks.iter_mut().for_each(f);
    }

    /// 稳定排序
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Task, &Task) -> Ordering,
    {
        self.tasks.sort_by(compare);
    }

    /// 按名称取出子集, 未知名称忽略
    pub fn slice(&self, names: &[String]) -> Self {
        self.tasks
            .iter()
            .filter(|task| names.contains(&task.name))
            .cloned()
            .collect()
    }

    pub fn into_vec(self) -> Vec<Task> {
        self.tasks
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.name == name)
    }
}

impl FromIterator<Task> for TaskList {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut list = TaskList::new();
        for task in iter {
            list.add(task);
        }
        list
    }
}

impl From<Vec<Task>> for TaskList {
    fn from(tasks: Vec<Task>) -> Self {
        tasks.into_iter().collect()
    }
}

impl IntoIterator for TaskList {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}
