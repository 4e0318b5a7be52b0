//! Task hierarchy store.
//!
//! Tasks live in an id-keyed arena; the parent link is the `parent_task_id`
//! field and the child lists are derived lazily from it. Every traversal
//! tracks visited ids so malformed data (a parent cycle) terminates.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::model::{Task, TaskId};

/// Read-only traversal view over the task arena.
pub struct Hierarchy<'a> {
    tasks: &'a BTreeMap<TaskId, Task>,
    max_depth: usize,
    children: OnceCell<BTreeMap<TaskId, Vec<TaskId>>>,
}

impl<'a> Hierarchy<'a> {
    pub fn new(tasks: &'a BTreeMap<TaskId, Task>, max_depth: usize) -> Self {
        Self {
            tasks,
            max_depth,
            children: OnceCell::new(),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn get(&self, id: TaskId) -> Option<&'a Task> {
        self.tasks.get(&id)
    }

    fn child_index(&self) -> &BTreeMap<TaskId, Vec<TaskId>> {
        self.children.get_or_init(|| {
            let mut index: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
            for task in self.tasks.values() {
                if let Some(parent) = task.parent_task_id {
                    index.entry(parent).or_default().push(task.id);
                }
            }
            for ids in index.values_mut() {
                ids.sort_by_key(|id| {
                    let task = &self.tasks[id];
                    (task.created_at, task.id)
                });
            }
            index
        })
    }

    /// Direct children, oldest first (ties broken by id).
    pub fn children(&self, id: TaskId) -> Vec<&'a Task> {
        self.child_index()
            .get(&id)
            .map(|ids| ids.iter().filter_map(|child| self.tasks.get(child)).collect())
            .unwrap_or_default()
    }

    pub fn child_count(&self, id: TaskId) -> usize {
        self.child_index().get(&id).map_or(0, Vec::len)
    }

    pub fn is_parent(&self, id: TaskId) -> bool {
        self.child_count(id) > 0
    }

    pub fn is_subtask(&self, id: TaskId) -> bool {
        self.get(id)
            .is_some_and(|task| task.parent_task_id.is_some())
    }

    /// Parent chain from the immediate parent up to the root.
    ///
    /// A parent id that no longer resolves ends the chain. Revisiting a task,
    /// or a chain longer than `max_depth`, is a `DataIntegrity` error.
    pub fn ancestors(&self, id: TaskId) -> Result<Vec<&'a Task>> {
        let task = self.get(id).ok_or(Error::TaskNotFound(id))?;

        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut next = task.parent_task_id;
        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                return Err(Error::DataIntegrity(format!(
                    "parent cycle detected at task {parent_id} while walking up from task {id}"
                )));
            }
            if chain.len() >= self.max_depth {
                return Err(Error::DataIntegrity(format!(
                    "ancestor chain of task {id} exceeds max depth {}",
                    self.max_depth
                )));
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            chain.push(parent);
            next = parent.parent_task_id;
        }
        Ok(chain)
    }

    /// Every task below `id`, depth-first pre-order. Never includes `id` itself.
    pub fn descendants(&self, id: TaskId) -> Vec<&'a Task> {
        let mut out = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut stack: Vec<TaskId> = self.child_ids_rev(id);
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                tracing::warn!(task_id = current, root = id, "cycle in task hierarchy; skipping revisit");
                continue;
            }
            if let Some(task) = self.get(current) {
                out.push(task);
            }
            stack.extend(self.child_ids_rev(current));
        }
        out
    }

    fn child_ids_rev(&self, id: TaskId) -> Vec<TaskId> {
        self.child_index()
            .get(&id)
            .map(|ids| ids.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    /// True when making `new_parent` the parent of `task` would close a loop.
    pub fn would_create_cycle(&self, task: TaskId, new_parent: TaskId) -> bool {
        new_parent == task
            || self
                .descendants(task)
                .iter()
                .any(|descendant| descendant.id == new_parent)
    }
}
