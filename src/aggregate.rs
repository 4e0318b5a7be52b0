//! Progress roll-up and time aggregation over the task hierarchy.
//!
//! A task with children derives its progress from the share of completed
//! children; a task without children keeps whatever was written to it.
//! Any progress write propagates upward: each ancestor is recomputed from its
//! current child set, never from the value that triggered it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::hierarchy::Hierarchy;
use crate::ledger::Ledger;
use crate::model::{Status, TaskId, MAX_PROGRESS};
use crate::state::State;

/// One progress value written during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressChange {
    pub task_id: TaskId,
    pub progress: u8,
}

/// Outcome of `update_progress`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Propagation {
    /// Writes in order: the task itself, then each ancestor up to the root.
    pub updated: Vec<ProgressChange>,
    /// Set when the ancestor walk hit a data integrity problem and the
    /// upward recompute was skipped. The task's own write still stands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abandoned: Option<String>,
}

/// `round(100 * completed / children)` for a parent, stored progress for a leaf.
pub fn calculate_progress(hierarchy: &Hierarchy<'_>, id: TaskId) -> Result<u8> {
    let task = hierarchy.get(id).ok_or(Error::TaskNotFound(id))?;
    let children = hierarchy.children(id);
    if children.is_empty() {
        return Ok(task.progress);
    }

    let total = children.len() as u64;
    let completed = children
        .iter()
        .filter(|child| child.status == Status::Completed)
        .count() as u64;
    // Half-up rounding in integers.
    let percent = (200 * completed + total) / (2 * total);
    Ok(percent.min(u64::from(MAX_PROGRESS)) as u8)
}

/// Write progress to `id` (explicit value or recomputed), then recompute
/// every ancestor up to the root.
///
/// The ancestor chain is validated before anything is written above the
/// task, so a cycle or an over-deep chain leaves every ancestor untouched.
pub fn update_progress(
    state: &mut State,
    id: TaskId,
    explicit: Option<u8>,
    max_depth: usize,
    now: DateTime<Utc>,
) -> Result<Propagation> {
    if let Some(value) = explicit {
        if value > MAX_PROGRESS {
            return Err(Error::InvalidArgument(format!(
                "progress must be between 0 and {MAX_PROGRESS}, got {value}"
            )));
        }
    }

    let (direct, chain) = {
        let hierarchy = Hierarchy::new(&state.tasks, max_depth);
        let direct = match explicit {
            Some(value) => value,
            None => calculate_progress(&hierarchy, id)?,
        };
        let chain = hierarchy
            .ancestors(id)
            .map(|ancestors| ancestors.iter().map(|task| task.id).collect::<Vec<_>>());
        (direct, chain)
    };

    let mut propagation = Propagation::default();
    write_progress(state, id, direct, now, &mut propagation)?;

    let ancestors = match chain {
        Ok(ancestors) => ancestors,
        Err(Error::DataIntegrity(message)) => {
            tracing::error!(task_id = id, %message, "progress propagation abandoned");
            propagation.abandoned = Some(message);
            return Ok(propagation);
        }
        Err(other) => return Err(other),
    };

    for ancestor in ancestors {
        // Children statuses do not change during the walk, so each level sees
        // the same child set it would see in a fresh read.
        let value = {
            let hierarchy = Hierarchy::new(&state.tasks, max_depth);
            calculate_progress(&hierarchy, ancestor)?
        };
        write_progress(state, ancestor, value, now, &mut propagation)?;
    }

    tracing::debug!(
        task_id = id,
        writes = propagation.updated.len(),
        "progress propagated"
    );
    Ok(propagation)
}

/// Recompute `id` from its children and propagate.
pub fn recompute(
    state: &mut State,
    id: TaskId,
    max_depth: usize,
    now: DateTime<Utc>,
) -> Result<Propagation> {
    update_progress(state, id, None, max_depth, now)
}

fn write_progress(
    state: &mut State,
    id: TaskId,
    value: u8,
    now: DateTime<Utc>,
    propagation: &mut Propagation,
) -> Result<()> {
    let task = state.task_mut(id)?;
    if task.progress != value {
        task.progress = value;
        task.updated_at = now;
    }
    propagation.updated.push(ProgressChange {
        task_id: id,
        progress: value,
    });
    Ok(())
}

/// Direct time of `id` plus the direct time of every task below it.
///
/// Revisited ids and levels beyond the hierarchy's max depth contribute 0.
pub fn total_time_including_descendants(
    hierarchy: &Hierarchy<'_>,
    ledger: &Ledger,
    id: TaskId,
) -> i64 {
    let mut visited = HashSet::new();
    sum_subtree(hierarchy, ledger, id, 0, &mut visited)
}

fn sum_subtree(
    hierarchy: &Hierarchy<'_>,
    ledger: &Ledger,
    id: TaskId,
    depth: usize,
    visited: &mut HashSet<TaskId>,
) -> i64 {
    if !visited.insert(id) {
        tracing::error!(task_id = id, "cycle in task hierarchy while summing time");
        return 0;
    }
    if depth > hierarchy.max_depth() {
        tracing::error!(
            task_id = id,
            max_depth = hierarchy.max_depth(),
            "task hierarchy too deep while summing time"
        );
        return 0;
    }

    ledger.total_direct_seconds(id)
        + hierarchy
            .children(id)
            .iter()
            .map(|child| sum_subtree(hierarchy, ledger, child.id, depth + 1, visited))
            .sum::<i64>()
}

/// Time recorded on descendants only.
pub fn total_subtask_time(hierarchy: &Hierarchy<'_>, ledger: &Ledger, id: TaskId) -> i64 {
    total_time_including_descendants(hierarchy, ledger, id) - ledger.total_direct_seconds(id)
}
