//! Read models returned by tracker operations.
//!
//! Every derived field is computed from the ledger and hierarchy on each read.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate;
use crate::hierarchy::Hierarchy;
use crate::ledger::{format_entry_duration, format_total_duration, Ledger};
use crate::model::{Project, Status, Task, TaskId, TimeEntry};

/// A task plus its derived time and hierarchy fields.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub total_time_spent: i64,
    pub formatted_total_time: String,
    pub total_subtask_time: i64,
    pub formatted_total_subtask_time: String,
    pub total_time_with_subtasks: i64,
    pub is_parent: bool,
    pub is_subtask: bool,
    pub is_timer_running: bool,
    pub subtasks_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_entry: Option<EntryView>,
}

impl TaskView {
    pub fn build(
        hierarchy: &Hierarchy<'_>,
        ledger: &Ledger,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Self {
        let direct = ledger.total_direct_seconds(task.id);
        let with_subtasks = aggregate::total_time_including_descendants(hierarchy, ledger, task.id);
        let subtask_time = with_subtasks - direct;
        let running_entry = ledger
            .running_entry(task.id)
            .map(|entry| EntryView::build(entry, now));

        Self {
            task: task.clone(),
            total_time_spent: direct,
            formatted_total_time: format_total_duration(direct),
            total_subtask_time: subtask_time,
            formatted_total_subtask_time: format_total_duration(subtask_time),
            total_time_with_subtasks: with_subtasks,
            is_parent: hierarchy.is_parent(task.id),
            is_subtask: task.parent_task_id.is_some(),
            is_timer_running: running_entry.is_some(),
            subtasks_count: hierarchy.child_count(task.id),
            running_entry,
        }
    }
}

/// A time entry with its display duration. Running entries report live elapsed time.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub is_running: bool,
    pub elapsed_seconds: i64,
    pub formatted_duration: String,
}

impl EntryView {
    pub fn build(entry: &TimeEntry, now: DateTime<Utc>) -> Self {
        let elapsed = entry.elapsed_seconds(now);
        Self {
            entry: entry.clone(),
            is_running: entry.is_running(),
            elapsed_seconds: elapsed,
            formatted_duration: format_entry_duration(elapsed),
        }
    }
}

/// Entries of one task with its totals.
#[derive(Debug, Clone, Serialize)]
pub struct EntryListView {
    pub task_id: TaskId,
    pub entries: Vec<EntryView>,
    pub total_time_spent: i64,
    pub formatted_total_time: String,
    pub is_timer_running: bool,
}

/// Result of stopping a timer.
#[derive(Debug, Clone, Serialize)]
pub struct StoppedTimer {
    pub entry: EntryView,
    pub total_time_spent: i64,
    pub formatted_total_time: String,
}

/// A running timer together with the task it runs on.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentTimer {
    pub entry: EntryView,
    pub task_id: TaskId,
    pub task_name: String,
}

/// A project with the tasks the actor may see.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn tally(statuses: impl IntoIterator<Item = Status>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.total += 1;
            match status {
                Status::Pending => counts.pending += 1,
                Status::InProgress => counts.in_progress += 1,
                Status::Completed => counts.completed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub tasks: StatusCounts,
    pub projects: StatusCounts,
    pub active_tasks: Vec<TaskView>,
    pub running_timers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::{arena, task};
    use chrono::{Duration, TimeZone};

    #[test]
    fn task_view_reports_live_timer_and_totals() {
        let t0 = Utc.with_ymd_and_hms(2024, 12, 19, 9, 0, 0).unwrap();
        let tasks = arena(vec![task(1, None), task(2, Some(1))]);
        let mut ledger = Ledger::default();
        ledger.start(1, 1, None, t0).unwrap();
        ledger.stop(1, t0 + Duration::seconds(3665)).unwrap();
        ledger.start(2, 1, None, t0).unwrap();
        ledger.stop(2, t0 + Duration::seconds(120)).unwrap();
        ledger.start(1, 1, None, t0 + Duration::hours(2)).unwrap();

        let hierarchy = Hierarchy::new(&tasks, 16);
        let now = t0 + Duration::hours(2) + Duration::seconds(125);
        let view = TaskView::build(&hierarchy, &ledger, &tasks[&1], now);

        assert_eq!(view.total_time_spent, 3665);
        assert_eq!(view.formatted_total_time, "1h 1m");
        assert_eq!(view.total_subtask_time, 120);
        assert_eq!(view.formatted_total_subtask_time, "2m");
        assert!(view.is_parent);
        assert!(!view.is_subtask);
        assert!(view.is_timer_running);
        assert_eq!(view.subtasks_count, 1);
        let running = view.running_entry.unwrap();
        assert_eq!(running.elapsed_seconds, 125);
        assert_eq!(running.formatted_duration, "02:05");
    }

    #[test]
    fn status_counts_tally() {
        let counts = StatusCounts::tally([Status::Pending, Status::Completed, Status::Pending]);
        assert_eq!(
            counts,
            StatusCounts {
                total: 3,
                pending: 2,
                in_progress: 0,
                completed: 1
            }
        );
    }
}
