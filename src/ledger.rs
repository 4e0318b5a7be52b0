//! Time entry ledger.
//!
//! Records work intervals per task and owns timer start/stop semantics.
//! The `running` map is a unique index (task id -> running entry id) stored
//! with the entries, so "at most one running entry per task" is enforced by
//! the persisted data itself and not by a separate check-then-act.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{EntryId, TaskId, TimeEntry, UserId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Last allocated entry id
    #[serde(default)]
    last_id: EntryId,
    #[serde(default)]
    entries: BTreeMap<EntryId, TimeEntry>,
    #[serde(default)]
    running: BTreeMap<TaskId, EntryId>,
}

impl Ledger {
    /// Open a running entry for `task_id`.
    ///
    /// Fails with `AlreadyRunning` when the task already has one, whoever started it.
    pub fn start(
        &mut self,
        task_id: TaskId,
        user_id: UserId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&TimeEntry> {
        if let Some(&entry_id) = self.running.get(&task_id) {
            return Err(Error::AlreadyRunning { task_id, entry_id });
        }

        self.last_id += 1;
        let id = self.last_id;
        let entry = TimeEntry {
            id,
            task_id,
            user_id,
            started_at: now,
            stopped_at: None,
            duration_seconds: None,
            description,
            clock_skew: false,
        };
        self.running.insert(task_id, id);
        tracing::debug!(task_id, entry_id = id, user_id, "timer started");
        Ok(&*self.entries.entry(id).or_insert(entry))
    }

    /// Close the running entry of `task_id`, storing its duration.
    ///
    /// A negative interval (clock skew) is clamped to 0 and flagged on the entry.
    pub fn stop(&mut self, task_id: TaskId, now: DateTime<Utc>) -> Result<&TimeEntry> {
        let entry_id = self
            .running
            .remove(&task_id)
            .ok_or(Error::NoRunningEntry(task_id))?;
        let entry = self.entries.get_mut(&entry_id).ok_or_else(|| {
            Error::DataIntegrity(format!(
                "running index of task {task_id} points at missing entry {entry_id}"
            ))
        })?;
        if !entry.is_running() {
            return Err(Error::DataIntegrity(format!(
                "running index of task {task_id} points at stopped entry {entry_id}"
            )));
        }

        let raw = (now - entry.started_at).num_seconds();
        if raw < 0 {
            tracing::warn!(
                task_id,
                entry_id,
                seconds = raw,
                "stop time precedes start time; clamping duration to 0"
            );
            entry.clock_skew = true;
        }
        entry.stopped_at = Some(now);
        entry.duration_seconds = Some(raw.max(0));
        tracing::debug!(task_id, entry_id, seconds = raw.max(0), "timer stopped");
        Ok(&*entry)
    }

    /// Sum of stored durations over the task's stopped entries.
    pub fn total_direct_seconds(&self, task_id: TaskId) -> i64 {
        self.entries
            .values()
            .filter(|entry| entry.task_id == task_id)
            .filter_map(|entry| entry.duration_seconds)
            .sum()
    }

    pub fn running_entry(&self, task_id: TaskId) -> Option<&TimeEntry> {
        self.running
            .get(&task_id)
            .and_then(|entry_id| self.entries.get(entry_id))
    }

    pub fn get(&self, entry_id: EntryId) -> Option<&TimeEntry> {
        self.entries.get(&entry_id)
    }

    /// Entries of a task, most recently started first.
    pub fn entries_for_task(&self, task_id: TaskId) -> Vec<&TimeEntry> {
        let mut entries: Vec<&TimeEntry> = self
            .entries
            .values()
            .filter(|entry| entry.task_id == task_id)
            .collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        entries
    }

    /// Running entries started by `user_id`.
    pub fn running_for_user(&self, user_id: UserId) -> Vec<&TimeEntry> {
        self.running
            .values()
            .filter_map(|entry_id| self.entries.get(entry_id))
            .filter(|entry| entry.user_id == user_id)
            .collect()
    }

    pub fn set_description(
        &mut self,
        entry_id: EntryId,
        description: Option<String>,
    ) -> Result<&TimeEntry> {
        let entry = self
            .entries
            .get_mut(&entry_id)
            .ok_or(Error::TimeEntryNotFound(entry_id))?;
        entry.description = description;
        Ok(&*entry)
    }

    /// Remove one entry; a running entry also leaves the running index.
    pub fn remove(&mut self, entry_id: EntryId) -> Result<TimeEntry> {
        let entry = self
            .entries
            .remove(&entry_id)
            .ok_or(Error::TimeEntryNotFound(entry_id))?;
        if self.running.get(&entry.task_id) == Some(&entry_id) {
            self.running.remove(&entry.task_id);
        }
        Ok(entry)
    }

    /// Drop every entry recorded against the given tasks. Returns how many were removed.
    pub fn remove_for_tasks(&mut self, task_ids: &BTreeSet<TaskId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !task_ids.contains(&entry.task_id));
        self.running.retain(|task_id, _| !task_ids.contains(task_id));
        before - self.entries.len()
    }
}

/// Task total format: `"{H}h {M}m"` when at least an hour, else `"{M}m"`.
pub fn format_total_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Single entry format: `"HH:MM:SS"` when at least an hour, else `"MM:SS"`.
pub fn format_entry_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
