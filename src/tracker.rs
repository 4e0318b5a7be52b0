//! Tracker operations.
//!
//! Each public method is one external operation: it authenticates the actor
//! against the stored users, consults the access policy, and runs inside a
//! single storage transaction so checks and writes see the same state.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::actor::ActorRef;
use crate::aggregate::{self, ProgressChange, Propagation};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hierarchy::Hierarchy;
use crate::ledger::format_total_duration;
use crate::model::{
    EntryId, Priority, Project, ProjectId, Role, Status, Task, TaskId, TimeEntry, User, UserId,
    MAX_PROGRESS,
};
use crate::policy;
use crate::state::State;
use crate::storage::Storage;
use crate::view::{
    CurrentTimer, Dashboard, EntryListView, EntryView, ProjectView, StatusCounts, StoppedTimer,
    TaskView,
};
/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub parent_task_id: Option<TaskId>,
    pub assigned_user_id: Option<UserId>,
    pub project_id: Option<ProjectId>,
    pub due_date: Option<NaiveDate>,
}

/// Partial task update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub parent_task_id: Option<Option<TaskId>>,
    pub assigned_user_id: Option<Option<UserId>>,
    pub project_id: Option<Option<ProjectId>>,
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub assigned_user_ids: BTreeSet<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// A written task plus every progress value the write touched.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: TaskView,
    pub progress_updates: Vec<ProgressChange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDeletion {
    pub task_id: TaskId,
    pub deleted_task_ids: Vec<TaskId>,
    pub removed_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub former_parent_id: Option<TaskId>,
    pub progress_updates: Vec<ProgressChange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDeletion {
    pub project: Project,
    pub detached_tasks: usize,
}

#[derive(Debug, Default)]
struct Recomputes {
    updates: Vec<ProgressChange>,
    warnings: Vec<String>,
}

impl Recomputes {
    fn absorb(&mut self, propagation: Propagation) {
        self.updates.extend(propagation.updated);
        if let Some(message) = propagation.abandoned {
            self.warnings
                .push(format!("progress propagation abandoned: {message}"));
        }
    }
}

pub struct Tracker<C: Clock = SystemClock> {
    storage: Storage,
    config: Config,
    clock: C,
}

impl Tracker<SystemClock> {
    /// Open an initialized tracker with its on-disk configuration.
    pub fn open(storage: Storage) -> Result<Self> {
        let config = load_config(&storage)?;
        Ok(Self::with_clock(storage, config, SystemClock))
    }
}

fn load_config(storage: &Storage) -> Result<Config> {
    let path = storage.config_file();
    if path.exists() {
        Config::load(&path)
    } else {
        Ok(Config::default())
    }
}

impl<C: Clock> Tracker<C> {
    pub fn with_clock(storage: Storage, config: Config, clock: C) -> Self {
        Self {
            storage,
            config,
            clock,
        }
    }

    /// Create the state for a new tracker whose first user is an admin.
    pub fn init(
        storage: Storage,
        config: Config,
        clock: C,
        admin_name: &str,
        admin_email: &str,
    ) -> Result<(Self, User)> {
        let name = required_text(admin_name, "name")?;
        let email = valid_email(admin_email)?;

        let mut state = State::default();
        let id = state.next_user_id();
        let admin = User {
            id,
            name,
            email,
            role: Role::Admin,
            created_at: clock.now(),
        };
        state.users.insert(id, admin.clone());
        storage.init(&state)?;
        tracing::debug!(root = %storage.root().display(), admin = id, "tracker initialized");

        Ok((Self::with_clock(storage, config, clock), admin))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn max_depth(&self) -> usize {
        self.config.tracker.max_depth
    }

    fn read(&self) -> Result<State> {
        self.storage.load(self.config.storage.lock_timeout_ms)
    }

    fn write<T>(&self, f: impl FnOnce(&mut State, DateTime<Utc>) -> Result<T>) -> Result<T> {
        self.storage
            .transaction(self.config.storage.lock_timeout_ms, |state| {
                f(state, self.clock.now())
            })
    }

    fn task_view(&self, state: &State, task: &Task, now: DateTime<Utc>) -> TaskView {
        let hierarchy = Hierarchy::new(&state.tasks, self.max_depth());
        TaskView::build(&hierarchy, &state.ledger, task, now)
    }

    fn task_views<'a>(
        &self,
        state: &'a State,
        tasks: impl IntoIterator<Item = &'a Task>,
        now: DateTime<Utc>,
    ) -> Vec<TaskView> {
        let hierarchy = Hierarchy::new(&state.tasks, self.max_depth());
        tasks
            .into_iter()
            .map(|task| TaskView::build(&hierarchy, &state.ledger, task, now))
            .collect()
    }

    /// The user the actor resolves to.
    pub fn current_user(&self, actor: &ActorRef) -> Result<User> {
        self.read()?.authenticate(actor, "use the tracker")
    }

    // =========================================================================
    // Timers and time entries
    // =========================================================================

    pub fn start_timer(
        &self,
        actor: &ActorRef,
        task_id: TaskId,
        description: Option<String>,
    ) -> Result<EntryView> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "start a timer")?;
            let task = state.task(task_id)?;
            policy::require(
                policy::can_mutate_task(&user, task),
                &user,
                format!("start a timer on task {task_id}"),
            )?;
            let entry = state
                .ledger
                .start(task_id, user.id, optional_text(description), now)?;
            Ok(EntryView::build(entry, now))
        })
    }

    pub fn stop_timer(&self, actor: &ActorRef, task_id: TaskId) -> Result<StoppedTimer> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "stop a timer")?;
            let task = state.task(task_id)?;
            policy::require(
                policy::can_mutate_task(&user, task),
                &user,
                format!("stop the timer on task {task_id}"),
            )?;
            let entry = state.ledger.stop(task_id, now)?.clone();
            let total = state.ledger.total_direct_seconds(task_id);
            Ok(StoppedTimer {
                entry: EntryView::build(&entry, now),
                total_time_spent: total,
                formatted_total_time: format_total_duration(total),
            })
        })
    }

    /// Entries of a task, most recently started first.
    pub fn list_time_entries(&self, actor: &ActorRef, task_id: TaskId) -> Result<EntryListView> {
        let state = self.read()?;
        let now = self.clock.now();
        let user = state.authenticate(actor, "list time entries")?;
        let task = state.task(task_id)?;
        policy::require(
            policy::can_view_task(&user, task),
            &user,
            format!("view time entries of task {task_id}"),
        )?;

        let total = state.ledger.total_direct_seconds(task_id);
        Ok(EntryListView {
            task_id,
            entries: state
                .ledger
                .entries_for_task(task_id)
                .into_iter()
                .map(|entry| EntryView::build(entry, now))
                .collect(),
            total_time_spent: total,
            formatted_total_time: format_total_duration(total),
            is_timer_running: state.ledger.running_entry(task_id).is_some(),
        })
    }

    /// Replace an entry's description. Progress is not touched.
    pub fn update_time_entry_description(
        &self,
        actor: &ActorRef,
        entry_id: EntryId,
        description: Option<String>,
    ) -> Result<EntryView> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "edit a time entry")?;
            let entry = state
                .ledger
                .get(entry_id)
                .ok_or(Error::TimeEntryNotFound(entry_id))?;
            policy::require(
                policy::can_mutate_time_entry(&user, entry),
                &user,
                format!("edit time entry {entry_id}"),
            )?;
            let entry = state
                .ledger
                .set_description(entry_id, optional_text(description))?;
            Ok(EntryView::build(entry, now))
        })
    }

    pub fn delete_time_entry(&self, actor: &ActorRef, entry_id: EntryId) -> Result<TimeEntry> {
        self.write(|state, _now| {
            let user = state.authenticate(actor, "delete a time entry")?;
            let entry = state
                .ledger
                .get(entry_id)
                .ok_or(Error::TimeEntryNotFound(entry_id))?;
            policy::require(
                policy::can_mutate_time_entry(&user, entry),
                &user,
                format!("delete time entry {entry_id}"),
            )?;
            let removed = state.ledger.remove(entry_id)?;
            tracing::debug!(entry_id, task_id = removed.task_id, "time entry deleted");
            Ok(removed)
        })
    }

    /// Running timers started by the actor.
    pub fn current_timers(&self, actor: &ActorRef) -> Result<Vec<CurrentTimer>> {
        let state = self.read()?;
        let now = self.clock.now();
        let user = state.authenticate(actor, "list running timers")?;

        Ok(state
            .ledger
            .running_for_user(user.id)
            .into_iter()
            .filter_map(|entry| {
                let task = state.tasks.get(&entry.task_id)?;
                Some(CurrentTimer {
                    entry: EntryView::build(entry, now),
                    task_id: task.id,
                    task_name: task.name.clone(),
                })
            })
            .collect())
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Create a task. A non-admin is always the assignee of what they create.
    pub fn create_task(&self, actor: &ActorRef, new: NewTask) -> Result<TaskOutcome> {
        let max_depth = self.max_depth();
        self.write(|state, now| {
            let user = state.authenticate(actor, "create a task")?;
            let name = required_text(&new.name, "task name")?;

            let assignee = if user.is_admin() {
                new.assigned_user_id
            } else {
                Some(user.id)
            };
            if let Some(assignee) = assignee {
                state.user(assignee)?;
            }
            if let Some(project_id) = new.project_id {
                let project = state.project(project_id)?;
                policy::require(
                    policy::can_view_project(&user, project),
                    &user,
                    format!("add tasks to project {project_id}"),
                )?;
            }
            if let Some(parent_id) = new.parent_task_id {
                let parent = state.task(parent_id)?;
                policy::require(
                    policy::can_mutate_task(&user, parent),
                    &user,
                    format!("add subtasks to task {parent_id}"),
                )?;
            }

            let id = state.next_task_id();
            state.tasks.insert(
                id,
                Task {
                    id,
                    name,
                    description: optional_text(new.description),
                    status: new.status,
                    priority: new.priority,
                    progress: 0,
                    parent_task_id: new.parent_task_id,
                    assigned_user_id: assignee,
                    project_id: new.project_id,
                    due_date: new.due_date,
                    created_by: user.id,
                    updated_by: Some(user.id),
                    created_at: now,
                    updated_at: now,
                },
            );
            tracing::debug!(task_id = id, parent = ?new.parent_task_id, "task created");

            let mut recomputes = Recomputes::default();
            if new.status == Status::Completed {
                recomputes.absorb(aggregate::update_progress(
                    state,
                    id,
                    Some(MAX_PROGRESS),
                    max_depth,
                    now,
                )?);
            } else if let Some(parent_id) = new.parent_task_id {
                recomputes.absorb(aggregate::recompute(state, parent_id, max_depth, now)?);
            }

            let task = state.task(id)?;
            Ok(TaskOutcome {
                task: self.task_view(state, task, now),
                progress_updates: recomputes.updates,
                warnings: recomputes.warnings,
            })
        })
    }

    /// Apply a partial update and run the progress triggers it implies.
    pub fn update_task(
        &self,
        actor: &ActorRef,
        task_id: TaskId,
        update: TaskUpdate,
    ) -> Result<TaskOutcome> {
        let max_depth = self.max_depth();
        self.write(|state, now| {
            let user = state.authenticate(actor, "update a task")?;
            let current = state.task(task_id)?.clone();
            policy::require(
                policy::can_mutate_task(&user, &current),
                &user,
                format!("update task {task_id}"),
            )?;

            let name = update
                .name
                .as_deref()
                .map(|name| required_text(name, "task name"))
                .transpose()?;

            if let Some(assignee) = update.assigned_user_id {
                if let Some(assignee) = assignee {
                    state.user(assignee)?;
                }
                if !user.is_admin() && assignee != Some(user.id) {
                    return Err(Error::unauthorized(
                        user.email.clone(),
                        format!("assign task {task_id} to another user"),
                    ));
                }
            }

            if let Some(Some(project_id)) = update.project_id {
                let project = state.project(project_id)?;
                policy::require(
                    policy::can_view_project(&user, project),
                    &user,
                    format!("move task {task_id} into project {project_id}"),
                )?;
            }

            let new_parent = update.parent_task_id.unwrap_or(current.parent_task_id);
            let parent_changed = new_parent != current.parent_task_id;
            if parent_changed {
                if let Some(parent_id) = new_parent {
                    validate_new_parent(state, &user, task_id, parent_id, max_depth)?;
                }
            }

            let task = state.task_mut(task_id)?;
            if let Some(name) = name {
                task.name = name;
            }
            if let Some(description) = update.description {
                task.description = optional_text(description);
            }
            if let Some(status) = update.status {
                task.status = status;
            }
            if let Some(priority) = update.priority {
                task.priority = priority;
            }
            if let Some(assignee) = update.assigned_user_id {
                task.assigned_user_id = assignee;
            }
            if let Some(project_id) = update.project_id {
                task.project_id = project_id;
            }
            if let Some(due_date) = update.due_date {
                task.due_date = due_date;
            }
            task.parent_task_id = new_parent;
            task.updated_by = Some(user.id);
            task.updated_at = now;
            let new_status = task.status;

            let mut recomputes = Recomputes::default();
            if new_status != current.status {
                if new_status == Status::Completed {
                    recomputes.absorb(aggregate::update_progress(
                        state,
                        task_id,
                        Some(MAX_PROGRESS),
                        max_depth,
                        now,
                    )?);
                } else if current.status == Status::Completed {
                    recomputes.absorb(aggregate::recompute(state, task_id, max_depth, now)?);
                }
            }
            if parent_changed {
                if let Some(old_parent) = current.parent_task_id {
                    if state.tasks.contains_key(&old_parent) {
                        recomputes.absorb(aggregate::recompute(state, old_parent, max_depth, now)?);
                    }
                }
                if let Some(parent_id) = new_parent {
                    recomputes.absorb(aggregate::recompute(state, parent_id, max_depth, now)?);
                }
            }
            tracing::debug!(task_id, recomputed = recomputes.updates.len(), "task updated");

            let task = state.task(task_id)?;
            Ok(TaskOutcome {
                task: self.task_view(state, task, now),
                progress_updates: recomputes.updates,
                warnings: recomputes.warnings,
            })
        })
    }

    /// Delete a task with its whole subtree and their time entries, then
    /// recompute the former parent once.
    pub fn delete_task(&self, actor: &ActorRef, task_id: TaskId) -> Result<TaskDeletion> {
        let max_depth = self.max_depth();
        self.write(|state, now| {
            let user = state.authenticate(actor, "delete a task")?;
            let task = state.task(task_id)?;
            policy::require(
                policy::can_mutate_task(&user, task),
                &user,
                format!("delete task {task_id}"),
            )?;
            let former_parent = task.parent_task_id;

            let doomed: BTreeSet<TaskId> = {
                let hierarchy = Hierarchy::new(&state.tasks, max_depth);
                let mut ids: BTreeSet<TaskId> = hierarchy
                    .descendants(task_id)
                    .iter()
                    .map(|task| task.id)
                    .collect();
                ids.insert(task_id);
                ids
            };
            for id in &doomed {
                state.tasks.remove(id);
            }
            let removed_entries = state.ledger.remove_for_tasks(&doomed);
            tracing::debug!(
                task_id,
                deleted = doomed.len(),
                removed_entries,
                "task subtree deleted"
            );

            let mut recomputes = Recomputes::default();
            let former_parent = former_parent.filter(|parent| state.tasks.contains_key(parent));
            if let Some(parent_id) = former_parent {
                recomputes.absorb(aggregate::recompute(state, parent_id, max_depth, now)?);
            }

            Ok(TaskDeletion {
                task_id,
                deleted_task_ids: doomed.into_iter().collect(),
                removed_entries,
                former_parent_id: former_parent,
                progress_updates: recomputes.updates,
                warnings: recomputes.warnings,
            })
        })
    }

    /// Write progress directly (0..=100) and propagate to the ancestors.
    pub fn set_task_progress(
        &self,
        actor: &ActorRef,
        task_id: TaskId,
        progress: i64,
    ) -> Result<TaskOutcome> {
        let value = u8::try_from(progress)
            .ok()
            .filter(|value| *value <= MAX_PROGRESS)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "progress must be between 0 and {MAX_PROGRESS}, got {progress}"
                ))
            })?;

        let max_depth = self.max_depth();
        self.write(|state, now| {
            let user = state.authenticate(actor, "set task progress")?;
            let task = state.task(task_id)?;
            policy::require(
                policy::can_mutate_task(&user, task),
                &user,
                format!("set progress of task {task_id}"),
            )?;

            let mut recomputes = Recomputes::default();
            recomputes.absorb(aggregate::update_progress(
                state,
                task_id,
                Some(value),
                max_depth,
                now,
            )?);
            if let Ok(task) = state.task_mut(task_id) {
                task.updated_by = Some(user.id);
            }

            let task = state.task(task_id)?;
            Ok(TaskOutcome {
                task: self.task_view(state, task, now),
                progress_updates: recomputes.updates,
                warnings: recomputes.warnings,
            })
        })
    }

    pub fn get_task_view(&self, actor: &ActorRef, task_id: TaskId) -> Result<TaskView> {
        let state = self.read()?;
        let user = state.authenticate(actor, "view a task")?;
        let task = state.task(task_id)?;
        policy::require(
            policy::can_view_task(&user, task),
            &user,
            format!("view task {task_id}"),
        )?;
        Ok(self.task_view(&state, task, self.clock.now()))
    }

    /// Root tasks visible to the actor, newest first.
    pub fn list_tasks(&self, actor: &ActorRef, status: Option<Status>) -> Result<Vec<TaskView>> {
        let state = self.read()?;
        let user = state.authenticate(actor, "list tasks")?;
        let tasks = newest_first(state.tasks.values().filter(|task| {
            task.parent_task_id.is_none()
                && policy::can_view_task(&user, task)
                && status.map_or(true, |status| task.status == status)
        }));
        Ok(self.task_views(&state, tasks, self.clock.now()))
    }

    /// Root tasks assigned to the actor, newest first.
    pub fn list_my_tasks(
        &self,
        actor: &ActorRef,
        status: Option<Status>,
    ) -> Result<Vec<TaskView>> {
        let state = self.read()?;
        let user = state.authenticate(actor, "list tasks")?;
        let tasks = newest_first(state.tasks.values().filter(|task| {
            task.parent_task_id.is_none()
                && task.assigned_user_id == Some(user.id)
                && status.map_or(true, |status| task.status == status)
        }));
        Ok(self.task_views(&state, tasks, self.clock.now()))
    }

    /// Children of a visible task, oldest first.
    pub fn subtasks(&self, actor: &ActorRef, task_id: TaskId) -> Result<Vec<TaskView>> {
        let state = self.read()?;
        let user = state.authenticate(actor, "list subtasks")?;
        let task = state.task(task_id)?;
        policy::require(
            policy::can_view_task(&user, task),
            &user,
            format!("view subtasks of task {task_id}"),
        )?;
        let hierarchy = Hierarchy::new(&state.tasks, self.max_depth());
        let now = self.clock.now();
        Ok(hierarchy
            .children(task_id)
            .into_iter()
            .map(|child| TaskView::build(&hierarchy, &state.ledger, child, now))
            .collect())
    }

    /// Status counts over visible tasks and projects plus the first active tasks.
    pub fn dashboard(&self, actor: &ActorRef) -> Result<Dashboard> {
        let state = self.read()?;
        let user = state.authenticate(actor, "view the dashboard")?;

        let visible: Vec<&Task> = state
            .tasks
            .values()
            .filter(|task| policy::can_view_task(&user, task))
            .collect();
        let projects = StatusCounts::tally(
            state
                .projects
                .values()
                .filter(|project| policy::can_view_project(&user, project))
                .map(|project| project.status),
        );
        let active = visible
            .iter()
            .copied()
            .filter(|task| task.status.is_active())
            .take(self.config.tracker.dashboard_limit);

        Ok(Dashboard {
            tasks: StatusCounts::tally(visible.iter().map(|task| task.status)),
            projects,
            active_tasks: self.task_views(&state, active, self.clock.now()),
            running_timers: state.ledger.running_for_user(user.id).len(),
        })
    }

    // =========================================================================
    // Projects
    // =========================================================================

    pub fn create_project(&self, actor: &ActorRef, new: NewProject) -> Result<Project> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "create a project")?;
            policy::require(policy::can_manage_project(&user), &user, "create projects")?;
            let name = required_text(&new.name, "project name")?;
            for assignee in &new.assigned_user_ids {
                state.user(*assignee)?;
            }

            let id = state.next_project_id();
            let project = Project {
                id,
                name,
                description: optional_text(new.description),
                status: new.status,
                due_date: new.due_date,
                assigned_user_ids: new.assigned_user_ids,
                created_by: user.id,
                updated_by: Some(user.id),
                created_at: now,
                updated_at: now,
            };
            state.projects.insert(id, project.clone());
            tracing::debug!(project_id = id, "project created");
            Ok(project)
        })
    }

    pub fn update_project(
        &self,
        actor: &ActorRef,
        project_id: ProjectId,
        update: ProjectUpdate,
    ) -> Result<Project> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "update a project")?;
            policy::require(
                policy::can_manage_project(&user),
                &user,
                format!("update project {project_id}"),
            )?;
            let name = update
                .name
                .as_deref()
                .map(|name| required_text(name, "project name"))
                .transpose()?;

            let project = state.project_mut(project_id)?;
            if let Some(name) = name {
                project.name = name;
            }
            if let Some(description) = update.description {
                project.description = optional_text(description);
            }
            if let Some(status) = update.status {
                project.status = status;
            }
            if let Some(due_date) = update.due_date {
                project.due_date = due_date;
            }
            project.updated_by = Some(user.id);
            project.updated_at = now;
            Ok(project.clone())
        })
    }

    /// Delete a project. Its tasks stay, detached from any project.
    pub fn delete_project(&self, actor: &ActorRef, project_id: ProjectId) -> Result<ProjectDeletion> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "delete a project")?;
            policy::require(
                policy::can_manage_project(&user),
                &user,
                format!("delete project {project_id}"),
            )?;
            let project = state
                .projects
                .remove(&project_id)
                .ok_or(Error::ProjectNotFound(project_id))?;

            let mut detached_tasks = 0;
            for task in state.tasks.values_mut() {
                if task.project_id == Some(project_id) {
                    task.project_id = None;
                    task.updated_at = now;
                    detached_tasks += 1;
                }
            }
            tracing::debug!(project_id, detached_tasks, "project deleted");
            Ok(ProjectDeletion {
                project,
                detached_tasks,
            })
        })
    }

    /// Replace the set of users assigned to a project.
    pub fn assign_project_users(
        &self,
        actor: &ActorRef,
        project_id: ProjectId,
        user_ids: BTreeSet<UserId>,
    ) -> Result<Project> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "assign project users")?;
            policy::require(
                policy::can_manage_project(&user),
                &user,
                format!("assign users to project {project_id}"),
            )?;
            for assignee in &user_ids {
                state.user(*assignee)?;
            }
            let project = state.project_mut(project_id)?;
            project.assigned_user_ids = user_ids;
            project.updated_by = Some(user.id);
            project.updated_at = now;
            Ok(project.clone())
        })
    }

    /// A visible project with the tasks of it the actor may see, newest first.
    pub fn get_project(&self, actor: &ActorRef, project_id: ProjectId) -> Result<ProjectView> {
        let state = self.read()?;
        let user = state.authenticate(actor, "view a project")?;
        let project = state.project(project_id)?;
        policy::require(
            policy::can_view_project(&user, project),
            &user,
            format!("view project {project_id}"),
        )?;

        let tasks = newest_first(state.tasks.values().filter(|task| {
            task.project_id == Some(project_id) && policy::can_view_task(&user, task)
        }));
        Ok(ProjectView {
            project: project.clone(),
            tasks: self.task_views(&state, tasks, self.clock.now()),
        })
    }

    /// Projects visible to the actor, newest first.
    pub fn list_projects(&self, actor: &ActorRef, status: Option<Status>) -> Result<Vec<Project>> {
        let state = self.read()?;
        let user = state.authenticate(actor, "list projects")?;
        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|project| {
                policy::can_view_project(&user, project)
                    && status.map_or(true, |status| project.status == status)
            })
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn add_user(&self, actor: &ActorRef, new: NewUser) -> Result<User> {
        self.write(|state, now| {
            let user = state.authenticate(actor, "add a user")?;
            policy::require(policy::can_manage_users(&user), &user, "add users")?;
            let name = required_text(&new.name, "name")?;
            let email = valid_email(&new.email)?;
            if state.find_user_by_email(&email).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "a user with email '{email}' already exists"
                )));
            }

            let id = state.next_user_id();
            let created = User {
                id,
                name,
                email,
                role: new.role,
                created_at: now,
            };
            state.users.insert(id, created.clone());
            tracing::debug!(user_id = id, role = created.role.as_str(), "user added");
            Ok(created)
        })
    }

    pub fn list_users(&self, actor: &ActorRef) -> Result<Vec<User>> {
        let state = self.read()?;
        let user = state.authenticate(actor, "list users")?;
        policy::require(policy::can_manage_users(&user), &user, "list users")?;
        Ok(state.users.values().cloned().collect())
    }
}

fn validate_new_parent(
    state: &State,
    user: &User,
    task_id: TaskId,
    parent_id: TaskId,
    max_depth: usize,
) -> Result<()> {
    if parent_id == task_id {
        return Err(Error::InvalidArgument(format!(
            "task {task_id} cannot be its own parent"
        )));
    }
    let parent = state.task(parent_id)?;
    let hierarchy = Hierarchy::new(&state.tasks, max_depth);
    if hierarchy.would_create_cycle(task_id, parent_id) {
        return Err(Error::InvalidArgument(format!(
            "task {parent_id} is a descendant of task {task_id}"
        )));
    }
    policy::require(
        policy::can_mutate_task(user, parent),
        user,
        format!("move task {task_id} under task {parent_id}"),
    )
}

fn newest_first<'a>(tasks: impl Iterator<Item = &'a Task>) -> Vec<&'a Task> {
    let mut tasks: Vec<&Task> = tasks.collect();
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    tasks
}

fn required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn valid_email(value: &str) -> Result<String> {
    let email = value.trim().to_lowercase();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !email.chars().any(char::is_whitespace);
    if !well_formed {
        return Err(Error::InvalidArgument(format!("invalid email '{value}'")));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        clock: Arc<ManualClock>,
        tracker: Tracker<Arc<ManualClock>>,
        admin: ActorRef,
        ada: ActorRef,
        ada_id: UserId,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 12, 19, 9, 0, 0).unwrap(),
        ));
        let (tracker, admin) = Tracker::init(
            Storage::new(dir.path().to_path_buf()),
            Config::default(),
            Arc::clone(&clock),
            "Root",
            "root@example.com",
        )
        .unwrap();
        let admin = ActorRef::Id(admin.id);
        let ada = tracker
            .add_user(
                &admin,
                NewUser {
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                    role: Role::User,
                },
            )
            .unwrap();
        Fixture {
            _dir: dir,
            clock,
            tracker,
            admin,
            ada: ActorRef::Id(ada.id),
            ada_id: ada.id,
        }
    }

    fn named(name: &str) -> NewTask {
        NewTask {
            name: name.to_string(),
            ..NewTask::default()
        }
    }

    fn child_of(parent: TaskId, name: &str) -> NewTask {
        NewTask {
            parent_task_id: Some(parent),
            ..named(name)
        }
    }

    fn set_status(fx: &Fixture, id: TaskId, status: Status) -> TaskOutcome {
        fx.tracker
            .update_task(
                &fx.admin,
                id,
                TaskUpdate {
                    status: Some(status),
                    ..TaskUpdate::default()
                },
            )
            .unwrap()
    }

    fn progress_of(fx: &Fixture, id: TaskId) -> u8 {
        fx.tracker.get_task_view(&fx.admin, id).unwrap().task.progress
    }

    #[test]
    fn completing_subtasks_rolls_progress_up() {
        let fx = fixture();
        let parent = fx.tracker.create_task(&fx.admin, named("release")).unwrap().task.task.id;
        let a = fx.tracker.create_task(&fx.admin, child_of(parent, "a")).unwrap().task.task.id;
        let b = fx.tracker.create_task(&fx.admin, child_of(parent, "b")).unwrap().task.task.id;
        let c = fx.tracker.create_task(&fx.admin, child_of(parent, "c")).unwrap().task.task.id;

        let outcome = set_status(&fx, a, Status::Completed);
        assert!(outcome
            .progress_updates
            .contains(&ProgressChange { task_id: parent, progress: 33 }));
        assert_eq!(progress_of(&fx, a), 100);
        assert_eq!(progress_of(&fx, parent), 33);
        set_status(&fx, b, Status::Completed);
        assert_eq!(progress_of(&fx, parent), 67);
        set_status(&fx, c, Status::Completed);
        assert_eq!(progress_of(&fx, parent), 100);

        set_status(&fx, c, Status::Pending);
        assert_eq!(progress_of(&fx, parent), 67);
        // c has no children so it keeps its last written value.
        assert_eq!(progress_of(&fx, c), 100);
    }

    #[test]
    fn pending_to_in_progress_does_not_recompute() {
        let fx = fixture();
        let task = fx.tracker.create_task(&fx.admin, named("solo")).unwrap().task.task.id;
        fx.tracker.set_task_progress(&fx.admin, task, 40).unwrap();

        let outcome = set_status(&fx, task, Status::InProgress);
        assert!(outcome.progress_updates.is_empty());
        assert_eq!(progress_of(&fx, task), 40);
    }

    #[test]
    fn deleting_a_subtask_recomputes_the_parent_once() {
        let fx = fixture();
        let parent = fx.tracker.create_task(&fx.admin, named("p")).unwrap().task.task.id;
        let done = fx.tracker.create_task(&fx.admin, child_of(parent, "done")).unwrap().task.task.id;
        let open = fx.tracker.create_task(&fx.admin, child_of(parent, "open")).unwrap().task.task.id;
        set_status(&fx, done, Status::Completed);
        assert_eq!(progress_of(&fx, parent), 50);

        let deletion = fx.tracker.delete_task(&fx.admin, open).unwrap();
        assert_eq!(deletion.former_parent_id, Some(parent));
        assert_eq!(
            deletion.progress_updates,
            vec![ProgressChange { task_id: parent, progress: 100 }]
        );
        assert_eq!(progress_of(&fx, parent), 100);
    }

    #[test]
    fn parent_keeps_progress_after_losing_its_last_child() {
        let fx = fixture();
        let parent = fx.tracker.create_task(&fx.admin, named("p")).unwrap().task.task.id;
        let only = fx.tracker.create_task(&fx.admin, child_of(parent, "only")).unwrap().task.task.id;
        set_status(&fx, only, Status::Completed);
        assert_eq!(progress_of(&fx, parent), 100);

        fx.tracker.delete_task(&fx.admin, only).unwrap();
        let view = fx.tracker.get_task_view(&fx.admin, parent).unwrap();
        assert_eq!(view.task.progress, 100);
        assert!(!view.is_parent);
    }

    #[test]
    fn delete_cascades_to_subtree_and_entries() {
        let fx = fixture();
        let root = fx.tracker.create_task(&fx.admin, named("root")).unwrap().task.task.id;
        let mid = fx.tracker.create_task(&fx.admin, child_of(root, "mid")).unwrap().task.task.id;
        let leaf = fx.tracker.create_task(&fx.admin, child_of(mid, "leaf")).unwrap().task.task.id;
        fx.tracker.start_timer(&fx.admin, leaf, None).unwrap();
        fx.tracker.start_timer(&fx.admin, root, None).unwrap();

        let deletion = fx.tracker.delete_task(&fx.admin, mid).unwrap();
        assert_eq!(deletion.deleted_task_ids, vec![mid, leaf]);
        assert_eq!(deletion.removed_entries, 1);
        assert!(matches!(
            fx.tracker.get_task_view(&fx.admin, leaf),
            Err(Error::TaskNotFound(_))
        ));
        assert_eq!(fx.tracker.current_timers(&fx.admin).unwrap().len(), 1);
    }

    #[test]
    fn reparenting_recomputes_old_and_new_parent() {
        let fx = fixture();
        let first = fx.tracker.create_task(&fx.admin, named("first")).unwrap().task.task.id;
        let second = fx.tracker.create_task(&fx.admin, named("second")).unwrap().task.task.id;
        let moving = fx.tracker.create_task(&fx.admin, child_of(first, "moving")).unwrap().task.task.id;
        fx.tracker.create_task(&fx.admin, child_of(first, "staying")).unwrap();
        fx.tracker.create_task(&fx.admin, child_of(second, "other")).unwrap();
        set_status(&fx, moving, Status::Completed);
        assert_eq!(progress_of(&fx, first), 50);

        fx.tracker
            .update_task(
                &fx.admin,
                moving,
                TaskUpdate {
                    parent_task_id: Some(Some(second)),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(progress_of(&fx, first), 0);
        assert_eq!(progress_of(&fx, second), 50);
    }

    #[test]
    fn reparenting_under_a_descendant_is_rejected() {
        let fx = fixture();
        let root = fx.tracker.create_task(&fx.admin, named("root")).unwrap().task.task.id;
        let child = fx.tracker.create_task(&fx.admin, child_of(root, "child")).unwrap().task.task.id;

        for parent in [root, child] {
            let err = fx
                .tracker
                .update_task(
                    &fx.admin,
                    root,
                    TaskUpdate {
                        parent_task_id: Some(Some(parent)),
                        ..TaskUpdate::default()
                    },
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");
        }
    }

    #[test]
    fn stop_timer_records_elapsed_seconds() {
        let fx = fixture();
        let task = fx.tracker.create_task(&fx.admin, named("t")).unwrap().task.task.id;
        fx.tracker.start_timer(&fx.admin, task, Some("focus".into())).unwrap();
        fx.clock.advance(Duration::seconds(125));

        let stopped = fx.tracker.stop_timer(&fx.admin, task).unwrap();
        assert_eq!(stopped.entry.entry.duration_seconds, Some(125));
        assert_eq!(stopped.entry.formatted_duration, "02:05");
        assert_eq!(stopped.formatted_total_time, "2m");

        assert!(matches!(
            fx.tracker.stop_timer(&fx.admin, task),
            Err(Error::NoRunningEntry(_))
        ));
    }

    #[test]
    fn totals_include_descendant_time() {
        let fx = fixture();
        let parent = fx.tracker.create_task(&fx.admin, named("p")).unwrap().task.task.id;
        let a = fx.tracker.create_task(&fx.admin, child_of(parent, "a")).unwrap().task.task.id;
        let b = fx.tracker.create_task(&fx.admin, child_of(parent, "b")).unwrap().task.task.id;
        for (task, seconds) in [(parent, 60), (a, 30), (b, 90)] {
            fx.tracker.start_timer(&fx.admin, task, None).unwrap();
            fx.clock.advance(Duration::seconds(seconds));
            fx.tracker.stop_timer(&fx.admin, task).unwrap();
        }

        let view = fx.tracker.get_task_view(&fx.admin, parent).unwrap();
        assert_eq!(view.total_time_with_subtasks, 180);
        assert_eq!(view.total_time_spent, 60);
        assert_eq!(view.total_subtask_time, 120);
        assert_eq!(view.subtasks_count, 2);
    }

    #[test]
    fn non_admin_is_limited_to_assigned_tasks() {
        let fx = fixture();
        let theirs = fx.tracker.create_task(&fx.admin, named("admin only")).unwrap().task.task.id;
        let own = fx.tracker.create_task(&fx.ada, named("mine")).unwrap().task;
        assert_eq!(own.task.assigned_user_id, Some(fx.ada_id));

        assert!(matches!(
            fx.tracker.start_timer(&fx.ada, theirs, None),
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            fx.tracker.set_task_progress(&fx.ada, theirs, 10),
            Err(Error::Unauthorized { .. })
        ));
        fx.tracker.start_timer(&fx.ada, own.task.id, None).unwrap();
        fx.tracker.set_task_progress(&fx.ada, own.task.id, 10).unwrap();

        let listed: Vec<_> = fx
            .tracker
            .list_tasks(&fx.ada, None)
            .unwrap()
            .into_iter()
            .map(|view| view.task.id)
            .collect();
        assert_eq!(listed, vec![own.task.id]);
        assert_eq!(fx.tracker.list_tasks(&fx.admin, None).unwrap().len(), 2);
    }

    #[test]
    fn non_admin_create_ignores_requested_assignee() {
        let fx = fixture();
        let task = fx
            .tracker
            .create_task(
                &fx.ada,
                NewTask {
                    assigned_user_id: Some(1),
                    ..named("sneaky")
                },
            )
            .unwrap()
            .task;
        assert_eq!(task.task.assigned_user_id, Some(fx.ada_id));
    }

    #[test]
    fn unknown_actor_is_unauthorized() {
        let fx = fixture();
        let err = fx
            .tracker
            .list_tasks(&ActorRef::Email("ghost@example.com".into()), None)
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[test]
    fn progress_out_of_range_is_a_validation_error() {
        let fx = fixture();
        let task = fx.tracker.create_task(&fx.admin, named("t")).unwrap().task.task.id;
        for bad in [-1, 101] {
            assert!(matches!(
                fx.tracker.set_task_progress(&fx.admin, task, bad),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn entry_owner_or_admin_may_edit_entries() {
        let fx = fixture();
        let task = fx.tracker.create_task(&fx.ada, named("mine")).unwrap().task.task.id;
        let entry = fx.tracker.start_timer(&fx.ada, task, None).unwrap().entry.id;
        fx.clock.advance(Duration::seconds(30));
        fx.tracker.stop_timer(&fx.ada, task).unwrap();

        let edited = fx
            .tracker
            .update_time_entry_description(&fx.ada, entry, Some("  review ".into()))
            .unwrap();
        assert_eq!(edited.entry.description.as_deref(), Some("review"));

        let listing = fx.tracker.list_time_entries(&fx.admin, task).unwrap();
        assert_eq!(listing.total_time_spent, 30);
        assert!(!listing.is_timer_running);

        fx.tracker.delete_time_entry(&fx.admin, entry).unwrap();
        assert_eq!(fx.tracker.list_time_entries(&fx.ada, task).unwrap().entries.len(), 0);
    }

    #[test]
    fn project_visibility_and_deletion() {
        let fx = fixture();
        let project = fx
            .tracker
            .create_project(
                &fx.admin,
                NewProject {
                    name: "Apollo".into(),
                    ..NewProject::default()
                },
            )
            .unwrap();
        assert!(matches!(
            fx.tracker.get_project(&fx.ada, project.id),
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            fx.tracker.create_project(
                &fx.ada,
                NewProject {
                    name: "Nope".into(),
                    ..NewProject::default()
                }
            ),
            Err(Error::Unauthorized { .. })
        ));

        fx.tracker
            .assign_project_users(&fx.admin, project.id, BTreeSet::from([fx.ada_id]))
            .unwrap();
        let task = fx
            .tracker
            .create_task(
                &fx.ada,
                NewTask {
                    project_id: Some(project.id),
                    ..named("in project")
                },
            )
            .unwrap()
            .task
            .task
            .id;
        assert_eq!(fx.tracker.get_project(&fx.ada, project.id).unwrap().tasks.len(), 1);
        assert_eq!(fx.tracker.list_projects(&fx.ada, None).unwrap().len(), 1);

        let deletion = fx.tracker.delete_project(&fx.admin, project.id).unwrap();
        assert_eq!(deletion.detached_tasks, 1);
        assert_eq!(fx.tracker.get_task_view(&fx.ada, task).unwrap().task.project_id, None);
    }

    #[test]
    fn dashboard_counts_visible_work() {
        let fx = fixture();
        fx.tracker.create_task(&fx.admin, named("admin task")).unwrap();
        let own = fx.tracker.create_task(&fx.ada, named("mine")).unwrap().task.task.id;
        fx.tracker.create_task(&fx.ada, named("done")).unwrap();
        fx.tracker
            .update_task(
                &fx.ada,
                own,
                TaskUpdate {
                    status: Some(Status::InProgress),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();

        let dashboard = fx.tracker.dashboard(&fx.ada).unwrap();
        assert_eq!(dashboard.tasks.total, 2);
        assert_eq!(dashboard.tasks.in_progress, 1);
        assert_eq!(dashboard.active_tasks.len(), 2);
        assert_eq!(fx.tracker.dashboard(&fx.admin).unwrap().tasks.total, 3);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let fx = fixture();
        let err = fx
            .tracker
            .add_user(
                &fx.admin,
                NewUser {
                    name: "Ada again".into(),
                    email: "ADA@example.com".into(),
                    role: Role::User,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(matches!(
            fx.tracker.list_users(&fx.ada),
            Err(Error::Unauthorized { .. })
        ));
    }
}
