//! Persisted tracker state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actor::ActorRef;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::model::{Project, ProjectId, Task, TaskId, User, UserId};

/// Version tag of the state document
pub const SCHEMA_VERSION: &str = "worklog.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub schema_version: String,
    #[serde(default)]
    pub last_user_id: UserId,
    #[serde(default)]
    pub last_project_id: ProjectId,
    #[serde(default)]
    pub last_task_id: TaskId,
    #[serde(default)]
    pub users: BTreeMap<UserId, User>,
    #[serde(default)]
    pub projects: BTreeMap<ProjectId, Project>,
    #[serde(default)]
    pub tasks: BTreeMap<TaskId, Task>,
    #[serde(default)]
    pub ledger: Ledger,
}

impl Default for State {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            last_user_id: 0,
            last_project_id: 0,
            last_task_id: 0,
            users: BTreeMap::new(),
            projects: BTreeMap::new(),
            tasks: BTreeMap::new(),
            ledger: Ledger::default(),
        }
    }
}

impl State {
    /// Resolve the acting user. An actor that matches no user is unauthorized.
    pub fn authenticate(&self, actor: &ActorRef, action: &str) -> Result<User> {
        let found = match actor {
            ActorRef::Id(id) => self.users.get(id),
            ActorRef::Email(email) => self.find_user_by_email(email),
        };
        found
            .cloned()
            .ok_or_else(|| Error::unauthorized(actor.to_string(), action))
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }

    pub fn user(&self, id: UserId) -> Result<&User> {
        self.users.get(&id).ok_or(Error::UserNotFound(id))
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or(Error::TaskNotFound(id))
    }

    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))
    }

    pub fn project(&self, id: ProjectId) -> Result<&Project> {
        self.projects.get(&id).ok_or(Error::ProjectNotFound(id))
    }

    pub fn project_mut(&mut self, id: ProjectId) -> Result<&mut Project> {
        self.projects.get_mut(&id).ok_or(Error::ProjectNotFound(id))
    }

    pub(crate) fn next_user_id(&mut self) -> UserId {
        self.last_user_id += 1;
        self.last_user_id
    }

    pub(crate) fn next_project_id(&mut self) -> ProjectId {
        self.last_project_id += 1;
        self.last_project_id
    }

    pub(crate) fn next_task_id(&mut self) -> TaskId {
        self.last_task_id += 1;
        self.last_task_id
    }
}
