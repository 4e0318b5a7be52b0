//! Access policy predicates.
//!
//! Pure functions over an already-authenticated user. Operations call
//! `require` with one of these to turn a `false` into `Unauthorized`.

use crate::error::{Error, Result};
use crate::model::{Project, Task, TimeEntry, User};

pub fn can_view_task(actor: &User, task: &Task) -> bool {
    actor.is_admin() || task.assigned_user_id == Some(actor.id)
}

pub fn can_mutate_task(actor: &User, task: &Task) -> bool {
    can_view_task(actor, task)
}

pub fn can_manage_project(actor: &User) -> bool {
    actor.is_admin()
}

pub fn can_view_project(actor: &User, project: &Project) -> bool {
    actor.is_admin() || project.assigned_user_ids.contains(&actor.id)
}

pub fn can_mutate_time_entry(actor: &User, entry: &TimeEntry) -> bool {
    actor.is_admin() || entry.user_id == actor.id
}

pub fn can_manage_users(actor: &User) -> bool {
    actor.is_admin()
}

/// `Ok(())` when `allowed`, otherwise `Unauthorized` naming the actor and action.
pub fn require(allowed: bool, actor: &User, action: impl Into<String>) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::unauthorized(actor.email.clone(), action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, Status};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn user(id: u64, role: Role) -> User {
        User {
            id,
            name: format!("user{id}"),
            email: format!("user{id}@example.com"),
            role,
            created_at: Utc::now(),
        }
    }

    fn task_assigned_to(assignee: Option<u64>) -> Task {
        let mut task = crate::hierarchy::tests::task(1, None);
        task.assigned_user_id = assignee;
        task
    }

    fn entry_by(user_id: u64) -> TimeEntry {
        TimeEntry {
            id: 1,
            task_id: 1,
            user_id,
            started_at: Utc::now(),
            stopped_at: None,
            duration_seconds: None,
            description: None,
            clock_skew: false,
        }
    }

    #[test]
    fn admin_passes_every_gate() {
        let admin = user(1, Role::Admin);
        let project = Project {
            id: 1,
            name: "Apollo".into(),
            description: None,
            status: Status::Pending,
            due_date: None,
            assigned_user_ids: BTreeSet::new(),
            created_by: 2,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(can_view_task(&admin, &task_assigned_to(Some(5))));
        assert!(can_mutate_task(&admin, &task_assigned_to(None)));
        assert!(can_manage_project(&admin));
        assert!(can_view_project(&admin, &project));
        assert!(can_mutate_time_entry(&admin, &entry_by(9)));
        assert!(can_manage_users(&admin));
    }

    #[test]
    fn users_see_only_their_assignments() {
        let ada = user(2, Role::User);

        assert!(can_view_task(&ada, &task_assigned_to(Some(2))));
        assert!(can_mutate_task(&ada, &task_assigned_to(Some(2))));
        assert!(!can_view_task(&ada, &task_assigned_to(Some(3))));
        assert!(!can_mutate_task(&ada, &task_assigned_to(None)));
        assert!(!can_manage_project(&ada));
        assert!(!can_manage_users(&ada));
    }

    #[test]
    fn project_visibility_follows_assignment() {
        let ada = user(2, Role::User);
        let mut project = Project {
            id: 1,
            name: "Apollo".into(),
            description: None,
            status: Status::InProgress,
            due_date: None,
            assigned_user_ids: BTreeSet::from([3]),
            created_by: 1,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!can_view_project(&ada, &project));

        project.assigned_user_ids.insert(2);
        assert!(can_view_project(&ada, &project));
    }

    #[test]
    fn entries_belong_to_their_owner() {
        let ada = user(2, Role::User);
        assert!(can_mutate_time_entry(&ada, &entry_by(2)));
        assert!(!can_mutate_time_entry(&ada, &entry_by(3)));
    }

    #[test]
    fn require_maps_denial_to_unauthorized() {
        let ada = user(2, Role::User);
        assert!(require(true, &ada, "view task 1").is_ok());
        match require(false, &ada, "view task 1").unwrap_err() {
            Error::Unauthorized { actor, action } => {
                assert_eq!(actor, "user2@example.com");
                assert_eq!(action, "view task 1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
