//! wl project command implementations.

use std::collections::BTreeSet;

use crate::cli::task::task_line;
use crate::cli::{set_or_clear, Context, ProjectCommands};
use crate::error::Result;
use crate::model::Project;
use crate::output::{emit_success, HumanOutput};
use crate::tracker::{NewProject, ProjectUpdate};

pub fn run(ctx: &Context, cmd: ProjectCommands) -> Result<()> {
    let (tracker, actor) = ctx.tracker()?;

    match cmd {
        ProjectCommands::New {
            name,
            description,
            status,
            due,
            assign,
        } => {
            let project = tracker.create_project(
                &actor,
                NewProject {
                    name,
                    description,
                    status,
                    due_date: due,
                    assigned_user_ids: assign.into_iter().collect(),
                },
            )?;
            let mut human = project_human("project new", &project);
            human.push_next_step(format!("wl task new <name> --project {}", project.id));
            emit_success(ctx.output(), "project new", &project, Some(&human))
        }
        ProjectCommands::Edit {
            id,
            name,
            description,
            clear_description,
            status,
            due,
            clear_due,
        } => {
            let project = tracker.update_project(
                &actor,
                id,
                ProjectUpdate {
                    name,
                    description: set_or_clear(description, clear_description),
                    status,
                    due_date: set_or_clear(due, clear_due),
                },
            )?;
            let human = project_human("project edit", &project);
            emit_success(ctx.output(), "project edit", &project, Some(&human))
        }
        ProjectCommands::Rm { id } => {
            let deletion = tracker.delete_project(&actor, id)?;
            let mut human = HumanOutput::new(format!("wl project rm: {id}"));
            human.push_summary("name", deletion.project.name.clone());
            human.push_summary("detached tasks", deletion.detached_tasks.to_string());
            emit_success(ctx.output(), "project rm", &deletion, Some(&human))
        }
        ProjectCommands::Assign { id, users } => {
            let users: BTreeSet<_> = users.into_iter().collect();
            let project = tracker.assign_project_users(&actor, id, users)?;
            let human = project_human("project assign", &project);
            emit_success(ctx.output(), "project assign", &project, Some(&human))
        }
        ProjectCommands::List { status } => {
            let projects = tracker.list_projects(&actor, status)?;
            let mut human =
                HumanOutput::new(format!("wl project list: {} projects", projects.len()));
            for project in &projects {
                human.push_detail(format!(
                    "{} {} [{}]",
                    project.id,
                    project.name,
                    project.status.as_str()
                ));
            }
            emit_success(ctx.output(), "project list", &projects, Some(&human))
        }
        ProjectCommands::Show { id } => {
            let view = tracker.get_project(&actor, id)?;
            let mut human = project_human("project show", &view.project);
            for task in &view.tasks {
                human.push_detail(task_line(task));
            }
            emit_success(ctx.output(), "project show", &view, Some(&human))
        }
    }
}

fn project_human(command: &str, project: &Project) -> HumanOutput {
    let mut human = HumanOutput::new(format!("wl {command}: {}", project.id));
    human.push_summary("name", project.name.clone());
    human.push_summary("status", project.status.as_str());
    if let Some(due) = project.due_date {
        human.push_summary("due", due.to_string());
    }
    let assigned: Vec<String> = project
        .assigned_user_ids
        .iter()
        .map(|id| id.to_string())
        .collect();
    human.push_summary(
        "assigned",
        if assigned.is_empty() {
            "none".to_string()
        } else {
            assigned.join(", ")
        },
    );
    if let Some(description) = &project.description {
        human.push_detail(description.clone());
    }
    human
}
