//! wl task command implementations.

use crate::cli::{set_or_clear, Context, TaskCommands};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::tracker::{NewTask, TaskOutcome, TaskUpdate};
use crate::view::TaskView;

pub fn run(ctx: &Context, cmd: TaskCommands) -> Result<()> {
    let (tracker, actor) = ctx.tracker()?;

    match cmd {
        TaskCommands::New {
            name,
            description,
            status,
            priority,
            parent,
            assign,
            project,
            due,
        } => {
            let outcome = tracker.create_task(
                &actor,
                NewTask {
                    name,
                    description,
                    status,
                    priority,
                    parent_task_id: parent,
                    assigned_user_id: assign,
                    project_id: project,
                    due_date: due,
                },
            )?;
            emit_outcome(ctx, "task new", &outcome)
        }
        TaskCommands::Edit {
            id,
            name,
            description,
            clear_description,
            status,
            priority,
            parent,
            detach,
            assign,
            unassign,
            project,
            no_project,
            due,
            clear_due,
        } => {
            let outcome = tracker.update_task(
                &actor,
                id,
                TaskUpdate {
                    name,
                    description: set_or_clear(description, clear_description),
                    status,
                    priority,
                    parent_task_id: set_or_clear(parent, detach),
                    assigned_user_id: set_or_clear(assign, unassign),
                    project_id: set_or_clear(project, no_project),
                    due_date: set_or_clear(due, clear_due),
                },
            )?;
            emit_outcome(ctx, "task edit", &outcome)
        }
        TaskCommands::Rm { id } => {
            let deletion = tracker.delete_task(&actor, id)?;

            let mut human = HumanOutput::new(format!("wl task rm: {id}"));
            human.push_summary("deleted tasks", deletion.deleted_task_ids.len().to_string());
            human.push_summary("removed entries", deletion.removed_entries.to_string());
            if let Some(parent) = deletion.former_parent_id {
                human.push_next_step(format!("wl task show {parent}"));
            }
            for change in &deletion.progress_updates {
                human.push_detail(format!("task {} progress {}%", change.task_id, change.progress));
            }
            for warning in &deletion.warnings {
                human.push_warning(warning.clone());
            }
            emit_success(ctx.output(), "task rm", &deletion, Some(&human))
        }
        TaskCommands::Progress { id, value } => {
            let outcome = tracker.set_task_progress(&actor, id, value)?;
            emit_outcome(ctx, "task progress", &outcome)
        }
        TaskCommands::Show { id } => {
            let view = tracker.get_task_view(&actor, id)?;
            let human = task_human(&format!("wl task show: {id}"), &view);
            emit_success(ctx.output(), "task show", &view, Some(&human))
        }
        TaskCommands::List { status } => {
            let views = tracker.list_tasks(&actor, status)?;
            emit_list(ctx, "task list", &views)
        }
        TaskCommands::Mine { status } => {
            let views = tracker.list_my_tasks(&actor, status)?;
            emit_list(ctx, "task mine", &views)
        }
        TaskCommands::Subtasks { id } => {
            let views = tracker.subtasks(&actor, id)?;
            emit_list(ctx, "task subtasks", &views)
        }
    }
}

/// One-line summary used by every task listing.
pub(crate) fn task_line(view: &TaskView) -> String {
    let task = &view.task;
    let mut line = format!(
        "{} {} [{}] {}% {}",
        task.id,
        task.name,
        task.status.as_str(),
        task.progress,
        view.formatted_total_time
    );
    if view.is_parent {
        line.push_str(&format!(" ({} subtasks)", view.subtasks_count));
    }
    if view.is_timer_running {
        line.push_str(" *timer running*");
    }
    line
}

fn task_human(header: &str, view: &TaskView) -> HumanOutput {
    let task = &view.task;
    let mut human = HumanOutput::new(header);
    human.push_summary("name", task.name.clone());
    human.push_summary("status", task.status.as_str());
    human.push_summary("priority", task.priority.as_str());
    human.push_summary("progress", format!("{}%", task.progress));
    human.push_summary("time", view.formatted_total_time.clone());
    if view.is_parent {
        human.push_summary("subtask time", view.formatted_total_subtask_time.clone());
        human.push_summary("subtasks", view.subtasks_count.to_string());
    }
    if let Some(parent) = task.parent_task_id {
        human.push_summary("parent", parent.to_string());
    }
    if let Some(assignee) = task.assigned_user_id {
        human.push_summary("assignee", assignee.to_string());
    }
    if let Some(project) = task.project_id {
        human.push_summary("project", project.to_string());
    }
    if let Some(due) = task.due_date {
        human.push_summary("due", due.to_string());
    }
    if let Some(description) = &task.description {
        human.push_detail(description.clone());
    }
    match &view.running_entry {
        Some(entry) => {
            human.push_summary("timer", format!("running {}", entry.formatted_duration));
            human.push_next_step(format!("wl timer stop {}", task.id));
        }
        None => human.push_next_step(format!("wl timer start {}", task.id)),
    }
    human
}

fn emit_outcome(ctx: &Context, command: &str, outcome: &TaskOutcome) -> Result<()> {
    let mut human = task_human(&format!("wl {command}: {}", outcome.task.task.id), &outcome.task);
    for change in &outcome.progress_updates {
        if change.task_id != outcome.task.task.id {
            human.push_detail(format!("task {} progress {}%", change.task_id, change.progress));
        }
    }
    for warning in &outcome.warnings {
        human.push_warning(warning.clone());
    }
    emit_success(ctx.output(), command, outcome, Some(&human))
}

fn emit_list(ctx: &Context, command: &str, views: &[TaskView]) -> Result<()> {
    let mut human = HumanOutput::new(format!("wl {command}: {} tasks", views.len()));
    for view in views {
        human.push_detail(task_line(view));
    }
    emit_success(ctx.output(), command, &views, Some(&human))
}
