//! wl dashboard command implementation.

use crate::cli::task::task_line;
use crate::cli::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::view::StatusCounts;

pub fn run(ctx: &Context) -> Result<()> {
    let (tracker, actor) = ctx.tracker()?;
    let dashboard = tracker.dashboard(&actor)?;

    let mut human = HumanOutput::new("wl dashboard");
    human.push_summary("tasks", counts_line(&dashboard.tasks));
    human.push_summary("projects", counts_line(&dashboard.projects));
    human.push_summary("running timers", dashboard.running_timers.to_string());
    for task in &dashboard.active_tasks {
        human.push_detail(task_line(task));
    }
    if dashboard.running_timers > 0 {
        human.push_next_step("wl timer current");
    }

    emit_success(ctx.output(), "dashboard", &dashboard, Some(&human))
}

fn counts_line(counts: &StatusCounts) -> String {
    format!(
        "{} total, {} pending, {} in progress, {} completed",
        counts.total, counts.pending, counts.in_progress, counts.completed
    )
}
