//! wl timer and entry command implementations.

use crate::cli::{set_or_clear, Context, EntryCommands, TimerCommands};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::view::EntryView;

pub fn run_timer(ctx: &Context, cmd: TimerCommands) -> Result<()> {
    let (tracker, actor) = ctx.tracker()?;

    match cmd {
        TimerCommands::Start { task, description } => {
            let entry = tracker.start_timer(&actor, task, description)?;
            let mut human = HumanOutput::new(format!("wl timer start: task {task}"));
            human.push_summary("entry", entry.entry.id.to_string());
            human.push_summary("started", entry.entry.started_at.to_rfc3339());
            human.push_next_step(format!("wl timer stop {task}"));
            emit_success(ctx.output(), "timer start", &entry, Some(&human))
        }
        TimerCommands::Stop { task } => {
            let stopped = tracker.stop_timer(&actor, task)?;
            let mut human = HumanOutput::new(format!("wl timer stop: task {task}"));
            human.push_summary("entry", stopped.entry.entry.id.to_string());
            human.push_summary("duration", stopped.entry.formatted_duration.clone());
            human.push_summary("task total", stopped.formatted_total_time.clone());
            if stopped.entry.entry.clock_skew {
                human.push_warning("stop time preceded start time; duration clamped to 0");
            }
            emit_success(ctx.output(), "timer stop", &stopped, Some(&human))
        }
        TimerCommands::Current => {
            let timers = tracker.current_timers(&actor)?;
            let mut human = HumanOutput::new(format!("wl timer current: {} running", timers.len()));
            for timer in &timers {
                human.push_detail(format!(
                    "task {} {} {}",
                    timer.task_id, timer.task_name, timer.entry.formatted_duration
                ));
            }
            emit_success(ctx.output(), "timer current", &timers, Some(&human))
        }
    }
}

pub fn run_entry(ctx: &Context, cmd: EntryCommands) -> Result<()> {
    let (tracker, actor) = ctx.tracker()?;

    match cmd {
        EntryCommands::List { task } => {
            let listing = tracker.list_time_entries(&actor, task)?;
            let mut human = HumanOutput::new(format!(
                "wl entry list: task {task}, {} entries",
                listing.entries.len()
            ));
            human.push_summary("total", listing.formatted_total_time.clone());
            human.push_summary(
                "timer",
                if listing.is_timer_running { "running" } else { "stopped" },
            );
            for entry in &listing.entries {
                human.push_detail(entry_line(entry));
            }
            emit_success(ctx.output(), "entry list", &listing, Some(&human))
        }
        EntryCommands::Edit {
            id,
            description,
            clear,
        } => {
            let description = set_or_clear(description, clear).flatten();
            let entry = tracker.update_time_entry_description(&actor, id, description)?;
            let human = HumanOutput::new(format!("wl entry edit: {}", entry_line(&entry)));
            emit_success(ctx.output(), "entry edit", &entry, Some(&human))
        }
        EntryCommands::Rm { id } => {
            let removed = tracker.delete_time_entry(&actor, id)?;
            let mut human = HumanOutput::new(format!("wl entry rm: {id}"));
            human.push_summary("task", removed.task_id.to_string());
            emit_success(ctx.output(), "entry rm", &removed, Some(&human))
        }
    }
}

fn entry_line(view: &EntryView) -> String {
    let entry = &view.entry;
    let mut line = format!(
        "{} {} {}",
        entry.id,
        entry.started_at.format("%Y-%m-%d %H:%M"),
        view.formatted_duration
    );
    if view.is_running {
        line.push_str(" (running)");
    }
    if let Some(description) = &entry.description {
        line.push_str(&format!(" {description}"));
    }
    line
}
