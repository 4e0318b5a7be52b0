//! wl actor command implementation
//!
//! Provides actor identity helpers (set/show).

use std::path::PathBuf;

use serde::Serialize;

use crate::actor::{self, ActorRef};
use crate::cli::Context;
use crate::error::Result;
use crate::model::User;
use crate::output::{emit_success, HumanOutput};
use crate::tracker::Tracker;

#[derive(Serialize)]
struct ActorSetReport {
    actor: String,
    path: PathBuf,
}

#[derive(Serialize)]
struct ActorShowReport {
    actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

pub fn run_set(ctx: &Context, value: &str) -> Result<()> {
    let storage = ctx.storage()?;
    // Reject malformed values before persisting them.
    value.parse::<ActorRef>()?;
    actor::persist_actor(&storage, value)?;

    let actor_name = actor::resolve_actor(Some(&storage), Some(value))?;
    let report = ActorSetReport {
        actor: actor_name.clone(),
        path: storage.actor_file(),
    };

    let mut human = HumanOutput::new(format!("wl actor set: {actor_name}"));
    human.push_summary("actor", actor_name);
    human.push_summary("path", report.path.display().to_string());
    human.push_next_step("wl actor show");

    emit_success(ctx.output(), "actor set", &report, Some(&human))
}

pub fn run_show(ctx: &Context) -> Result<()> {
    let storage = ctx.storage()?;
    let actor_name = actor::resolve_actor(Some(&storage), ctx.actor.as_deref())?;
    let tracker = Tracker::open(storage)?;
    let user = actor_name
        .parse::<ActorRef>()
        .and_then(|actor| tracker.current_user(&actor))
        .ok();

    let mut human = HumanOutput::new(format!("wl actor: {actor_name}"));
    human.push_summary("actor", actor_name.clone());
    match &user {
        Some(user) => {
            human.push_summary("user", format!("{} (id {})", user.name, user.id));
            human.push_summary("role", user.role.as_str());
        }
        None => {
            human.push_warning("actor does not match any user; commands will be rejected");
            human.push_next_step("wl actor set <id|email>");
        }
    }

    let report = ActorShowReport {
        actor: actor_name,
        user,
    };
    emit_success(ctx.output(), "actor show", &report, Some(&human))
}
