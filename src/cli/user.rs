//! wl user command implementations.

use crate::cli::Context;
use crate::error::Result;
use crate::model::Role;
use crate::output::{emit_success, HumanOutput};
use crate::tracker::NewUser;

pub struct AddOptions {
    pub name: String,
    pub email: String,
    pub admin: bool,
}

pub fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let (tracker, actor) = ctx.tracker()?;
    let user = tracker.add_user(
        &actor,
        NewUser {
            name: options.name,
            email: options.email,
            role: if options.admin { Role::Admin } else { Role::User },
        },
    )?;

    let mut human = HumanOutput::new(format!("wl user add: {}", user.id));
    human.push_summary("name", user.name.clone());
    human.push_summary("email", user.email.clone());
    human.push_summary("role", user.role.as_str());
    human.push_next_step(format!("wl --actor {} task mine", user.email));

    emit_success(ctx.output(), "user add", &user, Some(&human))
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let (tracker, actor) = ctx.tracker()?;
    let users = tracker.list_users(&actor)?;

    let mut human = HumanOutput::new(format!("wl user list: {} users", users.len()));
    for user in &users {
        human.push_detail(format!(
            "{} {} <{}> [{}]",
            user.id,
            user.name,
            user.email,
            user.role.as_str()
        ));
    }

    emit_success(ctx.output(), "user list", &users, Some(&human))
}
