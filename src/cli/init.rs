//! wl init command implementation
//!
//! Creates the state directory, a default `.worklog.toml`, and the first admin.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::actor;
use crate::cli::Context;
use crate::clock::SystemClock;
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::model::User;
use crate::output::{emit_success, HumanOutput};
use crate::storage::Storage;
use crate::tracker::Tracker;

pub struct InitOptions {
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
struct InitReport {
    root: PathBuf,
    admin: User,
    created_config: bool,
}

pub fn run(ctx: &Context, options: InitOptions) -> Result<()> {
    let root = ctx.start_dir();
    std::fs::create_dir_all(&root)?;

    let created_config = ensure_config(&root)?;
    let config = Config::load(&root.join(CONFIG_FILE))?;
    let storage = Storage::new(root.clone());
    let (tracker, admin) =
        Tracker::init(storage, config, SystemClock, &options.name, &options.email)?;
    actor::persist_actor(tracker.storage(), &admin.email)?;

    let mut human = HumanOutput::new(format!("wl init: initialized {}", root.display()));
    human.push_summary("admin", format!("{} <{}> (id {})", admin.name, admin.email, admin.id));
    human.push_summary(
        "config",
        if created_config {
            format!("created {CONFIG_FILE}")
        } else {
            format!("kept existing {CONFIG_FILE}")
        },
    );
    human.push_next_step("wl user add --name <name> --email <email>");
    human.push_next_step("wl task new <name>");

    let report = InitReport {
        root,
        admin,
        created_config,
    };
    emit_success(ctx.output(), "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}
