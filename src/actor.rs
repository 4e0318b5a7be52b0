//! Actor identity management.
//!
//! Actor resolution order:
//! 1) CLI --actor (explicit)
//! 2) WL_ACTOR environment variable
//! 3) Persisted value in .worklog/actor
//! 4) Config default (actor.default) or "unknown"
//!
//! An actor string is either a numeric user id or a user's email.

use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::UserId;
use crate::storage::Storage;

/// Reference to the acting user, resolved against the state inside each operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorRef {
    Id(UserId),
    Email(String),
}

impl FromStr for ActorRef {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("actor cannot be empty".to_string()));
        }
        match trimmed.parse::<UserId>() {
            Ok(id) => Ok(ActorRef::Id(id)),
            Err(_) => Ok(ActorRef::Email(trimmed.to_lowercase())),
        }
    }
}

impl From<UserId> for ActorRef {
    fn from(id: UserId) -> Self {
        ActorRef::Id(id)
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRef::Id(id) => write!(f, "user {id}"),
            ActorRef::Email(email) => f.write_str(email),
        }
    }
}

/// Resolve the current actor using CLI, environment, persisted value, and config.
pub fn resolve_actor(storage: Option<&Storage>, cli_actor: Option<&str>) -> Result<String> {
    if let Some(actor) = non_empty(cli_actor) {
        return Ok(actor.to_string());
    }

    if let Ok(env_actor) = std::env::var("WL_ACTOR") {
        if let Some(actor) = non_empty(Some(env_actor.as_str())) {
            return Ok(actor.to_string());
        }
    }

    if let Some(storage) = storage {
        if let Some(actor) = load_persisted_actor(storage)? {
            return Ok(actor);
        }

        let config = Config::load_from_root(storage.root());
        return Ok(config.actor.default);
    }

    Ok("unknown".to_string())
}

/// Persist the actor identity in `.worklog/actor`.
pub fn persist_actor(storage: &Storage, actor: &str) -> Result<()> {
    let actor = non_empty(Some(actor))
        .ok_or_else(|| Error::InvalidArgument("actor cannot be empty".to_string()))?;

    std::fs::create_dir_all(storage.state_dir())?;
    std::fs::write(storage.actor_file(), format!("{actor}\n"))?;
    Ok(())
}

/// Load the actor identity from `.worklog/actor`, if present.
pub fn load_persisted_actor(storage: &Storage) -> Result<Option<String>> {
    let path = storage.actor_file();
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    Ok(non_empty(Some(raw.as_str())).map(str::to_string))
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
