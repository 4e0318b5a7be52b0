//! worklog - project and task tracking library
//!
//! This library provides the core of the `wl` CLI: a task hierarchy with
//! progress roll-up, a time-entry ledger with per-task timers, and an
//! access policy that gates every operation by the acting user's role.
//!
//! # Core Concepts
//!
//! - **Tasks**: nest under a parent task; a parent's progress is the mean of
//!   its direct children and is recomputed whenever a child changes
//! - **Timers**: at most one running time entry per task
//! - **Projects**: group tasks and grant visibility to assigned users
//! - **Actors**: every command acts as a registered user, resolved from
//!   `--actor`, `WL_ACTOR`, the persisted actor file or the config
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `tracker`: Operations, each run as one locked transaction
//! - `hierarchy`: Read-only parent/child queries over the task arena
//! - `aggregate`: Progress calculation, propagation and time roll-up
//! - `ledger`: Time entries and timers
//! - `policy`: Role and ownership checks
//! - `view`: Derived, serializable read models
//! - `storage` / `lock` / `state`: Persisted state and concurrency safety
//! - `config`: Configuration loading from `.worklog.toml`

pub mod actor;
pub mod aggregate;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod ledger;
pub mod lock;
pub mod model;
pub mod output;
pub mod policy;
pub mod state;
pub mod storage;
pub mod tracker;
pub mod view;

pub use error::{Error, Result};
