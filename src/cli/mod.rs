//! Command-line interface for wl
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::actor::ActorRef;
use crate::error::Result;
use crate::model::{EntryId, Priority, ProjectId, Status, TaskId, UserId};
use crate::output::OutputOptions;
use crate::storage::Storage;
use crate::tracker::Tracker;

mod actor;
mod dashboard;
mod init;
mod project;
mod task;
mod timer;
mod user;

/// wl - project and task tracking
///
/// Tasks nest into subtasks whose completion rolls up into their parent's
/// progress; timers record work time per task.
#[derive(Parser, Debug)]
#[command(name = "wl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Tracker root (defaults to the nearest directory containing .worklog/)
    #[arg(long, global = true, env = "WL_ROOT")]
    pub root: Option<PathBuf>,

    /// Acting user: a user id or email
    #[arg(long, global = true, env = "WL_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a tracker and create its first admin
    Init {
        /// Admin display name
        #[arg(long)]
        name: String,

        /// Admin email
        #[arg(long)]
        email: String,
    },

    /// Set or show actor identity
    #[command(subcommand)]
    Actor(ActorCommands),

    /// User management (admin only)
    #[command(subcommand)]
    User(UserCommands),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Start and stop work timers
    #[command(subcommand)]
    Timer(TimerCommands),

    /// Recorded time entries
    #[command(subcommand)]
    Entry(EntryCommands),

    /// Task and project counts with active work
    Dashboard,
}

/// Actor subcommands
#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the actor for this tracker
    Set {
        /// User id or email
        actor: String,
    },

    /// Show the resolved actor and the user it maps to
    Show,
}

/// User subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Add a user
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        /// Email, unique per tracker
        #[arg(long)]
        email: String,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },

    /// List users
    List,
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    New {
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum, default_value_t = Status::Pending)]
        status: Status,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,

        /// Users assigned to the project
        #[arg(long = "assign", value_delimiter = ',')]
        assign: Vec<UserId>,
    },

    /// Edit a project
    Edit {
        id: ProjectId,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, value_enum)]
        status: Option<Status>,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        #[arg(long)]
        clear_due: bool,
    },

    /// Delete a project (its tasks are kept)
    Rm { id: ProjectId },

    /// Replace the users assigned to a project
    Assign {
        id: ProjectId,

        /// User ids; none clears the assignment
        users: Vec<UserId>,
    },

    /// List visible projects
    List {
        #[arg(long, value_enum)]
        status: Option<Status>,
    },

    /// Show a project with its visible tasks
    Show { id: ProjectId },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    New {
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum, default_value_t = Status::Pending)]
        status: Status,

        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,

        /// Parent task (makes this a subtask)
        #[arg(long)]
        parent: Option<TaskId>,

        /// Assignee (admins only; others are always the assignee)
        #[arg(long)]
        assign: Option<UserId>,

        #[arg(long)]
        project: Option<ProjectId>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Edit a task
    Edit {
        id: TaskId,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, value_enum)]
        status: Option<Status>,

        #[arg(long, value_enum)]
        priority: Option<Priority>,

        /// Move under another task
        #[arg(long, conflicts_with = "detach")]
        parent: Option<TaskId>,

        /// Make this a root task
        #[arg(long)]
        detach: bool,

        #[arg(long, conflicts_with = "unassign")]
        assign: Option<UserId>,

        #[arg(long)]
        unassign: bool,

        #[arg(long, conflicts_with = "no_project")]
        project: Option<ProjectId>,

        #[arg(long)]
        no_project: bool,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        #[arg(long)]
        clear_due: bool,
    },

    /// Delete a task with its subtasks and time entries
    Rm { id: TaskId },

    /// Set progress directly (0-100)
    Progress {
        id: TaskId,

        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Show a task with time totals
    Show { id: TaskId },

    /// List visible root tasks
    List {
        #[arg(long, value_enum)]
        status: Option<Status>,
    },

    /// List root tasks assigned to the actor
    Mine {
        #[arg(long, value_enum)]
        status: Option<Status>,
    },

    /// List the subtasks of a task
    Subtasks { id: TaskId },
}

/// Timer subcommands
#[derive(Subcommand, Debug)]
pub enum TimerCommands {
    /// Start a timer on a task
    Start {
        task: TaskId,

        #[arg(long)]
        description: Option<String>,
    },

    /// Stop the running timer of a task
    Stop { task: TaskId },

    /// List the actor's running timers
    Current,
}

/// Time entry subcommands
#[derive(Subcommand, Debug)]
pub enum EntryCommands {
    /// List the time entries of a task
    List { task: TaskId },

    /// Change an entry's description
    Edit {
        id: EntryId,

        #[arg(long, conflicts_with = "clear")]
        description: Option<String>,

        /// Remove the description
        #[arg(long)]
        clear: bool,
    },

    /// Delete a time entry
    Rm { id: EntryId },
}

/// Global flags shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: Option<PathBuf>,
    pub actor: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl Context {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Directory to start from: `--root` or the current directory.
    pub fn start_dir(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Storage at `--root`, or discovered upward from the current directory.
    pub fn storage(&self) -> Result<Storage> {
        match &self.root {
            Some(root) => Ok(Storage::new(root.clone())),
            None => Storage::discover(&self.start_dir()),
        }
    }

    /// Open the tracker and resolve the acting user.
    pub fn tracker(&self) -> Result<(Tracker, ActorRef)> {
        let storage = self.storage()?;
        let actor = crate::actor::resolve_actor(Some(&storage), self.actor.as_deref())?;
        let tracker = Tracker::open(storage)?;
        Ok((tracker, actor.parse()?))
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context {
            root: self.root,
            actor: self.actor,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init { name, email } => init::run(&ctx, init::InitOptions { name, email }),
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { actor } => actor::run_set(&ctx, &actor),
                ActorCommands::Show => actor::run_show(&ctx),
            },
            Commands::User(cmd) => match cmd {
                UserCommands::Add { name, email, admin } => {
                    user::run_add(&ctx, user::AddOptions { name, email, admin })
                }
                UserCommands::List => user::run_list(&ctx),
            },
            Commands::Project(cmd) => project::run(&ctx, cmd),
            Commands::Task(cmd) => task::run(&ctx, cmd),
            Commands::Timer(cmd) => timer::run_timer(&ctx, cmd),
            Commands::Entry(cmd) => timer::run_entry(&ctx, cmd),
            Commands::Dashboard => dashboard::run(&ctx),
        }
    }
}

/// `--x value` / `--clear-x` pair into the tri-state update form.
pub(crate) fn set_or_clear<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_progress_as_a_value() {
        let cli = Cli::try_parse_from(["wl", "task", "progress", "3", "-5"]).unwrap();
        match cli.command {
            Commands::Task(TaskCommands::Progress { id, value }) => {
                assert_eq!(id, 3);
                assert_eq!(value, -5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn set_or_clear_maps_flags() {
        assert_eq!(set_or_clear(Some(3), false), Some(Some(3)));
        assert_eq!(set_or_clear::<u8>(None, true), Some(None));
        assert_eq!(set_or_clear::<u8>(None, false), None);
    }
}
