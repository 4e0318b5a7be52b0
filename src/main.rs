//! wl - project and task tracking from the command line
//!
//! Tasks nest into sub-tasks whose progress rolls up to their ancestors,
//! timers record work per task, and every command runs against a
//! lock-guarded state file under `.worklog/`.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use worklog::cli::Cli;
use worklog::output::{emit_error, infer_command_name_from_args};

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();

    // Tracing is opt-in via RUST_LOG or --verbose.
    // Ignore invalid or huge filters so startup never fails on them.
    let filter = if cli.verbose {
        EnvFilter::new("worklog=debug")
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|raw| {
                let raw = raw.trim();
                if raw.is_empty() || raw.len() > 4096 {
                    return None;
                }
                EnvFilter::try_new(raw).ok()
            })
            .unwrap_or_else(|| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
