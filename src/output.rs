//! Shared output formatting for wl commands.
//!
//! Every command renders either a human report (header, summary, details,
//! warnings, next steps) or, with `--json`, one envelope:
//! `{schema_version, command, status, data | error, warnings, next_steps}`.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "worklog.v1";

/// Global flags that take a separate value argument.
const VALUE_FLAGS: &[&str] = &["--root", "--actor"];

/// Command groups whose subcommand is part of the command name.
const GROUPS: &[&str] = &["actor", "user", "project", "task", "timer", "entry"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

fn print_json<T: Serialize>(envelope: &Envelope<'_, T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        return print_json(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(data),
            error: None,
            warnings: human.map_or(&[][..], |h| h.warnings.as_slice()),
            next_steps: human.map_or(&[][..], |h| h.next_steps.as_slice()),
        });
    }

    if let (false, Some(human)) = (options.quiet, human) {
        println!("{}", format_human(human));
    }
    Ok(())
}

/// Report a failed command: the JSON envelope on stdout, or `error:` and
/// one hint on stderr.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        return print_json::<()>(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(JsonError::from(err)),
            warnings: &[],
            next_steps: &next_steps,
        });
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    if !output.summary.is_empty() {
        lines.push(String::new());
        lines.push("Summary:".to_string());
        for (key, value) in &output.summary {
            lines.push(if value.is_empty() {
                format!("- {key}")
            } else {
                format!("- {key}: {value}")
            });
        }
    }
    for (title, items) in [
        ("Details", &output.details),
        ("Warnings", &output.warnings),
        ("Next steps", &output.next_steps),
    ] {
        if items.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{title}:"));
        lines.extend(items.iter().map(|item| format!("- {item}")));
    }

    lines.join("\n")
}

/// Best-effort command name ("task new", "dashboard") for error envelopes
/// emitted before or without a parsed CLI.
pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut words = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            words.push(arg);
            if words.len() == 2 {
                break;
            }
        }
    }

    match words.as_slice() {
        [] => "wl".to_string(),
        [group, sub] if GROUPS.contains(&group.as_str()) => format!("{group} {sub}"),
        [command, ..] => command.clone(),
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::NotInitialized(_) => vec!["wl init --name <name> --email <email>".to_string()],
        Error::Unauthorized { .. } => vec!["wl actor show".to_string()],
        Error::AlreadyRunning { task_id, .. } => vec![format!("wl timer stop {task_id}")],
        Error::NoRunningEntry(task_id) => vec![format!("wl timer start {task_id}")],
        Error::InvalidConfig(_) => vec!["fix .worklog.toml then retry".to_string()],
        Error::LockFailed(_) => vec!["retry once the other wl command finishes".to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn human_output_lists_sections_in_order() {
        let mut human = HumanOutput::new("wl task show: 3");
        human.push_summary("progress", "33%");
        human.push_summary("parent", "");
        human.push_detail("a [completed]");
        human.push_warning("progress propagation abandoned");
        human.push_next_step("wl task subtasks 3");

        let text = format_human(&human);
        let expected = "wl task show: 3\n\nSummary:\n- progress: 33%\n- parent\n\nDetails:\n- a [completed]\n\nWarnings:\n- progress propagation abandoned\n\nNext steps:\n- wl task subtasks 3";
        assert_eq!(text, expected);
    }

    #[test]
    fn command_name_skips_global_flag_values() {
        assert_eq!(
            command_name(args(&["--root", "/tmp/t", "--json", "task", "new", "x"])),
            "task new"
        );
        assert_eq!(
            command_name(args(&["--actor", "ada@example.com", "dashboard"])),
            "dashboard"
        );
        assert_eq!(command_name(args(&["timer", "3"])), "timer 3");
        assert_eq!(command_name(args(&[])), "wl");
    }

    #[test]
    fn timer_conflicts_suggest_the_opposite_command() {
        let err = Error::AlreadyRunning {
            task_id: 4,
            entry_id: 9,
        };
        assert_eq!(error_next_steps(&err), vec!["wl timer stop 4".to_string()]);
    }
}
