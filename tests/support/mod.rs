#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "ada@example.com";

/// Temporary tracker root driven through the `wl` binary.
pub struct TestTracker {
    dir: TempDir,
}

impl TestTracker {
    /// Empty directory, not yet initialized.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// Initialized tracker whose admin is Ada.
    pub fn init() -> Self {
        let tracker = Self::empty();
        tracker
            .wl()
            .args(["init", "--name", "Ada", "--email", ADMIN_EMAIL])
            .assert()
            .success();
        tracker
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `wl` rooted at this tracker with no inherited actor.
    pub fn wl(&self) -> Command {
        let mut cmd = wl_cmd();
        cmd.arg("--root").arg(self.dir.path());
        cmd.env_remove("WL_ACTOR");
        cmd.env_remove("WL_ROOT");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// `wl` acting as the given user id or email.
    pub fn wl_as(&self, actor: &str) -> Command {
        let mut cmd = self.wl();
        cmd.args(["--actor", actor]);
        cmd
    }

    /// Run a command with `--json` and return the `data` payload.
    pub fn json(&self, actor: &str, args: &[&str]) -> Value {
        let output = self
            .wl_as(actor)
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let envelope: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    /// Run a command with `--json` that must fail and return the whole envelope.
    pub fn json_err(&self, actor: &str, args: &[&str], code: i32) -> Value {
        let output = self
            .wl_as(actor)
            .arg("--json")
            .args(args)
            .assert()
            .code(code)
            .get_output()
            .stdout
            .clone();
        let envelope: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(envelope["status"], "error");
        envelope
    }

    /// Create a task as the admin and return its id.
    pub fn new_task(&self, name: &str, extra: &[&str]) -> u64 {
        let mut args = vec!["task", "new", name];
        args.extend_from_slice(extra);
        let data = self.json(ADMIN_EMAIL, &args);
        data["task"]["id"].as_u64().expect("task id")
    }

    /// Register a regular user as the admin and return its id.
    pub fn add_user(&self, name: &str, email: &str) -> u64 {
        let data = self.json(
            ADMIN_EMAIL,
            &["user", "add", "--name", name, "--email", email],
        );
        data["id"].as_u64().expect("user id")
    }

    pub fn task(&self, id: u64) -> Value {
        self.json(ADMIN_EMAIL, &["task", "show", &id.to_string()])
    }
}

pub fn wl_cmd() -> Command {
    Command::cargo_bin("wl").expect("wl binary")
}
