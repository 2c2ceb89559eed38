//! `git` subprocess runner.
//!
//! Working-tree mutations, remotes and scratch-index tree writes go through
//! the git CLI because gix has no high-level API for them. Every invocation
//! scrubs repository-selecting environment variables inherited from the
//! parent process and pins the commit identity.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::error::GitError;
use crate::types::Identity;

/// Variables that would redirect git away from `dir`.
const SCRUBBED_ENV: &[&str] = &[
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_OBJECT_DIRECTORY",
    "GIT_ALTERNATE_OBJECT_DIRECTORIES",
    "GIT_NAMESPACE",
    "GIT_PREFIX",
];

/// A configured `git` invocation rooted at one directory.
pub(crate) struct Git<'a> {
    dir: &'a Path,
    identity: &'a Identity,
    envs: Vec<(&'static str, OsString)>,
}

impl<'a> Git<'a> {
    pub(crate) const fn new(dir: &'a Path, identity: &'a Identity) -> Self {
        Self {
            dir,
            identity,
            envs: Vec::new(),
        }
    }

    /// Set an extra environment variable for this invocation.
    pub(crate) fn env(mut self, key: &'static str, value: impl Into<OsString>) -> Self {
        self.envs.push((key, value.into()));
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        for key in SCRUBBED_ENV {
            cmd.env_remove(key);
        }
        cmd.args(["-c", "commit.gpgsign=false", "-c", "core.quotepath=false"])
            .args(args)
            .current_dir(self.dir)
            .env("GIT_AUTHOR_NAME", &self.identity.name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.email)
            .env("GIT_COMMITTER_NAME", &self.identity.name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.email)
            .env("GIT_TERMINAL_PROMPT", "0");
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run and return stdout.
    pub(crate) fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.command(args).stdin(Stdio::null()).output()?;
        finish(args, &output)
    }

    /// Run with `input` on stdin and return stdout.
    pub(crate) fn run_with_input(&self, args: &[&str], input: &[u8]) -> Result<String, GitError> {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input)?;
        }
        let output = child.wait_with_output()?;
        finish(args, &output)
    }

    /// Run and parse the first line of stdout as an object id.
    pub(crate) fn run_oid(&self, args: &[&str]) -> Result<crate::GitOid, GitError> {
        let out = self.run(args)?;
        Ok(out.lines().next().unwrap_or_default().parse()?)
    }
}

fn finish(args: &[&str], output: &Output) -> Result<String, GitError> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let command = format!("git {}", args.join(" "));
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        tracing::debug!(%command, %stderr, "git command failed");
        Err(GitError::CommandFailed {
            command,
            stderr,
            exit_code: output.status.code(),
        })
    }
}
