//! System git backend
//!
//! Every operation is a `git -C <work tree>` subprocess with an isolated
//! environment, so user-level `GIT_*` variables cannot redirect the run.

use crate::core::error::{GitError, PublishError, PublishResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Variables passed through to git; everything else is cleared
const ENV_WHITELIST: &[&str] = &["PATH", "HOME", "SSH_AUTH_SOCK", "GIT_SSH_COMMAND"];

/// Git backend using system git
pub struct SystemGit {
  /// Working tree root
  pub(crate) work_tree: PathBuf,
}

impl SystemGit {
  /// Open the git repository containing `path`
  pub fn open(path: &Path) -> PublishResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") || stderr.contains("cannot change to") {
        return Err(PublishError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(PublishError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(Self {
      work_tree: PathBuf::from(stdout.trim()),
    })
  }

  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> PublishResult<String> {
    Ok(self.run(["rev-parse", "HEAD"])?.trim().to_string())
  }

  /// Get current branch name
  pub fn current_branch(&self) -> PublishResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string()); // Detached HEAD
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Run git with `args`, failing on a non-zero exit. Returns stdout.
  pub(crate) fn run<I, S>(&self, args: I) -> PublishResult<String>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
  {
    let args: Vec<std::ffi::OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let output = self.output(&args)?;
    if !output.status.success() {
      return Err(PublishError::Git(GitError::CommandFailed {
        command: describe(&args),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      }));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  /// Run git with `args` and hand back the raw output, whatever the exit status
  pub(crate) fn output(&self, args: &[std::ffi::OsString]) -> PublishResult<Output> {
    let command = describe(args);
    tracing::debug!(%command, "running git");
    self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute {}", command))
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Runs against the work tree
  /// - Clears environment variables except a short whitelist
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.work_tree);

    cmd.env_clear();
    for key in ENV_WHITELIST {
      if let Ok(value) = std::env::var(key) {
        cmd.env(key, value);
      }
    }

    // Force safe behavior (override user config)
    cmd.arg("-c").arg("protocol.version=2");
    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false"); // Don't escape non-ASCII

    cmd
  }
}

fn describe(args: &[std::ffi::OsString]) -> String {
  let mut parts = vec!["git".to_string()];
  parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
  parts.join(" ")
}
