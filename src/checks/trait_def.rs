//! Check trait abstraction for the gates a publish run must pass
//!
//! A check either passes or returns the error that aborts the run. Checks run
//! against a git checkout and must not modify it.

use crate::core::error::PublishResult;
use crate::core::vcs::SystemGit;
use std::path::Path;

/// Context passed to checks
pub struct CheckContext<'a> {
  pub git: &'a SystemGit,
}

impl<'a> CheckContext<'a> {
  pub fn new(git: &'a SystemGit) -> Self {
    Self { git }
  }

  /// Root of the checked working tree
  pub fn root(&self) -> &Path {
    self.git.work_tree()
  }
}

/// A gate in front of (or inside) a publish run
pub trait Check {
  /// Unique name for this check (kebab-case)
  fn name(&self) -> &str;

  /// Human-readable description of what this check validates
  fn description(&self) -> &str;

  /// Run the check; an error aborts the run
  fn run(&self, ctx: &CheckContext<'_>) -> PublishResult<()>;
}
