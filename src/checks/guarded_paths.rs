//! Refuse to run while the tool's own inputs have local modifications
//!
//! The squash wipes the working tree, so unstaged edits to files such as
//! `publish.toml` would silently disappear.

use super::trait_def::{Check, CheckContext};
use crate::core::error::{ConsistencyError, PublishError, PublishResult};

pub struct GuardedPathsCheck {
  pub paths: Vec<String>,
}

impl Check for GuardedPathsCheck {
  fn name(&self) -> &str {
    "guarded-paths"
  }

  fn description(&self) -> &str {
    "Checks that guarded files have no local modifications"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> PublishResult<()> {
    if self.paths.is_empty() {
      return Ok(());
    }

    let modified = ctx.git.modified_files()?;
    let offending = guarded_modifications(&self.paths, &modified);
    if offending.is_empty() {
      return Ok(());
    }

    Err(PublishError::Consistency(ConsistencyError::SelfModification { paths: offending }))
  }
}

/// Modified paths that are guarded, either exactly or by living under a guarded directory
pub fn guarded_modifications(guarded: &[String], modified: &[String]) -> Vec<String> {
  modified
    .iter()
    .filter(|path| {
      guarded.iter().any(|g| {
        let g = g.trim_start_matches("./").trim_end_matches('/');
        path.as_str() == g || path.starts_with(&format!("{}/", g))
      })
    })
    .cloned()
    .collect()
}
