//! Gates a publish run must pass
//!
//! - **guarded-paths**: the source checkout has no local edits to files the
//!   run depends on (the squash would discard them)
//! - **preflight**: operator-configured validation commands succeed
//! - **hidden-paths**: the squashed tree has no dot-prefixed paths that are
//!   not explicitly whitelisted

mod guarded_paths;
mod hidden_paths;
mod preflight;
mod trait_def;

pub use guarded_paths::GuardedPathsCheck;
pub use hidden_paths::HiddenPathsCheck;
pub use preflight::PreflightCheck;
pub use trait_def::{Check, CheckContext};

use crate::core::error::PublishResult;

/// Run checks in order, stopping at the first failure
pub fn run_checks(checks: &[&dyn Check], ctx: &CheckContext<'_>) -> PublishResult<()> {
  for check in checks {
    tracing::debug!(check = check.name(), "{}", check.description());
    check.run(ctx)?;
  }
  Ok(())
}
