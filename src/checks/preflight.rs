//! Operator-supplied validation commands run before anything is mutated

use super::trait_def::{Check, CheckContext};
use crate::core::error::{PublishError, PublishResult, ResultExt, ValidationError};
use std::process::Command;

pub struct PreflightCheck {
  pub commands: Vec<String>,
}

impl Check for PreflightCheck {
  fn name(&self) -> &str {
    "preflight"
  }

  fn description(&self) -> &str {
    "Runs the configured package metadata validators"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> PublishResult<()> {
    for command in &self.commands {
      println!("   ▶ {}", command);
      tracing::debug!(%command, cwd = %ctx.root().display(), "running preflight command");

      let output = shell(command)
        .current_dir(ctx.root())
        .output()
        .with_context(|| format!("Failed to execute preflight command `{}`", command))?;

      if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PublishError::Validation(ValidationError::PreflightFailed {
          command: command.clone(),
          output: format!("{}\n{}", stdout, stderr).trim().to_string(),
        }));
      }
    }
    Ok(())
  }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
  let mut cmd = Command::new("sh");
  cmd.arg("-c").arg(command);
  cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
  let mut cmd = Command::new("cmd");
  cmd.arg("/C").arg(command);
  cmd
}
