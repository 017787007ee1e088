//! Flatten the source repository into a single release commit
//!
//! The release commit is built on a scratch branch that either tracks the
//! target branch of the distribution repository or starts with no history.
//! Its tree is the source tree (minus stripped and hidden paths) after the
//! orchestrator has replaced package sources with manifest references.
//!
//! # Steps
//!
//! 1. Guarded paths and pre-flight commands
//! 2. Reconcile and fetch the `target` remote
//! 3. Recreate the work branch
//! 4. Squash the source tree into a placeholder commit
//! 5. Publish packages (or republish existing ones)
//! 6. Copy the project manifest to every other manifest location
//! 7. Amend the placeholder into `Release N`, refuse an empty release, push
//!
//! Whatever happens, the source branch is checked out again at the end.

use crate::checks::{Check, CheckContext, GuardedPathsCheck, HiddenPathsCheck, PreflightCheck, run_checks};
use crate::core::context::PublishContext;
use crate::core::error::{ConfigError, ConsistencyError, PublishError, PublishResult, ResultExt};
use crate::core::vcs::TARGET_REMOTE;
use crate::registry::PackageRegistry;
use crate::release::manifest::MANIFEST_FILE;
use crate::release::orchestrator::{Orchestrator, PublishSummary, discover_packages};
use crate::release::republish::republish_existing;
use std::fs;
use std::path::{Path, PathBuf};

pub const SQUASH_MESSAGE: &str = "Current squash";

/// What a flatten run produced
#[derive(Debug)]
pub struct FlattenReport {
  pub summary: PublishSummary,
  pub commit_message: String,
  pub pushed: bool,
}

pub struct FlattenController<'a, R: PackageRegistry + ?Sized> {
  ctx: &'a PublishContext,
  registry: &'a R,
}

impl<'a, R: PackageRegistry + ?Sized> FlattenController<'a, R> {
  pub fn new(ctx: &'a PublishContext, registry: &'a R) -> Self {
    Self { ctx, registry }
  }

  pub fn run(&self) -> PublishResult<FlattenReport> {
    let git = &self.ctx.git;
    let branch = git.current_branch()?;
    if branch == self.ctx.settings.work_branch {
      return Err(PublishError::Consistency(ConsistencyError::Invalid {
        reason: format!(
          "The source checkout is on the work branch '{}'; check out the branch to publish from",
          branch
        ),
      }));
    }
    let source_ref = if branch == "HEAD" { git.head_commit()? } else { branch };

    let result = self.run_steps(&source_ref);
    self.restore_source(&source_ref);
    result
  }

  fn run_steps(&self, source_ref: &str) -> PublishResult<FlattenReport> {
    let git = &self.ctx.git;
    let settings = &self.ctx.settings;
    let check_ctx = CheckContext::new(git);

    println!("🔍 Running pre-flight checks...");
    let guarded = GuardedPathsCheck {
      paths: settings.guarded_paths.clone(),
    };
    let preflight = PreflightCheck {
      commands: settings.preflight.clone(),
    };
    let gates: [&dyn Check; 2] = [&guarded, &preflight];
    run_checks(&gates, &check_ctx)?;

    println!("🔗 Fetching {} ({})", TARGET_REMOTE, settings.target_repo);
    git.ensure_remote(TARGET_REMOTE, &settings.target_repo)?;
    git.fetch(TARGET_REMOTE)?;
    let target_exists = git.remote_branch_exists(TARGET_REMOTE, &settings.target_branch)?;
    if !target_exists {
      println!("   ℹ️  {} has no branch '{}' yet, starting fresh", TARGET_REMOTE, settings.target_branch);
    }

    self.prepare_work_branch(source_ref, target_exists)?;

    println!("🗜️  Squashing {} into {}", source_ref, settings.work_branch);
    self.squash(source_ref, &check_ctx)?;

    let summary = self.publish_packages()?;
    git.add_path(&self.ctx.packages_rel())?;
    self.scatter_manifest()?;

    let commit_message = if target_exists {
      let upstream = format!("{}/{}", TARGET_REMOTE, settings.target_branch);
      next_release_message(&git.log_messages(&upstream)?)
    } else {
      next_release_message("")
    };
    git.commit(&commit_message, true, true)?;
    println!("📝 Committed '{}'", commit_message);

    if target_exists && git.head_diff_is_empty()? {
      return Err(PublishError::NothingToPush {
        target_branch: settings.target_branch.clone(),
      });
    }

    if settings.dry_run {
      println!("🔍 Dry run: not pushing to {}/{}", TARGET_REMOTE, settings.target_branch);
      return Ok(FlattenReport {
        summary,
        commit_message,
        pushed: false,
      });
    }

    println!("⬆️  Pushing to {}/{}", TARGET_REMOTE, settings.target_branch);
    git.push(TARGET_REMOTE, &settings.work_branch, &settings.target_branch)?;
    println!("   ✅ Pushed");

    Ok(FlattenReport {
      summary,
      commit_message,
      pushed: true,
    })
  }

  fn prepare_work_branch(&self, source_ref: &str, target_exists: bool) -> PublishResult<()> {
    let git = &self.ctx.git;
    let settings = &self.ctx.settings;

    git.checkout(source_ref)?;
    if git.local_branch_exists(&settings.work_branch)? {
      tracing::debug!(branch = %settings.work_branch, "deleting stale work branch");
      git.delete_branch(&settings.work_branch)?;
    }

    if target_exists {
      let upstream = format!("{}/{}", TARGET_REMOTE, settings.target_branch);
      git.checkout_tracking(&settings.work_branch, &upstream)
    } else {
      git.checkout_orphan(&settings.work_branch)
    }
  }

  fn squash(&self, source_ref: &str, check_ctx: &CheckContext<'_>) -> PublishResult<()> {
    let git = &self.ctx.git;
    let settings = &self.ctx.settings;
    let root = self.ctx.root();

    let mut removed = Vec::new();
    for entry in fs::read_dir(root)? {
      let entry = entry?;
      let name = entry.file_name().to_string_lossy().into_owned();
      if name == ".git" {
        continue;
      }
      remove_path(&entry.path())?;
      removed.push(name);
    }
    git.remove_cached(&removed)?;
    git.checkout_tree_from(source_ref)?;

    for pattern in &settings.strip_from_commit {
      for path in glob_under(root, pattern)? {
        tracing::debug!(path = %path.display(), "stripping");
        remove_path(&path)?;
      }
    }

    let hidden = HiddenPathsCheck {
      whitelist: settings.whitelist_hidden_paths.clone(),
    };
    hidden.run(check_ctx)?;

    git.add_all()?;
    git.commit(SQUASH_MESSAGE, false, true)
  }

  fn publish_packages(&self) -> PublishResult<PublishSummary> {
    let settings = &self.ctx.settings;
    let packages = discover_packages(&self.ctx.packages_dir)?;

    if packages.is_empty() {
      if !settings.only_publish_existing_packages {
        return Err(PublishError::Config(ConfigError::InvalidValue {
          field: "packages_path".to_string(),
          value: format!("{} (no packages found)", settings.packages_path.display()),
        }));
      }
      return republish_existing(self.registry, settings, &self.ctx.packages_dir);
    }

    Orchestrator::new(self.registry, settings, &self.ctx.packages_dir).run(&packages)
  }

  /// Copy the project manifest over every other manifest matching the pattern
  fn scatter_manifest(&self) -> PublishResult<()> {
    let root = self.ctx.root();
    let main = self.ctx.packages_dir.join(MANIFEST_FILE);

    for copy in glob_under(root, &self.ctx.settings.manifest_pattern())? {
      if same_file(&copy, &main) {
        continue;
      }
      fs::copy(&main, &copy).with_context(|| format!("Failed to update {}", copy.display()))?;
      let rel = copy.strip_prefix(root)?;
      self.ctx.git.add_path(rel)?;
      println!("   📋 Updated {}", rel.display());
    }
    Ok(())
  }

  /// Best-effort return to the source branch
  ///
  /// Leaves the checkout alone when the run never left the source, so local
  /// edits that made an early gate fail survive.
  fn restore_source(&self, source_ref: &str) {
    let git = &self.ctx.git;
    let on_source = match git.current_branch() {
      Ok(branch) if branch == source_ref => true,
      Ok(branch) if branch == "HEAD" => git.head_commit().is_ok_and(|sha| sha == source_ref),
      _ => false,
    };
    if on_source {
      return;
    }
    if let Err(e) = git.checkout_force(source_ref) {
      tracing::warn!("failed to check out {} after the run: {}", source_ref, e);
      eprintln!("⚠️  Could not check out '{}' again: {}", source_ref, e);
    }
  }
}

/// `Release N+1` where N is the newest `Release <N>` message in `log`
pub fn next_release_message(log: &str) -> String {
  let latest = regex::Regex::new(r"(?m)^Release (\d+)\s*$")
    .ok()
    .and_then(|re| re.captures(log).and_then(|c| c[1].parse::<u64>().ok()));
  format!("Release {}", latest.unwrap_or(0) + 1)
}

fn glob_under(root: &Path, pattern: &str) -> PublishResult<Vec<PathBuf>> {
  let full = format!(
    "{}/{}",
    glob::Pattern::escape(&root.to_string_lossy()),
    pattern.trim_start_matches("./")
  );
  let mut matches = Vec::new();
  for entry in glob::glob(&full)? {
    matches.push(entry.map_err(|e| PublishError::from(e.into_error()))?);
  }
  Ok(matches)
}

fn remove_path(path: &Path) -> PublishResult<()> {
  // Overlapping globs may already have removed it with a parent
  let meta = match fs::symlink_metadata(path) {
    Ok(meta) => meta,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(e.into()),
  };
  if meta.is_dir() {
    fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))
  } else {
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))
  }
}

fn same_file(a: &Path, b: &Path) -> bool {
  match (a.canonicalize(), b.canonicalize()) {
    (Ok(a), Ok(b)) => a == b,
    _ => a == b,
  }
}
