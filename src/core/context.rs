//! Run context - build once, pass everywhere
//!
//! `PublishContext` bundles the opened source repository with the merged
//! settings so the controller, checks and orchestrator all read the same
//! resolved paths.

use crate::core::config::{Overrides, PublishConfig, PublishSettings};
use crate::core::error::PublishResult;
use crate::core::vcs::SystemGit;
use std::path::{Path, PathBuf};

pub struct PublishContext {
  /// Source repository
  pub git: SystemGit,

  /// Merged command line and publish.toml settings
  pub settings: PublishSettings,

  /// Absolute packages directory inside the working tree
  pub packages_dir: PathBuf,
}

impl PublishContext {
  /// Open the source repository, load its config and merge the command line over it
  pub fn build(overrides: Overrides, config_path: Option<&Path>) -> PublishResult<Self> {
    let git = SystemGit::open(&overrides.source_repo)?;
    let config = PublishConfig::load_or_default(git.work_tree(), config_path)?;
    let settings = config.merge(overrides)?;
    Ok(Self::new(git, settings))
  }

  pub fn new(git: SystemGit, settings: PublishSettings) -> Self {
    let packages_dir = git.work_tree().join(&settings.packages_path);
    Self {
      git,
      settings,
      packages_dir,
    }
  }

  /// Working tree root (convenience)
  pub fn root(&self) -> &Path {
    self.git.work_tree()
  }

  /// Packages directory relative to the working tree root, for staging
  pub fn packages_rel(&self) -> PathBuf {
    self
      .packages_dir
      .strip_prefix(self.root())
      .map(Path::to_path_buf)
      .unwrap_or_else(|_| self.settings.packages_path.clone())
  }
}
