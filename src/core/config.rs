use crate::core::error::{ConfigError, PublishError, PublishResult, ResultExt};
use crate::release::graph::DependencyEdge;
use crate::release::version::BumpKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "publish.toml";
pub const DEFAULT_WORK_BRANCH: &str = "publish-stable-temp";
pub const DEFAULT_REGISTRY_TOOL: &str = "npm";
pub const DEFAULT_VENDOR_DIR: &str = "node_modules";

/// Optional `publish.toml` in the source repository
///
/// Every field can also be given on the command line. Lists from both sources
/// are concatenated, scalars from the command line win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
  pub publish_registry: Option<String>,
  pub view_registries: Vec<String>,
  pub target_repo: Option<String>,
  pub target_branch: Option<String>,
  pub packages_path: Option<PathBuf>,
  pub strip_from_commit: Vec<String>,
  pub whitelist_hidden_paths: Vec<String>,
  pub add_packages_to_manifest: Vec<String>,
  /// `dependent:dependency` pairs
  pub manual_dependencies: Vec<String>,
  /// Commands run in the source checkout before anything is mutated
  pub preflight: Vec<String>,
  /// Files that must not carry local modifications (default: publish.toml)
  pub guarded_paths: Option<Vec<String>>,
  pub registry_tool: Option<String>,
  pub work_branch: Option<String>,
  pub vendor_dir: Option<String>,
  /// Glob (relative to the repository root) of manifest copies to keep in sync
  pub manifest_pattern: Option<String>,
  pub bump: Option<BumpKind>,
  pub only_publish_existing_packages: bool,
}

impl PublishConfig {
  /// Locate the config file: explicit path, else `publish.toml` in the repo root
  pub fn find_config_path(repo_root: &Path, explicit: Option<&Path>) -> PublishResult<Option<PathBuf>> {
    match explicit {
      Some(path) => {
        let path = if path.is_absolute() {
          path.to_path_buf()
        } else {
          repo_root.join(path)
        };
        if !path.is_file() {
          return Err(PublishError::Config(ConfigError::NotFound { path }));
        }
        Ok(Some(path))
      }
      None => {
        let candidate = repo_root.join(CONFIG_FILE);
        Ok(candidate.is_file().then_some(candidate))
      }
    }
  }

  /// Load config from a TOML file
  pub fn load(config_path: &Path) -> PublishResult<Self> {
    let content = fs::read_to_string(config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: PublishConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;
    Ok(config)
  }

  /// Load the config if there is one, else an empty config
  pub fn load_or_default(repo_root: &Path, explicit: Option<&Path>) -> PublishResult<Self> {
    match Self::find_config_path(repo_root, explicit)? {
      Some(path) => {
        tracing::debug!(path = %path.display(), "loading config");
        Self::load(&path)
      }
      None => Ok(Self::default()),
    }
  }

  /// Combine with command-line values into the settings for one run
  pub fn merge(self, cli: Overrides) -> PublishResult<PublishSettings> {
    let required = |value: Option<String>, field: &str| {
      value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        PublishError::Config(ConfigError::MissingField {
          field: field.to_string(),
        })
      })
    };

    let publish_registry = required(cli.publish_registry.or(self.publish_registry), "publish_registry")?;
    let target_repo = required(cli.target_repo.or(self.target_repo), "target_repo")?;
    let target_branch = required(cli.target_branch.or(self.target_branch), "target_branch")?;
    let packages_path = cli
      .packages_path
      .or(self.packages_path)
      .filter(|p| !p.as_os_str().is_empty())
      .ok_or_else(|| {
        PublishError::Config(ConfigError::MissingField {
          field: "packages_path".to_string(),
        })
      })?;

    let manual_dependencies = self
      .manual_dependencies
      .iter()
      .chain(cli.manual_dependencies.iter())
      .map(|edge| edge.parse::<DependencyEdge>())
      .collect::<PublishResult<Vec<_>>>()?;

    let mut guarded_paths = self
      .guarded_paths
      .unwrap_or_else(|| vec![CONFIG_FILE.to_string()]);
    guarded_paths.extend(cli.guarded_paths);

    Ok(PublishSettings {
      source_repo: cli.source_repo,
      publish_registry,
      view_registries: concat(self.view_registries, cli.view_registries),
      target_repo,
      target_branch,
      packages_path,
      add_packages_to_manifest: concat(self.add_packages_to_manifest, cli.add_packages_to_manifest),
      manual_dependencies,
      strip_from_commit: concat(self.strip_from_commit, cli.strip_from_commit),
      whitelist_hidden_paths: concat(self.whitelist_hidden_paths, cli.whitelist_hidden_paths),
      only_publish_existing_packages: cli.only_publish_existing_packages || self.only_publish_existing_packages,
      dry_run: cli.dry_run,
      bump: cli.bump.or(self.bump).unwrap_or_default(),
      preflight: concat(self.preflight, cli.preflight),
      guarded_paths,
      registry_tool: cli
        .registry_tool
        .or(self.registry_tool)
        .unwrap_or_else(|| DEFAULT_REGISTRY_TOOL.to_string()),
      work_branch: self.work_branch.unwrap_or_else(|| DEFAULT_WORK_BRANCH.to_string()),
      vendor_dir: self.vendor_dir.unwrap_or_else(|| DEFAULT_VENDOR_DIR.to_string()),
      manifest_pattern: self.manifest_pattern,
    })
  }
}

fn concat(mut base: Vec<String>, extra: Vec<String>) -> Vec<String> {
  for item in extra {
    if !base.contains(&item) {
      base.push(item);
    }
  }
  base
}

/// Values taken from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub source_repo: PathBuf,
  pub publish_registry: Option<String>,
  pub view_registries: Vec<String>,
  pub target_repo: Option<String>,
  pub target_branch: Option<String>,
  pub packages_path: Option<PathBuf>,
  pub add_packages_to_manifest: Vec<String>,
  pub manual_dependencies: Vec<String>,
  pub strip_from_commit: Vec<String>,
  pub whitelist_hidden_paths: Vec<String>,
  pub only_publish_existing_packages: bool,
  pub dry_run: bool,
  pub bump: Option<BumpKind>,
  pub preflight: Vec<String>,
  pub guarded_paths: Vec<String>,
  pub registry_tool: Option<String>,
}

/// Fully resolved settings for one publish run
#[derive(Debug, Clone)]
pub struct PublishSettings {
  pub source_repo: PathBuf,
  pub publish_registry: String,
  pub view_registries: Vec<String>,
  pub target_repo: String,
  pub target_branch: String,
  /// Relative to the repository root
  pub packages_path: PathBuf,
  pub add_packages_to_manifest: Vec<String>,
  pub manual_dependencies: Vec<DependencyEdge>,
  pub strip_from_commit: Vec<String>,
  pub whitelist_hidden_paths: Vec<String>,
  pub only_publish_existing_packages: bool,
  pub dry_run: bool,
  pub bump: BumpKind,
  pub preflight: Vec<String>,
  pub guarded_paths: Vec<String>,
  pub registry_tool: String,
  pub work_branch: String,
  pub vendor_dir: String,
  pub manifest_pattern: Option<String>,
}

impl PublishSettings {
  /// Registries consulted for current versions; the publish registry when none are configured
  pub fn view_registries(&self) -> Vec<String> {
    if self.view_registries.is_empty() {
      vec![self.publish_registry.clone()]
    } else {
      self.view_registries.clone()
    }
  }

  /// Names that appear as the dependency side of a manual edge
  pub fn tracked_dependencies(&self) -> std::collections::BTreeSet<String> {
    self
      .manual_dependencies
      .iter()
      .map(|edge| edge.dependency.clone())
      .collect()
  }

  /// Manual dependencies declared for one package
  pub fn manual_dependencies_of(&self, package: &str) -> Vec<&str> {
    self
      .manual_dependencies
      .iter()
      .filter(|edge| edge.dependent == package)
      .map(|edge| edge.dependency.as_str())
      .collect()
  }

  /// Glob locating copies of the project manifest, relative to the repo root
  pub fn manifest_pattern(&self) -> String {
    if let Some(pattern) = &self.manifest_pattern {
      return pattern.clone();
    }
    let dir_name = self
      .packages_path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "Packages".to_string());
    format!("**/{}/manifest.json", dir_name)
  }
}
