//! Error types for stable-publish with contextual messages and exit codes
//!
//! Every fatal condition of a publish run maps to one `PublishError` variant.
//! Each category carries its own exit code so CI can tell a broken
//! configuration from a registry outage or from "nothing to release".

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for stable-publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, registry, network, I/O)
  System = 2,
  /// Validation or consistency failure
  Validation = 3,
  /// The squashed commit had no changes, nothing was pushed
  NothingToPush = 4,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for stable-publish
#[derive(Debug)]
pub enum PublishError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// Registry command and download errors
  Registry(RegistryError),

  /// Malformed semantic versions
  Version(VersionError),

  /// Manifests or working tree not in the state the run requires
  Consistency(ConsistencyError),

  /// Pre-flight validation failures
  Validation(ValidationError),

  /// The release commit is identical to the previous release
  NothingToPush { target_branch: String },

  /// I/O errors
  Io(io::Error),

  /// A categorized error with the step it happened in
  Contextual {
    source: Box<PublishError>,
    context: String,
  },

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl PublishError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    PublishError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    PublishError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      PublishError::Message { message, context, help } => PublishError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      PublishError::Io(err) => PublishError::Message {
        message: format!("I/O error: {}", err),
        context: Some(ctx_str),
        help: None,
      },
      other => PublishError::Contextual {
        source: Box::new(other),
        context: ctx_str,
      },
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      PublishError::Config(_) => ExitCode::User,
      PublishError::Git(_) => ExitCode::System,
      PublishError::Registry(_) => ExitCode::System,
      PublishError::Version(_) => ExitCode::Validation,
      PublishError::Consistency(_) => ExitCode::Validation,
      PublishError::Validation(_) => ExitCode::Validation,
      PublishError::NothingToPush { .. } => ExitCode::NothingToPush,
      PublishError::Io(_) => ExitCode::System,
      PublishError::Contextual { source, .. } => source.exit_code(),
      PublishError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      PublishError::Config(e) => e.help_message(),
      PublishError::Git(e) => e.help_message(),
      PublishError::Registry(e) => e.help_message(),
      PublishError::Consistency(e) => e.help_message(),
      PublishError::Validation(e) => e.help_message(),
      PublishError::Version(_) => {
        Some("Versions must look like 1.2.3 or 1.2.3-preview.N with N a positive integer.".to_string())
      }
      PublishError::Contextual { source, .. } => source.help_message(),
      PublishError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for PublishError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PublishError::Config(e) => write!(f, "{}", e),
      PublishError::Git(e) => write!(f, "{}", e),
      PublishError::Registry(e) => write!(f, "{}", e),
      PublishError::Version(e) => write!(f, "{}", e),
      PublishError::Consistency(e) => write!(f, "{}", e),
      PublishError::Validation(e) => write!(f, "{}", e),
      PublishError::NothingToPush { target_branch } => write!(
        f,
        "Nothing has changed since the last release on '{}'. Won't push an empty release",
        target_branch
      ),
      PublishError::Io(e) => write!(f, "I/O error: {}", e),
      PublishError::Contextual { source, context } => write!(f, "{}\n{}", source, context),
      PublishError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for PublishError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      PublishError::Io(e) => Some(e),
      PublishError::Contextual { source, .. } => Some(source.as_ref()),
      _ => None,
    }
  }
}

impl From<io::Error> for PublishError {
  fn from(err: io::Error) -> Self {
    PublishError::Io(err)
  }
}

impl From<String> for PublishError {
  fn from(msg: String) -> Self {
    PublishError::message(msg)
  }
}

impl From<&str> for PublishError {
  fn from(msg: &str) -> Self {
    PublishError::message(msg)
  }
}

impl From<serde_json::Error> for PublishError {
  fn from(err: serde_json::Error) -> Self {
    PublishError::message(format!("JSON error: {}", err))
  }
}

impl From<toml_edit::de::Error> for PublishError {
  fn from(err: toml_edit::de::Error) -> Self {
    PublishError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<glob::PatternError> for PublishError {
  fn from(err: glob::PatternError) -> Self {
    PublishError::Config(ConfigError::InvalidValue {
      field: "glob pattern".to_string(),
      value: err.msg.to_string(),
    })
  }
}

impl From<std::path::StripPrefixError> for PublishError {
  fn from(err: std::path::StripPrefixError) -> Self {
    PublishError::message(format!("Path strip prefix error: {}", err))
  }
}

impl From<VersionError> for PublishError {
  fn from(err: VersionError) -> Self {
    PublishError::Version(err)
  }
}

impl From<RegistryError> for PublishError {
  fn from(err: RegistryError) -> Self {
    PublishError::Registry(err)
  }
}

impl From<GitError> for PublishError {
  fn from(err: GitError) -> Self {
    PublishError::Git(err)
  }
}

impl From<ConsistencyError> for PublishError {
  fn from(err: ConsistencyError) -> Self {
    PublishError::Consistency(err)
  }
}

impl From<ConfigError> for PublishError {
  fn from(err: ConfigError) -> Self {
    PublishError::Config(err)
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Config file passed explicitly but missing
  NotFound { path: PathBuf },

  /// Missing required setting (neither on the command line nor in publish.toml)
  MissingField { field: String },

  /// A setting has a value we cannot use
  InvalidValue { field: String, value: String },

  /// Packages path does not contain a manifest.json
  PackagesPathInvalid { path: PathBuf },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::MissingField { field } => Some(format!(
        "Pass --{} on the command line or set `{}` in publish.toml.",
        field.replace('_', "-"),
        field
      )),
      ConfigError::PackagesPathInvalid { .. } => {
        Some("--packages-path must point at the folder holding the shared manifest.json.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { path } => write!(f, "Config file not found: {}", path.display()),
      ConfigError::MissingField { field } => write!(f, "Missing required setting: {}", field),
      ConfigError::InvalidValue { field, value } => write!(f, "Invalid value for {}: '{}'", field, value),
      ConfigError::PackagesPathInvalid { path } => {
        write!(f, "Unable to find {}", path.join("manifest.json").display())
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Push failed
  PushFailed {
    remote: String,
    branch: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("non-fast-forward") {
          Some("The target branch moved while publishing. Re-run to squash on top of it.".to_string())
        } else if reason.contains("permission denied") || reason.contains("403") {
          Some("Check your credentials for the target repository.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "--source-repo must point at a git checkout: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::PushFailed { remote, branch, reason } => {
        write!(f, "Push to {}/{} failed: {}", remote, branch, reason)
      }
    }
  }
}

/// Registry command and artifact download errors
#[derive(Debug)]
pub enum RegistryError {
  /// Registry tool exited non-zero for a reason other than "not found"
  CommandFailed { command: String, output: String },

  /// Registry tool produced output we could not interpret
  UnexpectedOutput { command: String, output: String },

  /// Tarball download failed after all retries
  Download { url: String, attempts: u32, reason: String },

  /// Tarball could not be unpacked
  Extract { archive: PathBuf, reason: String },
}

impl RegistryError {
  fn help_message(&self) -> Option<String> {
    match self {
      RegistryError::CommandFailed { output, .. } if output.contains("E401") || output.contains("ENEEDAUTH") => {
        Some("The publish registry needs a valid access token in .npmrc.".to_string())
      }
      RegistryError::Download { .. } => Some("Check that the view registry is reachable from this machine.".to_string()),
      _ => None,
    }
  }
}

impl fmt::Display for RegistryError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RegistryError::CommandFailed { command, output } => {
        write!(f, "Registry command failed: {}\n{}", command, output)
      }
      RegistryError::UnexpectedOutput { command, output } => {
        write!(f, "Unexpected output from `{}`: {}", command, output)
      }
      RegistryError::Download { url, attempts, reason } => {
        write!(f, "Failed to download {} after {} attempts: {}", url, attempts, reason)
      }
      RegistryError::Extract { archive, reason } => {
        write!(f, "Failed to extract {}: {}", archive.display(), reason)
      }
    }
  }
}

/// Malformed semantic versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
  /// Not `major.minor.patch[-pre][+build]` at all
  Malformed { version: String, reason: String },

  /// Pre-release present but not `preview.<N>`
  InvalidPrerelease { version: String },
}

impl fmt::Display for VersionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionError::Malformed { version, reason } => {
        write!(f, "Invalid version format '{}': {}", version, reason)
      }
      VersionError::InvalidPrerelease { version } => {
        write!(f, "Invalid version format '{}': only `preview.<N>` pre-releases are allowed", version)
      }
    }
  }
}

impl std::error::Error for VersionError {}

/// Manifests or working tree not in the state the run requires
#[derive(Debug)]
pub enum ConsistencyError {
  /// A guarded file has local modifications in the source checkout
  SelfModification { paths: Vec<String> },

  /// Dot-prefixed paths found in the squashed tree
  HiddenPaths { paths: Vec<PathBuf> },

  /// A tracked dependency never got a resolved version
  UnresolvedDependency { package: String, dependency: String },

  /// A package requested for the manifest was never resolved
  UnresolvedManifestEntry { package: String },

  /// Manual dependency edges form a cycle
  DependencyCycle { package: String },

  /// Change detected while only republishing existing packages
  UnexpectedChange { package: String },

  /// Anything else that leaves the run in a state we refuse to push
  Invalid { reason: String },
}

impl ConsistencyError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConsistencyError::SelfModification { .. } => Some(
        "Commit or stash those changes, or run against a secondary local clone while testing.".to_string(),
      ),
      ConsistencyError::HiddenPaths { .. } => {
        Some("Use --whitelist-hidden-paths (or --strip-from-commit) for paths that belong in the release.".to_string())
      }
      ConsistencyError::DependencyCycle { .. } => {
        Some("Check --add-package-as-dependency-to-package for edges that point back at each other.".to_string())
      }
      ConsistencyError::UnexpectedChange { .. } => Some(
        "Drop --only-publish-existing-packages to allow new versions to be published.".to_string(),
      ),
      _ => None,
    }
  }
}

impl fmt::Display for ConsistencyError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConsistencyError::SelfModification { paths } => write!(
        f,
        "Refusing to run: {} has local modifications that would be lost",
        paths.join(", ")
      ),
      ConsistencyError::HiddenPaths { paths } => {
        writeln!(f, "There are hidden paths in the repo that aren't whitelisted:")?;
        for path in paths {
          writeln!(f, "  {}", path.display())?;
        }
        Ok(())
      }
      ConsistencyError::UnresolvedDependency { package, dependency } => write!(
        f,
        "{} depends on {}, but no version was resolved for {}",
        package, dependency, dependency
      ),
      ConsistencyError::UnresolvedManifestEntry { package } => write!(
        f,
        "{} should be added to the manifest, but no version was resolved for it",
        package
      ),
      ConsistencyError::DependencyCycle { package } => write!(
        f,
        "Circular manual dependency detected involving package '{}'",
        package
      ),
      ConsistencyError::UnexpectedChange { package } => write!(
        f,
        "{} has changes that need a new version, but --only-publish-existing-packages is set",
        package
      ),
      ConsistencyError::Invalid { reason } => write!(f, "{}", reason),
    }
  }
}

/// Pre-flight validation errors
#[derive(Debug)]
pub enum ValidationError {
  /// A pre-flight command exited non-zero
  PreflightFailed { command: String, output: String },
}

impl ValidationError {
  fn help_message(&self) -> Option<String> {
    match self {
      ValidationError::PreflightFailed { .. } => {
        Some("Fix the reported package metadata before publishing.".to_string())
      }
    }
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValidationError::PreflightFailed { command, output } => {
        write!(f, "Pre-flight check failed: {}\n{}", command, output)
      }
    }
  }
}

/// Result type alias for stable-publish
pub type PublishResult<T> = Result<T, PublishError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> PublishResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> PublishResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<PublishError>,
{
  fn context(self, ctx: impl Into<String>) -> PublishResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> PublishResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &PublishError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_exit_codes_by_category() {
    let nothing = PublishError::NothingToPush {
      target_branch: "master".to_string(),
    };
    assert_eq!(nothing.exit_code(), ExitCode::NothingToPush);
    assert_ne!(nothing.exit_code().as_i32(), 0);

    let version = PublishError::from(VersionError::InvalidPrerelease {
      version: "1.2.3-beta.1".to_string(),
    });
    assert_eq!(version.exit_code(), ExitCode::Validation);

    let config = PublishError::from(ConfigError::MissingField {
      field: "publish_registry".to_string(),
    });
    assert_eq!(config.exit_code(), ExitCode::User);
    assert!(config.help_message().unwrap().contains("--publish-registry"));
  }

  #[test]
  fn test_context_is_appended_to_messages() {
    let err = PublishError::message("boom").context("while publishing package1");
    let text = err.to_string();
    assert!(text.starts_with("boom"));
    assert!(text.contains("while publishing package1"));
  }

  #[test]
  fn test_context_keeps_category_of_typed_errors() {
    let err = PublishError::from(VersionError::InvalidPrerelease {
      version: "1.0.0-beta.1".to_string(),
    })
    .context("While processing package com.example.jobs");

    assert!(matches!(err, PublishError::Contextual { .. }));
    assert_eq!(err.exit_code(), ExitCode::Validation);
    assert!(err.help_message().unwrap().contains("preview.N"));
    let text = err.to_string();
    assert!(text.contains("1.0.0-beta.1"));
    assert!(text.contains("While processing package com.example.jobs"));
  }

  #[test]
  fn test_hidden_paths_lists_every_path() {
    let err = ConsistencyError::HiddenPaths {
      paths: vec![PathBuf::from("./.idea"), PathBuf::from("./src/.DS_Store")],
    };
    let text = err.to_string();
    assert!(text.contains("./.idea"));
    assert!(text.contains("./src/.DS_Store"));
  }
}
