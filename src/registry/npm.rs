//! npm-compatible registry client driven through the `npm` command line

use super::PackageRegistry;
use super::download::{self, Backoff};
use crate::core::error::{PublishError, PublishResult, RegistryError, ResultExt};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Output fragments npm uses when a package or version does not exist
const NOT_FOUND_MARKERS: &[&str] = &["E404", "404 Not Found", "is not in the npm registry"];

/// Typed builder for a registry tool invocation
#[derive(Debug, Clone)]
pub struct NpmCommand {
  program: String,
  args: Vec<String>,
  registry: Option<String>,
  cwd: Option<PathBuf>,
}

impl NpmCommand {
  pub fn new(program: &str) -> Self {
    Self {
      program: program.to_string(),
      args: Vec::new(),
      registry: None,
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Target a registry; appended as `--registry <url>`
  pub fn registry(mut self, url: Option<&str>) -> Self {
    self.registry = url.map(str::to_string);
    self
  }

  pub fn current_dir(mut self, dir: &Path) -> Self {
    self.cwd = Some(dir.to_path_buf());
    self
  }

  /// Final argument vector, without the program
  pub fn argv(&self) -> Vec<String> {
    let mut argv = self.args.clone();
    if let Some(url) = &self.registry {
      argv.push("--registry".to_string());
      argv.push(url.clone());
    }
    argv
  }

  pub fn display(&self) -> String {
    let mut parts = vec![self.program.clone()];
    parts.extend(self.argv());
    parts.join(" ")
  }

  fn to_command(&self) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.args(self.argv());
    if let Some(dir) = &self.cwd {
      cmd.current_dir(dir);
    }
    cmd
  }

  fn output(&self) -> PublishResult<Output> {
    tracing::debug!(command = %self.display(), "running registry tool");
    self
      .to_command()
      .output()
      .with_context(|| format!("Failed to execute `{}`", self.display()))
  }
}

/// Outcome of a `view` query
#[derive(Debug, PartialEq, Eq)]
enum ViewOutput {
  Found(String),
  NotFound,
}

/// Interpret a `view` invocation's result
///
/// Not-found is signalled by the tool exiting non-zero with one of the known
/// markers, or by succeeding with nothing on stdout.
fn classify_view(command: &str, success: bool, stdout: &str, stderr: &str) -> Result<ViewOutput, RegistryError> {
  if success {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
      return Ok(ViewOutput::NotFound);
    }
    return Ok(ViewOutput::Found(trimmed.to_string()));
  }

  let combined = format!("{}\n{}", stdout, stderr);
  if NOT_FOUND_MARKERS.iter().any(|marker| combined.contains(marker)) {
    return Ok(ViewOutput::NotFound);
  }

  Err(RegistryError::CommandFailed {
    command: command.to_string(),
    output: combined.trim().to_string(),
  })
}

/// Registry client shelling out to npm (or a compatible tool)
pub struct NpmRegistry {
  program: String,
  dry_run: bool,
  backoff: Backoff,
  http: reqwest::blocking::Client,
}

impl NpmRegistry {
  pub fn new(program: &str, dry_run: bool) -> PublishResult<Self> {
    Ok(Self {
      program: program.to_string(),
      dry_run,
      backoff: Backoff::default(),
      http: download::http_client()?,
    })
  }

  fn command(&self) -> NpmCommand {
    NpmCommand::new(&self.program)
  }

  fn view(&self, cmd: NpmCommand) -> PublishResult<ViewOutput> {
    let output = cmd.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(classify_view(&cmd.display(), output.status.success(), &stdout, &stderr)?)
  }

  fn run(&self, cmd: NpmCommand) -> PublishResult<String> {
    let output = cmd.output()?;
    if !output.status.success() {
      let stdout = String::from_utf8_lossy(&output.stdout);
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(
        RegistryError::CommandFailed {
          command: cmd.display(),
          output: format!("{}\n{}", stdout, stderr).trim().to_string(),
        }
        .into(),
      );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

impl PackageRegistry for NpmRegistry {
  fn view_version(&self, name: &str, registry: &str) -> PublishResult<Option<String>> {
    let cmd = self.command().args(["view", name, "version"]).registry(Some(registry));
    match self.view(cmd)? {
      ViewOutput::Found(version) => Ok(Some(version)),
      ViewOutput::NotFound => Ok(None),
    }
  }

  fn view_dependencies(&self, name: &str, version: &str, registry: &str) -> PublishResult<BTreeMap<String, String>> {
    let cmd = self
      .command()
      .args(["view".to_string(), format!("{}@{}", name, version), "dependencies".to_string(), "--json".to_string()])
      .registry(Some(registry));
    let display = cmd.display();

    let raw = match self.view(cmd)? {
      ViewOutput::Found(raw) => raw,
      ViewOutput::NotFound => return Ok(BTreeMap::new()),
    };

    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|_| RegistryError::UnexpectedOutput {
      command: display.clone(),
      output: raw.clone(),
    })?;
    let Some(deps) = value.as_object() else {
      return Err(RegistryError::UnexpectedOutput { command: display, output: raw }.into());
    };

    Ok(
      deps
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
        .collect(),
    )
  }

  fn fetch_archive(&self, name: &str, version: &str, registry: &str, dest_dir: &Path) -> PublishResult<PathBuf> {
    let spec = format!("{}@{}", name, version);
    let cmd = self
      .command()
      .args(["view", spec.as_str(), "dist.tarball"])
      .registry(Some(registry));

    let url = match self.view(cmd)? {
      ViewOutput::Found(url) => url,
      ViewOutput::NotFound => {
        return Err(PublishError::with_help(
          format!("{} has no tarball in {}", spec, registry),
          "The version was reported by the registry but its artifact is missing.",
        ));
      }
    };

    fs::create_dir_all(dest_dir)?;
    let file_name = url
      .rsplit('/')
      .next()
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .unwrap_or_else(|| format!("{}-{}.tgz", name.replace('/', "-"), version));
    let archive = dest_dir.join(file_name);
    download::download_with_retry(&self.http, &url, &archive, self.backoff)?;
    Ok(archive)
  }

  fn publish(&self, package_dir: &Path, registry: &str) -> PublishResult<()> {
    if self.dry_run {
      tracing::info!(dir = %package_dir.display(), registry, "dry run, skipping pack and publish");
      return Ok(());
    }

    let packed = self.run(self.command().args(["pack", "."]).current_dir(package_dir))?;
    let archive_name = packed
      .lines()
      .map(str::trim)
      .rfind(|l| !l.is_empty())
      .ok_or_else(|| RegistryError::UnexpectedOutput {
        command: format!("{} pack .", self.program),
        output: packed.clone(),
      })?;
    let archive = package_dir.join(archive_name);

    let result = self.publish_archive(&archive, registry);
    if let Err(e) = fs::remove_file(&archive) {
      tracing::warn!(archive = %archive.display(), "failed to remove packed archive: {}", e);
    }
    result
  }

  fn publish_archive(&self, archive: &Path, registry: &str) -> PublishResult<()> {
    if self.dry_run {
      tracing::info!(archive = %archive.display(), registry, "dry run, skipping publish");
      return Ok(());
    }

    let cmd = self
      .command()
      .arg("publish")
      .arg(archive.to_string_lossy().into_owned())
      .registry(Some(registry));
    self.run(cmd)?;
    Ok(())
  }
}
