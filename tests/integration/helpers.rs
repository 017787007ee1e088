//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A source repository with a packages folder, plus an empty bare target repository
pub struct TestRepo {
  _root: TempDir,
  pub path: PathBuf,
  pub target: PathBuf,
}

impl TestRepo {
  /// Source repo with `Project/Packages/manifest.json` committed on `main`
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("source");
    let target = root.path().join("target.git");
    std::fs::create_dir_all(&path)?;

    git(root.path(), &["init", "--bare", "--initial-branch=main", "target.git"])?;

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    let repo = Self {
      _root: root,
      path,
      target,
    };
    repo.write_file("README.md", "# Project\n")?;
    repo.write_file("Project/Packages/manifest.json", "{\n    \"dependencies\": {}\n}\n")?;
    repo.commit("Initial project")?;
    Ok(repo)
  }

  /// Add a package folder with a package.json
  pub fn add_package(&self, name: &str, version: &str) -> Result<()> {
    self.write_file(
      &format!("Project/Packages/{}/package.json", name),
      &format!("{{\n    \"name\": \"{}\",\n    \"version\": \"{}\"\n}}\n", name, version),
    )
  }

  pub fn write_file(&self, rel: &str, content: &str) -> Result<()> {
    let path = self.path.join(rel);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
  }

  pub fn read_file(&self, rel: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(rel))?)
  }

  /// Commit everything
  pub fn commit(&self, message: &str) -> Result<()> {
    git(&self.path, &["add", "-A"])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  pub fn current_branch(&self) -> Result<String> {
    let output = git(&self.path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// The flags every run needs, pointing at this repo pair
  pub fn required_args(&self) -> Vec<String> {
    vec![
      "--publish-registry".to_string(),
      "https://registry.invalid".to_string(),
      "--target-repo".to_string(),
      self.target.to_string_lossy().into_owned(),
      "--target-branch".to_string(),
      "master".to_string(),
      "--packages-path".to_string(),
      "Project/Packages".to_string(),
    ]
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run the stable-publish binary; the caller inspects the exit status
pub fn run_stable_publish<S: AsRef<str>>(cwd: &Path, args: &[S]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_stable-publish");

  Command::new(bin)
    .current_dir(cwd)
    .args(args.iter().map(|a| a.as_ref()))
    .output()
    .context("Failed to run stable-publish")
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}
