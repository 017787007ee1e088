//! End-to-end runs against a local target repository and a scripted registry tool

use crate::helpers::{TestRepo, git, run_stable_publish, stderr};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Registry tool that knows no packages and records every invocation
#[cfg(unix)]
fn scripted_registry_tool(dir: &Path) -> Result<(PathBuf, PathBuf)> {
  use std::os::unix::fs::PermissionsExt;

  let log = dir.join("registry.log");
  let script = dir.join("fake-npm");
  std::fs::write(
    &script,
    format!(
      r#"#!/bin/sh
echo "$@" >> "{log}"
case "$1" in
  view) exit 0 ;;
  pack) touch package.tgz; echo "npm notice packing"; echo package.tgz ;;
  publish) exit 0 ;;
  *) exit 1 ;;
esac
"#,
      log = log.display()
    ),
  )?;
  std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
  Ok((script, log))
}

fn show(repo: &Path, spec: &str) -> Result<String> {
  let output = git(repo, &["show", spec])?;
  Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(unix)]
#[test]
fn test_first_release_publishes_and_pushes() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write_file(
    "Project/Packages/manifest.json",
    "{\n    \"dependencies\": {\n        \"package1\": \"1.0.0\"\n    }\n}\n",
  )?;
  repo.add_package("package1", "1.0.0")?;
  repo.write_file("Project/Packages/package1/Runtime/a.cs", "class A {}\n")?;
  repo.write_file("Other/Packages/manifest.json", "{}\n")?;
  repo.commit("Add package1")?;

  let tools = tempfile::TempDir::new()?;
  let (tool, log) = scripted_registry_tool(tools.path())?;

  let mut args = repo.required_args();
  args.push("--registry-tool".to_string());
  args.push(tool.to_string_lossy().into_owned());

  let output = run_stable_publish(&repo.path, &args)?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("0.0.1-preview.1"), "stdout: {}", stdout);
  assert!(stdout.contains("Release 1"), "stdout: {}", stdout);

  // Registry tool saw a lookup, a pack and a publish against the publish registry
  let calls = std::fs::read_to_string(&log)?;
  assert!(calls.contains("view package1 version --registry https://registry.invalid"));
  assert!(calls.contains("pack ."));
  assert!(calls.lines().any(|l| l.starts_with("publish ") && l.ends_with("--registry https://registry.invalid")));

  // Release commit: package sources replaced by manifest entries
  let subject = git(&repo.target, &["log", "-1", "--pretty=%s", "master"])?;
  assert_eq!(String::from_utf8_lossy(&subject.stdout).trim(), "Release 1");
  let manifest = show(&repo.target, "master:Project/Packages/manifest.json")?;
  assert!(manifest.contains("\"package1\": \"0.0.1-preview.1\""));
  assert!(manifest.contains("https://registry.invalid"));
  let copy = show(&repo.target, "master:Other/Packages/manifest.json")?;
  assert_eq!(copy, manifest);
  let files = git(&repo.target, &["ls-tree", "-r", "--name-only", "master"])?;
  assert!(!String::from_utf8_lossy(&files.stdout).contains("package1/"));

  // Source checkout is back where it started
  assert_eq!(repo.current_branch()?, "main");
  assert!(repo.path.join("Project/Packages/package1/Runtime/a.cs").exists());

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_dry_run_publishes_and_pushes_nothing() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.add_package("package1", "1.0.0")?;
  repo.commit("Add package1")?;

  let tools = tempfile::TempDir::new()?;
  let (tool, log) = scripted_registry_tool(tools.path())?;

  let mut args = repo.required_args();
  args.extend(["--dry-run".to_string(), "--registry-tool".to_string()]);
  args.push(tool.to_string_lossy().into_owned());

  let output = run_stable_publish(&repo.path, &args)?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("Would publish package1@0.0.1-preview.1"), "stdout: {}", stdout);

  let calls = std::fs::read_to_string(&log)?;
  assert!(calls.lines().all(|l| l.starts_with("view ")));

  let heads = git(&repo.target, &["branch", "--list"])?;
  assert!(String::from_utf8_lossy(&heads.stdout).trim().is_empty());
  assert_eq!(repo.current_branch()?, "main");

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_stripped_paths_never_reach_the_target() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.add_package("package1", "1.0.0")?;
  repo.write_file("publish.toml", "strip_from_commit = [\"Tools\"]\n")?;
  repo.write_file("Tools/release.sh", "echo internal\n")?;
  repo.write_file(".gitignore", "Library/\n")?;
  repo.commit("Add tooling")?;

  let tools = tempfile::TempDir::new()?;
  let (tool, _log) = scripted_registry_tool(tools.path())?;

  let mut args = repo.required_args();
  args.extend([
    "--whitelist-hidden-paths".to_string(),
    ".gitignore".to_string(),
    "--strip-from-commit".to_string(),
    "publish.toml".to_string(),
    "--registry-tool".to_string(),
  ]);
  args.push(tool.to_string_lossy().into_owned());

  let output = run_stable_publish(&repo.path, &args)?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  let files = git(&repo.target, &["ls-tree", "-r", "--name-only", "master"])?;
  let files = String::from_utf8_lossy(&files.stdout);
  assert!(files.contains(".gitignore"));
  assert!(files.contains("README.md"));
  assert!(!files.contains("Tools/"));
  assert!(!files.contains("publish.toml"));

  // Stripped files are only gone from the release, not from the source
  assert!(repo.path.join("Tools/release.sh").exists());
  Ok(())
}
