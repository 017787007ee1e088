//! Integration tests for settings resolution and argument validation

use crate::helpers::{TestRepo, run_stable_publish, stderr};
use anyhow::Result;

#[test]
fn test_missing_required_settings_exit_with_user_error() -> Result<()> {
  let repo = TestRepo::new()?;

  let output = run_stable_publish(&repo.path, &["--target-branch", "master"])?;
  assert_eq!(output.status.code(), Some(1));
  let err = stderr(&output);
  assert!(err.contains("publish_registry"), "stderr: {}", err);
  assert!(err.contains("--publish-registry"), "stderr: {}", err);

  Ok(())
}

#[test]
fn test_malformed_dependency_edge_is_rejected() -> Result<()> {
  let repo = TestRepo::new()?;

  let mut args = repo.required_args();
  args.push("--add-package-as-dependency-to-package".to_string());
  args.push("package2-package1".to_string());

  let output = run_stable_publish(&repo.path, &args)?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("package2-package1"));
  assert_eq!(repo.current_branch()?, "main");

  Ok(())
}

#[test]
fn test_unknown_bump_kind_is_a_usage_error() -> Result<()> {
  let repo = TestRepo::new()?;

  let mut args = repo.required_args();
  args.push("--bump".to_string());
  args.push("gigantic".to_string());

  let output = run_stable_publish(&repo.path, &args)?;
  assert!(!output.status.success());

  Ok(())
}

#[test]
fn test_explicit_config_must_exist() -> Result<()> {
  let repo = TestRepo::new()?;

  let mut args = repo.required_args();
  args.push("--config".to_string());
  args.push("nowhere.toml".to_string());

  let output = run_stable_publish(&repo.path, &args)?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("nowhere.toml"));

  Ok(())
}

#[test]
fn test_unknown_config_key_is_rejected() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write_file("publish.toml", "publish_registri = \"https://typo.invalid\"\n")?;
  repo.commit("Add config")?;

  let output = run_stable_publish(&repo.path, &repo.required_args())?;
  assert!(!output.status.success());
  assert!(stderr(&output).contains("publish.toml"));

  Ok(())
}

#[test]
fn test_source_repo_must_be_a_git_repository() -> Result<()> {
  let repo = TestRepo::new()?;
  let outside = tempfile::TempDir::new()?;

  let mut args = repo.required_args();
  args.push("--source-repo".to_string());
  args.push(outside.path().to_string_lossy().into_owned());

  let output = run_stable_publish(&repo.path, &args)?;
  assert_eq!(output.status.code(), Some(2));

  Ok(())
}
