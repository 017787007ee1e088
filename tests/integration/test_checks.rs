//! Integration tests for the gates that run before anything is published

use crate::helpers::{TestRepo, git, run_stable_publish, stderr};
use anyhow::Result;

#[test]
fn test_modified_config_refuses_to_run() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write_file("publish.toml", "target_branch = \"master\"\n")?;
  repo.commit("Add config")?;
  repo.write_file("publish.toml", "target_branch = \"release\"\n")?;

  let output = run_stable_publish(&repo.path, &repo.required_args())?;
  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("publish.toml"));

  // Local edit survives
  assert_eq!(repo.read_file("publish.toml")?, "target_branch = \"release\"\n");
  Ok(())
}

#[test]
fn test_failing_preflight_command_stops_the_run() -> Result<()> {
  let repo = TestRepo::new()?;

  let mut args = repo.required_args();
  args.push("--preflight-command".to_string());
  args.push("exit 7".to_string());

  let output = run_stable_publish(&repo.path, &args)?;
  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("exit 7"));
  assert_eq!(repo.current_branch()?, "main");

  // Nothing reached the target
  let heads = git(&repo.target, &["branch", "--list"])?;
  assert!(String::from_utf8_lossy(&heads.stdout).trim().is_empty());
  Ok(())
}

#[test]
fn test_hidden_path_rejected_and_source_restored() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.add_package("package1", "1.0.0")?;
  repo.write_file(".editorconfig", "root = true\n")?;
  repo.commit("Add editorconfig")?;

  let output = run_stable_publish(&repo.path, &repo.required_args())?;
  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains(".editorconfig"));
  assert_eq!(repo.current_branch()?, "main");
  assert!(repo.path.join("Project/Packages/package1/package.json").exists());

  Ok(())
}

#[test]
fn test_no_packages_found_is_a_config_error() -> Result<()> {
  let repo = TestRepo::new()?;

  let output = run_stable_publish(&repo.path, &repo.required_args())?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("no packages found"));
  assert_eq!(repo.current_branch()?, "main");

  Ok(())
}
