//! Reject dot-prefixed paths that would leak into the published tree

use super::trait_def::{Check, CheckContext};
use crate::core::error::{ConsistencyError, PublishError, PublishResult};
use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct HiddenPathsCheck {
  pub whitelist: Vec<String>,
}

impl Check for HiddenPathsCheck {
  fn name(&self) -> &str {
    "hidden-paths"
  }

  fn description(&self) -> &str {
    "Checks the squashed tree for hidden paths that are not whitelisted"
  }

  fn run(&self, ctx: &CheckContext<'_>) -> PublishResult<()> {
    let hidden = find_hidden_paths(ctx.root(), &self.whitelist)?;
    if hidden.is_empty() {
      return Ok(());
    }
    Err(PublishError::Consistency(ConsistencyError::HiddenPaths { paths: hidden }))
  }
}

/// A whitelist entry: a bare name matches that name at any depth, anything
/// with a `/` is a root-relative path or glob
enum Allowed {
  Name(Pattern),
  Path(Pattern),
}

impl Allowed {
  fn parse(entry: &str) -> Result<Self, glob::PatternError> {
    let entry = normalize(entry);
    let pattern = Pattern::new(entry)?;
    Ok(if entry.contains('/') {
      Allowed::Path(pattern)
    } else {
      Allowed::Name(pattern)
    })
  }

  fn matches(&self, rel: &str, name: &str) -> bool {
    match self {
      Allowed::Name(p) => p.matches(name),
      Allowed::Path(p) => p.matches(rel),
    }
  }
}

/// Hidden paths under `root`, relative to it
///
/// `.git` at the root is exempt. Neither whitelisted nor reported directories
/// are descended.
pub fn find_hidden_paths(root: &Path, whitelist: &[String]) -> PublishResult<Vec<PathBuf>> {
  let patterns = whitelist
    .iter()
    .map(|w| Allowed::parse(w))
    .collect::<Result<Vec<_>, _>>()?;

  let mut found = Vec::new();
  walk(root, root, &patterns, &mut found)?;
  found.sort();
  Ok(found)
}

fn normalize(entry: &str) -> &str {
  entry.trim_start_matches("./").trim_end_matches('/')
}

fn walk(root: &Path, dir: &Path, whitelist: &[Allowed], found: &mut Vec<PathBuf>) -> io::Result<()> {
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    let path = entry.path();
    let Ok(rel) = path.strip_prefix(root) else {
      continue;
    };
    let rel_str = rel.to_string_lossy().replace('\\', "/");

    if dir == root && rel_str == ".git" {
      continue;
    }

    let name = entry.file_name().to_string_lossy().into_owned();
    if name.starts_with('.') {
      if !whitelist.iter().any(|p| p.matches(&rel_str, &name)) {
        found.push(rel.to_path_buf());
      }
      continue;
    }

    if entry.file_type()?.is_dir() {
      walk(root, &path, whitelist, found)?;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
  }

  #[test]
  fn test_reports_hidden_files_and_directories() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), ".git/HEAD");
    touch(tmp.path(), ".gitignore");
    touch(tmp.path(), ".idea/workspace.xml");
    touch(tmp.path(), "src/.DS_Store");
    touch(tmp.path(), "src/main.cs");

    let found = find_hidden_paths(tmp.path(), &[]).unwrap();
    assert_eq!(
      found,
      vec![
        PathBuf::from(".gitignore"),
        PathBuf::from(".idea"),
        PathBuf::from("src/.DS_Store"),
      ]
    );
  }

  #[test]
  fn test_whitelisted_paths_are_skipped() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), ".gitignore");
    touch(tmp.path(), ".github/workflows/.hidden-inside");
    touch(tmp.path(), "Packages/pkg/.npmignore");

    let whitelist = vec![
      "./.gitignore".to_string(),
      ".github/".to_string(),
      "Packages/*/.npmignore".to_string(),
    ];
    assert!(find_hidden_paths(tmp.path(), &whitelist).unwrap().is_empty());
  }

  #[test]
  fn test_bare_name_is_allowed_at_any_depth() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), ".npmignore");
    touch(tmp.path(), "Packages/pkg/.npmignore");
    touch(tmp.path(), "Packages/pkg/.DS_Store");

    let found = find_hidden_paths(tmp.path(), &[".npmignore".to_string()]).unwrap();
    assert_eq!(found, vec![PathBuf::from("Packages/pkg/.DS_Store")]);
  }

  #[test]
  fn test_rooted_entry_only_matches_that_path() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), ".npmignore");
    touch(tmp.path(), "Packages/pkg/.npmignore");

    let found = find_hidden_paths(tmp.path(), &["./Packages/pkg/.npmignore".to_string()]).unwrap();
    assert_eq!(found, vec![PathBuf::from(".npmignore")]);
  }

  #[test]
  fn test_bad_pattern_is_config_error() {
    let tmp = TempDir::new().unwrap();
    let err = find_hidden_paths(tmp.path(), &["[".to_string()]).unwrap_err();
    assert!(matches!(err, PublishError::Config(_)));
  }
}
