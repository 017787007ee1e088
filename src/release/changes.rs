//! Decide whether a local package differs from its published artifact
//!
//! Three tiers, cheapest first, stopping at the first difference:
//! the set of files, their line content, then the package descriptor.

use crate::core::error::PublishResult;
use crate::registry::PackageRegistry;
use crate::release::manifest::{DESCRIPTOR_FILE, PackageDescriptor};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Why a package is (or isn't) considered changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReport {
  Unchanged,
  /// Nothing published to compare against
  NotPublished,
  /// Files present on only one side
  FileSet { local_only: Vec<PathBuf>, published_only: Vec<PathBuf> },
  /// First file whose lines differ
  Content { path: PathBuf },
  /// First descriptor key whose value differs
  Descriptor { key: String },
}

impl ChangeReport {
  pub fn is_changed(&self) -> bool {
    !matches!(self, ChangeReport::Unchanged)
  }
}

impl fmt::Display for ChangeReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ChangeReport::Unchanged => write!(f, "identical to the published version"),
      ChangeReport::NotPublished => write!(f, "not published yet"),
      ChangeReport::FileSet {
        local_only,
        published_only,
      } => {
        let first = local_only.first().or(published_only.first());
        write!(
          f,
          "{} file(s) added, {} removed",
          local_only.len(),
          published_only.len()
        )?;
        if let Some(path) = first {
          write!(f, " (e.g. {})", path.display())?;
        }
        Ok(())
      }
      ChangeReport::Content { path } => write!(f, "{} differs", path.display()),
      ChangeReport::Descriptor { key } => write!(f, "package.json field '{}' differs", key),
    }
  }
}

/// Compares local packages against artifacts in one view registry
pub struct ChangeDetector<'a, R: PackageRegistry + ?Sized> {
  registry: &'a R,
  view_registry: &'a str,
  vendor_dir: &'a str,
  tracked: &'a BTreeSet<String>,
  resolved: &'a BTreeMap<String, String>,
}

impl<'a, R: PackageRegistry + ?Sized> ChangeDetector<'a, R> {
  pub fn new(
    registry: &'a R,
    view_registry: &'a str,
    vendor_dir: &'a str,
    tracked: &'a BTreeSet<String>,
    resolved: &'a BTreeMap<String, String>,
  ) -> Self {
    Self {
      registry,
      view_registry,
      vendor_dir,
      tracked,
      resolved,
    }
  }

  /// Download `package_name@published_version` and compare it with `local_dir`
  pub fn is_changed(&self, local_dir: &Path, package_name: &str, published_version: &str) -> PublishResult<ChangeReport> {
    let scratch = tempfile::tempdir()?;
    let published_root =
      self
        .registry
        .fetch_package(package_name, published_version, self.view_registry, scratch.path())?;

    let report = compare_trees(
      local_dir,
      &published_root,
      published_version,
      self.vendor_dir,
      self.tracked,
      self.resolved,
    )?;
    tracing::debug!(package = package_name, version = published_version, %report, "compared with published artifact");
    Ok(report)
  }
}

/// Compare an unpacked published package against a local one
pub fn compare_trees(
  local_root: &Path,
  published_root: &Path,
  published_version: &str,
  vendor_dir: &str,
  tracked: &BTreeSet<String>,
  resolved: &BTreeMap<String, String>,
) -> PublishResult<ChangeReport> {
  let local_files = collect_files(local_root, vendor_dir)?;
  let published_files = collect_files(published_root, vendor_dir)?;

  let local_only: Vec<PathBuf> = local_files.difference(&published_files).cloned().collect();
  let published_only: Vec<PathBuf> = published_files.difference(&local_files).cloned().collect();
  if !local_only.is_empty() || !published_only.is_empty() {
    return Ok(ChangeReport::FileSet {
      local_only,
      published_only,
    });
  }

  for rel in &local_files {
    if !same_lines(&local_root.join(rel), &published_root.join(rel))? {
      return Ok(ChangeReport::Content { path: rel.clone() });
    }
  }

  let local = PackageDescriptor::load(local_root)?;
  let published = PackageDescriptor::from_path(&published_root.join(DESCRIPTOR_FILE))?;
  if let Some(key) = descriptor_difference(local.fields(), published.fields(), published_version, tracked, resolved) {
    return Ok(ChangeReport::Descriptor { key });
  }

  Ok(ChangeReport::Unchanged)
}

/// Relative paths of every file under `root`, minus the root descriptor and
/// anything inside a vendor directory
pub fn collect_files(root: &Path, vendor_dir: &str) -> io::Result<BTreeSet<PathBuf>> {
  let mut files = BTreeSet::new();
  walk(root, root, vendor_dir, &mut files)?;
  files.remove(Path::new(DESCRIPTOR_FILE));
  Ok(files)
}

fn walk(root: &Path, dir: &Path, vendor_dir: &str, files: &mut BTreeSet<PathBuf>) -> io::Result<()> {
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    if entry.file_name() == vendor_dir {
      continue;
    }
    let path = entry.path();
    if path.is_dir() {
      walk(root, &path, vendor_dir, files)?;
    } else if let Ok(rel) = path.strip_prefix(root) {
      files.insert(rel.to_path_buf());
    }
  }
  Ok(())
}

/// Line-by-line equality, ignoring `\n` / `\r\n` / `\r` differences
pub fn same_lines(a: &Path, b: &Path) -> io::Result<bool> {
  let left = fs::read(a)?;
  let right = fs::read(b)?;
  if left == right {
    return Ok(true);
  }
  Ok(split_lines(&left) == split_lines(&right))
}

fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
  let mut lines = Vec::new();
  let mut start = 0;
  let mut i = 0;
  while i < bytes.len() {
    match bytes[i] {
      b'\n' => {
        lines.push(&bytes[start..i]);
        start = i + 1;
      }
      b'\r' => {
        lines.push(&bytes[start..i]);
        if bytes.get(i + 1) == Some(&b'\n') {
          i += 1;
        }
        start = i + 1;
      }
      _ => {}
    }
    i += 1;
  }
  if start < bytes.len() {
    lines.push(&bytes[start..]);
  }
  lines
}

/// First descriptor key that differs, if any
///
/// The local `version` is taken to be `published_version`. A `dependencies`
/// difference is tolerated when every differing entry exists only in the
/// published descriptor, is a tracked dependency, and equals its resolved
/// version.
pub fn descriptor_difference(
  local: &Map<String, Value>,
  published: &Map<String, Value>,
  published_version: &str,
  tracked: &BTreeSet<String>,
  resolved: &BTreeMap<String, String>,
) -> Option<String> {
  let mut local = local.clone();
  local.insert("version".to_string(), Value::String(published_version.to_string()));

  let local_keys: BTreeSet<&String> = local.keys().collect();
  let published_keys: BTreeSet<&String> = published.keys().collect();
  if let Some(key) = local_keys.symmetric_difference(&published_keys).next() {
    return Some((*key).clone());
  }

  for (key, local_value) in &local {
    let published_value = &published[key];
    if local_value == published_value {
      continue;
    }
    if key == "dependencies" && dependencies_tolerated(local_value, published_value, tracked, resolved) {
      continue;
    }
    return Some(key.clone());
  }

  None
}

fn dependencies_tolerated(
  local: &Value,
  published: &Value,
  tracked: &BTreeSet<String>,
  resolved: &BTreeMap<String, String>,
) -> bool {
  let (Some(local), Some(published)) = (local.as_object(), published.as_object()) else {
    return false;
  };

  let names: BTreeSet<&String> = local.keys().chain(published.keys()).collect();
  names
    .into_iter()
    .filter(|name| local.get(*name) != published.get(*name))
    .all(|name| {
      !local.contains_key(name)
        && tracked.contains(name)
        && published.get(name).and_then(Value::as_str) == resolved.get(name).map(String::as_str)
    })
}
