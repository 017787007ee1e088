//! Package registry access
//!
//! Everything the publish pipeline needs from a registry goes through the
//! `PackageRegistry` trait: version lookups, dependency lookups, artifact
//! downloads and publishing. `NpmRegistry` drives an npm-compatible command
//! line tool; tests substitute an in-memory implementation.

pub mod download;
mod npm;

pub use npm::{NpmCommand, NpmRegistry};

use crate::core::error::PublishResult;
use crate::release::manifest::PackageDescriptor;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Operations against a package registry identified by URL
pub trait PackageRegistry {
  /// Latest version of `name` in `registry`, `None` when the registry does not know it
  fn view_version(&self, name: &str, registry: &str) -> PublishResult<Option<String>>;

  /// Dependencies declared by a published version
  fn view_dependencies(&self, name: &str, version: &str, registry: &str) -> PublishResult<BTreeMap<String, String>>;

  /// Download the published tarball into `dest_dir`, returning the archive path
  fn fetch_archive(&self, name: &str, version: &str, registry: &str, dest_dir: &Path) -> PublishResult<PathBuf>;

  /// Pack and publish a package directory
  fn publish(&self, package_dir: &Path, registry: &str) -> PublishResult<()>;

  /// Publish an already-built tarball as-is
  fn publish_archive(&self, archive: &Path, registry: &str) -> PublishResult<()>;

  /// Download and unpack a published version, returning the unpacked package root
  fn fetch_package(&self, name: &str, version: &str, registry: &str, dest: &Path) -> PublishResult<PathBuf> {
    let archive = self.fetch_archive(name, version, registry, dest)?;
    download::unpack(&archive, &dest.join("unpacked"))
  }

  /// Rewrite the `version` of a local package descriptor
  fn set_local_version(&self, package_dir: &Path, version: &str) -> PublishResult<()> {
    let mut descriptor = PackageDescriptor::load(package_dir)?;
    descriptor.set_version(version);
    descriptor.save()?;
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod fake {
  //! In-memory registry used by orchestrator and controller tests

  use super::PackageRegistry;
  use crate::core::error::{PublishError, PublishResult};
  use crate::release::manifest::PackageDescriptor;
  use std::cell::RefCell;
  use std::collections::BTreeMap;
  use std::fs;
  use std::path::{Path, PathBuf};

  #[derive(Debug, Clone)]
  pub struct PublishedPackage {
    pub files: BTreeMap<String, String>,
  }

  #[derive(Default)]
  pub struct FakeRegistry {
    /// (registry, name, version) -> contents
    packages: RefCell<BTreeMap<(String, String, String), PublishedPackage>>,
    pub published: RefCell<Vec<(String, String, String)>>,
    pub republished: RefCell<Vec<(String, String)>>,
  }

  impl FakeRegistry {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn insert(&self, registry: &str, name: &str, version: &str, files: &[(&str, &str)]) {
      let files = files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
      self.packages.borrow_mut().insert(
        (registry.to_string(), name.to_string(), version.to_string()),
        PublishedPackage { files },
      );
    }

    pub fn files_of(&self, registry: &str, name: &str, version: &str) -> Option<BTreeMap<String, String>> {
      self
        .packages
        .borrow()
        .get(&(registry.to_string(), name.to_string(), version.to_string()))
        .map(|p| p.files.clone())
    }

    fn versions(&self, name: &str, registry: &str) -> Vec<String> {
      self
        .packages
        .borrow()
        .keys()
        .filter(|(r, n, _)| r == registry && n == name)
        .map(|(_, _, v)| v.clone())
        .collect()
    }

    fn lookup(&self, name: &str, version: &str, registry: &str) -> PublishResult<PublishedPackage> {
      self
        .packages
        .borrow()
        .get(&(registry.to_string(), name.to_string(), version.to_string()))
        .cloned()
        .ok_or_else(|| PublishError::message(format!("{}@{} not in {}", name, version, registry)))
    }
  }

  impl PackageRegistry for FakeRegistry {
    fn view_version(&self, name: &str, registry: &str) -> PublishResult<Option<String>> {
      let mut versions = self.versions(name, registry);
      versions.sort_by(|a, b| {
        semver::Version::parse(a)
          .unwrap()
          .cmp_precedence(&semver::Version::parse(b).unwrap())
      });
      Ok(versions.pop())
    }

    fn view_dependencies(&self, name: &str, version: &str, registry: &str) -> PublishResult<BTreeMap<String, String>> {
      let package = self.lookup(name, version, registry)?;
      let Some(descriptor) = package.files.get("package.json") else {
        return Ok(BTreeMap::new());
      };
      let value: serde_json::Value = serde_json::from_str(descriptor)?;
      Ok(
        value
          .get("dependencies")
          .and_then(|d| d.as_object())
          .map(|d| {
            d.iter()
              .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
              .collect()
          })
          .unwrap_or_default(),
      )
    }

    fn fetch_archive(&self, name: &str, version: &str, registry: &str, dest_dir: &Path) -> PublishResult<PathBuf> {
      self.lookup(name, version, registry)?;
      let archive = dest_dir.join(format!("{}-{}.tgz", name, version));
      fs::write(&archive, format!("{}@{}", name, version))?;
      Ok(archive)
    }

    fn fetch_package(&self, name: &str, version: &str, registry: &str, dest: &Path) -> PublishResult<PathBuf> {
      let package = self.lookup(name, version, registry)?;
      let root = dest.join("package");
      for (rel, content) in &package.files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
          fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
      }
      fs::create_dir_all(&root)?;
      Ok(root)
    }

    fn publish(&self, package_dir: &Path, registry: &str) -> PublishResult<()> {
      let descriptor = PackageDescriptor::load(package_dir)?;
      let name = descriptor.name().unwrap_or_default().to_string();
      let version = descriptor.version().unwrap_or_default().to_string();

      let mut files = BTreeMap::new();
      collect(package_dir, package_dir, &mut files)?;
      self.packages.borrow_mut().insert(
        (registry.to_string(), name.clone(), version.clone()),
        PublishedPackage { files },
      );
      self.published.borrow_mut().push((registry.to_string(), name, version));
      Ok(())
    }

    fn publish_archive(&self, archive: &Path, registry: &str) -> PublishResult<()> {
      let content = fs::read_to_string(archive)?;
      let (name, version) = content
        .split_once('@')
        .ok_or_else(|| PublishError::message("bad fake archive"))?;
      let source = self
        .packages
        .borrow()
        .iter()
        .find(|((_, n, v), _)| n == name && v == version)
        .map(|(_, p)| p.clone())
        .ok_or_else(|| PublishError::message("unknown fake archive"))?;
      self.packages.borrow_mut().insert(
        (registry.to_string(), name.to_string(), version.to_string()),
        source,
      );
      self
        .republished
        .borrow_mut()
        .push((name.to_string(), version.to_string()));
      Ok(())
    }
  }

  fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) -> PublishResult<()> {
    for entry in fs::read_dir(dir)? {
      let path = entry?.path();
      if path.is_dir() {
        collect(root, &path, files)?;
      } else {
        let rel = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
        files.insert(rel, fs::read_to_string(&path)?);
      }
    }
    Ok(())
  }
}
