//! Drives one publish run over the local packages
//!
//! For each package, in dependency order: align its dependency block with the
//! versions resolved so far, look up what is already published, decide
//! whether it changed, and pick the version to publish. Once every package is
//! resolved the shared manifest and all descriptors are rewritten, packages
//! are published, and their working copies are removed.

use crate::core::config::PublishSettings;
use crate::core::error::{ConfigError, ConsistencyError, PublishError, PublishResult, ResultExt};
use crate::registry::PackageRegistry;
use crate::release::changes::{ChangeDetector, ChangeReport};
use crate::release::graph::PackageGraph;
use crate::release::manifest::{DESCRIPTOR_FILE, MANIFEST_FILE, PackageDescriptor, ProjectManifest};
use crate::release::version::{self, cmp_precedence};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Version assumed for packages no registry knows about
pub const UNPUBLISHED_VERSION: &str = "0.0.0";

/// A package directory under the packages path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
  pub name: String,
  pub dir: PathBuf,
}

/// Find `<packages_dir>/*/package.json`, sorted by name
pub fn discover_packages(packages_dir: &Path) -> PublishResult<Vec<LocalPackage>> {
  if !packages_dir.join(MANIFEST_FILE).is_file() {
    return Err(PublishError::Config(ConfigError::PackagesPathInvalid {
      path: packages_dir.to_path_buf(),
    }));
  }

  let mut packages = Vec::new();
  let entries =
    fs::read_dir(packages_dir).with_context(|| format!("Failed to list {}", packages_dir.display()))?;
  for entry in entries {
    let dir = entry?.path();
    if !dir.join(DESCRIPTOR_FILE).is_file() {
      continue;
    }
    if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
      packages.push(LocalPackage {
        name: name.to_string(),
        dir: dir.clone(),
      });
    }
  }
  packages.sort_by(|a, b| a.name.cmp(&b.name));
  Ok(packages)
}

/// Mutable state of one run
#[derive(Debug, Default)]
pub struct RunContext {
  /// Version every processed package ends up at
  pub resolved: BTreeMap<String, String>,
  /// Packages to publish, in processing order
  pub publish: Vec<(String, String)>,
  /// View registry the last published version was found in
  pub view_registry: Option<String>,
}

impl RunContext {
  fn record_publish(&mut self, name: &str, version: &str) {
    self.publish.retain(|(n, _)| n != name);
    self.publish.push((name.to_string(), version.to_string()));
  }
}

/// What a run resolved and published
#[derive(Debug, Clone, Default)]
pub struct PublishSummary {
  pub resolved: BTreeMap<String, String>,
  pub published: Vec<(String, String)>,
  /// View registry the last published version was found in
  pub view_registry: Option<String>,
}

pub struct Orchestrator<'a, R: PackageRegistry + ?Sized> {
  registry: &'a R,
  settings: &'a PublishSettings,
  packages_dir: &'a Path,
}

impl<'a, R: PackageRegistry + ?Sized> Orchestrator<'a, R> {
  pub fn new(registry: &'a R, settings: &'a PublishSettings, packages_dir: &'a Path) -> Self {
    Self {
      registry,
      settings,
      packages_dir,
    }
  }

  /// Resolve, rewrite, publish and clean up `packages`
  pub fn run(&self, packages: &[LocalPackage]) -> PublishResult<PublishSummary> {
    let names: Vec<String> = packages.iter().map(|p| p.name.clone()).collect();
    let graph = PackageGraph::new(&names, &self.settings.manual_dependencies);
    let deferred: BTreeSet<String> = self.settings.add_packages_to_manifest.iter().cloned().collect();
    let order = graph.processing_order(&deferred)?;

    println!("📦 Processing {} package(s)", order.len());
    println!("   Order: {}", order.join(" → "));
    println!();

    let mut ctx = RunContext::default();
    for (idx, name) in order.iter().enumerate() {
      let package = packages
        .iter()
        .find(|p| &p.name == name)
        .ok_or_else(|| PublishError::message(format!("Package {} vanished while processing", name)))?;
      println!("📌 [{}/{}] {}", idx + 1, order.len(), name);
      let dependencies = graph.dependencies_of(name);
      if !dependencies.is_empty() {
        println!("   Depends on: {}", dependencies.join(", "));
      }
      self
        .process(package, &mut ctx)
        .with_context(|| format!("While processing package {}", name))?;
    }

    self.finalize(packages, &ctx)?;
    self.publish_all(packages, &ctx)?;

    if !self.settings.dry_run {
      for package in packages {
        fs::remove_dir_all(&package.dir).with_context(|| format!("Failed to remove {}", package.dir.display()))?;
      }
    }

    Ok(PublishSummary {
      resolved: ctx.resolved,
      published: ctx.publish,
      view_registry: ctx.view_registry,
    })
  }

  fn process(&self, package: &LocalPackage, ctx: &mut RunContext) -> PublishResult<()> {
    self.rewrite_dependencies(package, &ctx.resolved, false)?;

    let (current, report) = match self.highest_version(&package.name)? {
      Some((current, registry)) if current != UNPUBLISHED_VERSION => {
        let tracked = self.settings.tracked_dependencies();
        let detector = ChangeDetector::new(
          self.registry,
          &registry,
          &self.settings.vendor_dir,
          &tracked,
          &ctx.resolved,
        );
        let report = detector.is_changed(&package.dir, &package.name, &current)?;
        ctx.view_registry = Some(registry);
        (current, report)
      }
      // Nothing to diff against
      _ => (UNPUBLISHED_VERSION.to_string(), ChangeReport::NotPublished),
    };

    if report.is_changed() {
      if self.settings.only_publish_existing_packages {
        return Err(PublishError::Consistency(ConsistencyError::UnexpectedChange {
          package: package.name.clone(),
        }));
      }

      tracing::debug!(
        package = %package.name,
        current = %current,
        preview = version::is_preview(&current),
        bump = %self.settings.bump,
        "resolving next version"
      );
      let next = version::resolve(&current, self.settings.bump)?;
      println!("   ✏️  {}: {} → {}", report, current, next);
      self.registry.set_local_version(&package.dir, &next)?;
      ctx.resolved.insert(package.name.clone(), next.clone());
      ctx.record_publish(&package.name, &next);
      return Ok(());
    }

    ctx.resolved.insert(package.name.clone(), current.clone());
    let in_publish_registry = self
      .registry
      .view_version(&package.name, &self.settings.publish_registry)?;
    if in_publish_registry.as_deref() == Some(current.as_str()) {
      println!("   ✅ Unchanged at {}", current);
    } else {
      println!("   📤 Unchanged at {}, but missing from the publish registry", current);
      self.registry.set_local_version(&package.dir, &current)?;
      ctx.record_publish(&package.name, &current);
    }
    Ok(())
  }

  /// Highest version over all view registries, with the registry it came from
  ///
  /// Ties go to the publish registry.
  pub fn highest_version(&self, name: &str) -> PublishResult<Option<(String, String)>> {
    let mut best: Option<(String, String)> = None;

    for registry in self.settings.view_registries() {
      let Some(found) = self.registry.view_version(name, &registry)? else {
        tracing::debug!(package = name, registry = %registry, "not found");
        continue;
      };
      tracing::debug!(package = name, registry = %registry, version = %found, "found");

      best = match best {
        None => Some((found, registry)),
        Some((best_version, best_registry)) => match cmp_precedence(&found, &best_version)? {
          Ordering::Greater => Some((found, registry)),
          Ordering::Equal if registry == self.settings.publish_registry => Some((found, registry)),
          _ => Some((best_version, best_registry)),
        },
      };
    }

    Ok(best)
  }

  /// Point declared and manual dependencies at their resolved versions
  ///
  /// With `strict`, a manual dependency that was never resolved is an error.
  fn rewrite_dependencies(
    &self,
    package: &LocalPackage,
    resolved: &BTreeMap<String, String>,
    strict: bool,
  ) -> PublishResult<bool> {
    let mut descriptor = PackageDescriptor::load(&package.dir)?;

    for name in descriptor.dependencies().into_keys() {
      if let Some(version) = resolved.get(&name) {
        descriptor.set_dependency(&name, version);
      }
    }

    for dependency in self.settings.manual_dependencies_of(&package.name) {
      match resolved.get(dependency) {
        Some(version) => descriptor.set_dependency(dependency, version),
        None if strict => {
          return Err(PublishError::Consistency(ConsistencyError::UnresolvedDependency {
            package: package.name.clone(),
            dependency: dependency.to_string(),
          }));
        }
        None => {}
      }
    }

    descriptor.save()
  }

  fn finalize(&self, packages: &[LocalPackage], ctx: &RunContext) -> PublishResult<()> {
    let mut manifest = ProjectManifest::load(self.packages_dir)?;
    manifest.set_registry(&self.settings.publish_registry);

    for (name, version) in &ctx.resolved {
      if manifest.dependency(name).is_some() {
        manifest.set_dependency(name, version);
      }
    }

    for name in &self.settings.add_packages_to_manifest {
      let version = ctx.resolved.get(name).ok_or_else(|| {
        PublishError::Consistency(ConsistencyError::UnresolvedManifestEntry { package: name.clone() })
      })?;
      manifest.set_dependency(name, version);
    }

    for package in packages {
      if self.rewrite_dependencies(package, &ctx.resolved, true)? {
        tracing::debug!(package = %package.name, "rewrote dependencies");
      }
    }

    if manifest.save()? {
      println!("📝 Updated {}", manifest.path().display());
    }
    Ok(())
  }

  fn publish_all(&self, packages: &[LocalPackage], ctx: &RunContext) -> PublishResult<()> {
    if ctx.publish.is_empty() {
      println!("ℹ️  Nothing to publish");
      return Ok(());
    }

    println!();
    for (name, version) in &ctx.publish {
      let package = packages
        .iter()
        .find(|p| &p.name == name)
        .ok_or_else(|| PublishError::message(format!("Package {} vanished before publishing", name)))?;

      if self.settings.dry_run {
        println!("🔍 Would publish {}@{} to {}", name, version, self.settings.publish_registry);
      } else {
        println!("🚀 Publishing {}@{} to {}", name, version, self.settings.publish_registry);
      }
      self
        .registry
        .publish(&package.dir, &self.settings.publish_registry)
        .with_context(|| format!("Failed to publish {}@{}", name, version))?;
    }
    Ok(())
  }
}
