//! Republish-only mode
//!
//! Used when the packages path holds no package sources but the manifest
//! names packages (and their manual dependencies) that must exist in the
//! publish registry. Each missing artifact is copied as-is from the registry
//! recorded in the manifest.

use crate::core::config::PublishSettings;
use crate::core::error::{ConfigError, ConsistencyError, PublishError, PublishResult, ResultExt};
use crate::registry::PackageRegistry;
use crate::release::manifest::ProjectManifest;
use crate::release::orchestrator::PublishSummary;
use std::collections::BTreeMap;
use std::path::Path;

pub fn republish_existing<R: PackageRegistry + ?Sized>(
  registry: &R,
  settings: &PublishSettings,
  packages_dir: &Path,
) -> PublishResult<PublishSummary> {
  if !settings.view_registries.is_empty() {
    return Err(PublishError::Config(ConfigError::InvalidValue {
      field: "view_registries".to_string(),
      value: settings.view_registries.join(", "),
    }));
  }
  if settings.add_packages_to_manifest.is_empty() {
    return Err(PublishError::Config(ConfigError::MissingField {
      field: "add_packages_to_manifest".to_string(),
    }));
  }
  if settings.manual_dependencies.is_empty() {
    return Err(PublishError::Config(ConfigError::MissingField {
      field: "add_package_as_dependency_to_package".to_string(),
    }));
  }

  let mut manifest = ProjectManifest::load(packages_dir)?;
  let view_registry = manifest
    .registry()
    .map(str::to_string)
    .ok_or_else(|| PublishError::with_help(
      format!("{} has no registry entry", manifest.path().display()),
      "Republishing copies packages from the registry recorded in the manifest.",
    ))?;

  let tracked = settings.tracked_dependencies();
  let mut wanted: BTreeMap<String, String> = BTreeMap::new();
  for name in &settings.add_packages_to_manifest {
    let version = manifest
      .dependency(name)
      .map(str::to_string)
      .ok_or_else(|| PublishError::Consistency(ConsistencyError::UnresolvedManifestEntry { package: name.clone() }))?;

    let dependencies = registry.view_dependencies(name, &version, &view_registry)?;
    for (dependency, dependency_version) in dependencies {
      if tracked.contains(&dependency) {
        wanted.insert(dependency, dependency_version);
      }
    }
    wanted.insert(name.clone(), version);
  }

  for edge in &settings.manual_dependencies {
    for end in [&edge.dependent, &edge.dependency] {
      if !wanted.contains_key(end) {
        return Err(PublishError::Consistency(ConsistencyError::Invalid {
          reason: format!(
            "{} is named in dependency {} but is neither being added nor a published dependency of one",
            end, edge
          ),
        }));
      }
    }
  }

  println!("♻️  Republishing {} package(s) from {}", wanted.len(), view_registry);
  let scratch = tempfile::tempdir()?;
  let mut published = Vec::new();
  for (name, version) in &wanted {
    let current = registry.view_version(name, &settings.publish_registry)?;
    if current.as_deref() == Some(version.as_str()) {
      println!("   ✅ {}@{} already in the publish registry", name, version);
      continue;
    }

    println!("   🚀 {}@{}", name, version);
    let archive = registry
      .fetch_archive(name, version, &view_registry, scratch.path())
      .with_context(|| format!("Failed to download {}@{}", name, version))?;
    registry.publish_archive(&archive, &settings.publish_registry)?;
    published.push((name.clone(), version.clone()));
  }

  manifest.set_registry(&settings.publish_registry);
  for (name, version) in &published {
    if manifest.dependency(name).is_some() {
      manifest.set_dependency(name, version);
    }
  }
  for name in &settings.add_packages_to_manifest {
    manifest.set_dependency(name, &wanted[name]);
  }
  manifest.save()?;

  Ok(PublishSummary {
    resolved: wanted,
    published,
    view_registry: Some(view_registry),
  })
}
