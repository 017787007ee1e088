//! JSON documents touched by a publish run: `manifest.json` and `package.json`
//!
//! Both are read into an order-preserving `serde_json` map so that keys we do
//! not know about survive a rewrite untouched. Files are written back with
//! four-space indentation, and only when their content actually changed.

use crate::core::error::{ConfigError, PublishError, PublishResult, ResultExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const DESCRIPTOR_FILE: &str = "package.json";

/// A JSON object on disk, remembering what it looked like when loaded
#[derive(Debug, Clone)]
struct JsonFile {
  path: PathBuf,
  data: Map<String, Value>,
  loaded: Map<String, Value>,
}

impl JsonFile {
  fn load(path: &Path) -> PublishResult<Self> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value =
      serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    let Value::Object(data) = value else {
      return Err(PublishError::message(format!(
        "{} does not contain a JSON object",
        path.display()
      )));
    };

    Ok(Self {
      path: path.to_path_buf(),
      loaded: data.clone(),
      data,
    })
  }

  fn is_modified(&self) -> bool {
    self.data != self.loaded
  }

  /// Write back if anything changed. Returns whether the file was written.
  fn save(&mut self) -> PublishResult<bool> {
    if !self.is_modified() {
      return Ok(false);
    }

    let rendered = to_pretty_json(&self.data)?;
    fs::write(&self.path, rendered).with_context(|| format!("Failed to write {}", self.path.display()))?;
    self.loaded = self.data.clone();
    Ok(true)
  }

  fn string_field(&self, key: &str) -> Option<&str> {
    self.data.get(key).and_then(Value::as_str)
  }

  fn string_map(&self, key: &str) -> BTreeMap<String, String> {
    self
      .data
      .get(key)
      .and_then(Value::as_object)
      .map(|deps| {
        deps
          .iter()
          .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
          .collect()
      })
      .unwrap_or_default()
  }

  fn map_entry(&self, key: &str, name: &str) -> Option<&str> {
    self.data.get(key)?.as_object()?.get(name)?.as_str()
  }

  fn set_map_entry(&mut self, key: &str, name: &str, value: &str) {
    let entry = self
      .data
      .entry(key.to_string())
      .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
      *entry = Value::Object(Map::new());
    }
    if let Value::Object(map) = entry {
      map.insert(name.to_string(), Value::String(value.to_string()));
    }
  }
}

/// Render JSON with four-space indentation and a trailing newline
pub fn to_pretty_json<T: Serialize>(value: &T) -> PublishResult<String> {
  let mut buf = Vec::new();
  let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
  let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
  value.serialize(&mut serializer)?;
  let mut rendered = String::from_utf8(buf).map_err(|e| PublishError::message(e.to_string()))?;
  rendered.push('\n');
  Ok(rendered)
}

/// The shared project manifest listing every released package
#[derive(Debug, Clone)]
pub struct ProjectManifest {
  file: JsonFile,
}

impl ProjectManifest {
  /// Load `<packages_path>/manifest.json`
  pub fn load(packages_path: &Path) -> PublishResult<Self> {
    let path = packages_path.join(MANIFEST_FILE);
    if !path.is_file() {
      return Err(PublishError::Config(ConfigError::PackagesPathInvalid {
        path: packages_path.to_path_buf(),
      }));
    }
    Ok(Self {
      file: JsonFile::load(&path)?,
    })
  }

  pub fn path(&self) -> &Path {
    &self.file.path
  }

  pub fn registry(&self) -> Option<&str> {
    self.file.string_field("registry")
  }

  pub fn set_registry(&mut self, url: &str) {
    self
      .file
      .data
      .insert("registry".to_string(), Value::String(url.to_string()));
  }

  pub fn dependency(&self, name: &str) -> Option<&str> {
    self.file.map_entry("dependencies", name)
  }

  pub fn set_dependency(&mut self, name: &str, version: &str) {
    self.file.set_map_entry("dependencies", name, version);
  }

  pub fn dependencies(&self) -> BTreeMap<String, String> {
    self.file.string_map("dependencies")
  }

  pub fn save(&mut self) -> PublishResult<bool> {
    self.file.save()
  }
}

/// A package's own descriptor (`package.json`)
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
  file: JsonFile,
}

impl PackageDescriptor {
  /// Load `<package_dir>/package.json`
  pub fn load(package_dir: &Path) -> PublishResult<Self> {
    Ok(Self {
      file: JsonFile::load(&package_dir.join(DESCRIPTOR_FILE))?,
    })
  }

  /// Parse a descriptor that is not backed by a file we intend to write
  pub fn from_path(path: &Path) -> PublishResult<Self> {
    Ok(Self {
      file: JsonFile::load(path)?,
    })
  }

  pub fn name(&self) -> Option<&str> {
    self.file.string_field("name")
  }

  pub fn version(&self) -> Option<&str> {
    self.file.string_field("version")
  }

  pub fn set_version(&mut self, version: &str) {
    self
      .file
      .data
      .insert("version".to_string(), Value::String(version.to_string()));
  }

  pub fn dependency(&self, name: &str) -> Option<&str> {
    self.file.map_entry("dependencies", name)
  }

  pub fn dependencies(&self) -> BTreeMap<String, String> {
    self.file.string_map("dependencies")
  }

  pub fn set_dependency(&mut self, name: &str, version: &str) {
    self.file.set_map_entry("dependencies", name, version);
  }

  /// Raw key/value view, used when comparing against a published descriptor
  pub fn fields(&self) -> &Map<String, Value> {
    &self.file.data
  }

  pub fn save(&mut self) -> PublishResult<bool> {
    self.file.save()
  }
}
