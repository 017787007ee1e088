//! Version resolution, change detection and publish orchestration
//!
//! # Flow
//!
//! 1. `orchestrator::discover_packages` finds every `<packages>/*/package.json`
//! 2. `graph::PackageGraph` orders them so manual dependencies come first
//! 3. For each package, `changes::ChangeDetector` diffs it against the highest
//!    published version and `version::resolve` picks the next version
//! 4. The orchestrator rewrites `manifest.json` and every descriptor, then
//!    publishes through the `PackageRegistry`
//!
//! When the packages path holds no sources, `republish` copies the artifacts
//! named by the manifest into the publish registry instead.
//!
//! # Invariants
//!
//! - A package is evaluated only after every local package it manually
//!   depends on has a resolved version.
//! - After finalizing, every resolved package listed in `manifest.json`
//!   carries exactly the version that was (or would be) published.
//! - Rewriting manifests twice with the same versions leaves the files
//!   byte-identical.

pub mod changes;
pub mod graph;
pub mod manifest;
pub mod orchestrator;
pub mod republish;
pub mod version;
