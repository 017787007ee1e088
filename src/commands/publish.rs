//! Publish command implementation
//!
//! Turns command line flags into `Overrides`, merges them with publish.toml,
//! and hands the resulting context to the flatten controller.

use crate::core::config::Overrides;
use crate::core::context::PublishContext;
use crate::core::error::PublishResult;
use crate::core::flatten::FlattenController;
use crate::registry::NpmRegistry;
use crate::release::version::BumpKind;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
  /// Registries consulted for the current version of each package (repeatable)
  #[arg(long = "view-registries", value_name = "URL")]
  pub view_registries: Vec<String>,

  /// Registry packages are published to
  #[arg(long, value_name = "URL")]
  pub publish_registry: Option<String>,

  /// Source repository checkout
  #[arg(long, value_name = "PATH", default_value = ".")]
  pub source_repo: PathBuf,

  /// Distribution repository receiving the release commit
  #[arg(long, value_name = "URL")]
  pub target_repo: Option<String>,

  /// Branch of the distribution repository to push to
  #[arg(long, value_name = "BRANCH")]
  pub target_branch: Option<String>,

  /// Folder holding manifest.json and the package folders, relative to the repository root
  #[arg(long, value_name = "PATH")]
  pub packages_path: Option<PathBuf>,

  /// Package to add to manifest.json once published (repeatable)
  #[arg(long = "add-packages-to-manifest", value_name = "NAME")]
  pub add_packages_to_manifest: Vec<String>,

  /// Extra dependency edge as dependent:dependency (repeatable)
  #[arg(long = "add-package-as-dependency-to-package", value_name = "DEPENDENT:DEPENDENCY")]
  pub add_package_as_dependency_to_package: Vec<String>,

  /// Resolve and commit, but do not publish or push
  #[arg(long)]
  pub dry_run: bool,

  /// Path or glob removed from the release commit (repeatable)
  #[arg(long = "strip-from-commit", value_name = "GLOB")]
  pub strip_from_commit: Vec<String>,

  /// Hidden path or glob allowed in the release commit (repeatable)
  #[arg(long = "whitelist-hidden-paths", value_name = "GLOB")]
  pub whitelist_hidden_paths: Vec<String>,

  /// Republish already published versions instead of publishing new ones
  #[arg(long)]
  pub only_publish_existing_packages: bool,

  /// Version bump applied to changed packages
  #[arg(long, value_enum)]
  pub bump: Option<BumpKind>,

  /// Config file (default: publish.toml in the repository root)
  #[arg(long, value_name = "PATH")]
  pub config: Option<PathBuf>,

  /// Command run in the source checkout before anything is mutated (repeatable)
  #[arg(long = "preflight-command", value_name = "COMMAND")]
  pub preflight_command: Vec<String>,

  /// File that must not carry local modifications (repeatable)
  #[arg(long = "guarded-path", value_name = "PATH")]
  pub guarded_path: Vec<String>,

  /// npm-compatible command line tool
  #[arg(long, value_name = "PROGRAM")]
  pub registry_tool: Option<String>,
}

impl PublishArgs {
  fn overrides(&self) -> Overrides {
    Overrides {
      source_repo: self.source_repo.clone(),
      publish_registry: self.publish_registry.clone(),
      view_registries: self.view_registries.clone(),
      target_repo: self.target_repo.clone(),
      target_branch: self.target_branch.clone(),
      packages_path: self.packages_path.clone(),
      add_packages_to_manifest: self.add_packages_to_manifest.clone(),
      manual_dependencies: self.add_package_as_dependency_to_package.clone(),
      strip_from_commit: self.strip_from_commit.clone(),
      whitelist_hidden_paths: self.whitelist_hidden_paths.clone(),
      only_publish_existing_packages: self.only_publish_existing_packages,
      dry_run: self.dry_run,
      bump: self.bump,
      preflight: self.preflight_command.clone(),
      guarded_paths: self.guarded_path.clone(),
      registry_tool: self.registry_tool.clone(),
    }
  }
}

/// Run the publish command
pub fn run_publish(args: &PublishArgs) -> PublishResult<()> {
  let ctx = PublishContext::build(args.overrides(), args.config.as_deref())?;
  let settings = &ctx.settings;

  println!("📦 stable-publish");
  println!("   Source:   {}", ctx.root().display());
  println!("   Packages: {}", settings.packages_path.display());
  println!("   Target:   {} ({})", settings.target_repo, settings.target_branch);
  println!("   Registry: {}", settings.publish_registry);
  if settings.dry_run {
    println!("   Mode:     dry run");
  }
  println!();

  let registry = NpmRegistry::new(&settings.registry_tool, settings.dry_run)?;
  let report = FlattenController::new(&ctx, &registry).run()?;

  println!();
  println!("📊 Summary");
  for (name, version) in &report.summary.resolved {
    let marker = if report.summary.published.iter().any(|(n, _)| n == name) {
      "🚀"
    } else {
      "  "
    };
    println!("   {} {}@{}", marker, name, version);
  }
  if let Some(view_registry) = &report.summary.view_registry {
    println!("   Compared against {}", view_registry);
  }
  if report.pushed {
    println!("✅ {} pushed to {}", report.commit_message, settings.target_branch);
  } else {
    println!("✅ {} prepared (dry run, not pushed)", report.commit_message);
  }

  Ok(())
}
