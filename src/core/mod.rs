//! Core engine for stable-publish
//!
//! - **config**: publish.toml parsing and merging with the command line
//! - **context**: opened source repository plus resolved settings for one run
//! - **error**: error types with exit codes and contextual help
//! - **flatten**: the release commit pipeline (squash, publish, push)
//! - **vcs**: git operations (SystemGit)

pub mod config;
pub mod context;
pub mod error;
pub mod flatten;
pub mod vcs;
