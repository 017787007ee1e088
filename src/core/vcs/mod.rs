pub mod system_git;
mod system_git_ops;

pub use system_git::SystemGit;

/// Remote name the flattened release is pushed to
pub const TARGET_REMOTE: &str = "target";
