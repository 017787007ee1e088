//! CLI commands for stable-publish
//!
//! - **publish**: publish changed packages and push a flattened release commit

pub mod publish;

pub use publish::{PublishArgs, run_publish};
