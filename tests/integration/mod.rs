//! Integration tests for the stable-publish binary

mod helpers;
mod test_checks;
mod test_config;
mod test_flatten;
