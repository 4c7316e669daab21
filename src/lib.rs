//! # `goal_forest`
//!
//! A hierarchical store of goals, milestones, requirements and tasks, kept as
//! an in-memory forest over two durable tables.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod forest;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
