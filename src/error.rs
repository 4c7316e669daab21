//! Error types for `goal_forest`.

use crate::forest::models::{NodeId, NodeType};

/// Errors that can occur while reading or mutating the goal forest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A storage backend failed for a reason other than `SQLite`.
    #[error("Storage error: {0}")]
    Backend(String),

    /// The target of an operation does not exist in the forest.
    #[error("{node_type} not found: {id}")]
    NotFound {
        /// The kind of node that was looked up.
        node_type: NodeType,
        /// The id that did not resolve.
        id: NodeId,
    },

    /// A parent id does not resolve to an existing goal, milestone or requirement.
    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),

    /// The requested move would make a node its own ancestor.
    #[error("cannot move a node into its own descendant ({id} -> {new_parent})")]
    Cycle {
        /// The node being moved.
        id: NodeId,
        /// The requested new parent.
        new_parent: NodeId,
    },

    /// Caller-supplied input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_the_node_type() {
        let err = Error::NotFound { node_type: NodeType::Task, id: 7 };
        assert_eq!(err.to_string(), "task not found: 7");
    }

    #[test]
    fn test_cycle_message() {
        let err = Error::Cycle { id: 1, new_parent: 3 };
        assert!(err.to_string().starts_with("cannot move a node into its own descendant"));
    }

    #[test]
    fn test_database_error_converts() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
