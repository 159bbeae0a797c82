//! Warband error types

use thiserror::Error;

/// Errors that can occur while ingesting or resolving a team graph
#[derive(Debug, Error)]
pub enum WarbandError {
    /// Manager nodes delegate to each other in a loop
    #[error("Circular team manager dependency detected: {}", .path.join(" -> "))]
    CircularDependency {
        /// Full cycle, first id repeated at the end
        path: Vec<String>,
    },

    /// Two nodes share an id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// Tool node carries an unusable toolConfig
    #[error("Tool configuration error: {0}")]
    ToolConfig(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed project JSON
    #[error("Invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading a project
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WarbandError {
    /// Ids taking part in a cycle, if this is a cycle error
    pub fn cycle_path(&self) -> Option<&[String]> {
        match self {
            Self::CircularDependency { path } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_full_path() {
        let err = WarbandError::CircularDependency {
            path: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Circular team manager dependency detected: a -> b -> c -> a"
        );
        assert_eq!(err.cycle_path().map(|p| p.len()), Some(4));
    }

    #[test]
    fn test_non_cycle_has_no_path() {
        let err = WarbandError::DuplicateNode("x".into());
        assert!(err.cycle_path().is_none());
        assert_eq!(err.to_string(), "Duplicate node id: x");
    }
}
