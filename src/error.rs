// src/error.rs

//! Error types for kiln
//!
//! The variants follow the failure taxonomy of the orchestrator: configuration
//! problems and missing tools abort a run before any build work starts,
//! dependency problems abort the traversal that found them, and subprocess
//! failures carry enough context to be reported verbatim.

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unsupported platform/architecture, bad config file, template that
    /// never converges
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A required platform tool could not be located
    #[error("Required tool '{tool}' not found for sdk '{sdk}'")]
    ToolNotFound { sdk: String, tool: String },

    /// A recipe references a dependency the registry cannot load
    #[error("Cannot find recipe [{name}] in dependency list for [{}]", referrers.join(", "))]
    MissingDependency {
        name: String,
        referrers: Vec<String>,
    },

    /// The dependency graph contains a cycle
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// An external program exited with a non-zero status
    #[error("Failed to execute {command} (exit code {code:?})\nstdout: {stdout}\nstderr: {stderr}")]
    CommandFailed {
        command: String,
        stdout: String,
        stderr: String,
        code: Option<i32>,
    },

    /// A recipe build step failed for one architecture
    #[error("Build of {recipe} failed for {arch}: {reason}")]
    BuildFailed {
        recipe: String,
        arch: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Wrap `err` with what was being done when it happened, keeping its kind
    pub fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        Error::Io(std::io::Error::new(err.kind(), format!("{context}: {err}")))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(format!("Invalid JSON: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_names_referrers() {
        let err = Error::MissingDependency {
            name: "libffi".to_string(),
            referrers: vec!["python3".to_string(), "openssl".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("[libffi]"));
        assert!(msg.contains("python3, openssl"));
    }

    #[test]
    fn test_circular_dependency_renders_path() {
        let err = Error::CircularDependency {
            cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_io_context_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io("Failed to write state file /x", io);
        match &err {
            Error::Io(inner) => assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "I/O error: Failed to write state file /x: denied");
    }
}
