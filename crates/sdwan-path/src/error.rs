//! Error types for overlay path selection

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path selection error type
#[derive(Error, Debug)]
pub enum PathError {
    /// Node is not part of the topology
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Node id already registered
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// The node pair already has a link
    #[error("duplicate link: {a} <-> {b}")]
    DuplicateLink {
        /// First endpoint
        a: String,
        /// Second endpoint
        b: String,
    },

    /// No link between the node pair
    #[error("link not found: {a} <-> {b}")]
    LinkNotFound {
        /// First endpoint
        a: String,
        /// Second endpoint
        b: String,
    },

    /// Source and destination are disconnected
    #[error("no path from {from} to {to}")]
    NoPath {
        /// Flow source
        from: String,
        /// Flow destination
        to: String,
    },

    /// Flow id not registered
    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    /// Metric or flow attribute outside its plausible range
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PathError {
    /// Closed classification of this error, as reported in per-flow results
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownNode(_) => ErrorKind::UnknownNode,
            Self::DuplicateNode(_) => ErrorKind::DuplicateNode,
            Self::DuplicateLink { .. } => ErrorKind::DuplicateLink,
            Self::LinkNotFound { .. } => ErrorKind::LinkNotFound,
            Self::NoPath { .. } => ErrorKind::NoPath,
            Self::UnknownFlow(_) => ErrorKind::UnknownFlow,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_) | Self::Io(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn link_not_found(a: &str, b: &str) -> Self {
        Self::LinkNotFound {
            a: a.to_string(),
            b: b.to_string(),
        }
    }
}

/// Error classification without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`PathError::UnknownNode`]
    UnknownNode,
    /// See [`PathError::DuplicateNode`]
    DuplicateNode,
    /// See [`PathError::DuplicateLink`]
    DuplicateLink,
    /// See [`PathError::LinkNotFound`]
    LinkNotFound,
    /// See [`PathError::NoPath`]
    NoPath,
    /// See [`PathError::UnknownFlow`]
    UnknownFlow,
    /// See [`PathError::Validation`]
    Validation,
    /// Configuration or IO failure
    Config,
}

/// Result type for path selection
pub type Result<T> = std::result::Result<T, PathError>;
