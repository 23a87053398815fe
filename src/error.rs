use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::properties::NodeId;

/// Errors surfaced by the substrate.
///
/// None of these are retried or swallowed internally; the core is a library
/// and recovery (skip, abort, re-run) belongs to the calling system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum AsgError {
    /// An identity did not resolve to a live node: never allocated, already
    /// removed, or referenced by a persisted edge whose target record was
    /// never declared.
    #[error("Dangling reference: node {0} is not allocated")]
    DanglingReference(NodeId),
    /// An operation contradicted the schema catalog: undeclared edge,
    /// target-kind mismatch, multiplicity misuse, double ownership, missing
    /// capability, or removal of a still-referenced node.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),
    /// Raised by a visitor callback; aborts the active traversal and
    /// propagates to the traversal's caller unchanged.
    #[error("Visitor error: {0}")]
    Visitor(String),
    /// Persisted stream has a wrong header, wrong version, or ends
    /// mid-record.
    #[error("Format error: {0}")]
    Format(String),
    /// A record was framed correctly but its fields cannot be interpreted
    /// consistently with its declared kind.
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    /// File system error while saving or loading.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<io::Error> for AsgError {
    fn from(src: io::Error) -> Self {
        match src.kind() {
            // A stream that ends inside a record is a framing problem, not
            // an environment problem.
            io::ErrorKind::UnexpectedEof => {
                AsgError::Format(format!("truncated stream: {src}"))
            }
            _ => AsgError::Io(format!("IOError: {}", src.kind())),
        }
    }
}

impl From<std::string::FromUtf8Error> for AsgError {
    fn from(src: std::string::FromUtf8Error) -> Self {
        AsgError::CorruptData(format!("string record is not valid UTF-8: {src}"))
    }
}

pub type Result<T> = std::result::Result<T, AsgError>;
