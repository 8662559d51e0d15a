//! Error types shared by the document layer and the configuration loader.
//!
//! None of these ever reach the end user: the annotation pass swallows
//! `DomError` per fragment and the wasm entry points turn the rest into
//! console diagnostics.

use thiserror::Error;

/// Failure of a structural document operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node is no longer part of the document")]
    DeadNode,
    #[error("node has no parent")]
    Detached,
    #[error("expected a {expected} node")]
    WrongKind { expected: &'static str },
    #[error("cannot insert a node into its own subtree")]
    Cycle,
    #[error("host document rejected the operation: {0}")]
    Host(String),
}

/// Failure to parse a selector from the configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("combinator without a following compound selector")]
    DanglingCombinator,
}

/// Failure to load or validate an `AnnotatorConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid selector in `{field}`: {source}")]
    Selector {
        field: &'static str,
        #[source]
        source: SelectorError,
    },
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
