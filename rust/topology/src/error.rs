// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for complex operations.
//!
//! Two families of errors exist. Logic errors are precondition violations
//! made by the caller (a stale key, a sibling that is not a child of the
//! given group, an invalid cycle). Unsupported errors reject configurations
//! the engine deliberately does not attempt. Neither is ever recovered
//! internally, and there is no rollback: after an error raised in the middle
//! of an operation group the complex should be treated as suspect.

use crate::keys::{NodeKey, NodeType};

/// Result type alias for complex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during complex operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A referenced node does not exist (never existed or was destroyed).
    #[error("node not found: {0:?}")]
    NotFound(NodeKey),

    /// A node exists but has the wrong variant for this operation.
    #[error("expected a {expected} but {key:?} is a {actual}")]
    WrongNodeType {
        key: NodeKey,
        expected: NodeType,
        actual: NodeType,
    },

    /// The given next sibling is not a child of the given group.
    #[error("{node:?} is not a child of group {parent:?}")]
    NotAChild { node: NodeKey, parent: NodeKey },

    /// A cycle does not close, or references cells of the wrong kind.
    #[error("invalid key cycle: {0}")]
    InvalidCycle(String),

    /// An argument is malformed (empty input, duplicated cells, mismatched
    /// stroke closedness, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The root group cannot be deleted, moved, or re-parented.
    #[error("the root group cannot be deleted or moved")]
    RootGroup,

    /// Moving a group into its own subtree.
    #[error("cannot move {node:?} into its own descendant {parent:?}")]
    CyclicParenting { node: NodeKey, parent: NodeKey },

    /// An operation was requested while another one is still running.
    #[error("another operation is in progress on this complex")]
    OperationInProgress,

    /// The request is well-formed but describes a configuration the engine
    /// does not handle.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Snapshot serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns `true` for precondition violations made by the caller.
    pub fn is_logic_error(&self) -> bool {
        !matches!(self, Error::Unsupported(_) | Error::Serialization(_))
    }
}
