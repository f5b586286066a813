//! Errors raised while building, reading or writing trees.
//!
//! Faults that occur *during evaluation* never appear here, they are reported through
//! `gp::context::EvaluationStatus` instead.

use crate::gp::types::Type;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown type name `{0}`")]
    UnknownType(String),
    #[error("type `{0}` has no display name in the type catalog")]
    UnnamedType(Type),
    #[error("unknown node `{0}`")]
    UnknownNode(String),
    #[error("malformed node name `{name}`: {reason}")]
    MalformedName { name: String, reason: String },
    #[error("a node returning `{child}` cannot be attached to a slot of type `{slot}`")]
    ChildTypeMismatch { slot: Type, child: Type },
    #[error("`{node}` refers to {table} {index} but the tree declares {declared}")]
    VariableOutOfRange {
        node: String,
        table: &'static str,
        index: usize,
        declared: usize,
    },
    #[error("`{node}` reads {table} {index} as `{found}` but the tree declares `{declared}`")]
    VariableTypeMismatch {
        node: String,
        table: &'static str,
        index: usize,
        found: Type,
        declared: Type,
    },
    #[error("tree text ended early, expected a child for `{0}`")]
    UnexpectedEnd(String),
    #[error("tree text contains no nodes")]
    EmptyTree,
    #[error("unexpected node `{0}` after the end of the tree")]
    TrailingNode(String),
    #[error("no candidate returning `{ty}` (leaf only: {leaf_only})")]
    NoCandidate { ty: Type, leaf_only: bool },
    #[error("prototype `{0}` is already registered")]
    DuplicatePrototype(String),
    #[error("subroutine `{0}` is already registered")]
    DuplicateSubroutine(String),
    #[error("tree has no name")]
    MissingName,
    #[error("{}", .0.join("\n"))]
    Document(Vec<String>),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    TomlWrite(#[from] toml::ser::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Collects independent failures so they can be reported together.
#[derive(Debug, Default)]
pub struct Errors {
    messages: Vec<String>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Record the error of `result` (if any) and hand back its value.
    pub fn check<T, E: std::fmt::Display>(
        &mut self,
        result: std::result::Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err.to_string());
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `Ok(())` when nothing was recorded, otherwise one combined `Error::Document`.
    pub fn finish(self) -> Result<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(Error::Document(self.messages))
        }
    }
}
