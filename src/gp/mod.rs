//! Common items related to Genetic Programming.
//!
//! Expressions are trees of typed nodes. Every node declares the type it returns and the
//! type each of its child slots accepts, and a tree can only be assembled in ways that
//! respect those types.
//!
//! - `types`, `value`: the type identities and the values and variables they describe.
//! - `node`, `catalog`: the node kinds and the prototype sets trees are built from.
//! - `expr`, `tree`: the graph that owns a tree's nodes, and the tree itself.
//! - `context`, `eval`: evaluation against argument and local-variable bindings.
//! - `gen`, `ops`: random generation, mutation and crossover.
//! - `text`, `document`, `subroutine`: the text form of trees and named, callable trees.
//! - `fitness`: individuals and operators for evolving trees with `crate::ga`.

pub mod catalog;
pub mod context;
pub mod document;
pub mod eval;
pub mod expr;
pub mod fitness;
pub mod gen;
pub mod node;
pub mod ops;
pub mod subroutine;
pub mod text;
pub mod tree;
pub mod types;
pub mod value;

pub use self::catalog::NodeCatalog;
pub use self::context::EvaluationStatus;
pub use self::node::Node;
pub use self::subroutine::SubroutineRegistry;
pub use self::tree::{Outcome, Signature, Tree};
pub use self::types::{BaseType, Type, TypeCatalog};
pub use self::value::{Value, Variable};
