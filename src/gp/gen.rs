//! Random generation of trees from a node catalog.
//!
//! Two classic methods are supported:
//!
//! - **Full**: internal nodes are chosen until the depth budget is spent, so every branch
//!   tends towards the full depth.
//! - **Grow**: any node may be chosen at any level, so branches end at varying depths.
//!
//! `ramped` picks between the two at random for each tree.

use super::catalog::NodeCatalog;
use super::expr::{self, Graph, NodeIndex};
use super::node::Node;
use super::tree::{Signature, Tree};
use super::types::{BaseType, Type};
use super::value::Value;
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// A source of random literals for `Const` nodes.
pub trait LiteralSource {
    /// A literal of type `base`.
    fn literal<R: Rng>(&self, rng: &mut R, base: BaseType) -> Value;
}

/// Literals drawn uniformly from the configured ranges.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformLiterals {
    pub int_min: i32,
    pub int_max: i32,
    pub float_min: f64,
    pub float_max: f64,
    pub max_array_len: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Full,
    Grow,
}

/// Generates trees from the prototypes of a catalog.
#[derive(Copy, Clone, Debug)]
pub struct Generator<'a, L> {
    catalog: &'a NodeCatalog,
    literals: &'a L,
}

// Literals.

impl UniformLiterals {
    fn int<R: Rng>(&self, rng: &mut R) -> i32 {
        if self.int_min < self.int_max {
            rng.gen_range(self.int_min..=self.int_max)
        } else {
            self.int_min
        }
    }
}

impl LiteralSource for UniformLiterals {
    fn literal<R: Rng>(&self, rng: &mut R, base: BaseType) -> Value {
        match base {
            BaseType::Bool => Value::Bool(rng.gen()),
            BaseType::Int => Value::Int(self.int(rng)),
            BaseType::Float => {
                if self.float_min < self.float_max {
                    Value::Float(rng.gen_range(self.float_min..self.float_max))
                } else {
                    Value::Float(self.float_min)
                }
            }
            BaseType::IntArray => {
                let len = rng.gen_range(0..=self.max_array_len);
                Value::IntArray((0..len).map(|_| self.int(rng)).collect())
            }
            BaseType::Any => unreachable!("constants always have a concrete type"),
        }
    }
}

impl<'a> From<&'a GenerationConfig> for UniformLiterals {
    fn from(config: &'a GenerationConfig) -> Self {
        UniformLiterals {
            int_min: config.int_min,
            int_max: config.int_max,
            float_min: config.float_min,
            float_max: config.float_max,
            max_array_len: config.max_array_len,
        }
    }
}

impl Default for UniformLiterals {
    fn default() -> Self {
        UniformLiterals::from(&GenerationConfig::default())
    }
}

// Generation.

impl<'a, L> Generator<'a, L>
where
    L: LiteralSource,
{
    pub fn new(catalog: &'a NodeCatalog, literals: &'a L) -> Self {
        Generator { catalog, literals }
    }

    pub fn catalog(&self) -> &'a NodeCatalog {
        self.catalog
    }

    /// A tree whose branches end at varying depths no greater than `max_depth`.
    pub fn grow<R: Rng>(
        &self,
        rng: &mut R,
        signature: &Signature,
        max_depth: usize,
    ) -> Result<Tree> {
        self.tree(rng, signature, max_depth, Method::Grow)
    }

    /// A tree whose branches reach `max_depth` wherever the catalog allows.
    pub fn full<R: Rng>(
        &self,
        rng: &mut R,
        signature: &Signature,
        max_depth: usize,
    ) -> Result<Tree> {
        self.tree(rng, signature, max_depth, Method::Full)
    }

    /// Either `full` or `grow`, chosen at random.
    pub fn ramped<R: Rng>(
        &self,
        rng: &mut R,
        signature: &Signature,
        max_depth: usize,
    ) -> Result<Tree> {
        let method = if rng.gen() { Method::Full } else { Method::Grow };
        self.tree(rng, signature, max_depth, method)
    }

    pub fn tree<R: Rng>(
        &self,
        rng: &mut R,
        signature: &Signature,
        max_depth: usize,
        method: Method,
    ) -> Result<Tree> {
        let mut tree = Tree::new(signature.clone());
        let root = self.subtree(
            rng,
            signature,
            tree.graph_mut(),
            signature.return_type,
            max_depth,
            method,
        )?;
        tree.set_root(root)?;
        Ok(tree)
    }

    /// Generate a parentless subtree accepted by a slot of type `ty` within `graph`.
    ///
    /// Its height is at most `budget`. On failure nothing is left behind in `graph`.
    pub fn subtree<R: Rng>(
        &self,
        rng: &mut R,
        signature: &Signature,
        graph: &mut Graph,
        ty: Type,
        budget: usize,
        method: Method,
    ) -> Result<NodeIndex> {
        let leaf_only = budget == 0;
        let mut candidates = self.candidates(signature, ty, leaf_only);
        if method == Method::Full && !leaf_only && candidates.iter().any(|n| !n.is_leaf()) {
            candidates.retain(|n| !n.is_leaf());
        }
        let prototype = candidates
            .choose(rng)
            .ok_or(Error::NoCandidate { ty, leaf_only })?;

        let mut node = (*prototype).clone();
        if let Node::Const(ref mut value) = node {
            *value = self.literals.literal(rng, value.base_type());
        }
        let nx = graph.add_node(node);
        for slot in 0..graph[nx].arity() {
            let slot_ty = graph[nx].child_type(slot);
            let attached = self
                .subtree(rng, signature, graph, slot_ty, budget - 1, method)
                .and_then(|child| match expr::set_child(graph, nx, slot, child) {
                    Ok(_) => Ok(()),
                    Err(err) => {
                        expr::remove_subtree(graph, child);
                        Err(err)
                    }
                });
            if let Err(err) = attached {
                expr::remove_subtree(graph, nx);
                return Err(err);
            }
        }
        Ok(nx)
    }

    /// Prototypes that may fill a slot of type `ty` in a tree with `signature`.
    ///
    /// Variable access is limited to slots the signature declares, and internal nodes are
    /// only offered when every one of their slots can be closed by a leaf.
    pub fn candidates(&self, signature: &Signature, ty: Type, leaf_only: bool) -> Vec<&'a Node> {
        let leaves = self.leaves(signature);
        self.catalog
            .prototypes()
            .iter()
            .filter(|node| ty.accepts(node.return_type()))
            .filter(|node| {
                if node.is_leaf() {
                    fits(node, signature)
                } else {
                    !leaf_only
                        && (0..node.arity()).all(|slot| {
                            let slot_ty = node.child_type(slot);
                            leaves.iter().any(|leaf| slot_ty.accepts(leaf.return_type()))
                        })
                }
            })
            .collect()
    }

    // Leaf prototypes usable under `signature`.
    fn leaves(&self, signature: &Signature) -> Vec<&'a Node> {
        self.catalog
            .prototypes()
            .iter()
            .filter(|node| node.is_leaf() && fits(node, signature))
            .collect()
    }
}

// Whether a variable access node refers to a slot `signature` declares with a matching type.
fn fits(node: &Node, signature: &Signature) -> bool {
    let (declared, ty, index) = match *node {
        Node::Argument { ty, index } => (&signature.arguments, ty, index),
        Node::LocalVariable { ty, index } => (&signature.local_variables, ty, index),
        _ => return true,
    };
    declared
        .get(index)
        .map_or(false, |declared| declared.strip() == ty.strip())
}
