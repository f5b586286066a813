//! Structural operators: mutation and crossover.

use super::expr::{self, NodeIndex, Subtree};
use super::gen::{Generator, LiteralSource, Method};
use super::node::Node;
use super::tree::{Signature, Tree};
use super::types::Type;
use crate::error::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

/// Picks the node a mutation replaces.
pub trait NodeSelector {
    fn select<R: Rng>(&self, rng: &mut R, tree: &Tree) -> Option<NodeIndex>;
}

/// Picks the pair of nodes a crossover exchanges, one from each tree.
pub trait CrossoverSelector {
    fn select<R: Rng>(&self, rng: &mut R, a: &Tree, b: &Tree) -> Option<(NodeIndex, NodeIndex)>;
}

/// Repairs a `LocalVariable` node moved into a tree with a different signature.
pub trait LocalVariableAdapter {
    fn adapt(&self, node: &mut Node, destination: &Signature);
}

/// Every node of the tree is equally likely.
#[derive(Copy, Clone, Debug, Default)]
pub struct UniformSelector;

/// Pairs nodes with equal return types whose exchange keeps both trees within
/// `max_depth`.
#[derive(Copy, Clone, Debug)]
pub struct DepthPreservingSelector {
    pub max_depth: usize,
    /// Attempts made before giving up on a pair of trees.
    pub retries: usize,
}

/// Keeps local-variable indices that still fit, otherwise moves them to the first slot of
/// the same type.
///
/// When the destination has no slot of that type the index is set past the end. The node
/// then faults with `InvalidValue` when read, and the tree's text no longer reads back,
/// failing with `Error::VariableOutOfRange`. Crossover between trees with the same
/// signature never needs this.
#[derive(Copy, Clone, Debug, Default)]
pub struct RemapLocalVariables;

/// Leaves local-variable nodes untouched.
#[derive(Copy, Clone, Debug, Default)]
pub struct KeepLocalVariables;

impl NodeSelector for UniformSelector {
    fn select<R: Rng>(&self, rng: &mut R, tree: &Tree) -> Option<NodeIndex> {
        // Reservoir sampling over a depth-first walk.
        let mut chosen = None;
        for (i, nx) in tree.nodes().into_iter().enumerate() {
            if rng.gen_range(0..=i) == 0 {
                chosen = Some(nx);
            }
        }
        chosen
    }
}

impl CrossoverSelector for DepthPreservingSelector {
    fn select<R: Rng>(&self, rng: &mut R, a: &Tree, b: &Tree) -> Option<(NodeIndex, NodeIndex)> {
        let b_nodes = b.nodes();
        for _ in 0..self.retries.max(1) {
            let n1 = UniformSelector.select(rng, a)?;
            let ty = a.node(n1).return_type();
            let d1 = a.depth(n1);
            let h1 = a.height(n1);
            let compatible: Vec<NodeIndex> = b_nodes
                .iter()
                .cloned()
                .filter(|&n2| {
                    b.node(n2).return_type() == ty
                        && d1 + b.height(n2) <= self.max_depth
                        && b.depth(n2) + h1 <= self.max_depth
                })
                .collect();
            if let Some(&n2) = compatible.choose(rng) {
                return Some((n1, n2));
            }
        }
        debug!(retries = self.retries, "no compatible crossover points");
        None
    }
}

impl LocalVariableAdapter for RemapLocalVariables {
    fn adapt(&self, node: &mut Node, destination: &Signature) {
        if let Node::LocalVariable { ty, index } = node {
            let base = ty.strip();
            let locals = &destination.local_variables;
            if locals.get(*index).map_or(false, |t| t.strip() == base) {
                return;
            }
            *index = locals
                .iter()
                .position(|t| t.strip() == base)
                .unwrap_or(locals.len());
        }
    }
}

impl LocalVariableAdapter for KeepLocalVariables {
    fn adapt(&self, _node: &mut Node, _destination: &Signature) {}
}

/// Replace a randomly selected node of `tree` with a freshly generated subtree.
///
/// A node at depth `d` is replaced by a subtree of height at most `max_depth - d`. An
/// empty tree is left as it is.
pub fn mutate<R, S, L>(
    rng: &mut R,
    tree: &mut Tree,
    selector: &S,
    generator: &Generator<L>,
    max_depth: usize,
) -> Result<()>
where
    R: Rng,
    S: NodeSelector,
    L: LiteralSource,
{
    let target = match selector.select(rng, tree) {
        Some(nx) => nx,
        None => return Ok(()),
    };
    let depth = tree.depth(target);
    let budget = max_depth.saturating_sub(depth);
    let ty = tree.node(target).return_type();
    let signature = tree.signature().clone();
    let new = generator.subtree(rng, &signature, tree.graph_mut(), ty, budget, Method::Grow)?;
    trace!(?target, depth, budget, "mutating");

    let displaced = match tree.parent(target) {
        Some((parent, slot)) => tree.set_child(parent, slot, new),
        None => tree.set_root(new),
    };
    match displaced {
        Ok(old) => {
            if let Some(old) = old {
                tree.remove_subtree(old);
            }
            Ok(())
        }
        Err(err) => {
            tree.remove_subtree(new);
            Err(err)
        }
    }
}

/// Exchange a pair of compatible subtrees between `a` and `b`.
///
/// When `selector` finds no pair the trees are returned unchanged.
pub fn crossover<R, S, A>(
    rng: &mut R,
    mut a: Tree,
    mut b: Tree,
    selector: &S,
    adapter: &A,
) -> Result<(Tree, Tree)>
where
    R: Rng,
    S: CrossoverSelector,
    A: LocalVariableAdapter,
{
    if let Some((n1, n2)) = selector.select(rng, &a, &b) {
        swap_subtrees(&mut a, n1, &mut b, n2, adapter)?;
    }
    Ok((a, b))
}

/// Move the subtree at `n1` into `b` in place of the subtree at `n2`, and vice versa.
///
/// Each moved subtree is passed through `adapter` for its new tree's signature. Roots
/// and inner nodes are handled alike: a subtree taken from the root becomes the other
/// tree's new root.
///
/// Both subtrees must be accepted where they land. When either is not, both trees are
/// left untouched and `Error::ChildTypeMismatch` is returned.
pub fn swap_subtrees<A>(
    a: &mut Tree,
    n1: NodeIndex,
    b: &mut Tree,
    n2: NodeIndex,
    adapter: &A,
) -> Result<()>
where
    A: LocalVariableAdapter,
{
    expr::check_slot(landing_type(a, n1), b.node(n2).return_type())?;
    expr::check_slot(landing_type(b, n2), a.node(n1).return_type())?;

    let slot_a = a.detach(n1);
    let slot_b = b.detach(n2);
    let mut from_a = a.take_subtree(n1);
    let mut from_b = b.take_subtree(n2);
    adapt(&mut from_a, b.signature(), adapter);
    adapt(&mut from_b, a.signature(), adapter);
    let into_a = a.graft(from_b);
    let into_b = b.graft(from_a);
    attach(a, slot_a, into_a)?;
    attach(b, slot_b, into_b)?;
    Ok(())
}

// The type accepted at the position of `nx`: its parent's slot, or the return type for
// the root.
fn landing_type(tree: &Tree, nx: NodeIndex) -> Type {
    match tree.parent(nx) {
        Some((parent, slot)) => tree.node(parent).child_type(slot),
        None => tree.signature().return_type,
    }
}

fn adapt<A: LocalVariableAdapter>(subtree: &mut Subtree, destination: &Signature, adapter: &A) {
    for nx in expr::subtree_nodes(&subtree.graph, subtree.root) {
        let node = &mut subtree.graph[nx];
        if let Node::LocalVariable { .. } = *node {
            adapter.adapt(node, destination);
        }
    }
}

fn attach(tree: &mut Tree, slot: Option<(NodeIndex, usize)>, nx: NodeIndex) -> Result<()> {
    match slot {
        Some((parent, slot)) => tree.set_child(parent, slot, nx).map(|_| ()),
        None => tree.set_root(nx).map(|_| ()),
    }
}
