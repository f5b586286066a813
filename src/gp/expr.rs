//! The graph in which tree nodes live.
//!
//! Each node within the graph is a `Node`. Edges point from a parent to its children and
//! carry the index of the child slot they fill, so a node's children are found on its
//! `Outgoing` edges and its parent on its single `Incoming` edge.
//!
//! A `StableDiGraph` is used so that node indices stay valid while subtrees are cut out
//! and grafted in by the structural operators.

use super::node::Node;
use super::types::Type;
use crate::error::{Error, Result};
use fnv::FnvHashMap;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Incoming, Outgoing};
use std::mem;

/// The directed graph type used to store tree nodes. Edge weights are child slot indices.
pub type Graph = StableDiGraph<Node, usize, u32>;

/// The node index type used within the `Graph` type.
pub type NodeIndex = petgraph::graph::NodeIndex<u32>;

/// A subtree cut out of (or cloned from) a tree, together with the index of its root.
#[derive(Clone, Debug)]
pub struct Subtree {
    pub graph: Graph,
    pub root: NodeIndex,
}

/// The child filling `slot` of `nx`, if any.
pub fn child(graph: &Graph, nx: NodeIndex, slot: usize) -> Option<NodeIndex> {
    graph
        .edges_directed(nx, Outgoing)
        .find(|e| *e.weight() == slot)
        .map(|e| e.target())
}

/// The children of `nx` indexed by slot. Empty slots are `None`.
pub fn children(graph: &Graph, nx: NodeIndex) -> Vec<Option<NodeIndex>> {
    let mut children = vec![None; graph[nx].arity()];
    for e in graph.edges_directed(nx, Outgoing) {
        children[*e.weight()] = Some(e.target());
    }
    children
}

/// The children of `nx` in slot order.
///
/// Panics when a slot is empty, as every traversal requires complete structure.
pub fn expect_children(graph: &Graph, nx: NodeIndex) -> Vec<NodeIndex> {
    children(graph, nx)
        .into_iter()
        .enumerate()
        .map(|(slot, child)| {
            child.unwrap_or_else(|| {
                panic!("slot {} of node {:?} ({:?}) is empty", slot, nx, graph[nx])
            })
        })
        .collect()
}

/// The parent of `nx` and the slot of the parent it fills.
pub fn parent(graph: &Graph, nx: NodeIndex) -> Option<(NodeIndex, usize)> {
    graph
        .edges_directed(nx, Incoming)
        .next()
        .map(|e| (e.source(), *e.weight()))
}

/// Whether `nx` is the last child of its parent. Parentless nodes count as last.
pub fn is_last_child(graph: &Graph, nx: NodeIndex) -> bool {
    match parent(graph, nx) {
        Some((p, slot)) => slot + 1 == graph[p].arity(),
        None => true,
    }
}

/// Place `new_child` into `slot` of `nx`, returning the child it displaces.
///
/// The new child's return type must be accepted by the slot's declared type. The
/// displaced child stays in the graph without a parent; the caller decides its fate.
///
/// Panics if `slot` is out of range or `new_child` already has a parent.
pub fn set_child(
    graph: &mut Graph,
    nx: NodeIndex,
    slot: usize,
    new_child: NodeIndex,
) -> Result<Option<NodeIndex>> {
    let slot_ty = graph[nx].child_type(slot);
    let child_ty = graph[new_child].return_type();
    if !slot_ty.accepts(child_ty) {
        return Err(Error::ChildTypeMismatch {
            slot: slot_ty,
            child: child_ty,
        });
    }
    assert!(
        parent(graph, new_child).is_none(),
        "node {:?} is already owned by another node",
        new_child
    );
    let old = graph
        .edges_directed(nx, Outgoing)
        .find(|e| *e.weight() == slot)
        .map(|e| (e.id(), e.target()));
    let displaced = old.map(|(edge, target)| {
        graph.remove_edge(edge);
        target
    });
    graph.add_edge(nx, new_child, slot);
    Ok(displaced)
}

/// Check that `ty` is accepted by a slot declared as `slot`.
pub fn check_slot(slot: Type, ty: Type) -> Result<()> {
    if slot.accepts(ty) {
        Ok(())
    } else {
        Err(Error::ChildTypeMismatch { slot, child: ty })
    }
}

/// Remove the edge to `nx` from its parent, returning where it was attached.
pub fn detach(graph: &mut Graph, nx: NodeIndex) -> Option<(NodeIndex, usize)> {
    let edge = graph
        .edges_directed(nx, Incoming)
        .next()
        .map(|e| (e.id(), e.source(), *e.weight()));
    edge.map(|(id, p, slot)| {
        graph.remove_edge(id);
        (p, slot)
    })
}

/// All nodes of the subtree rooted at `root`, in pre-order (slot order).
pub fn subtree_nodes(graph: &Graph, root: NodeIndex) -> Vec<NodeIndex> {
    let mut nodes = Vec::new();
    let mut stack = vec![root];
    while let Some(nx) = stack.pop() {
        nodes.push(nx);
        let mut kids: Vec<(usize, NodeIndex)> = graph
            .edges_directed(nx, Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        kids.sort_by(|a, b| b.0.cmp(&a.0));
        stack.extend(kids.into_iter().map(|(_, c)| c));
    }
    nodes
}

/// The number of edges between `nx` and the root of its tree.
pub fn depth(graph: &Graph, nx: NodeIndex) -> usize {
    let mut depth = 0;
    let mut curr = nx;
    while let Some((p, _)) = parent(graph, curr) {
        depth += 1;
        curr = p;
    }
    depth
}

/// The length of the longest path from `nx` down to a leaf.
///
/// Panics on an empty child slot.
pub fn height(graph: &Graph, nx: NodeIndex) -> usize {
    expect_children(graph, nx)
        .into_iter()
        .map(|c| 1 + height(graph, c))
        .max()
        .unwrap_or(0)
}

/// The number of nodes in the subtree rooted at `nx`.
///
/// Panics on an empty child slot.
pub fn count(graph: &Graph, nx: NodeIndex) -> usize {
    1 + expect_children(graph, nx)
        .into_iter()
        .map(|c| count(graph, c))
        .sum::<usize>()
}

/// Clone the subtree rooted at `root` into a new graph.
pub fn clone_subtree(graph: &Graph, root: NodeIndex) -> Subtree {
    let mut subtree = Graph::default();

    // Add the root without its incoming edge.
    let new_root = subtree.add_node(graph[root].clone());

    // For all others, add both the nodes and their edges from their parent.
    let mut curr = vec![(root, new_root)];
    let mut next = vec![];
    while !curr.is_empty() {
        for (a_old, a_new) in curr.drain(..) {
            for e in graph.edges_directed(a_old, Outgoing) {
                let b = subtree.add_node(graph[e.target()].clone());
                subtree.add_edge(a_new, b, *e.weight());
                next.push((e.target(), b));
            }
        }
        mem::swap(&mut curr, &mut next);
    }

    Subtree {
        graph: subtree,
        root: new_root,
    }
}

/// Move the subtree rooted at `root` out of `graph` into a graph of its own.
///
/// Any edge from the subtree's parent is dropped with it.
pub fn take_subtree(graph: &mut Graph, root: NodeIndex) -> Subtree {
    let nodes = subtree_nodes(graph, root);
    let edges: Vec<(NodeIndex, NodeIndex, usize)> = nodes
        .iter()
        .flat_map(|&a| {
            graph
                .edges_directed(a, Outgoing)
                .map(move |e| (a, e.target(), *e.weight()))
        })
        .collect();

    let mut subtree = Graph::default();
    let mut map = FnvHashMap::with_capacity_and_hasher(nodes.len(), Default::default());
    for nx in nodes {
        if let Some(node) = graph.remove_node(nx) {
            map.insert(nx, subtree.add_node(node));
        }
    }
    for (a, b, slot) in edges {
        subtree.add_edge(map[&a], map[&b], slot);
    }

    Subtree {
        graph: subtree,
        root: map[&root],
    }
}

/// Move every node of `subtree` into `graph`, returning the index of its root there.
///
/// The grafted root has no parent; attach it with `set_child`.
pub fn graft(graph: &mut Graph, subtree: Subtree) -> NodeIndex {
    let Subtree {
        graph: mut sub,
        root,
    } = subtree;
    let edges: Vec<(NodeIndex, NodeIndex, usize)> = sub
        .edge_indices()
        .filter_map(|e| {
            let (a, b) = sub.edge_endpoints(e)?;
            Some((a, b, sub[e]))
        })
        .collect();
    let indices: Vec<NodeIndex> = sub.node_indices().collect();
    let mut map = FnvHashMap::with_capacity_and_hasher(indices.len(), Default::default());
    for nx in indices {
        if let Some(node) = sub.remove_node(nx) {
            map.insert(nx, graph.add_node(node));
        }
    }
    for (a, b, slot) in edges {
        graph.add_edge(map[&a], map[&b], slot);
    }
    map[&root]
}

/// Remove the subtree rooted at `root` from `graph`.
pub fn remove_subtree(graph: &mut Graph, root: NodeIndex) {
    for nx in subtree_nodes(graph, root) {
        graph.remove_node(nx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::node::Arithmetic;
    use crate::gp::types::BaseType;
    use crate::gp::value::Value;

    fn add() -> Node {
        Node::Arithmetic(Arithmetic::Add, BaseType::Int)
    }

    fn int(i: i32) -> Node {
        Node::Const(Value::Int(i))
    }

    // Add(1, Add(2, 3))
    fn sample() -> (Graph, NodeIndex) {
        let mut g = Graph::default();
        let root = g.add_node(add());
        let one = g.add_node(int(1));
        let inner = g.add_node(add());
        let two = g.add_node(int(2));
        let three = g.add_node(int(3));
        set_child(&mut g, root, 0, one).unwrap();
        set_child(&mut g, root, 1, inner).unwrap();
        set_child(&mut g, inner, 0, two).unwrap();
        set_child(&mut g, inner, 1, three).unwrap();
        (g, root)
    }

    #[test]
    fn queries() {
        let (g, root) = sample();
        assert_eq!(height(&g, root), 2);
        assert_eq!(count(&g, root), 5);
        let inner = child(&g, root, 1).unwrap();
        let three = child(&g, inner, 1).unwrap();
        assert_eq!(depth(&g, three), 2);
        assert_eq!(parent(&g, three), Some((inner, 1)));
        assert!(is_last_child(&g, three));
        assert!(!is_last_child(&g, child(&g, inner, 0).unwrap()));
        let order: Vec<Node> = subtree_nodes(&g, root).into_iter().map(|n| g[n].clone()).collect();
        assert_eq!(order, vec![add(), int(1), add(), int(2), int(3)]);
    }

    #[test]
    fn set_child_returns_displaced_child() {
        let (mut g, root) = sample();
        let old = child(&g, root, 0).unwrap();
        let new = g.add_node(int(9));
        assert_eq!(set_child(&mut g, root, 0, new).unwrap(), Some(old));
        assert_eq!(parent(&g, old), None);
        assert_eq!(parent(&g, new), Some((root, 0)));
        assert_eq!(g[old], int(1));
    }

    #[test]
    fn set_child_rejects_wrong_type() {
        let (mut g, root) = sample();
        let b = g.add_node(Node::Const(Value::Bool(true)));
        let before = child(&g, root, 0);
        assert!(set_child(&mut g, root, 0, b).is_err());
        assert_eq!(child(&g, root, 0), before);
        assert_eq!(parent(&g, b), None);
    }

    #[test]
    #[should_panic(expected = "already owned")]
    fn set_child_rejects_owned_child() {
        let (mut g, root) = sample();
        let inner = child(&g, root, 1).unwrap();
        let _ = set_child(&mut g, root, 0, inner);
    }

    #[test]
    #[should_panic(expected = "is empty")]
    fn height_panics_on_missing_child() {
        let mut g = Graph::default();
        let root = g.add_node(add());
        let one = g.add_node(int(1));
        set_child(&mut g, root, 0, one).unwrap();
        height(&g, root);
    }

    #[test]
    fn take_and_graft_move_whole_subtrees() {
        let (mut g, root) = sample();
        let inner = child(&g, root, 1).unwrap();
        let sub = take_subtree(&mut g, inner);
        assert_eq!(g.node_count(), 2);
        assert_eq!(child(&g, root, 1), None);
        assert_eq!(count(&sub.graph, sub.root), 3);

        let mut other = Graph::default();
        let new_root = graft(&mut other, sub);
        assert_eq!(count(&other, new_root), 3);
        assert_eq!(other[child(&other, new_root, 1).unwrap()], int(3));
    }

    #[test]
    fn clone_subtree_preserves_slots() {
        let (g, root) = sample();
        let copy = clone_subtree(&g, root);
        assert_eq!(count(&copy.graph, copy.root), 5);
        let inner = child(&copy.graph, copy.root, 1).unwrap();
        assert_eq!(copy.graph[child(&copy.graph, inner, 0).unwrap()], int(2));
    }

    #[test]
    fn detach_and_remove() {
        let (mut g, root) = sample();
        let inner = child(&g, root, 1).unwrap();
        assert_eq!(detach(&mut g, inner), Some((root, 1)));
        assert_eq!(detach(&mut g, inner), None);
        remove_subtree(&mut g, inner);
        assert_eq!(g.node_count(), 2);
    }
}
