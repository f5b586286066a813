//! A tree: a graph of nodes, its root and its declared signature.

use super::context::{EvaluationContext, EvaluationStatus, Resources};
use super::eval;
use super::expr::{self, Graph, NodeIndex, Subtree};
use super::node::Node;
use super::subroutine::{SubroutineRegistry, SubroutineSignature};
use super::types::Type;
use super::value::{Value, Variable};
use crate::config::EvaluationConfig;
use crate::error::Result;

/// The declared interface of a tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    /// Required for trees registered as subroutines.
    pub name: Option<String>,
    pub return_type: Type,
    pub arguments: Vec<Type>,
    pub local_variables: Vec<Type>,
}

/// A typed expression tree.
///
/// Cloning deep-copies the whole graph.
#[derive(Clone, Debug)]
pub struct Tree {
    signature: Signature,
    graph: Graph,
    root: Option<NodeIndex>,
}

/// The result of evaluating a tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub status: EvaluationStatus,
    /// Present when `status` is `ValueReturned`.
    pub value: Option<Value>,
}

impl Signature {
    /// A signature with no arguments and no local variables.
    pub fn new(return_type: Type) -> Self {
        Signature {
            name: None,
            return_type,
            arguments: vec![],
            local_variables: vec![],
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Type>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_local_variables(mut self, local_variables: Vec<Type>) -> Self {
        self.local_variables = local_variables;
        self
    }

    /// The signature callers see when this tree is registered as a subroutine.
    pub fn subroutine(&self) -> Option<SubroutineSignature> {
        self.name.as_ref().map(|name| SubroutineSignature {
            name: name.clone(),
            return_type: self.return_type,
            arguments: self.arguments.clone(),
        })
    }
}

impl Outcome {
    pub fn returned(value: Value) -> Self {
        Outcome {
            status: EvaluationStatus::ValueReturned,
            value: Some(value),
        }
    }
}

impl Tree {
    /// An empty tree. Add nodes and call `set_root` before evaluating it.
    pub fn new(signature: Signature) -> Self {
        Tree {
            signature,
            graph: Graph::default(),
            root: None,
        }
    }

    /// A tree rooted at the root of `subtree`.
    pub fn from_subtree(signature: Signature, subtree: Subtree) -> Result<Self> {
        let Subtree { graph, root } = subtree;
        let mut tree = Tree {
            signature,
            graph,
            root: None,
        };
        tree.set_root(root)?;
        Ok(tree)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn name(&self) -> Option<&str> {
        self.signature.name.as_ref().map(|s| &s[..])
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    pub fn node(&self, nx: NodeIndex) -> &Node {
        &self.graph[nx]
    }

    pub fn node_mut(&mut self, nx: NodeIndex) -> &mut Node {
        &mut self.graph[nx]
    }

    /// Add a parentless node to the tree's graph.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        self.graph.add_node(node)
    }

    /// Make `nx` the root, returning the previous root.
    ///
    /// The new root must be accepted by the declared return type. The previous root stays
    /// in the graph without a parent.
    ///
    /// Panics if `nx` has a parent.
    pub fn set_root(&mut self, nx: NodeIndex) -> Result<Option<NodeIndex>> {
        expr::check_slot(self.signature.return_type, self.graph[nx].return_type())?;
        assert!(
            !self.has_parent(nx),
            "node {:?} is already owned by another node",
            nx
        );
        Ok(self.root.replace(nx))
    }

    pub fn child(&self, nx: NodeIndex, slot: usize) -> Option<NodeIndex> {
        expr::child(&self.graph, nx, slot)
    }

    pub fn children(&self, nx: NodeIndex) -> Vec<Option<NodeIndex>> {
        expr::children(&self.graph, nx)
    }

    /// See `expr::set_child`.
    pub fn set_child(
        &mut self,
        nx: NodeIndex,
        slot: usize,
        child: NodeIndex,
    ) -> Result<Option<NodeIndex>> {
        assert!(Some(child) != self.root, "the root cannot become a child");
        expr::set_child(&mut self.graph, nx, slot, child)
    }

    pub fn parent(&self, nx: NodeIndex) -> Option<(NodeIndex, usize)> {
        expr::parent(&self.graph, nx)
    }

    pub fn has_parent(&self, nx: NodeIndex) -> bool {
        self.parent(nx).is_some()
    }

    /// Unlink `nx` from its parent, returning where it was attached.
    pub fn detach(&mut self, nx: NodeIndex) -> Option<(NodeIndex, usize)> {
        expr::detach(&mut self.graph, nx)
    }

    pub fn depth(&self, nx: NodeIndex) -> usize {
        expr::depth(&self.graph, nx)
    }

    pub fn height(&self, nx: NodeIndex) -> usize {
        expr::height(&self.graph, nx)
    }

    pub fn count(&self, nx: NodeIndex) -> usize {
        expr::count(&self.graph, nx)
    }

    /// The nodes reachable from the root, in pre-order.
    pub fn nodes(&self) -> Vec<NodeIndex> {
        match self.root {
            Some(root) => expr::subtree_nodes(&self.graph, root),
            None => vec![],
        }
    }

    pub fn clone_subtree(&self, nx: NodeIndex) -> Subtree {
        expr::clone_subtree(&self.graph, nx)
    }

    /// Move the subtree at `nx` out of the tree. The tree loses its root if `nx` was it.
    pub fn take_subtree(&mut self, nx: NodeIndex) -> Subtree {
        if self.root == Some(nx) {
            self.root = None;
        }
        expr::take_subtree(&mut self.graph, nx)
    }

    /// Move `subtree` into the tree, returning the index of its (parentless) root.
    pub fn graft(&mut self, subtree: Subtree) -> NodeIndex {
        expr::graft(&mut self.graph, subtree)
    }

    pub fn remove_subtree(&mut self, nx: NodeIndex) {
        if self.root == Some(nx) {
            self.root = None;
        }
        expr::remove_subtree(&mut self.graph, nx)
    }

    /// Empty local-variable cells for one activation of this tree.
    pub fn local_variable_cells(&self) -> Vec<Variable> {
        self.signature
            .local_variables
            .iter()
            .map(|ty| Variable::empty(ty.base()))
            .collect()
    }

    /// Evaluate the tree against `arguments`.
    ///
    /// A frame that finishes while still `Evaluating` returns its root's value. Every
    /// fault is reported through `Outcome::status`.
    ///
    /// Panics if the tree has no root.
    pub fn evaluate(
        &self,
        arguments: Vec<Variable>,
        registry: &SubroutineRegistry,
        config: &EvaluationConfig,
    ) -> Outcome {
        let root = self.root.expect("cannot evaluate a tree without a root");
        let mut resources = Resources::new(config);
        let locals = self.local_variable_cells();
        let mut ctx = EvaluationContext::new(arguments, locals, &mut resources, registry);
        let result = eval::evaluate(&self.graph, root, &mut ctx);
        eval::finish(&mut ctx, result)
    }
}
