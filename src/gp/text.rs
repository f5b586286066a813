//! The indented text form of a tree.
//!
//! Nodes are written in pre-order. Each node is a `+--<name>` header indented under its
//! parent, followed by a connector line that keeps a `|` running for every ancestor that
//! still has children to come:
//!
//! ```text
//! +--Add<int>
//!    |
//!    +--Const<int,1>
//!    |
//!    +--Add<int>
//!       |
//!       +--Argument<int,0>
//!       |
//!       +--Const<int,2>
//! ```
//!
//! The reader only looks at lines containing `+--` and takes the name after the marker,
//! so connector lines and indentation are free-form.

use super::catalog::NodeCatalog;
use super::expr::{self, Graph, NodeIndex};
use super::node::Node;
use super::subroutine::SubroutineRegistry;
use super::tree::{Signature, Tree};
use super::types::{Type, TypeCatalog};
use crate::error::{Error, Result};

const MARKER: &str = "+--";

/// Write `tree` in its text form.
///
/// Panics if the tree has no root or has empty child slots.
pub fn write_tree(tree: &Tree, types: &TypeCatalog) -> Result<String> {
    let root = tree.root().expect("cannot write a tree without a root");
    write_subtree(tree.graph(), root, types)
}

/// Write the subtree rooted at `root` as though it were a whole tree.
pub fn write_subtree(graph: &Graph, root: NodeIndex, types: &TypeCatalog) -> Result<String> {
    let mut out = String::new();
    write_node(graph, root, types, "", true, &mut out)?;
    Ok(out)
}

fn write_node(
    graph: &Graph,
    nx: NodeIndex,
    types: &TypeCatalog,
    prefix: &str,
    last: bool,
    out: &mut String,
) -> Result<()> {
    push_line(out, &format!("{}{}{}", prefix, MARKER, graph[nx].name(types)?));
    let segment = if last { "   " } else { "|  " };
    let children = expr::expect_children(graph, nx);
    if !children.is_empty() {
        push_line(out, &format!("{}{}|", prefix, segment));
    } else if !last {
        push_line(out, &format!("{}|", prefix));
    } else {
        push_line(out, prefix);
    }
    let prefix = format!("{}{}", prefix, segment);
    let count = children.len();
    for (i, child) in children.into_iter().enumerate() {
        write_node(graph, child, types, &prefix, i + 1 == count, out)?;
    }
    Ok(())
}

fn push_line(out: &mut String, line: &str) {
    let line = line.trim_end();
    if !line.is_empty() {
        out.push_str(line);
        out.push('\n');
    }
}

/// The node names of `text`, in order.
pub fn node_names(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .filter_map(|line| line.find(MARKER).map(|i| line[i + MARKER.len()..].trim()))
}

/// Reads trees, resolving names through a catalog and then a subroutine registry.
#[derive(Copy, Clone, Debug)]
pub struct Reader<'a> {
    catalog: &'a NodeCatalog,
    registry: &'a SubroutineRegistry,
}

impl<'a> Reader<'a> {
    pub fn new(catalog: &'a NodeCatalog, registry: &'a SubroutineRegistry) -> Self {
        Reader { catalog, registry }
    }

    /// Read a whole tree with the given signature from `text`.
    pub fn read(&self, text: &str, signature: Signature) -> Result<Tree> {
        let mut names = node_names(text).peekable();
        if names.peek().is_none() {
            return Err(Error::EmptyTree);
        }
        let mut tree = Tree::new(signature);
        let root = self.read_node(&mut names, &mut tree, None)?;
        tree.set_root(root)?;
        match names.next() {
            Some(extra) => Err(Error::TrailingNode(extra.to_string())),
            None => Ok(tree),
        }
    }

    /// A fresh node for `name`.
    pub fn instantiate(&self, name: &str) -> Result<Node> {
        if let Some(node) = self.catalog.instantiate(name)? {
            return Ok(node);
        }
        self.registry
            .prototype(name)
            .ok_or_else(|| Error::UnknownNode(name.to_string()))
    }

    fn read_node<'t, I>(
        &self,
        names: &mut I,
        tree: &mut Tree,
        parent: Option<&str>,
    ) -> Result<NodeIndex>
    where
        I: Iterator<Item = &'t str>,
    {
        let name = match names.next() {
            Some(name) => name,
            None => return Err(Error::UnexpectedEnd(parent.unwrap_or("").to_string())),
        };
        let node = self.instantiate(name)?;
        check_variable(&node, name, tree.signature())?;
        let arity = node.arity();
        let nx = tree.add_node(node);
        for slot in 0..arity {
            let child = self.read_node(names, tree, Some(name))?;
            tree.set_child(nx, slot, child)?;
        }
        Ok(nx)
    }
}

/// Read a tree with the given signature from `text`.
pub fn read_tree(
    text: &str,
    signature: Signature,
    catalog: &NodeCatalog,
    registry: &SubroutineRegistry,
) -> Result<Tree> {
    Reader::new(catalog, registry).read(text, signature)
}

// Argument and local-variable nodes must refer to a declared slot of the same type.
fn check_variable(node: &Node, name: &str, signature: &Signature) -> Result<()> {
    let (table, declared, ty, index) = match *node {
        Node::Argument { ty, index } => ("argument", &signature.arguments, ty, index),
        Node::LocalVariable { ty, index } => {
            ("local variable", &signature.local_variables, ty, index)
        }
        _ => return Ok(()),
    };
    let found: Type = match declared.get(index) {
        Some(&found) => found,
        None => {
            return Err(Error::VariableOutOfRange {
                node: name.to_string(),
                table,
                index,
                declared: declared.len(),
            })
        }
    };
    if found.strip() != ty.strip() {
        return Err(Error::VariableTypeMismatch {
            node: name.to_string(),
            table,
            index,
            found: ty,
            declared: found,
        });
    }
    Ok(())
}
