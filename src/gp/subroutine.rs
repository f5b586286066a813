//! Named trees that other trees may call.
//!
//! Registration is two phase so that a document may call itself: the name is first
//! `reserve`d (making a `Subroutine` prototype available to the reader), the body is
//! parsed, and the entry is then `commit`ted or `rollback`ed.

use super::node::Node;
use super::tree::Tree;
use super::types::Type;
use crate::error::{Error, Result};
use fnv::FnvHashMap;
use std::sync::Arc;
use tracing::debug;

/// What a caller needs to know about a subroutine: its name and its call signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubroutineSignature {
    pub name: String,
    pub return_type: Type,
    pub arguments: Vec<Type>,
}

#[derive(Clone, Debug)]
struct Entry {
    signature: Arc<SubroutineSignature>,
    // `None` while the body is still being read.
    body: Option<Tree>,
}

/// The table of subroutines shared by every `Subroutine` node. Bodies are looked up by
/// name at call time.
#[derive(Clone, Debug, Default)]
pub struct SubroutineRegistry {
    entries: FnvHashMap<String, Entry>,
}

impl SubroutineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `signature.name` before the body exists.
    pub fn reserve(&mut self, signature: SubroutineSignature) -> Result<Arc<SubroutineSignature>> {
        if self.entries.contains_key(&signature.name) {
            return Err(Error::DuplicateSubroutine(signature.name));
        }
        let signature = Arc::new(signature);
        let entry = Entry {
            signature: signature.clone(),
            body: None,
        };
        self.entries.insert(signature.name.clone(), entry);
        Ok(signature)
    }

    /// Install the body of a reserved subroutine.
    ///
    /// Panics if `name` was never reserved.
    pub fn commit(&mut self, name: &str, body: Tree) {
        match self.entries.get_mut(name) {
            Some(entry) => entry.body = Some(body),
            None => panic!("subroutine `{}` was committed without being reserved", name),
        }
    }

    /// Forget a reservation, e.g. after its body failed to load.
    pub fn rollback(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Reserve and commit `tree` under its own name in one go.
    pub fn register(&mut self, tree: Tree) -> Result<Arc<SubroutineSignature>> {
        let signature = tree.signature().subroutine().ok_or(Error::MissingName)?;
        let signature = self.reserve(signature)?;
        self.commit(&signature.name, tree);
        debug!(name = %signature.name, "registered subroutine");
        Ok(signature)
    }

    /// Remove a subroutine, returning its body if it had one.
    pub fn remove(&mut self, name: &str) -> Option<Tree> {
        debug!(name, "removing subroutine");
        self.entries.remove(name).and_then(|entry| entry.body)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn signature(&self, name: &str) -> Option<&Arc<SubroutineSignature>> {
        self.entries.get(name).map(|entry| &entry.signature)
    }

    /// A node calling `name`. Available as soon as the name is reserved.
    pub fn prototype(&self, name: &str) -> Option<Node> {
        self.signature(name).map(|sig| Node::Subroutine(sig.clone()))
    }

    /// The committed body of `name`.
    pub fn body(&self, name: &str) -> Option<&Tree> {
        self.entries.get(name).and_then(|entry| entry.body.as_ref())
    }

    /// The names of all committed subroutines, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .iter()
            .filter(|&(_, entry)| entry.body.is_some())
            .map(|(name, _)| &name[..])
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::tree::Signature;
    use crate::gp::value::Value;

    fn signature(name: &str) -> SubroutineSignature {
        SubroutineSignature {
            name: name.to_string(),
            return_type: Type::INT,
            arguments: vec![Type::INT],
        }
    }

    fn body(name: &str) -> Tree {
        let signature = Signature::new(Type::INT)
            .named(name)
            .with_arguments(vec![Type::INT]);
        let mut tree = Tree::new(signature);
        let root = tree.add_node(Node::Const(Value::Int(1)));
        tree.set_root(root).unwrap();
        tree
    }

    #[test]
    fn reserved_names_resolve_before_commit() {
        let mut registry = SubroutineRegistry::new();
        registry.reserve(signature("Fact[int]")).unwrap();
        assert!(registry.prototype("Fact[int]").is_some());
        assert!(registry.body("Fact[int]").is_none());
        assert!(registry.names().is_empty());
        registry.commit("Fact[int]", body("Fact[int]"));
        assert!(registry.body("Fact[int]").is_some());
        assert_eq!(registry.names(), vec!["Fact[int]"]);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = SubroutineRegistry::new();
        registry.register(body("One[int]")).unwrap();
        match registry.reserve(signature("One[int]")) {
            Err(Error::DuplicateSubroutine(name)) => assert_eq!(name, "One[int]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rollback_forgets_the_reservation() {
        let mut registry = SubroutineRegistry::new();
        registry.reserve(signature("Broken[int]")).unwrap();
        registry.rollback("Broken[int]");
        assert!(!registry.contains("Broken[int]"));
        assert!(registry.prototype("Broken[int]").is_none());
        assert!(registry.reserve(signature("Broken[int]")).is_ok());
    }

    #[test]
    fn unnamed_trees_cannot_be_registered() {
        let mut registry = SubroutineRegistry::new();
        let tree = Tree::new(Signature::new(Type::INT));
        assert!(matches!(registry.register(tree), Err(Error::MissingName)));
    }
}
