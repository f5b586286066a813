//! The prototypes from which trees are built.
//!
//! Random generation picks among the catalog's prototypes and the reader instantiates
//! nodes by name from it. Nodes that carry a property (`Const`, `Argument`,
//! `LocalVariable`, `Progn`) and `Nop` are also resolved through their family, so
//! `Const<int,42>` or `Argument<ref[int],3>` read correctly whether or not that exact
//! instance was registered.

use super::node::{Arithmetic, Comparison, Logic, Node, NodeName};
use super::subroutine::SubroutineRegistry;
use super::types::{BaseType, Type, TypeCatalog};
use super::value::Value;
use crate::error::{Error, Result};
use fnv::FnvHashMap;

/// A set of node prototypes indexed by canonical name.
#[derive(Clone, Debug)]
pub struct NodeCatalog {
    types: TypeCatalog,
    prototypes: Vec<Node>,
    by_name: FnvHashMap<String, usize>,
}

impl NodeCatalog {
    /// A catalog with no prototypes.
    pub fn new(types: TypeCatalog) -> Self {
        NodeCatalog {
            types,
            prototypes: vec![],
            by_name: FnvHashMap::default(),
        }
    }

    /// The standard node set over `bool`, `int`, `float` and `array[int]`, plus variable
    /// access for the given argument and local-variable types in each of their forms.
    pub fn standard(
        types: TypeCatalog,
        arguments: &[Type],
        local_variables: &[Type],
    ) -> Result<Self> {
        let mut catalog = NodeCatalog::new(types);
        let numeric = [BaseType::Int, BaseType::Float];
        let scalar = [Type::BOOL, Type::INT, Type::FLOAT];

        for &base in BaseType::CONCRETE.iter() {
            if let Some(value) = Value::default_for(base) {
                catalog.register(Node::Const(value))?;
            }
        }
        for (index, ty) in arguments.iter().enumerate() {
            let ty = ty.strip();
            for &ty in [ty, ty.left_hand(), ty.reference()].iter() {
                catalog.register(Node::Argument { ty, index })?;
            }
        }
        for (index, ty) in local_variables.iter().enumerate() {
            let ty = ty.strip();
            for &ty in [ty, ty.left_hand(), ty.reference()].iter() {
                catalog.register(Node::LocalVariable { ty, index })?;
            }
        }
        for &ty in scalar.iter() {
            catalog.register(Node::Progn { ty, arity: 2 })?;
            catalog.register(Node::If(ty))?;
        }
        for &base in numeric.iter() {
            for &op in Arithmetic::ALL.iter() {
                catalog.register(Node::Arithmetic(op, base))?;
            }
            for &op in Comparison::ALL.iter() {
                catalog.register(Node::Comparison(op, base))?;
            }
            catalog.register(Node::Substitute(base))?;
            catalog.register(Node::Increment(base))?;
        }
        catalog.register(Node::Logic(Logic::And))?;
        catalog.register(Node::Logic(Logic::Or))?;
        catalog.register(Node::Logic(Logic::Not))?;
        catalog.register(Node::Repeat(Type::INT))?;
        catalog.register(Node::At(BaseType::Int))?;
        catalog.register(Node::Size(BaseType::Int))?;
        catalog.register(Node::Break(Type::INT))?;
        catalog.register(Node::Continue(Type::INT))?;
        catalog.register(Node::Return(Type::INT))?;
        Ok(catalog)
    }

    pub fn types(&self) -> &TypeCatalog {
        &self.types
    }

    /// Add `node` as a prototype.
    pub fn register(&mut self, node: Node) -> Result<&mut Self> {
        let name = node.name(&self.types)?;
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicatePrototype(name));
        }
        self.by_name.insert(name, self.prototypes.len());
        self.prototypes.push(node);
        Ok(self)
    }

    /// Add a call prototype for every committed subroutine in `registry`.
    pub fn register_subroutines(&mut self, registry: &SubroutineRegistry) -> Result<&mut Self> {
        for name in registry.names() {
            if let Some(node) = registry.prototype(name) {
                self.register(node)?;
            }
        }
        Ok(self)
    }

    pub fn prototypes(&self) -> &[Node] {
        &self.prototypes
    }

    /// The prototype registered under exactly `name`.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.by_name.get(name.trim()).map(|&i| &self.prototypes[i])
    }

    /// A fresh node for `name`, with any embedded property applied.
    ///
    /// `Ok(None)` when the name is not known to the catalog.
    pub fn instantiate(&self, name: &str) -> Result<Option<Node>> {
        let mut node = match self.get(name) {
            Some(node) => node.clone(),
            None => match self.family(name)? {
                Some(node) => node,
                None => return Ok(None),
            },
        };
        node.set_property_from_name(name, &self.types)?;
        Ok(Some(node))
    }

    // A placeholder member of the family named by `name`, if it has one.
    fn family(&self, name: &str) -> Result<Option<Node>> {
        let parsed = NodeName::parse(name)?;
        let ty = match parsed.first {
            Some(first) => first,
            None => return Ok(None),
        };
        let node = match parsed.kind {
            "Const" => {
                let ty = self.types.lookup(ty)?;
                match Value::default_for(ty.base()) {
                    Some(value) if !ty.is_qualified() => Node::Const(value),
                    _ => {
                        return Err(Error::MalformedName {
                            name: name.to_string(),
                            reason: format!("constants cannot have type `{}`", ty),
                        })
                    }
                }
            }
            "Argument" => Node::Argument {
                ty: self.types.lookup(ty)?,
                index: 0,
            },
            "LocalVariable" => Node::LocalVariable {
                ty: self.types.lookup(ty)?,
                index: 0,
            },
            "Progn" => Node::Progn {
                ty: self.types.lookup(ty)?,
                arity: 2,
            },
            "Nop" => Node::Nop(self.types.lookup(ty)?),
            _ => return Ok(None),
        };
        Ok(Some(node))
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> NodeCatalog {
        NodeCatalog::standard(TypeCatalog::standard(), &[Type::INT], &[Type::FLOAT]).unwrap()
    }

    #[test]
    fn standard_names_are_unique_and_resolvable() {
        let catalog = catalog();
        for node in catalog.prototypes() {
            let name = node.name(catalog.types()).unwrap();
            assert_eq!(catalog.instantiate(&name).unwrap().as_ref(), Some(node));
        }
    }

    #[test]
    fn every_slot_accepts_exactly_its_declared_type() {
        use crate::gp::expr::{self, Graph};

        let catalog = catalog();
        let mut children = vec![];
        for &base in BaseType::CONCRETE.iter() {
            let ty = Type::plain(base);
            children.extend(vec![ty, ty.left_hand(), ty.reference()]);
        }
        for prototype in catalog.prototypes() {
            for slot in 0..prototype.arity() {
                let slot_ty = prototype.child_type(slot);
                for &child_ty in &children {
                    let mut g = Graph::default();
                    let parent = g.add_node(prototype.clone());
                    let child = g.add_node(Node::Nop(child_ty));
                    let attached = expr::set_child(&mut g, parent, slot, child).is_ok();
                    assert_eq!(
                        attached,
                        slot_ty.accepts(child_ty),
                        "slot {} of {:?} given {}",
                        slot,
                        prototype,
                        child_ty
                    );
                    if attached {
                        assert_eq!(expr::parent(&g, child), Some((parent, slot)));
                    } else {
                        assert_eq!(expr::parent(&g, child), None);
                        assert_eq!(expr::child(&g, parent, slot), None);
                    }
                }
            }
        }
    }

    #[test]
    fn families_resolve_unregistered_properties() {
        let catalog = catalog();
        assert_eq!(
            catalog.instantiate("Const<int,42>").unwrap(),
            Some(Node::Const(Value::Int(42)))
        );
        assert_eq!(
            catalog.instantiate("Argument<ref[bool],3>").unwrap(),
            Some(Node::Argument {
                ty: Type::BOOL.reference(),
                index: 3
            })
        );
        assert_eq!(
            catalog.instantiate("Progn<float,5>").unwrap(),
            Some(Node::Progn {
                ty: Type::FLOAT,
                arity: 5
            })
        );
        assert_eq!(
            catalog.instantiate("Nop<ref[int]>").unwrap(),
            Some(Node::Nop(Type::INT.reference()))
        );
    }

    #[test]
    fn unknown_and_malformed_names() {
        let catalog = catalog();
        assert_eq!(catalog.instantiate("Frobnicate<int>").unwrap(), None);
        assert_eq!(catalog.instantiate("Fact[int]").unwrap(), None);
        assert!(catalog.instantiate("Const<int,x>").is_err());
        assert!(catalog.instantiate("Const<lvalue[int],1>").is_err());
        assert!(catalog.instantiate("Argument<integer,0>").is_err());
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut catalog = catalog();
        match catalog.register(Node::If(Type::INT)) {
            Err(Error::DuplicatePrototype(name)) => assert_eq!(name, "If<int>"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
