//! The node kinds that make up a tree.
//!
//! A `Node` only holds its own parameters (type, literal, index, arity). Its children
//! live in the owning tree's graph, so cloning a `Node` yields the parameter-only copy
//! used to instantiate prototypes.
//!
//! Every node has a canonical name that encodes its kind, type and property, for example
//! `Const<int,5>`, `Argument<lvalue[int],0>`, `Progn<int,3>` or `Add<float>`. Subroutine
//! nodes are named by their bare document name, e.g. `Fact[int]`.

use super::subroutine::SubroutineSignature;
use super::types::{BaseType, Type, TypeCatalog};
use super::value::Value;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Binary arithmetic on `int` (wrapping) or `float`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arithmetic {
    Add,
    Sub,
    Mult,
    Div,
}

/// Binary comparisons producing `bool`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Comparison {
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Equal,
    NotEqual,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Logic {
    And,
    Or,
    Not,
}

/// An evaluation node.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// A literal.
    Const(Value),
    /// Reads slot `index` of the argument table. A qualified `ty` yields a handle.
    Argument { ty: Type, index: usize },
    /// Reads slot `index` of the local-variable table. A qualified `ty` yields a handle.
    LocalVariable { ty: Type, index: usize },
    /// Evaluates `arity - 1` children for effect then returns the last.
    Progn { ty: Type, arity: usize },
    /// Produces the default of its type.
    Nop(Type),
    Arithmetic(Arithmetic, BaseType),
    Comparison(Comparison, BaseType),
    Logic(Logic),
    /// `(condition, then, else)`.
    If(Type),
    /// `(count, body)`, the body is evaluated `count` times.
    Repeat(Type),
    /// `(location, value)`.
    Substitute(BaseType),
    /// `(location)`.
    Increment(BaseType),
    /// `(array, index)`, the element type of the array.
    At(BaseType),
    /// `(array)`.
    Size(BaseType),
    Break(Type),
    Continue(Type),
    /// `(value)`, ends the current frame with `value`.
    Return(Type),
    /// A call to a registered subroutine.
    Subroutine(Arc<SubroutineSignature>),
}

/// The coarse kind of a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Normal,
    Argument,
    LocalVariable,
    Const,
    Progn,
    Subroutine,
}

/// The node-specific datum embedded in a name.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Literal(Value),
    Index(usize),
    Arity(usize),
}

/// A node name split into its kind and bracketed parameters.
///
/// Only the first comma separates parameters, so literals may contain commas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct NodeName<'a> {
    pub kind: &'a str,
    pub first: Option<&'a str>,
    pub second: Option<&'a str>,
}

impl Arithmetic {
    pub const ALL: [Arithmetic; 4] = [
        Arithmetic::Add,
        Arithmetic::Sub,
        Arithmetic::Mult,
        Arithmetic::Div,
    ];

    fn name(self) -> &'static str {
        match self {
            Arithmetic::Add => "Add",
            Arithmetic::Sub => "Sub",
            Arithmetic::Mult => "Mult",
            Arithmetic::Div => "Div",
        }
    }
}

impl Comparison {
    pub const ALL: [Comparison; 6] = [
        Comparison::Greater,
        Comparison::GreaterEq,
        Comparison::Less,
        Comparison::LessEq,
        Comparison::Equal,
        Comparison::NotEqual,
    ];

    fn name(self) -> &'static str {
        match self {
            Comparison::Greater => "Greater",
            Comparison::GreaterEq => "GreaterEq",
            Comparison::Less => "Less",
            Comparison::LessEq => "LessEq",
            Comparison::Equal => "Equal",
            Comparison::NotEqual => "NotEqual",
        }
    }
}

impl Logic {
    fn name(self) -> &'static str {
        match self {
            Logic::And => "And",
            Logic::Or => "Or",
            Logic::Not => "Not",
        }
    }
}

impl<'a> NodeName<'a> {
    pub fn parse(name: &'a str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        let name = name.trim();
        let open = match name.find('<') {
            Some(open) => open,
            None => {
                return Ok(NodeName {
                    kind: name,
                    first: None,
                    second: None,
                })
            }
        };
        let inner = name[open + 1..]
            .strip_suffix('>')
            .ok_or_else(|| malformed("missing closing `>`"))?;
        let mut params = inner.splitn(2, ',');
        let first = params.next().map(str::trim);
        let second = params.next().map(str::trim);
        Ok(NodeName {
            kind: &name[..open],
            first,
            second,
        })
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match *self {
            Node::Const(_) => NodeKind::Const,
            Node::Argument { .. } => NodeKind::Argument,
            Node::LocalVariable { .. } => NodeKind::LocalVariable,
            Node::Progn { .. } => NodeKind::Progn,
            Node::Subroutine(_) => NodeKind::Subroutine,
            _ => NodeKind::Normal,
        }
    }

    pub fn return_type(&self) -> Type {
        match *self {
            Node::Const(ref value) => Type::plain(value.base_type()),
            Node::Argument { ty, .. }
            | Node::LocalVariable { ty, .. }
            | Node::Progn { ty, .. }
            | Node::Nop(ty)
            | Node::If(ty)
            | Node::Repeat(ty)
            | Node::Break(ty)
            | Node::Continue(ty)
            | Node::Return(ty) => ty,
            Node::Arithmetic(_, base) | Node::Substitute(base) | Node::Increment(base) => {
                Type::plain(base)
            }
            Node::Comparison(..) | Node::Logic(_) => Type::BOOL,
            Node::At(base) => Type::plain(base),
            Node::Size(_) => Type::INT,
            Node::Subroutine(ref sig) => sig.return_type,
        }
    }

    /// The number of child slots.
    pub fn arity(&self) -> usize {
        match *self {
            Node::Const(_)
            | Node::Argument { .. }
            | Node::LocalVariable { .. }
            | Node::Nop(_)
            | Node::Break(_)
            | Node::Continue(_) => 0,
            Node::Logic(Logic::Not)
            | Node::Increment(_)
            | Node::Size(_)
            | Node::Return(_) => 1,
            Node::Arithmetic(..)
            | Node::Comparison(..)
            | Node::Logic(_)
            | Node::Repeat(_)
            | Node::Substitute(_)
            | Node::At(_) => 2,
            Node::If(_) => 3,
            Node::Progn { arity, .. } => arity,
            Node::Subroutine(ref sig) => sig.arguments.len(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.arity() == 0
    }

    /// The declared type of child slot `slot`.
    ///
    /// Panics when `slot >= self.arity()`.
    pub fn child_type(&self, slot: usize) -> Type {
        assert!(
            slot < self.arity(),
            "slot {} out of range for a node of arity {}",
            slot,
            self.arity()
        );
        match *self {
            Node::Progn { ty, arity } => {
                if slot + 1 == arity {
                    ty
                } else {
                    Type::ANY
                }
            }
            Node::Arithmetic(_, base) | Node::Comparison(_, base) => Type::plain(base),
            Node::Logic(_) => Type::BOOL,
            Node::If(ty) => match slot {
                0 => Type::BOOL,
                _ => ty,
            },
            Node::Repeat(ty) => match slot {
                0 => Type::INT,
                _ => ty,
            },
            Node::Substitute(base) => match slot {
                0 => Type::plain(base).left_hand(),
                _ => Type::plain(base),
            },
            Node::Increment(base) => Type::plain(base).left_hand(),
            Node::At(base) => match slot {
                0 => Type::plain(array_of(base)),
                _ => Type::INT,
            },
            Node::Size(base) => Type::plain(array_of(base)),
            Node::Return(ty) => ty,
            Node::Subroutine(ref sig) => sig.arguments[slot],
            _ => unreachable!("leaf nodes have no slots"),
        }
    }

    /// The canonical name.
    pub fn name(&self, types: &TypeCatalog) -> Result<String> {
        let name = match *self {
            Node::Const(ref value) => {
                let ty = types.name(Type::plain(value.base_type()))?;
                format!("Const<{},{}>", ty, value)
            }
            Node::Argument { ty, index } => format!("Argument<{},{}>", types.name(ty)?, index),
            Node::LocalVariable { ty, index } => {
                format!("LocalVariable<{},{}>", types.name(ty)?, index)
            }
            Node::Progn { ty, arity } => format!("Progn<{},{}>", types.name(ty)?, arity),
            Node::Repeat(ty) => format!(
                "Repeat<{},{}>",
                types.name(Type::INT)?,
                types.name(ty)?
            ),
            Node::Subroutine(ref sig) => sig.name.clone(),
            _ => format!("{}<{}>", self.kind_name(), types.name(self.type_parameter())?),
        };
        Ok(name)
    }

    /// The name of prototype families whose members differ only by property, such as
    /// `Const<int>` for every int literal. `None` for nodes without a property.
    pub fn family_name(&self, types: &TypeCatalog) -> Result<Option<String>> {
        let ty = match *self {
            Node::Const(ref value) => Type::plain(value.base_type()),
            Node::Argument { ty, .. } | Node::LocalVariable { ty, .. } | Node::Progn { ty, .. } => {
                ty
            }
            _ => return Ok(None),
        };
        Ok(Some(format!("{}<{}>", self.kind_name(), types.name(ty)?)))
    }

    fn kind_name(&self) -> &'static str {
        match *self {
            Node::Const(_) => "Const",
            Node::Argument { .. } => "Argument",
            Node::LocalVariable { .. } => "LocalVariable",
            Node::Progn { .. } => "Progn",
            Node::Nop(_) => "Nop",
            Node::Arithmetic(op, _) => op.name(),
            Node::Comparison(op, _) => op.name(),
            Node::Logic(op) => op.name(),
            Node::If(_) => "If",
            Node::Repeat(_) => "Repeat",
            Node::Substitute(_) => "Substitute",
            Node::Increment(_) => "Increment",
            Node::At(_) => "At",
            Node::Size(_) => "Size",
            Node::Break(_) => "Break",
            Node::Continue(_) => "Continue",
            Node::Return(_) => "Return",
            Node::Subroutine(_) => "Subroutine",
        }
    }

    /// The single bracketed type of operator-style names.
    fn type_parameter(&self) -> Type {
        match *self {
            Node::Comparison(_, base) => Type::plain(base),
            Node::Logic(_) => Type::BOOL,
            Node::At(base) | Node::Size(base) => Type::plain(array_of(base)),
            _ => self.return_type(),
        }
    }

    pub fn property_value(&self) -> Option<Property> {
        match *self {
            Node::Const(ref value) => Some(Property::Literal(value.clone())),
            Node::Argument { index, .. } | Node::LocalVariable { index, .. } => {
                Some(Property::Index(index))
            }
            Node::Progn { arity, .. } => Some(Property::Arity(arity)),
            _ => None,
        }
    }

    /// Replace the node's property, keeping its type.
    pub fn set_property_from_value(&mut self, property: Property) -> Result<()> {
        let kind = self.kind_name();
        let invalid = |reason: String| Error::MalformedName {
            name: kind.to_string(),
            reason,
        };
        match (self, property) {
            (&mut Node::Const(ref mut value), Property::Literal(new)) => {
                if new.base_type() != value.base_type() {
                    return Err(invalid(format!(
                        "literal `{}` does not match the constant's type",
                        new
                    )));
                }
                *value = new;
            }
            (&mut Node::Argument { ref mut index, .. }, Property::Index(new))
            | (&mut Node::LocalVariable { ref mut index, .. }, Property::Index(new)) => {
                *index = new;
            }
            (&mut Node::Progn { ref mut arity, .. }, Property::Arity(new)) => {
                if new < 2 {
                    return Err(invalid("progn needs at least two children".to_string()));
                }
                *arity = new;
            }
            (_, property) => {
                return Err(invalid(format!("node has no property of the form {:?}", property)));
            }
        }
        Ok(())
    }

    /// Recover the property embedded in `name`, e.g. the literal of `Const<int,5>`.
    ///
    /// Nodes without a property only check that `name` is their own.
    pub fn set_property_from_name(&mut self, name: &str, types: &TypeCatalog) -> Result<()> {
        let malformed = |reason: String| Error::MalformedName {
            name: name.to_string(),
            reason,
        };
        if self.property_value().is_none() {
            return if self.name(types)? == name.trim() {
                Ok(())
            } else {
                Err(malformed(format!("expected `{}`", self.name(types)?)))
            };
        }
        let parsed = NodeName::parse(name)?;
        if parsed.kind != self.kind_name() {
            return Err(malformed(format!("expected a `{}` node", self.kind_name())));
        }
        let ty = types.lookup(parsed.first.unwrap_or(""))?;
        let expected = match *self {
            Node::Const(ref value) => Type::plain(value.base_type()),
            _ => self.return_type(),
        };
        if ty != expected {
            return Err(malformed(format!("expected type `{}`", expected)));
        }
        let datum = parsed
            .second
            .ok_or_else(|| malformed("missing property after the type".to_string()))?;
        let property = match *self {
            Node::Const(_) => Property::Literal(Value::parse(ty.base(), datum).map_err(malformed)?),
            Node::Progn { .. } => Property::Arity(parse_index(datum).map_err(malformed)?),
            _ => Property::Index(parse_index(datum).map_err(malformed)?),
        };
        self.set_property_from_value(property)
    }
}

fn parse_index(datum: &str) -> std::result::Result<usize, String> {
    datum
        .parse::<usize>()
        .map_err(|_| format!("`{}` is not a valid index", datum))
}

fn array_of(element: BaseType) -> BaseType {
    match element {
        BaseType::Int => BaseType::IntArray,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> TypeCatalog {
        TypeCatalog::standard()
    }

    #[test]
    fn names_encode_kind_type_and_property() {
        let types = types();
        let cases = vec![
            (Node::Const(Value::Int(10)), "Const<int,10>"),
            (Node::Const(Value::IntArray(vec![1, 2])), "Const<array[int],[1,2]>"),
            (
                Node::LocalVariable {
                    ty: Type::INT.left_hand(),
                    index: 0,
                },
                "LocalVariable<lvalue[int],0>",
            ),
            (
                Node::Argument {
                    ty: Type::INT.reference(),
                    index: 2,
                },
                "Argument<ref[int],2>",
            ),
            (
                Node::Progn {
                    ty: Type::INT,
                    arity: 2,
                },
                "Progn<int,2>",
            ),
            (Node::Arithmetic(Arithmetic::Mult, BaseType::Int), "Mult<int>"),
            (Node::Comparison(Comparison::Greater, BaseType::Float), "Greater<float>"),
            (Node::Logic(Logic::Not), "Not<bool>"),
            (Node::Repeat(Type::BOOL), "Repeat<int,bool>"),
            (Node::Substitute(BaseType::Int), "Substitute<int>"),
            (Node::At(BaseType::Int), "At<array[int]>"),
            (Node::Size(BaseType::Int), "Size<array[int]>"),
            (Node::Nop(Type::INT.reference()), "Nop<ref[int]>"),
        ];
        for (node, name) in cases {
            assert_eq!(node.name(&types).unwrap(), name);
        }
    }

    #[test]
    fn slot_types() {
        let substitute = Node::Substitute(BaseType::Int);
        assert_eq!(substitute.child_type(0), Type::INT.left_hand());
        assert_eq!(substitute.child_type(1), Type::INT);
        let progn = Node::Progn {
            ty: Type::FLOAT,
            arity: 3,
        };
        assert_eq!(progn.child_type(0), Type::ANY);
        assert_eq!(progn.child_type(2), Type::FLOAT);
        let at = Node::At(BaseType::Int);
        assert_eq!(at.return_type(), Type::INT);
        assert_eq!(at.child_type(0), Type::INT_ARRAY);
        assert_eq!(Node::Size(BaseType::Int).return_type(), Type::INT);
        assert_eq!(Node::Comparison(Comparison::Less, BaseType::Int).return_type(), Type::BOOL);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn child_type_past_arity_panics() {
        Node::Logic(Logic::Not).child_type(1);
    }

    #[test]
    fn properties_are_recovered_from_names() {
        let types = types();
        let mut node = Node::Const(Value::Int(0));
        node.set_property_from_name("Const<int,-7>", &types).unwrap();
        assert_eq!(node, Node::Const(Value::Int(-7)));

        let mut node = Node::Argument {
            ty: Type::INT.left_hand(),
            index: 0,
        };
        node.set_property_from_name("Argument<lvalue[int],3>", &types)
            .unwrap();
        assert_eq!(node.property_value(), Some(Property::Index(3)));

        let mut node = Node::Progn {
            ty: Type::INT,
            arity: 2,
        };
        node.set_property_from_name("Progn<int,4>", &types).unwrap();
        assert_eq!(node.arity(), 4);
        assert!(node.set_property_from_name("Progn<int,1>", &types).is_err());
    }

    #[test]
    fn mismatched_names_are_rejected() {
        let types = types();
        let mut node = Node::Const(Value::Int(0));
        assert!(node.set_property_from_name("Const<bool,true>", &types).is_err());
        assert!(node.set_property_from_name("Const<int,abc>", &types).is_err());
        assert!(node.set_property_from_name("Const<int>", &types).is_err());
        let mut add = Node::Arithmetic(Arithmetic::Add, BaseType::Int);
        assert!(add.set_property_from_name("Add<int>", &types).is_ok());
        assert!(add.set_property_from_name("Sub<int>", &types).is_err());
        assert!(add
            .set_property_from_value(Property::Index(1))
            .is_err());
    }

    #[test]
    fn node_name_parsing() {
        let name = NodeName::parse("Const<array[int],[1,2,3]>").unwrap();
        assert_eq!(name.kind, "Const");
        assert_eq!(name.first, Some("array[int]"));
        assert_eq!(name.second, Some("[1,2,3]"));
        let name = NodeName::parse("Fact[int]").unwrap();
        assert_eq!(name.kind, "Fact[int]");
        assert_eq!(name.first, None);
        assert!(NodeName::parse("Add<int").is_err());
    }
}
