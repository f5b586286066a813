//! Type identities for node slots and values.
//!
//! Every slot and every node return value is described by a `Type`: a base value type
//! together with a `Qualifier`. Two `Type`s are the same identity exactly when both parts
//! match, so `Type` is a small `Copy` value that can be compared and hashed freely.
//!
//! The display names used by the text format live in a `TypeCatalog`, which is built once
//! and passed to every read, write and generate call.

use crate::error::{Error, Result};
use fnv::FnvHashMap;
use std::fmt;

/// The value types that nodes may produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BaseType {
    /// The wildcard. Slots of this type accept a child of any type.
    Any,
    Bool,
    Int,
    Float,
    IntArray,
}

/// A modifier layered on top of a base type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// The value itself.
    Plain,
    /// An aliasable slot that may be passed across a subroutine call.
    Reference,
    /// An assignable location.
    LeftHand,
}

/// A (base type, qualifier) identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    base: BaseType,
    qualifier: Qualifier,
}

/// Binds display names to `Type`s and back.
#[derive(Clone, Debug, Default)]
pub struct TypeCatalog {
    by_name: FnvHashMap<String, Type>,
    names: FnvHashMap<Type, String>,
}

impl BaseType {
    /// Every concrete (non-wildcard) base type.
    pub const CONCRETE: [BaseType; 4] = [
        BaseType::Bool,
        BaseType::Int,
        BaseType::Float,
        BaseType::IntArray,
    ];

    /// The element type of array types.
    pub fn element(self) -> Option<BaseType> {
        match self {
            BaseType::IntArray => Some(BaseType::Int),
            _ => None,
        }
    }

    fn canonical_name(self) -> &'static str {
        match self {
            BaseType::Any => "any",
            BaseType::Bool => "bool",
            BaseType::Int => "int",
            BaseType::Float => "float",
            BaseType::IntArray => "array[int]",
        }
    }
}

impl Type {
    pub const ANY: Type = Type::plain(BaseType::Any);
    pub const BOOL: Type = Type::plain(BaseType::Bool);
    pub const INT: Type = Type::plain(BaseType::Int);
    pub const FLOAT: Type = Type::plain(BaseType::Float);
    pub const INT_ARRAY: Type = Type::plain(BaseType::IntArray);

    pub const fn new(base: BaseType, qualifier: Qualifier) -> Self {
        Type { base, qualifier }
    }

    pub const fn plain(base: BaseType) -> Self {
        Type::new(base, Qualifier::Plain)
    }

    /// The assignable-location form of this type's base.
    pub const fn left_hand(self) -> Self {
        Type::new(self.base, Qualifier::LeftHand)
    }

    /// The reference form of this type's base.
    pub const fn reference(self) -> Self {
        Type::new(self.base, Qualifier::Reference)
    }

    /// Strip the qualifier, recovering the base identity.
    pub const fn strip(self) -> Self {
        Type::plain(self.base)
    }

    pub fn base(self) -> BaseType {
        self.base
    }

    pub fn qualifier(self) -> Qualifier {
        self.qualifier
    }

    pub fn is_any(self) -> bool {
        self.base == BaseType::Any
    }

    pub fn is_qualified(self) -> bool {
        self.qualifier != Qualifier::Plain
    }

    /// Whether a slot of this type accepts a child returning `child`.
    ///
    /// Plain slots also accept qualified children of the same base, the value is then read
    /// through the handle.
    pub fn accepts(self, child: Type) -> bool {
        self.is_any() || self == child || child.strip() == self
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let base = self.base.canonical_name();
        match self.qualifier {
            Qualifier::Plain => write!(f, "{}", base),
            Qualifier::Reference => write!(f, "ref[{}]", base),
            Qualifier::LeftHand => write!(f, "lvalue[{}]", base),
        }
    }
}

impl TypeCatalog {
    /// An empty catalog. Nothing can be read or written until types are bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog binding every type, in every qualified form, to its canonical spelling:
    /// `bool`, `int`, `float`, `array[int]`, `lvalue[int]`, `ref[int]`, `any`.
    pub fn standard() -> Self {
        let mut catalog = TypeCatalog::new();
        catalog.bind(Type::ANY, "any");
        for &base in BaseType::CONCRETE.iter() {
            let ty = Type::plain(base);
            for &ty in [ty, ty.left_hand(), ty.reference()].iter() {
                let name = ty.to_string();
                catalog.bind(ty, name);
            }
        }
        catalog
    }

    /// Bind `name` to `ty`, replacing any earlier name of `ty`.
    pub fn bind(&mut self, ty: Type, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if let Some(old) = self.names.insert(ty, name.clone()) {
            self.by_name.remove(&old);
        }
        self.by_name.insert(name, ty);
        self
    }

    /// The type bound to `name`.
    pub fn lookup(&self, name: &str) -> Result<Type> {
        self.by_name
            .get(name.trim())
            .cloned()
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// The display name of `ty`.
    pub fn name(&self, ty: Type) -> Result<&str> {
        self.names
            .get(&ty)
            .map(|s| &s[..])
            .ok_or(Error::UnnamedType(ty))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
