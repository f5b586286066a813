//! Values, storage cells and the handles that alias them.

use super::types::{BaseType, Qualifier, Type};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// A plain value of one of the concrete base types.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f64),
    IntArray(Vec<i32>),
}

/// The shared storage behind a `Variable`. `None` until first written or read.
type Storage = Rc<RefCell<Option<Value>>>;

/// A typed storage cell, either owning its value or sharing the storage of a variable
/// owned elsewhere.
#[derive(Clone, Debug)]
pub struct Variable {
    base: BaseType,
    storage: Storage,
}

/// An erased, possibly unbound, handle onto a `Variable`.
#[derive(Clone, Debug)]
pub struct Handle {
    base: BaseType,
    storage: Option<Storage>,
}

/// The type-erased result of evaluating a node.
#[derive(Clone, Debug)]
pub enum Erased {
    /// Produced for wildcard-typed defaults only.
    Void,
    Value(Value),
    LeftHand(Handle),
    Reference(Handle),
}

/// Rust types that map onto a `BaseType`.
pub trait ValueType: Sized {
    const BASE: BaseType;
    fn from_value(value: Value) -> Option<Self>;
    fn into_value(self) -> Value;
}

/// A typed assignable location. Unbound handles are valid and report `false` from
/// `is_bound`.
#[derive(Clone, Debug)]
pub struct LeftHandValue<T> {
    handle: Handle,
    _value: PhantomData<T>,
}

/// A typed reference, the form in which a location crosses a subroutine call.
#[derive(Clone, Debug)]
pub struct Reference<T>(LeftHandValue<T>);

// Value.

impl Value {
    pub fn base_type(&self) -> BaseType {
        match *self {
            Value::Bool(_) => BaseType::Bool,
            Value::Int(_) => BaseType::Int,
            Value::Float(_) => BaseType::Float,
            Value::IntArray(_) => BaseType::IntArray,
        }
    }

    /// The default value of `base`. The wildcard has none.
    pub fn default_for(base: BaseType) -> Option<Value> {
        let value = match base {
            BaseType::Any => return None,
            BaseType::Bool => Value::Bool(false),
            BaseType::Int => Value::Int(0),
            BaseType::Float => Value::Float(0.0),
            BaseType::IntArray => Value::IntArray(Vec::new()),
        };
        Some(value)
    }

    /// Parse the literal form produced by `Display`.
    pub fn parse(base: BaseType, literal: &str) -> Result<Value, String> {
        let literal = literal.trim();
        let bad = || format!("`{}` is not a valid {:?} literal", literal, base);
        match base {
            BaseType::Any => Err("the wildcard type has no literals".to_string()),
            BaseType::Bool => literal.parse().map(Value::Bool).map_err(|_| bad()),
            BaseType::Int => literal.parse().map(Value::Int).map_err(|_| bad()),
            BaseType::Float => literal.parse().map(Value::Float).map_err(|_| bad()),
            BaseType::IntArray => {
                let inner = literal
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(|| format!("`{}` is not a bracketed array literal", literal))?;
                if inner.trim().is_empty() {
                    return Ok(Value::IntArray(Vec::new()));
                }
                inner
                    .split(',')
                    .map(|s| s.trim().parse::<i32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::IntArray)
                    .map_err(|_| format!("`{}` is not a valid int array literal", literal))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // `Debug` gives the shortest representation that parses back exactly.
            Value::Float(x) => write!(f, "{:?}", x),
            Value::IntArray(ref xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl ValueType for bool {
    const BASE: BaseType = BaseType::Bool;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl ValueType for i32 {
    const BASE: BaseType = BaseType::Int;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl ValueType for f64 {
    const BASE: BaseType = BaseType::Float;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(x),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl ValueType for Vec<i32> {
    const BASE: BaseType = BaseType::IntArray;
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::IntArray(xs) => Some(xs),
            _ => None,
        }
    }
    fn into_value(self) -> Value {
        Value::IntArray(self)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Vec<i32>> for Value {
    fn from(xs: Vec<i32>) -> Self {
        Value::IntArray(xs)
    }
}

// Variable.

impl Variable {
    /// A variable owning `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        let value = value.into();
        Variable {
            base: value.base_type(),
            storage: Rc::new(RefCell::new(Some(value))),
        }
    }

    /// A variable with no value yet. It takes the default of `base` on first read.
    pub fn empty(base: BaseType) -> Self {
        assert!(base != BaseType::Any, "variables must have a concrete type");
        Variable {
            base,
            storage: Rc::new(RefCell::new(None)),
        }
    }

    /// A variable sharing the location behind `handle`. `None` when the handle is
    /// unbound.
    pub fn shared(handle: &Handle) -> Option<Self> {
        handle.storage.as_ref().map(|storage| Variable {
            base: handle.base,
            storage: storage.clone(),
        })
    }

    pub fn base_type(&self) -> BaseType {
        self.base
    }

    /// Whether a value has been stored or defaulted yet.
    pub fn has_value(&self) -> bool {
        self.storage.borrow().is_some()
    }

    /// The current value, defaulting it first if the variable is still empty.
    pub fn get(&self) -> Value {
        read(&self.storage, self.base)
    }

    /// The current value as `T`.
    ///
    /// Panics when `T` is not the variable's type.
    pub fn get_as<T: ValueType>(&self) -> T {
        assert_eq!(T::BASE, self.base, "variable read as the wrong type");
        T::from_value(self.get()).expect("stored value matches the declared type")
    }

    /// Store `value`.
    ///
    /// Panics when `value` is not of the variable's type.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        assert_eq!(value.base_type(), self.base, "variable assigned the wrong type");
        *self.storage.borrow_mut() = Some(value);
    }

    /// A handle aliasing this variable.
    pub fn handle(&self) -> Handle {
        Handle {
            base: self.base,
            storage: Some(self.storage.clone()),
        }
    }

    pub fn left_hand<T: ValueType>(&self) -> LeftHandValue<T> {
        LeftHandValue::from_handle(self.handle())
    }

    pub fn reference<T: ValueType>(&self) -> Reference<T> {
        Reference(self.left_hand())
    }
}

fn read(storage: &Storage, base: BaseType) -> Value {
    storage
        .borrow_mut()
        .get_or_insert_with(|| Value::default_for(base).expect("variables have concrete types"))
        .clone()
}

// Handle.

impl Handle {
    /// A handle bound to nothing.
    pub fn unbound(base: BaseType) -> Self {
        Handle { base, storage: None }
    }

    pub fn base_type(&self) -> BaseType {
        self.base
    }

    pub fn is_bound(&self) -> bool {
        self.storage.is_some()
    }

    /// The value behind the handle, defaulting an empty location first.
    pub fn get(&self) -> Option<Value> {
        self.storage.as_ref().map(|s| read(s, self.base))
    }

    /// Write through the handle. Returns `false` when unbound or when `value` has the
    /// wrong type, leaving the location untouched.
    pub fn set(&self, value: Value) -> bool {
        match self.storage {
            Some(ref storage) if value.base_type() == self.base => {
                *storage.borrow_mut() = Some(value);
                true
            }
            _ => false,
        }
    }
}

// Erased.

impl Erased {
    /// The value a node of type `ty` produces when it does not run.
    pub fn default_for(ty: Type) -> Self {
        match ty.qualifier() {
            Qualifier::Plain => match Value::default_for(ty.base()) {
                Some(value) => Erased::Value(value),
                None => Erased::Void,
            },
            Qualifier::LeftHand => Erased::LeftHand(Handle::unbound(ty.base())),
            Qualifier::Reference => Erased::Reference(Handle::unbound(ty.base())),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match *self {
            Erased::Value(ref value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Erased::Value(value) => Some(value),
            _ => None,
        }
    }
}

// Typed handles.

impl<T: ValueType> LeftHandValue<T> {
    pub fn from_handle(handle: Handle) -> Self {
        debug_assert!(
            handle.base == T::BASE,
            "typed handle does not match the location type"
        );
        LeftHandValue {
            handle,
            _value: PhantomData,
        }
    }

    pub fn unbound() -> Self {
        Self::from_handle(Handle::unbound(T::BASE))
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_bound()
    }

    pub fn get(&self) -> Option<T> {
        self.handle.get().and_then(T::from_value)
    }

    /// Returns `false` when unbound.
    pub fn set(&self, value: T) -> bool {
        self.handle.set(value.into_value())
    }

    /// Apply `f` to the stored value, returning the new value.
    pub fn update<F>(&self, f: F) -> Option<T>
    where
        T: Clone,
        F: FnOnce(T) -> T,
    {
        let new = f(self.get()?);
        self.set(new.clone());
        Some(new)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn into_handle(self) -> Handle {
        self.handle
    }
}

impl<'a, T> From<&'a LeftHandValue<T>> for bool {
    fn from(lhv: &'a LeftHandValue<T>) -> bool {
        lhv.handle.is_bound()
    }
}

impl<T: ValueType> Reference<T> {
    pub fn from_handle(handle: Handle) -> Self {
        Reference(LeftHandValue::from_handle(handle))
    }

    pub fn unbound() -> Self {
        Reference(LeftHandValue::unbound())
    }

    pub fn is_bound(&self) -> bool {
        self.0.is_bound()
    }

    pub fn as_left_hand(&self) -> &LeftHandValue<T> {
        &self.0
    }

    pub fn into_left_hand(self) -> LeftHandValue<T> {
        self.0
    }
}

impl<'a, T> From<&'a Reference<T>> for bool {
    fn from(reference: &'a Reference<T>) -> bool {
        reference.0.handle.is_bound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_variables_default_on_first_read() {
        let v = Variable::empty(BaseType::Int);
        assert!(!v.has_value());
        assert_eq!(v.get(), Value::Int(0));
        assert!(v.has_value());
    }

    #[test]
    fn handles_alias_the_variable() {
        let v = Variable::new(3);
        let lhv = v.left_hand::<i32>();
        assert!(lhv.set(7));
        assert_eq!(v.get_as::<i32>(), 7);
        assert_eq!(lhv.update(|x| x + 1), Some(8));
        let shared = Variable::shared(lhv.handle()).unwrap();
        shared.set(10);
        assert_eq!(v.get(), Value::Int(10));
    }

    #[test]
    fn handles_default_empty_locations() {
        let v = Variable::empty(BaseType::Bool);
        let r = v.reference::<bool>();
        assert_eq!(r.as_left_hand().get(), Some(false));
        assert!(v.has_value());
    }

    #[test]
    fn unbound_handles_are_valid_and_inert() {
        let lhv = LeftHandValue::<i32>::unbound();
        assert!(!bool::from(&lhv));
        assert_eq!(lhv.get(), None);
        assert!(!lhv.set(3));
        assert!(Variable::shared(lhv.handle()).is_none());
        let r = Reference::<f64>::unbound();
        assert!(!r.is_bound());
    }

    #[test]
    fn handle_rejects_wrong_type() {
        let v = Variable::new(1);
        assert!(!v.handle().set(Value::Bool(true)));
        assert_eq!(v.get(), Value::Int(1));
    }

    #[test]
    #[should_panic(expected = "wrong type")]
    fn reading_as_wrong_type_panics() {
        let v = Variable::new(true);
        let _: i32 = v.get_as();
    }

    #[test]
    fn literals_parse_back() {
        let values = vec![
            Value::Bool(true),
            Value::Int(-42),
            Value::Float(0.1),
            Value::Float(-3.0),
            Value::IntArray(vec![1, -2, 3]),
            Value::IntArray(vec![]),
        ];
        for value in values {
            let text = value.to_string();
            assert_eq!(Value::parse(value.base_type(), &text).unwrap(), value);
        }
        assert!(Value::parse(BaseType::Int, "1.5").is_err());
        assert!(Value::parse(BaseType::IntArray, "1,2").is_err());
    }

    #[test]
    fn erased_defaults_follow_qualifier() {
        assert_eq!(Erased::default_for(Type::INT).into_value(), Some(Value::Int(0)));
        match Erased::default_for(Type::INT.left_hand()) {
            Erased::LeftHand(h) => assert!(!h.is_bound()),
            other => panic!("unexpected {:?}", other),
        }
        match Erased::default_for(Type::ANY) {
            Erased::Void => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
