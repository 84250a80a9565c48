//! The tagged value model.
//!
//! Every datum a script touches is a [`Value`]: a closed sum over null,
//! boolean, 64-bit integer, 64-bit float, string, list, map, buffer, error,
//! opaque object, and iterator. Scalars carry their payload inline; the
//! container variants hold shared references, so pushing a list onto the
//! operand stack and assigning it to a variable observe the same storage.
//!
//! Coercion rules (truthiness, numeric widening, string forms) live here;
//! the arithmetic and comparison semantics built on top of them live in the
//! `operators` module.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::buffer::BufferData;

/// A runtime value.
///
/// Cloning is cheap for every variant: scalars are copied, containers share
/// their backing storage via reference counting.
///
/// # Example
///
/// ```
/// use rookscript::Value;
///
/// let v = Value::from(42);
/// assert_eq!(v.type_name(), "int");
/// assert!(v.is_truthy());
/// assert_eq!(v.coerce_string(), "42");
/// ```
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<MapData>>),
    Buffer(Rc<RefCell<BufferData>>),
    Error(Rc<ErrorValue>),
    Object(Rc<dyn Any>),
    Iterator(Rc<RefCell<dyn ValueIterator>>),
}

/// A first-class runtime failure.
///
/// Error values flow through the operand stack like any other value and are
/// detected by the `CHECK_ERROR` opcode; they are distinct from host-level
/// [`Error`](crate::Error)s, which terminate the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    kind: String,
    message: String,
}

impl ErrorValue {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Shorthand for the `OutOfRange` kind used by buffer access.
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new("OutOfRange", message)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Insertion-ordered, case-sensitive string-keyed mapping.
///
/// Backed by a plain entry vector; script maps are small and iteration order
/// must match insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData {
    entries: Vec<(Rc<str>, Value)>,
}

impl MapData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    /// Insert or overwrite. New keys append, preserving insertion order.
    pub fn set(&mut self, key: impl Into<Rc<str>>, value: Value) {
        let key = key.into();
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let at = self.entries.iter().position(|(k, _)| k.as_ref() == key)?;
        Some(self.entries.remove(at).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_ref() == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

// ---------------------------------------------------------------------------
// Iterators
// ---------------------------------------------------------------------------

/// Pull-stream over a value's contents.
///
/// Returned pairs are fresh values each call; mutating them does not affect
/// the source container. `next` after exhaustion returns `None`.
pub trait ValueIterator {
    fn has_next(&self) -> bool;

    /// Advance and return the next `(key, value)` pair.
    fn next(&mut self) -> Option<(Value, Value)>;
}

/// Yields `(index, element)` over a shared list. Tracks the live list, so
/// elements appended during iteration are visited.
struct ListValueIterator {
    list: Rc<RefCell<Vec<Value>>>,
    index: usize,
}

impl ValueIterator for ListValueIterator {
    fn has_next(&self) -> bool {
        self.index < self.list.borrow().len()
    }

    fn next(&mut self) -> Option<(Value, Value)> {
        let element = self.list.borrow().get(self.index).cloned()?;
        let key = Value::Int(self.index as i64);
        self.index += 1;
        Some((key, element))
    }
}

/// Yields `(key, value)` over a shared map in insertion order.
struct MapValueIterator {
    map: Rc<RefCell<MapData>>,
    index: usize,
}

impl ValueIterator for MapValueIterator {
    fn has_next(&self) -> bool {
        self.index < self.map.borrow().len()
    }

    fn next(&mut self) -> Option<(Value, Value)> {
        let map = self.map.borrow();
        let (key, value) = map.entries.get(self.index)?;
        let pair = (Value::Str(Rc::clone(key)), value.clone());
        drop(map);
        self.index += 1;
        Some(pair)
    }
}

/// Yields `(index, char-as-int)` over a string's characters, masked to
/// 16 bits like the char widening rule.
struct StringValueIterator {
    chars: Vec<char>,
    index: usize,
}

impl ValueIterator for StringValueIterator {
    fn has_next(&self) -> bool {
        self.index < self.chars.len()
    }

    fn next(&mut self) -> Option<(Value, Value)> {
        let c = *self.chars.get(self.index)?;
        let pair = (
            Value::Int(self.index as i64),
            Value::Int((c as i64) & 0xFFFF),
        );
        self.index += 1;
        Some(pair)
    }
}

/// Yields a single `(null, value)` pair, for iterating non-container values.
struct SingleValueIterator {
    value: Option<Value>,
}

impl ValueIterator for SingleValueIterator {
    fn has_next(&self) -> bool {
        self.value.is_some()
    }

    fn next(&mut self) -> Option<(Value, Value)> {
        self.value.take().map(|v| (Value::Null, v))
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

impl Value {
    /// Build a new, empty list value.
    pub fn new_list() -> Self {
        Value::List(Rc::new(RefCell::new(Vec::new())))
    }

    /// Build a list value from existing elements.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Build a new, empty map value.
    pub fn new_map() -> Self {
        Value::Map(Rc::new(RefCell::new(MapData::new())))
    }

    /// Build a map value from existing contents.
    pub fn map(data: MapData) -> Self {
        Value::Map(Rc::new(RefCell::new(data)))
    }

    /// Build a buffer value.
    pub fn buffer(data: BufferData) -> Self {
        Value::Buffer(Rc::new(RefCell::new(data)))
    }

    /// Build an error value from a kind tag and message.
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error(Rc::new(ErrorValue::new(kind, message)))
    }

    /// Wrap an arbitrary host object as an opaque reference.
    pub fn object<T: 'static>(value: T) -> Self {
        Value::Object(Rc::new(value))
    }

    /// Downcast an opaque object reference to a concrete type.
    pub fn object_as<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            Value::Object(o) => Rc::clone(o).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// True if this is an opaque object of the given concrete type.
    pub fn object_is<T: 'static>(&self) -> bool {
        matches!(self, Value::Object(o) if (**o).is::<T>())
    }

    /// Build an iterator value over `value`.
    ///
    /// Lists yield `(index, element)`, maps `(key, value)`, strings
    /// `(index, char-as-int)`. An iterator passes through unchanged; any
    /// other value yields a single `(null, value)` pair.
    pub fn make_iterator(value: Value) -> Self {
        match value {
            Value::List(list) => {
                Value::Iterator(Rc::new(RefCell::new(ListValueIterator { list, index: 0 })))
            }
            Value::Map(map) => {
                Value::Iterator(Rc::new(RefCell::new(MapValueIterator { map, index: 0 })))
            }
            Value::Str(s) => Value::Iterator(Rc::new(RefCell::new(StringValueIterator {
                chars: s.chars().collect(),
                index: 0,
            }))),
            it @ Value::Iterator(_) => it,
            other => Value::Iterator(Rc::new(RefCell::new(SingleValueIterator {
                value: Some(other),
            }))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Buffer(_) => "buffer",
            Value::Error(_) => "error",
            Value::Object(_) => "object",
            Value::Iterator(_) => "iterator",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    /// Boolean coercion.
    ///
    /// Null is false; numbers are true when nonzero and not NaN; strings and
    /// containers are true when non-empty; objects, iterators, and errors
    /// are always true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Map(m) => !m.borrow().is_empty(),
            Value::Buffer(b) => !b.borrow().is_empty(),
            Value::Error(_) | Value::Object(_) | Value::Iterator(_) => true,
        }
    }

    /// Non-coercing integer accessor: ints and booleans only.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Non-coercing float accessor: floats, ints, and booleans.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Integer coercion. Strings parse as integers, falling back to a
    /// truncated float parse; unparseable strings and reference types are 0.
    pub fn coerce_int(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => *b as i64,
            Value::Int(i) => *i,
            Value::Float(f) => {
                if f.is_nan() {
                    0
                } else {
                    *f as i64
                }
            }
            Value::Str(s) => {
                let t = s.trim();
                t.parse::<i64>()
                    .ok()
                    .or_else(|| t.parse::<f64>().ok().map(|f| f as i64))
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Float coercion. Unparseable strings and reference types are NaN.
    pub fn coerce_float(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => *b as i64 as f64,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    /// String coercion, locale-independent. NaN stringifies to `"NaN"`,
    /// infinities to `"Infinity"` / `"-Infinity"`.
    pub fn coerce_string(&self) -> String {
        self.to_string()
    }

    /// Element or character count for strings, lists, maps, and buffers.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.borrow().len()),
            Value::Map(m) => Some(m.borrow().len()),
            Value::Buffer(b) => Some(b.borrow().len()),
            _ => None,
        }
    }

    /// Read a list element. Out-of-range and non-list reads yield null.
    pub fn list_get(&self, index: i64) -> Value {
        match self {
            Value::List(l) if index >= 0 => {
                l.borrow().get(index as usize).cloned().unwrap_or(Value::Null)
            }
            _ => Value::Null,
        }
    }

    /// Write a list element in place. Out-of-range and non-list writes are
    /// no-ops.
    pub fn list_set(&self, index: i64, value: Value) {
        if let Value::List(l) = self
            && index >= 0
        {
            let mut items = l.borrow_mut();
            if let Some(slot) = items.get_mut(index as usize) {
                *slot = value;
            }
        }
    }

    /// Read a map entry by key. Missing keys and non-maps yield null.
    pub fn map_get(&self, key: &str) -> Value {
        match self {
            Value::Map(m) => m.borrow().get(key).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Write a map entry in place. Non-map writes are no-ops.
    pub fn map_set(&self, key: impl Into<Rc<str>>, value: Value) {
        if let Value::Map(m) = self {
            m.borrow_mut().set(key, value);
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if f.fract() == 0.0 {
        format!("{}.0", f)
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", format_float(*fl)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Buffer(b) => write!(f, "buffer[{}]", b.borrow().len()),
            Value::Error(e) => write!(f, "{}", e),
            Value::Object(_) => write!(f, "[object]"),
            Value::Iterator(_) => write!(f, "[iterator]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "Str({:?})", s),
            other => write!(f, "{}:{}", other.type_name(), other),
        }
    }
}

/// Strict equality: same type tag and same payload. Lists and maps compare
/// element-wise, buffers and errors by contents, opaque objects and
/// iterators by identity. NaN is never equal to anything.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Buffer(a), Value::Buffer(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
            }
            (Value::Iterator(a), Value::Iterator(b)) => {
                std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions from Rust types
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// Chars widen to their code point masked to 16 bits.
impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Int((c as i64) & 0xFFFF)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(Rc::new(e))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

// ---------------------------------------------------------------------------
// Conversions to Rust types
// ---------------------------------------------------------------------------

/// Error when extracting a Rust type from a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMismatch {
    /// The expected script type name
    pub expected: &'static str,
    /// The actual script type name
    pub got: &'static str,
}

impl TypeMismatch {
    pub fn new(expected: &'static str, got: &'static str) -> Self {
        Self { expected, got }
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.got)
    }
}

impl std::error::Error for TypeMismatch {}

/// Trait for extracting a Rust value from a script [`Value`].
///
/// Used by [`call_and_return_as`](crate::ScriptInstance::call_and_return_as)
/// to hand a typed result back to the host.
///
/// # Example
///
/// ```
/// use rookscript::{FromValue, Value};
///
/// let value = Value::from("hello");
/// let s: String = String::from_value(&value).unwrap();
/// assert_eq!(s, "hello");
///
/// let err = String::from_value(&Value::Int(42)).unwrap_err();
/// assert_eq!(err.expected, "string");
/// assert_eq!(err.got, "int");
/// ```
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch>;

    /// The script type name expected by this type (for error messages).
    fn expected_type() -> &'static str;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        Ok(value.clone())
    }

    fn expected_type() -> &'static str {
        "any"
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(TypeMismatch::new(Self::expected_type(), other.type_name())),
        }
    }

    fn expected_type() -> &'static str {
        "string"
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        value
            .as_int()
            .ok_or_else(|| TypeMismatch::new(Self::expected_type(), value.type_name()))
    }

    fn expected_type() -> &'static str {
        "int"
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        i64::from_value(value).map(|i| i as i32)
    }

    fn expected_type() -> &'static str {
        "int"
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        value
            .as_float()
            .ok_or_else(|| TypeMismatch::new(Self::expected_type(), value.type_name()))
    }

    fn expected_type() -> &'static str {
        "float"
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        f64::from_value(value).map(|f| f as f32)
    }

    fn expected_type() -> &'static str {
        "float"
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(TypeMismatch::new(Self::expected_type(), other.type_name())),
        }
    }

    fn expected_type() -> &'static str {
        "boolean"
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn expected_type() -> &'static str {
        "optional"
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::List(items) => items.borrow().iter().map(T::from_value).collect(),
            other => Err(TypeMismatch::new(Self::expected_type(), other.type_name())),
        }
    }

    fn expected_type() -> &'static str {
        "list"
    }
}

impl<V: FromValue> FromValue for HashMap<String, V> {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Map(pairs) => {
                let mut map = HashMap::new();
                for (k, v) in pairs.borrow().iter() {
                    map.insert(k.to_string(), V::from_value(v)?);
                }
                Ok(map)
            }
            other => Err(TypeMismatch::new(Self::expected_type(), other.type_name())),
        }
    }

    fn expected_type() -> &'static str {
        "map"
    }
}

impl FromValue for () {
    fn from_value(value: &Value) -> Result<Self, TypeMismatch> {
        match value {
            Value::Null => Ok(()),
            other => Err(TypeMismatch::new(Self::expected_type(), other.type_name())),
        }
    }

    fn expected_type() -> &'static str {
        "null"
    }
}

// ---------------------------------------------------------------------------
// Serde support
// ---------------------------------------------------------------------------

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::de::{self, MapAccess, SeqAccess, Visitor};
    use serde::ser::{SerializeMap, SerializeSeq};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Values serialize by content. Opaque objects and iterators have no
    /// portable form and are rejected.
    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Null => serializer.serialize_unit(),
                Value::Bool(b) => serializer.serialize_bool(*b),
                Value::Int(i) => serializer.serialize_i64(*i),
                Value::Float(f) => serializer.serialize_f64(*f),
                Value::Str(s) => serializer.serialize_str(s),
                Value::List(items) => {
                    let items = items.borrow();
                    let mut seq = serializer.serialize_seq(Some(items.len()))?;
                    for item in items.iter() {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                }
                Value::Map(pairs) => {
                    let pairs = pairs.borrow();
                    let mut map = serializer.serialize_map(Some(pairs.len()))?;
                    for (k, v) in pairs.iter() {
                        map.serialize_entry(k.as_ref(), v)?;
                    }
                    map.end()
                }
                Value::Buffer(b) => serializer.serialize_bytes(b.borrow().as_bytes()),
                Value::Error(e) => {
                    let mut map = serializer.serialize_map(Some(2))?;
                    map.serialize_entry("kind", e.kind())?;
                    map.serialize_entry("message", e.message())?;
                    map.end()
                }
                Value::Object(_) | Value::Iterator(_) => Err(serde::ser::Error::custom(
                    format!("cannot serialize a {} value", self.type_name()),
                )),
            }
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct ValueVisitor;

            impl<'de> Visitor<'de> for ValueVisitor {
                type Value = Value;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a script value")
                }

                fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
                    Ok(Value::Null)
                }

                fn visit_none<E: de::Error>(self) -> Result<Value, E> {
                    Ok(Value::Null)
                }

                fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
                    Value::deserialize(d)
                }

                fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
                    Ok(Value::Bool(b))
                }

                fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
                    Ok(Value::Int(i))
                }

                fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
                    Ok(Value::Int(u as i64))
                }

                fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
                    Ok(Value::Float(f))
                }

                fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
                    Ok(Value::from(s))
                }

                fn visit_bytes<E: de::Error>(self, bytes: &[u8]) -> Result<Value, E> {
                    Ok(Value::buffer(BufferData::from_bytes(bytes)))
                }

                fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
                    let mut items = Vec::new();
                    while let Some(item) = seq.next_element()? {
                        items.push(item);
                    }
                    Ok(Value::list(items))
                }

                fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
                    let mut data = MapData::new();
                    while let Some((key, value)) = access.next_entry::<String, Value>()? {
                        data.set(key, value);
                    }
                    Ok(Value::map(data))
                }
            }

            deserializer.deserialize_any(ValueVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::new_list().is_truthy());
        assert!(Value::list(vec![Value::Null]).is_truthy());
        assert!(Value::error("Test", "boom").is_truthy());
        assert!(Value::object(12u8).is_truthy());
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(Value::Null.coerce_string(), "null");
        assert_eq!(Value::Bool(true).coerce_string(), "true");
        assert_eq!(Value::Int(42).coerce_string(), "42");
        assert_eq!(Value::Float(2.5).coerce_string(), "2.5");
        assert_eq!(Value::Float(3.0).coerce_string(), "3.0");
        assert_eq!(Value::Float(f64::NAN).coerce_string(), "NaN");
        assert_eq!(Value::Float(f64::INFINITY).coerce_string(), "Infinity");
        assert_eq!(Value::Float(f64::NEG_INFINITY).coerce_string(), "-Infinity");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::from("a")]).coerce_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::from("17").coerce_int(), 17);
        assert_eq!(Value::from(" 2.75 ").coerce_float(), 2.75);
        assert_eq!(Value::from("2.75").coerce_int(), 2);
        assert_eq!(Value::from("junk").coerce_int(), 0);
        assert!(Value::from("junk").coerce_float().is_nan());
        assert_eq!(Value::Null.coerce_int(), 0);
        assert_eq!(Value::Bool(true).coerce_int(), 1);
        assert_eq!(Value::Float(f64::NAN).coerce_int(), 0);
    }

    #[test]
    fn test_string_round_trip() {
        for i in [0i64, 1, -1, 4096, i64::MAX, i64::MIN] {
            let s = Value::Int(i).coerce_string();
            assert_eq!(Value::from(s).coerce_int(), i);
        }
        for f in [0.5f64, -12.25, 1.0, 1e100] {
            let s = Value::Float(f).coerce_string();
            assert_eq!(Value::from(s).coerce_float(), f);
        }
    }

    #[test]
    fn test_char_widening() {
        assert_eq!(Value::from('A'), Value::Int(65));
        // Code points above the BMP are masked to 16 bits.
        assert_eq!(Value::from('\u{10041}'), Value::Int(0x0041));
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_ne!(Value::Null, Value::Bool(false));
        assert_eq!(Value::from("a"), Value::from("a"));

        // NaN is never strictly equal to itself.
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));

        // Lists compare element-wise.
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let c = Value::list(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        // Objects compare by identity.
        let o = Value::object("payload".to_string());
        assert_eq!(o, o.clone());
        assert_ne!(o, Value::object("payload".to_string()));
    }

    #[test]
    fn test_shared_list_storage() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        b.list_set(0, Value::Int(9));
        assert_eq!(a.list_get(0), Value::Int(9));

        // Out-of-range reads are null, writes are no-ops.
        assert_eq!(a.list_get(10), Value::Null);
        assert_eq!(a.list_get(-1), Value::Null);
        a.list_set(10, Value::Int(5));
        assert_eq!(a.length(), Some(1));
    }

    #[test]
    fn test_map_insertion_order() {
        let m = Value::new_map();
        m.map_set("b", Value::Int(2));
        m.map_set("a", Value::Int(1));
        m.map_set("b", Value::Int(3));
        if let Value::Map(data) = &m {
            let keys: Vec<String> = data.borrow().iter().map(|(k, _)| k.to_string()).collect();
            assert_eq!(keys, vec!["b", "a"]);
        } else {
            unreachable!();
        }
        // Keys are case-sensitive.
        assert_eq!(m.map_get("B"), Value::Null);
        assert_eq!(m.map_get("b"), Value::Int(3));
    }

    #[test]
    fn test_list_iterator() {
        let list = Value::list(vec![Value::Int(10), Value::Int(20)]);
        let it = Value::make_iterator(list);
        let Value::Iterator(inner) = &it else {
            unreachable!()
        };
        let mut inner = inner.borrow_mut();
        assert!(inner.has_next());
        assert_eq!(inner.next(), Some((Value::Int(0), Value::Int(10))));
        assert_eq!(inner.next(), Some((Value::Int(1), Value::Int(20))));
        assert!(!inner.has_next());
        assert_eq!(inner.next(), None);
    }

    #[test]
    fn test_string_iterator_yields_char_codes() {
        let it = Value::make_iterator(Value::from("ab"));
        let Value::Iterator(inner) = &it else {
            unreachable!()
        };
        let mut inner = inner.borrow_mut();
        assert_eq!(inner.next(), Some((Value::Int(0), Value::Int(97))));
        assert_eq!(inner.next(), Some((Value::Int(1), Value::Int(98))));
        assert_eq!(inner.next(), None);
    }

    #[test]
    fn test_single_iterator() {
        let it = Value::make_iterator(Value::Int(7));
        let Value::Iterator(inner) = &it else {
            unreachable!()
        };
        let mut inner = inner.borrow_mut();
        assert_eq!(inner.next(), Some((Value::Null, Value::Int(7))));
        assert_eq!(inner.next(), None);
    }

    #[test]
    fn test_from_value_extraction() {
        assert_eq!(i64::from_value(&Value::Int(42)).unwrap(), 42);
        assert_eq!(i64::from_value(&Value::Bool(true)).unwrap(), 1);
        assert_eq!(f64::from_value(&Value::Int(2)).unwrap(), 2.0);
        assert_eq!(
            String::from_value(&Value::from("hi")).unwrap(),
            "hi".to_string()
        );
        assert_eq!(
            Option::<i64>::from_value(&Value::Null).unwrap(),
            None
        );
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Vec::<i64>::from_value(&list).unwrap(), vec![1, 2]);

        let err = i64::from_value(&Value::from("42")).unwrap_err();
        assert_eq!(err.expected, "int");
        assert_eq!(err.got, "string");
    }
}
