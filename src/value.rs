// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The object graph overlays operate on.
//!
//! A [`Value`] is either a scalar or a compound value. Compound values are
//! [`Node`]s (objects and arrays) or [`Overlay`]s, and both have reference
//! identity: they are shared, never copied, and two compound values are equal
//! only if they are the same object.
use crate::{Overlay, properties::Properties};
use std::{
    cell::{Ref, RefCell},
    fmt,
    rc::Rc,
};

/// A property key.
///
/// Index keys address array items, named keys address object fields. Both
/// kinds may appear on either kind of [`Node`].
///
/// Converting a string that is the canonical decimal form of an index (`"0"`,
/// `"42"`, but not `"042"` or `"+1"`) produces [`Key::Index`], so that `"0"` and
/// `0` address the same property.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// Returns the index if this is an index key.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }

    fn parse_index(name: &str) -> Option<usize> {
        let canonical = name == "0" || (!name.starts_with('0') && !name.is_empty());
        if canonical && name.bytes().all(|b| b.is_ascii_digit()) {
            name.parse().ok()
        } else {
            None
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        match Key::parse_index(name) {
            Some(i) => Key::Index(i),
            None => Key::Name(name.to_string()),
        }
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        match Key::parse_index(&name) {
            Some(i) => Key::Index(i),
            None => Key::Name(name),
        }
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => i.fmt(f),
            Key::Name(name) => name.fmt(f),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "#{i}"),
            Key::Name(name) => name.fmt(f),
        }
    }
}

/// What shape of compound value a [`Node`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum NodeKind {
    Object,
    Array,
}

pub(crate) struct NodeData {
    kind: NodeKind,
    properties: Properties<Value>,
}

/// A shared, mutable compound value.
///
/// `Node` is a reference: [`Clone`] produces another handle to the same
/// contents, and [`PartialEq`] compares identity. Mutating methods take
/// `&self` and are visible through every handle.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    /// Creates an empty node of the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            kind,
            properties: Properties::default(),
        })))
    }

    /// Creates an empty object.
    pub fn object() -> Self {
        Self::new(NodeKind::Object)
    }

    /// Creates an empty array.
    pub fn array() -> Self {
        Self::new(NodeKind::Array)
    }

    /// Creates an object from key/value pairs.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let node = Self::object();
        for (key, value) in entries {
            node.insert(key, value);
        }
        node
    }

    /// Creates an array holding `items` at indices `0..n`.
    pub fn from_items<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        let node = Self::array();
        for item in items {
            node.push(item);
        }
        node
    }

    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        self.0.borrow().properties.get(key).cloned()
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.0.borrow().properties.contains_key(key)
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        self.0
            .borrow_mut()
            .properties
            .insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    ///
    /// Removing an index leaves a hole: later items keep their indices.
    pub fn remove(&self, key: &Key) -> Option<Value> {
        self.0.borrow_mut().properties.remove(key)
    }

    /// Appends `value` at index [`Node::len`].
    pub fn push(&self, value: impl Into<Value>) {
        let index = self.len();
        self.insert(index, value);
    }

    /// Array-style length: one past the highest index key, holes included.
    ///
    /// Named keys do not count, so an object without index keys has length 0.
    pub fn len(&self) -> usize {
        self.0
            .borrow()
            .properties
            .last_index()
            .map_or(0, |last| last + 1)
    }

    /// Returns true if the node has no properties at all.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().properties.is_empty()
    }

    /// Removes every property.
    pub fn clear(&self) {
        self.0.borrow_mut().properties.clear();
    }

    /// Keys in enumeration order: indices ascending, then names in insertion order.
    pub fn keys(&self) -> Vec<Key> {
        self.0.borrow().properties.keys().collect()
    }

    /// Values in key enumeration order.
    pub fn values(&self) -> Vec<Value> {
        self.0.borrow().properties.values().cloned().collect()
    }

    /// Key/value pairs in enumeration order.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.0
            .borrow()
            .properties
            .iter()
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }

    /// Returns true if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the node, stable for its lifetime.
    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn properties(&self) -> Ref<'_, Properties<Value>> {
        Ref::map(self.0.borrow(), |data| &data.properties)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Shows one level of the node; nested compound values are elided so that
/// cyclic graphs print.
impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(data) = self.0.try_borrow() else {
            return f.write_str("Node(<borrowed>)");
        };
        match data.kind {
            NodeKind::Object => f.write_str("Object")?,
            NodeKind::Array => f.write_str("Array")?,
        }
        let mut map = f.debug_map();
        for (key, value) in data.properties.iter() {
            match value {
                Value::Node(_) => map.entry(&key, &format_args!("{{..}}")),
                Value::Overlay(_) => map.entry(&key, &format_args!("Overlay(..)")),
                scalar => map.entry(&key, scalar),
            };
        }
        map.finish()
    }
}

/// A value held in a [`Node`] or staged in an [`Overlay`].
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    U64(u64),
    I64(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Node(Node),
    Overlay(Overlay),
}

impl Value {
    /// Returns true for values that get their own overlay when read through a
    /// parent overlay: nodes and overlays. Everything else is a scalar.
    pub fn is_compound(&self) -> bool {
        matches!(self, Value::Node(_) | Value::Overlay(_))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_overlay(&self) -> Option<&Overlay> {
        match self {
            Value::Overlay(overlay) => Some(overlay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::U64(_) => "u64",
            Value::I64(_) => "i64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Node(_) => "node",
            Value::Overlay(_) => "overlay",
        }
    }
}

/// Strict equality: scalars by value, compound values by identity.
///
/// The numeric variants compare numerically with each other, and
/// `Double(NaN)` is not equal to anything, itself included.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Node(a), Node(b)) => a.ptr_eq(b),
            (Overlay(a), Overlay(b)) => a.ptr_eq(b),
            (U64(a), U64(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (U64(u), I64(i)) | (I64(i), U64(u)) => u64::try_from(*i).is_ok_and(|i| i == *u),
            (U64(u), Double(d)) | (Double(d), U64(u)) => *u as f64 == *d,
            (I64(i), Double(d)) | (Double(d), I64(i)) => *i as f64 == *d,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(inner) => inner.fmt(f),
            Value::U64(inner) => write!(f, "{inner}u"),
            Value::I64(inner) => write!(f, "{inner}"),
            // Always print at least one decimal so doubles and integers are
            // distinguishable.
            Value::Double(inner) => write!(f, "{inner:?}d"),
            Value::String(inner) => inner.fmt(f),
            Value::Bytes(inner) => write!(f, "{inner:02X?}"),
            Value::Node(inner) => inner.fmt(f),
            Value::Overlay(inner) => inner.fmt(f),
        }
    }
}

macro_rules! impl_from {
(
    $(
        $source:ty => $target:ident $(with $conv:ident)?
    ),* $(,)?
    ) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Self::$target(impl_from!(value$(, $conv)?))
                }
            }
        )*
    };

    ($value:ident, $conv:ident) => {
        $value.$conv()
    };

    ($value:ident) => {
        $value
    };
}

impl_from!(
    &[u8]      => Bytes with into,
    Vec<u8>    => Bytes,
    String     => String,
    &str       => String with to_string,
    f64        => Double,
    f32        => Double with into,
    u8         => U64 with into,
    u16        => U64 with into,
    u32        => U64 with into,
    u64        => U64,
    i8         => I64 with into,
    i16        => I64 with into,
    i32        => I64 with into,
    i64        => I64,
    bool       => Bool,
    Node       => Node,
    Overlay    => Overlay,
);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        Value::Node(node.clone())
    }
}

impl From<&Overlay> for Value {
    fn from(overlay: &Overlay) -> Self {
        Value::Overlay(overlay.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_index_strings_become_indices() {
        assert_eq!(Key::from("0"), Key::Index(0));
        assert_eq!(Key::from("42"), Key::Index(42));
        assert_eq!(Key::from("042"), Key::Name("042".into()));
        assert_eq!(Key::from("+1"), Key::Name("+1".into()));
        assert_eq!(Key::from(""), Key::Name(String::new()));
        assert_eq!(Key::from("name".to_string()), Key::Name("name".into()));
        assert_eq!(Key::from("7".to_string()), Key::Index(7));
    }

    #[test]
    fn numbers_compare_across_variants() {
        assert_eq!(Value::U64(121), Value::I64(121));
        assert_eq!(Value::I64(121), Value::Double(121.0));
        assert_ne!(Value::I64(-1), Value::U64(u64::MAX));
        assert_ne!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::from("1"), Value::from(1));
    }

    #[test]
    fn nodes_compare_by_identity() {
        let a = Node::from_entries([("x", 1)]);
        let b = Node::from_entries([("x", 1)]);
        assert_ne!(Value::from(&a), Value::from(&b));
        assert_eq!(Value::from(&a), Value::from(a.clone()));
    }

    #[test]
    fn removing_an_index_leaves_a_hole() {
        let list = Node::from_items(["a", "b", "c"]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.remove(&Key::Index(1)), Some(Value::from("b")));
        assert_eq!(list.len(), 3);
        assert_eq!(list.keys(), vec![Key::Index(0), Key::Index(2)]);

        list.push("d");
        assert_eq!(list.get(&Key::Index(3)), Some(Value::from("d")));
        assert_eq!(list.values().len(), 3);
    }

    #[test]
    fn objects_have_no_length() {
        let obj = Node::from_entries([("a", 1), ("b", 2)]);
        assert_eq!(obj.len(), 0);
        assert!(!obj.is_empty());
        obj.clear();
        assert!(obj.is_empty());
    }

    #[test]
    fn debug_elides_nested_nodes() {
        let inner = Node::from_entries([("y", 2)]);
        let outer = Node::from_entries([("x", Value::from(1)), ("inner", Value::from(&inner))]);
        outer.insert("me", &outer);
        assert_eq!(format!("{outer:?}"), r#"Object{"x": 1, "inner": {..}, "me": {..}}"#);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn keys_serialize_untagged() {
        let keys = vec![Key::Index(3), Key::from("name")];
        let json = serde_json::to_string(&keys).unwrap();
        assert_eq!(json, r#"[3,"name"]"#);
        let parsed: Vec<Key> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, keys);
    }
}
