// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Implementation of the quickcheck::Arbitrary trait for keys, scalar values
//! and sequences of overlay operations.

use crate::{Key, Node, Overlay, Value};
use quickcheck::{Arbitrary, Gen};

// Keep the key space small so that operations in the same sequence keep hitting
// the same keys. Most interesting behavior comes from repeated edits of one key.
const NAMES: [&str; 4] = ["a", "b", "c", "data"];
const INDICES: usize = 4;

impl Arbitrary for Key {
    fn arbitrary(g: &mut Gen) -> Self {
        if bool::arbitrary(g) {
            Key::Index(usize::arbitrary(g) % INDICES)
        } else {
            let name = g.choose(&NAMES).copied().unwrap_or("a");
            Key::Name(name.to_string())
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Key::Index(0) => quickcheck::empty_shrinker(),
            Key::Index(_) => quickcheck::single_shrinker(Key::Index(0)),
            Key::Name(_) => quickcheck::single_shrinker(Key::Index(0)),
        }
    }
}

/// Generates scalar values only.
///
/// Doubles are always finite, since `NaN` never equals itself and would make
/// every read-back comparison fail.
impl Arbitrary for Value {
    fn arbitrary(g: &mut Gen) -> Self {
        match *g.choose(&[0u8, 1, 2, 3, 4, 5, 6]).unwrap_or(&0) {
            0 => Value::Null,
            1 => Value::Bool(bool::arbitrary(g)),
            // small integers collide with each other and with the base values
            2 => Value::U64(u64::from(u8::arbitrary(g) % 4)),
            3 => Value::I64(i64::from(i8::arbitrary(g))),
            4 => Value::Double(f64::from(i16::arbitrary(g)) / 4.0),
            5 => Value::String(g.choose(&NAMES).copied().unwrap_or("a").to_string()),
            _ => Value::Bytes(Vec::<u8>::arbitrary(g)),
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Value::Null => quickcheck::empty_shrinker(),
            _ => quickcheck::single_shrinker(Value::Null),
        }
    }
}

/// A single staged edit.
#[cfg_attr(feature = "arbitrary", allow(dead_code))]
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Write(Key, Value),
    Delete(Key),
    Push(Value),
}

#[cfg_attr(feature = "arbitrary", allow(dead_code))]
impl Op {
    pub(crate) fn apply(&self, tx: &Overlay) {
        match self {
            Op::Write(key, value) => tx.write(key, value.clone()),
            Op::Delete(key) => tx.delete(key),
            Op::Push(value) => tx.push(value.clone()),
        }
    }
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        match *g.choose(&["write", "write", "delete", "push"]).unwrap_or(&"write") {
            "write" => Op::Write(Key::arbitrary(g), Value::arbitrary(g)),
            "delete" => Op::Delete(Key::arbitrary(g)),
            _ => Op::Push(Value::arbitrary(g)),
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Op::Write(key, value) => {
                let key = key.clone();
                Box::new(value.shrink().map(move |value| Op::Write(key.clone(), value)))
            }
            Op::Delete(key) => Box::new(key.shrink().map(Op::Delete)),
            Op::Push(value) => Box::new(value.shrink().map(Op::Push)),
        }
    }
}

/// Base contents for an overlay, as key/value pairs.
#[cfg_attr(feature = "arbitrary", allow(dead_code))]
#[derive(Debug, Clone)]
pub(crate) struct Entries(pub(crate) Vec<(Key, Value)>);

#[cfg_attr(feature = "arbitrary", allow(dead_code))]
impl Entries {
    pub(crate) fn to_node(&self) -> Node {
        Node::from_entries(self.0.iter().cloned())
    }
}

impl Arbitrary for Entries {
    fn arbitrary(g: &mut Gen) -> Self {
        Self(Vec::arbitrary(g))
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.0.shrink().map(Self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_set;

    /// Snapshot of a node's contents, compared by value.
    fn contents(node: &Node) -> Vec<(Key, Value)> {
        node.entries()
    }

    #[quickcheck]
    fn write_then_read(base: Entries, key: Key, value: Value) {
        let tx = Overlay::new(base.to_node());
        tx.write(&key, value.clone());
        assert_eq!(tx.read(&key), Some(value));
    }

    #[quickcheck]
    fn rollback_restores_base_view(base: Entries, ops: Vec<Op>, key: Key) {
        let node = base.to_node();
        let before = contents(&node);
        let tx = Overlay::new(node.clone());
        for op in &ops {
            op.apply(&tx);
        }
        tx.rollback();
        assert!(tx.delta().is_empty());
        assert_eq!(tx.read(&key), node.get(&key));
        assert_eq!(contents(&node), before);
    }

    #[quickcheck]
    fn writing_base_value_unstages(base: Entries, ops: Vec<Op>) {
        let node = base.to_node();
        let tx = Overlay::new(node.clone());
        for op in &ops {
            op.apply(&tx);
        }
        for (key, value) in node.entries() {
            tx.write(&key, value);
            let delta = tx.delta();
            assert!(delta.get(&key).is_none());
            assert!(!delta.is_tombstoned(&key));
        }
    }

    #[quickcheck]
    fn delete_then_commit_removes(base: Entries, ops: Vec<Op>, key: Key) {
        let node = base.to_node();
        let tx = Overlay::new(node.clone());
        for op in &ops {
            op.apply(&tx);
        }
        tx.delete(&key);
        assert_eq!(tx.read(&key), None);
        tx.commit();
        assert!(!node.contains_key(&key));
    }

    #[quickcheck]
    fn base_untouched_until_commit(base: Entries, ops: Vec<Op>) {
        let node = base.to_node();
        let before = contents(&node);
        let tx = Overlay::new(node.clone());
        for op in &ops {
            op.apply(&tx);
        }
        assert_eq!(contents(&node), before);

        // staged-only indices come after base keys in the view, so compare
        // without relying on order
        let expected = tx.entries();
        tx.commit();
        assert!(tx.is_clean());
        assert_eq!(node.keys().len(), expected.len());
        for (key, value) in expected {
            assert_eq!(node.get(&key), Some(value));
        }
    }

    #[quickcheck]
    fn keys_are_unique_and_readable(base: Entries, ops: Vec<Op>) {
        let tx = Overlay::new(base.to_node());
        for op in &ops {
            op.apply(&tx);
        }
        let keys = tx.keys();
        let mut seen = create_set();
        for key in &keys {
            assert!(seen.insert(key.clone()), "duplicate key {key:?}");
            assert!(tx.read(key).is_some());
        }
        for key in tx.delta().tombstones() {
            assert!(!keys.contains(key));
        }
    }

    #[quickcheck]
    fn fork_stages_independently(base: Entries, before: Vec<Op>, after: Vec<Op>) {
        let tx = Overlay::new(base.to_node());
        for op in &before {
            op.apply(&tx);
        }
        let expected = tx.entries();
        let forked = tx.fork();
        assert_eq!(forked.entries(), expected);

        for op in &after {
            op.apply(&forked);
        }
        assert_eq!(tx.entries(), expected);
    }
}
