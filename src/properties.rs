// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! An ordered property map.
//!
//! Keys enumerate the way property keys of a plain object do: index keys in
//! ascending order first, then named keys in insertion order. Both node
//! contents and staged writes are stored this way so that enumeration of a
//! staged view matches enumeration of the committed result.

use crate::{Key, OverlayRandomState, create_map};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

#[derive(Clone)]
pub(crate) struct Properties<V> {
    indexed: BTreeMap<usize, V>,
    names: Vec<String>,
    named: HashMap<String, V, OverlayRandomState>,
}

impl<V> Default for Properties<V> {
    fn default() -> Self {
        Self {
            indexed: BTreeMap::new(),
            names: Vec::new(),
            named: create_map(),
        }
    }
}

impl<V> Properties<V> {
    pub fn len(&self) -> usize {
        self.indexed.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Key) -> Option<&V> {
        match key {
            Key::Index(i) => self.indexed.get(i),
            Key::Name(name) => self.named.get(name),
        }
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Inserts `value` at `key`, returning the previous value.
    ///
    /// Overwriting a named key keeps its original position.
    pub fn insert(&mut self, key: Key, value: V) -> Option<V> {
        match key {
            Key::Index(i) => self.indexed.insert(i, value),
            Key::Name(name) => {
                if !self.named.contains_key(&name) {
                    self.names.push(name.clone());
                }
                self.named.insert(name, value)
            }
        }
    }

    pub fn remove(&mut self, key: &Key) -> Option<V> {
        match key {
            Key::Index(i) => self.indexed.remove(i),
            Key::Name(name) => {
                let removed = self.named.remove(name)?;
                self.names.retain(|n| n != name);
                Some(removed)
            }
        }
    }

    pub fn clear(&mut self) {
        self.indexed.clear();
        self.names.clear();
        self.named.clear();
    }

    /// The highest index key, if any.
    pub fn last_index(&self) -> Option<usize> {
        self.indexed.keys().next_back().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &V)> + '_ {
        let indexed = self.indexed.iter().map(|(&i, v)| (Key::Index(i), v));
        // every entry in `names` has a value in `named`
        let named = self
            .names
            .iter()
            .filter_map(|name| Some((Key::Name(name.clone()), self.named.get(name)?)));
        indexed.chain(named)
    }
}

impl<V> IntoIterator for Properties<V> {
    type Item = (Key, V);
    type IntoIter = std::vec::IntoIter<(Key, V)>;

    fn into_iter(mut self) -> Self::IntoIter {
        let mut entries: Vec<_> = std::mem::take(&mut self.indexed)
            .into_iter()
            .map(|(i, v)| (Key::Index(i), v))
            .collect();
        for name in self.names {
            if let Some(value) = self.named.remove(&name) {
                entries.push((Key::Name(name), value));
            }
        }
        entries.into_iter()
    }
}

impl<V> FromIterator<(Key, V)> for Properties<V> {
    fn from_iter<T: IntoIterator<Item = (Key, V)>>(iter: T) -> Self {
        let mut properties = Self::default();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

impl<V: fmt::Debug> fmt::Debug for Properties<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_enumerate_before_names() {
        let mut props = Properties::default();
        props.insert(Key::from("b"), 1);
        props.insert(Key::Index(3), 2);
        props.insert(Key::from("a"), 3);
        props.insert(Key::Index(0), 4);

        let keys: Vec<_> = props.keys().collect();
        assert_eq!(
            keys,
            vec![Key::Index(0), Key::Index(3), Key::from("b"), Key::from("a")]
        );
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut props = Properties::default();
        props.insert(Key::from("x"), 1);
        props.insert(Key::from("y"), 2);
        assert_eq!(props.insert(Key::from("x"), 10), Some(1));

        let entries: Vec<_> = props.into_iter().collect();
        assert_eq!(entries, vec![(Key::from("x"), 10), (Key::from("y"), 2)]);
    }

    #[test]
    fn remove_named_and_indexed() {
        let mut props: Properties<i32> = [(Key::from("x"), 1), (Key::Index(7), 2)]
            .into_iter()
            .collect();
        assert_eq!(props.last_index(), Some(7));
        assert_eq!(props.remove(&Key::from("x")), Some(1));
        assert_eq!(props.remove(&Key::from("x")), None);
        assert_eq!(props.remove(&Key::Index(7)), Some(2));
        assert!(props.is_empty());
        assert_eq!(props.last_index(), None);
    }
}
