use crate::{Key, OverlayRandomState, Value, create_set, properties::Properties};
use std::{collections::HashSet, fmt};

/// Pending changes of one overlay: staged writes and staged deletions.
///
/// A key is never both written and tombstoned: staging a write clears the
/// tombstone, staging a deletion drops the write.
///
/// # Example
/// ```
/// use overlay_tx::{Delta, Key, Value};
///
/// let mut delta = Delta::default();
/// delta.stage_write(Key::from("a"), Value::from(1));
/// delta.stage_delete(Key::from("a"));
/// assert!(delta.is_tombstoned(&Key::from("a")));
/// assert!(delta.get(&Key::from("a")).is_none());
/// ```
#[derive(Clone)]
pub struct Delta {
    writes: Properties<Value>,
    tombstones: HashSet<Key, OverlayRandomState>,
}

impl Default for Delta {
    fn default() -> Self {
        Self {
            writes: Properties::default(),
            tombstones: create_set(),
        }
    }
}

impl Delta {
    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.tombstones.is_empty()
    }

    /// The staged value for `key`, if any.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.writes.get(key)
    }

    /// Returns true if a write is staged for `key`.
    pub fn contains(&self, key: &Key) -> bool {
        self.writes.contains_key(key)
    }

    pub fn is_tombstoned(&self, key: &Key) -> bool {
        self.tombstones.contains(key)
    }

    /// Stages `value` for `key`, clearing any tombstone.
    pub fn stage_write(&mut self, key: Key, value: Value) {
        self.tombstones.remove(&key);
        self.writes.insert(key, value);
    }

    /// Drops the staged write for `key`, returning it.
    pub fn unstage_write(&mut self, key: &Key) -> Option<Value> {
        self.writes.remove(key)
    }

    /// Marks `key` for deletion, dropping any staged write.
    pub fn stage_delete(&mut self, key: Key) {
        self.writes.remove(&key);
        self.tombstones.insert(key);
    }

    pub fn clear_tombstone(&mut self, key: &Key) -> bool {
        self.tombstones.remove(key)
    }

    /// Staged writes in enumeration order.
    pub fn writes(&self) -> impl Iterator<Item = (Key, &Value)> + '_ {
        self.writes.iter()
    }

    /// Keys staged for deletion, in no particular order.
    pub fn tombstones(&self) -> impl Iterator<Item = &Key> + '_ {
        self.tombstones.iter()
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    /// The highest index with a staged write.
    pub fn highest_index(&self) -> Option<usize> {
        self.writes.last_index()
    }

    pub(crate) fn into_parts(self) -> (Properties<Value>, HashSet<Key, OverlayRandomState>) {
        (self.writes, self.tombstones)
    }
}

impl fmt::Debug for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tombstones: Vec<_> = self.tombstones.iter().collect();
        tombstones.sort();
        f.debug_struct("Delta")
            .field("writes", &self.writes.keys().collect::<Vec<_>>())
            .field("tombstones", &tombstones)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_clears_tombstone() {
        let mut delta = Delta::default();
        delta.stage_delete(Key::from("k"));
        assert!(delta.is_tombstoned(&Key::from("k")));

        delta.stage_write(Key::from("k"), Value::from(3));
        assert!(!delta.is_tombstoned(&Key::from("k")));
        assert_eq!(delta.get(&Key::from("k")), Some(&Value::from(3)));
        assert_eq!(delta.write_count(), 1);
        assert_eq!(delta.tombstone_count(), 0);
    }

    #[test]
    fn delete_drops_write() {
        let mut delta = Delta::default();
        delta.stage_write(Key::Index(4), Value::from("x"));
        assert_eq!(delta.highest_index(), Some(4));

        delta.stage_delete(Key::Index(4));
        assert!(!delta.contains(&Key::Index(4)));
        assert_eq!(delta.highest_index(), None);
        assert_eq!(delta.tombstones().collect::<Vec<_>>(), vec![&Key::Index(4)]);
        assert!(!delta.is_empty());
    }

    #[test]
    fn clone_is_independent() {
        let mut delta = Delta::default();
        delta.stage_write(Key::from("a"), Value::from(1));
        let mut copy = delta.clone();
        copy.stage_delete(Key::from("a"));
        copy.stage_write(Key::from("b"), Value::from(2));

        assert!(delta.contains(&Key::from("a")));
        assert!(!delta.contains(&Key::from("b")));
        assert_eq!(format!("{delta:?}"), r#"Delta { writes: ["a"], tombstones: [] }"#);
        assert_eq!(
            format!("{copy:?}"),
            r#"Delta { writes: ["b"], tombstones: ["a"] }"#
        );
    }
}
