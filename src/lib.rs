// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # overlay-tx: Transactional Overlays for In-Memory Object Graphs
//!
//! This crate lets you stage arbitrary nested mutations (writes, deletions,
//! appends) against a shared, in-memory object graph, observe the staged state
//! as if it had already been applied, and then apply ([`Overlay::commit`]) or
//! discard ([`Overlay::rollback`]) the entire staged change set at once,
//! recursively through every nested object reached during the transaction.
//!
//! ## Core Concepts
//!
//! - [`Node`]: a shared, interior-mutable compound value (an object or an
//!   array). Nodes have reference identity: cloning a `Node` clones the
//!   reference, not the contents.
//! - [`Value`]: a scalar, a [`Node`], or an [`Overlay`].
//! - [`Overlay`]: a staging wrapper over one node (its **base**). Writes and
//!   deletions land in the overlay's [`Delta`] and are only applied to the base
//!   on commit.
//!
//! Reading a property whose base value is compound returns a **child
//! overlay**. Children are created lazily on first read and cached, so repeated
//! reads return the same overlay and edits accumulate in one place. Committing
//! or rolling back an overlay recurses into every child that was materialized.
//!
//! ## Explicit Interception
//!
//! There is no way to intercept native field access in Rust, so all access
//! goes through [`Overlay::read`], [`Overlay::write`], [`Overlay::delete`] and
//! [`Overlay::keys`]. The base node is never touched by these methods; only
//! commit mutates it.
//!
//! ## Getting Started
//!
//! ```rust
//! use overlay_tx::{Node, Overlay, Value};
//!
//! let base = Node::from_entries([("a", Value::from(1)), ("b", Value::from(2))]);
//! let tx = Overlay::new(base.clone());
//!
//! tx.write("a", 5);
//! tx.delete("b");
//!
//! // The overlay shows the staged state...
//! assert_eq!(tx.read("a"), Some(Value::from(5)));
//! assert_eq!(tx.read("b"), None);
//! // ...while the base is untouched.
//! assert_eq!(base.get(&"a".into()), Some(Value::from(1)));
//!
//! tx.commit();
//! assert_eq!(base.get(&"a".into()), Some(Value::from(5)));
//! assert!(!base.contains_key(&"b".into()));
//! ```
//!
//! ## Nested Edits
//!
//! ```rust
//! use overlay_tx::{Node, Overlay, Value};
//!
//! let address = Node::from_entries([("city", Value::from("Kyiv"))]);
//! let person = Node::from_entries([("address", Value::from(address.clone()))]);
//! let tx = Overlay::new(person);
//!
//! let staged_address = tx.read_overlay("address").unwrap();
//! staged_address.write("city", "Odessa");
//!
//! // The same child overlay is returned on every read.
//! assert!(tx.read_overlay("address").unwrap().ptr_eq(&staged_address));
//!
//! tx.rollback();
//! assert_eq!(address.get(&"city".into()), Some(Value::from("Kyiv")));
//! ```
//!
//! For list-shaped data, [`DatasetTransaction`] wraps the dataset in a root
//! overlay and provides `add`/`delete` helpers.
//!
//! ## Concurrency
//!
//! Everything is single-threaded and synchronous. Overlays and nodes are
//! `Rc`-based and therefore neither `Send` nor `Sync`.
//!
//! ## Features
//!
//! - `json`: Enables conversion from `serde_json::Value` and JSON snapshots of
//!   values, nodes and staged overlay views. This feature is enabled by default.
//! - `serde`: Provides `serde` support for keys, node kinds and events.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for keys and scalar values,
//!   useful for property-based testing.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make test output have less variance.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

mod properties;
pub mod value;
pub use value::{Key, Node, NodeKind, Value};
/// Transactional overlays, the event bus and the dataset adapter.
///
/// See [`transaction`] module documentation for details and examples.
pub mod transaction;
pub use transaction::{DatasetTransaction, Delta, Event, Overlay};
#[cfg(feature = "json")]
pub mod json;
/// Macros usable for tests and initialization
pub mod macros;
#[cfg(any(test, feature = "arbitrary"))]
mod test_util;

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all internal hash maps and sets iterate deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

fn create_map<K, V>() -> std::collections::HashMap<K, V, OverlayRandomState> {
    std::collections::HashMap::with_hasher(OverlayRandomState::default())
}

fn create_set<K>() -> std::collections::HashSet<K, OverlayRandomState> {
    std::collections::HashSet::with_hasher(OverlayRandomState::default())
}

/// This is a small wrapper around the standard RandomState.
/// This allows us to easily switch to a non-random RandomState for use in tests.
#[derive(Clone)]
pub struct OverlayRandomState {
    inner: RandomState,
}

// Falls back on regular ahash::RandomState except when 'enable_determinism'
// has been called, in which case a static only-for-test RandomState is used.
impl Default for OverlayRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

impl BuildHasher for OverlayRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}
