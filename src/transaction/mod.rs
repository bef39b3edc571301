//! Overlay-based transactions over shared object graphs.
//!
//! An [`Overlay`] stages writes and deletions against a base [`Node`] without
//! touching it. Reads through the overlay see the staged state. Calling
//! [`Overlay::commit`] applies everything at once; [`Overlay::rollback`]
//! discards everything at once.
//!
//! # Example
//!
//! ```
//! use overlay_tx::{Node, Overlay, Value};
//!
//! let base = Node::from_entries([("a", 1), ("b", 2)]);
//! let tx = Overlay::new(base.clone());
//!
//! tx.write("a", 5);
//! tx.delete("b");
//! assert_eq!(tx.read("a"), Some(Value::from(5)));
//! assert_eq!(tx.read("b"), None);
//!
//! // IMPORTANT: nothing reaches the base until commit()
//! assert_eq!(base.get(&"b".into()), Some(Value::from(2)));
//! tx.commit();
//! assert_eq!(base.get(&"b".into()), None);
//! ```
//!
//! # Transaction Semantics
//!
//! Each overlay owns a [`Delta`]: staged writes plus tombstones for staged
//! deletions. The base is only ever mutated by commit.
//!
//! ## How Overlays Work
//!
//! - **On read**: tombstoned keys read as absent, staged writes are returned
//!   as is, everything else comes from the base. A compound base value is
//!   returned as a child overlay.
//! - **On write**: the value is staged, unless it equals the base value, in
//!   which case any staged write for the key is dropped instead.
//! - **On delete**: a tombstone is staged if the key exists.
//! - **On commit**: staged writes and deletions are applied to the base, then
//!   every materialized child commits.
//! - **On rollback**: staged state is dropped here and in every materialized
//!   child.
//!
//! ## Nested Overlays
//!
//! The first read of a key holding a node creates a child overlay over that
//! node and caches it, so every later read returns the same child and edits
//! accumulate in one place. Keys that are never read are never materialized,
//! which is sound because nothing can have been staged for them.
//!
//! Staged state takes precedence over the child cache: once a key with a
//! cached child is overwritten or deleted, reads return the staged value (or
//! nothing), and commit evicts the stale child.
//!
//! Reading a node that already is the base of an overlay further up the
//! materialization path returns that overlay, so self-referencing graphs do
//! not materialize without bound.
//!
//! # Events
//!
//! Listeners registered with [`Overlay::on`] receive the base node after
//! commit or rollback. See [`Event`] for the channels.
//!
//! # Datasets
//!
//! [`DatasetTransaction`] wraps a list-shaped dataset and adds `add`/`delete`
//! helpers on top of a root overlay.

// for [``] auto-linking
#[cfg(doc)]
use crate::Node;

mod dataset;
mod delta;
mod events;
mod overlay;

pub use dataset::DatasetTransaction;
pub use delta::Delta;
pub use events::{Event, Listener, UnknownEvent};
pub use overlay::{Descriptor, Overlay};
