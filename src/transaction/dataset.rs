use super::Overlay;
use crate::{Node, NodeKind, Value};
use tracing::debug;

/// A transaction over a list-shaped dataset.
///
/// The dataset is held in a root overlay over `{ dataset: <container> }`, and
/// [`DatasetTransaction::dataset`] is the child overlay for it. Items added
/// through [`DatasetTransaction::add`] are wrapped in their own overlays, so
/// edits to them after adding stay transactional and are applied by the same
/// [`DatasetTransaction::commit`].
///
/// # Example
///
/// ```
/// use overlay_tx::{DatasetTransaction, Key, Node, Value};
///
/// let people = Node::from_items([
///     Node::from_entries([("name", "Marcus")]),
///     Node::from_entries([("name", "Lucius")]),
/// ]);
/// let tx = DatasetTransaction::start(&people);
///
/// tx.add(Node::from_entries([("name", "Faustina")]));
/// assert!(tx.delete(0));
/// assert!(!tx.delete(7));
///
/// tx.commit();
/// assert_eq!(people.keys(), vec![Key::Index(1), Key::Index(2)]);
/// ```
pub struct DatasetTransaction {
    root: Overlay,
    dataset: Overlay,
}

impl DatasetTransaction {
    /// Starts a transaction over `dataset`.
    ///
    /// A scalar dataset is boxed as `{ data: dataset }` first.
    pub fn start(dataset: impl Into<Value>) -> Self {
        let root_node = Node::object();
        let root = Overlay::new(root_node.clone());
        let dataset = match dataset.into() {
            Value::Node(node) => {
                root_node.insert("dataset", &node);
                root.materialize("dataset".into(), node)
            }
            Value::Overlay(overlay) => {
                root_node.insert("dataset", &overlay);
                root.adopt("dataset".into(), overlay)
            }
            scalar => {
                let node = Node::from_entries([("data", scalar)]);
                root_node.insert("dataset", &node);
                root.materialize("dataset".into(), node)
            }
        };
        Self { root, dataset }
    }

    /// The root overlay over `{ dataset }`.
    pub fn root(&self) -> &Overlay {
        &self.root
    }

    /// The overlay over the dataset container.
    pub fn dataset(&self) -> &Overlay {
        &self.dataset
    }

    /// Commits the root overlay, and with it everything read or added.
    pub fn commit(&self) {
        self.root.commit();
    }

    /// Rolls back the root overlay, and with it everything read or added.
    pub fn rollback(&self) {
        self.root.rollback();
    }

    /// Appends items to the dataset.
    ///
    /// An array node is taken as a list of items; any other value is a single
    /// item. Each item is wrapped with [`Overlay::start`] and the overlay, not
    /// the raw item, is appended.
    pub fn add(&self, items: impl Into<Value>) {
        let items = match items.into() {
            Value::Node(node) if node.kind() == NodeKind::Array => node.values(),
            item => vec![item],
        };
        debug!(count = items.len(), "add to dataset");
        for item in items {
            self.dataset.push(Overlay::start(item));
        }
    }

    /// Stages the deletion of the item at `index`.
    ///
    /// Returns `false` without staging anything if `index` is beyond the
    /// current dataset length. Deleting at exactly the length succeeds but
    /// stages nothing, since no item lives there.
    pub fn delete(&self, index: usize) -> bool {
        let len = self.dataset.len();
        if index > len {
            debug!(index, len, "delete out of range");
            return false;
        }
        debug!(index, "delete from dataset");
        self.dataset.delete(index);
        true
    }
}
