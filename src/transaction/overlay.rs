use super::{
    Delta, Event,
    events::{Listener, Listeners},
};
use crate::{Key, Node, OverlayRandomState, Value, create_map, create_set};
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt,
    rc::{Rc, Weak},
};
use tracing::{debug, trace};

/// A transactional staging wrapper over one [`Node`].
///
/// Writes and deletions made through an overlay are staged in its [`Delta`]
/// and only applied to the base node by [`Overlay::commit`]. Reads see the
/// staged state. Reading a property whose base value is compound returns a
/// child overlay over that value; children are created on first read, cached
/// for the rest of the transaction, and committed or rolled back together
/// with their parent.
///
/// `Overlay` is a handle: [`Clone`] returns another handle to the same
/// overlay. To copy the staged state into an independent overlay, use
/// [`Overlay::fork`].
///
/// # Example
///
/// ```
/// use overlay_tx::{Key, Node, Overlay, Value};
///
/// let base = Node::from_entries([("a", 1), ("b", 2)]);
/// let tx = Overlay::new(base.clone());
///
/// tx.write("a", 5);
/// tx.delete("b");
/// assert_eq!(tx.keys(), vec![Key::from("a")]);
///
/// tx.commit();
/// assert_eq!(base.keys(), vec![Key::from("a")]);
/// assert_eq!(base.get(&"a".into()), Some(Value::from(5)));
/// ```
#[derive(Clone)]
pub struct Overlay(Rc<RefCell<OverlayState>>);

struct OverlayState {
    base: Node,
    delta: Delta,
    children: Children,
    listeners: Listeners,
    // the overlay whose read materialized this one
    parent: Weak<RefCell<OverlayState>>,
}

/// A cached child overlay.
enum Child {
    Owned(Overlay),
    // an overlay further up the materialization path, reused for a cyclic
    // reference; held weakly so the cycle does not keep itself alive
    Ancestor(Weak<RefCell<OverlayState>>),
}

impl Child {
    fn upgrade(&self) -> Option<Overlay> {
        match self {
            Child::Owned(overlay) => Some(overlay.clone()),
            Child::Ancestor(weak) => weak.upgrade().map(Overlay),
        }
    }
}

/// The child cache, iterated in the order children were added.
struct Children {
    slots: HashMap<Key, Child, OverlayRandomState>,
    order: Vec<Key>,
}

impl Default for Children {
    fn default() -> Self {
        Self {
            slots: create_map(),
            order: Vec::new(),
        }
    }
}

impl Children {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn get(&self, key: &Key) -> Option<&Child> {
        self.slots.get(key)
    }

    /// Replacing a key moves it to the end of the order.
    fn insert(&mut self, key: Key, child: Child) {
        if self.slots.insert(key.clone(), child).is_some() {
            self.order.retain(|k| k != &key);
        }
        self.order.push(key);
    }

    fn remove(&mut self, key: &Key) -> Option<Child> {
        let removed = self.slots.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    fn keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.order.iter()
    }

    fn values(&self) -> impl Iterator<Item = &Child> + '_ {
        self.order.iter().filter_map(|key| self.slots.get(key))
    }
}

/// What [`Overlay::descriptor`] reports about a visible property.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// The visible value, without materializing a child overlay.
    pub value: Value,
    /// Whether the value comes from a staged write rather than the base.
    pub staged: bool,
}

type Visited = HashSet<usize, OverlayRandomState>;

impl Overlay {
    /// Wraps any value in a new overlay.
    ///
    /// Nodes are wrapped directly. Scalars are first boxed as `{ data: value }`.
    /// An existing overlay is forked, so the result shows the same staged view
    /// but stages independently.
    pub fn start(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Node(node) => Self::new(node),
            Value::Overlay(overlay) => overlay.fork(),
            scalar => Self::new(Node::from_entries([("data", scalar)])),
        }
    }

    /// Creates an overlay over `base` with nothing staged.
    pub fn new(base: Node) -> Self {
        debug!(kind = ?base.kind(), "start overlay");
        Self::with_state(base, Delta::default(), Weak::new())
    }

    fn with_state(base: Node, delta: Delta, parent: Weak<RefCell<OverlayState>>) -> Self {
        Self(Rc::new(RefCell::new(OverlayState {
            base,
            delta,
            children: Children::default(),
            listeners: Listeners::default(),
            parent,
        })))
    }

    /// The node this overlay stages changes for.
    pub fn base(&self) -> Node {
        self.0.borrow().base.clone()
    }

    /// A copy of the currently staged writes and deletions.
    pub fn delta(&self) -> Delta {
        self.0.borrow().delta.clone()
    }

    /// Returns true if nothing is staged here or in any materialized child.
    pub fn is_clean(&self) -> bool {
        let mut visited = create_set();
        self.is_clean_with(&mut visited)
    }

    fn is_clean_with(&self, visited: &mut Visited) -> bool {
        if !visited.insert(self.id()) {
            return true;
        }
        let children = {
            let state = self.0.borrow();
            if !state.delta.is_empty() {
                return false;
            }
            state.materialized()
        };
        children.iter().all(|child| child.is_clean_with(visited))
    }

    /// Returns true if both handles refer to the same overlay.
    pub fn ptr_eq(&self, other: &Overlay) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Reads `key` through the overlay.
    ///
    /// Returns `None` if the key is staged for deletion or does not exist. A
    /// staged write is returned as is. Otherwise the base value is returned,
    /// except that compound base values are returned as the (cached) child
    /// overlay for `key`.
    pub fn read(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        let value = {
            let state = self.0.borrow();
            if state.delta.is_tombstoned(&key) {
                return None;
            }
            if let Some(staged) = state.delta.get(&key) {
                return Some(staged.clone());
            }
            state.base.get(&key)?
        };
        Some(match value {
            Value::Node(node) => Value::Overlay(self.materialize(key, node)),
            Value::Overlay(overlay) => Value::Overlay(self.adopt(key, overlay)),
            scalar => scalar,
        })
    }

    /// Like [`Overlay::read`], but only returns child overlays.
    pub fn read_overlay(&self, key: impl Into<Key>) -> Option<Overlay> {
        match self.read(key)? {
            Value::Overlay(overlay) => Some(overlay),
            _ => None,
        }
    }

    /// Returns the cached child for `key`, or creates one over `node`.
    ///
    /// If `node` is already the base of an overlay on the path from the root
    /// to here, that overlay is reused instead, so cyclic graphs materialize
    /// finitely.
    pub(crate) fn materialize(&self, key: Key, node: Node) -> Overlay {
        if let Some(child) = self.cached_child(&key) {
            return child;
        }
        let (child, slot) = match self.ancestor_over(&node) {
            Some(ancestor) => {
                trace!(%key, "reuse ancestor overlay for cyclic reference");
                let weak = Rc::downgrade(&ancestor.0);
                (ancestor, Child::Ancestor(weak))
            }
            None => {
                trace!(%key, kind = ?node.kind(), "materialize child overlay");
                let child = Self::with_state(node, Delta::default(), Rc::downgrade(&self.0));
                (child.clone(), Child::Owned(child))
            }
        };
        self.0.borrow_mut().children.insert(key, slot);
        child
    }

    /// Caches `overlay` as the child for `key`, unless a child is cached already.
    pub(crate) fn adopt(&self, key: Key, overlay: Overlay) -> Overlay {
        if let Some(child) = self.cached_child(&key) {
            return child;
        }
        let slot = Self::slot_for(&self.lineage(), &overlay);
        self.0.borrow_mut().children.insert(key, slot);
        overlay
    }

    /// Identities of this overlay and every overlay above it on the
    /// materialization path.
    fn lineage(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        let mut current = Some(self.clone());
        while let Some(overlay) = current {
            ids.push(overlay.id());
            current = overlay.0.borrow().parent.upgrade().map(Overlay);
        }
        ids
    }

    /// Cache slot for `overlay`: weak if it is one of `lineage`, so a parent
    /// never owns itself through its own cache.
    fn slot_for(lineage: &[usize], overlay: &Overlay) -> Child {
        if lineage.contains(&overlay.id()) {
            Child::Ancestor(Rc::downgrade(&overlay.0))
        } else {
            Child::Owned(overlay.clone())
        }
    }

    fn cached_child(&self, key: &Key) -> Option<Overlay> {
        self.0.borrow().children.get(key).and_then(Child::upgrade)
    }

    fn ancestor_over(&self, node: &Node) -> Option<Overlay> {
        let mut current = Some(self.clone());
        while let Some(overlay) = current {
            let parent = {
                let state = overlay.0.borrow();
                if state.base.ptr_eq(node) {
                    drop(state);
                    return Some(overlay);
                }
                state.parent.upgrade()
            };
            current = parent.map(Overlay);
        }
        None
    }

    /// Stages `value` for `key`.
    ///
    /// Writing the value the base currently holds drops any staged write for
    /// `key` instead. Either way, a staged deletion of `key` is cancelled.
    pub fn write(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let mut state = self.0.borrow_mut();
        let unchanged = state
            .base
            .get(&key)
            .is_some_and(|current| current == value);
        trace!(%key, value = value.type_name(), unchanged, "stage write");
        if unchanged {
            state.delta.unstage_write(&key);
            state.delta.clear_tombstone(&key);
        } else {
            state.delta.stage_write(key, value);
        }
    }

    /// Stages the deletion of `key`.
    ///
    /// Only keys that exist in the base or have a staged write get a
    /// tombstone; any staged write is dropped regardless.
    pub fn delete(&self, key: impl Into<Key>) {
        let key = key.into();
        let mut state = self.0.borrow_mut();
        let exists = state.base.contains_key(&key) || state.delta.contains(&key);
        trace!(%key, exists, "stage delete");
        if exists {
            state.delta.stage_delete(key);
        } else {
            state.delta.unstage_write(&key);
        }
    }

    /// Keys of the staged view: base keys that are not tombstoned, followed by
    /// keys that only have a staged write.
    pub fn keys(&self) -> Vec<Key> {
        let state = self.0.borrow();
        let base = state.base.properties();
        let mut seen = create_set();
        base.keys()
            .filter(|key| !state.delta.is_tombstoned(key))
            .chain(state.delta.writes().map(|(key, _)| key))
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Key/value pairs of the staged view, as returned by [`Overlay::read`].
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let value = self.read(&key)?;
                Some((key, value))
            })
            .collect()
    }

    /// Looks up the visible value for `key` without materializing children.
    pub fn descriptor(&self, key: impl Into<Key>) -> Option<Descriptor> {
        let key = key.into();
        let state = self.0.borrow();
        if state.delta.is_tombstoned(&key) {
            return None;
        }
        if let Some(staged) = state.delta.get(&key) {
            return Some(Descriptor {
                value: staged.clone(),
                staged: true,
            });
        }
        state.base.get(&key).map(|value| Descriptor {
            value,
            staged: false,
        })
    }

    /// Returns true if `key` is visible through the overlay.
    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.descriptor(key).is_some()
    }

    /// Array-style length of the staged view.
    ///
    /// Staged deletions leave holes and do not shrink the length.
    pub fn len(&self) -> usize {
        let state = self.0.borrow();
        let staged = state.delta.highest_index().map_or(0, |last| last + 1);
        staged.max(state.base.len())
    }

    /// Returns true if no key is visible through the overlay.
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Stages `value` at index [`Overlay::len`].
    pub fn push(&self, value: impl Into<Value>) {
        let index = self.len();
        self.write(index, value);
    }

    /// Registers `listener` for the event called `name`.
    ///
    /// Unknown names are ignored.
    pub fn on(&self, name: &str, listener: impl FnMut(&Node) + 'static) {
        match name.parse::<Event>() {
            Ok(event) => self.on_event(event, listener),
            Err(err) => trace!(%err, "ignoring listener"),
        }
    }

    /// Registers `listener` for `event`.
    pub fn on_event(&self, event: Event, listener: impl FnMut(&Node) + 'static) {
        self.0
            .borrow_mut()
            .listeners
            .register(event, Box::new(listener) as Listener);
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: Event) -> usize {
        self.0.borrow().listeners.count(event)
    }

    fn emit(&self, event: Event) {
        let (base, mut listeners) = {
            let mut state = self.0.borrow_mut();
            (state.base.clone(), state.listeners.take(event))
        };
        for listener in listeners.iter_mut() {
            listener(&base);
        }
        self.0.borrow_mut().listeners.restore(event, listeners);
    }

    /// Applies all staged changes to the base, then commits every materialized
    /// child, then notifies [`Event::Commit`] listeners.
    ///
    /// Staged writes holding an overlay make that overlay the child for the
    /// key, so it is committed in the same pass. Cached children of keys that
    /// were overwritten or deleted are committed and then evicted, so later
    /// reads see the committed value.
    pub fn commit(&self) {
        let mut visited = create_set();
        self.commit_with(&mut visited);
    }

    fn commit_with(&self, visited: &mut Visited) {
        if !visited.insert(self.id()) {
            return;
        }
        let lineage = self.lineage();
        let pending = {
            let mut guard = self.0.borrow_mut();
            let state = &mut *guard;
            let delta = std::mem::take(&mut state.delta);
            debug!(
                writes = delta.write_count(),
                deletes = delta.tombstone_count(),
                children = state.children.len(),
                "commit overlay"
            );
            let mut pending = state.materialized();
            let (writes, tombstones) = delta.into_parts();
            for (key, value) in writes {
                state.children.remove(&key);
                if let Value::Overlay(overlay) = &value {
                    let slot = Self::slot_for(&lineage, overlay);
                    state.children.insert(key.clone(), slot);
                    pending.push(overlay.clone());
                }
                state.base.insert(key, value);
            }
            for key in tombstones {
                state.children.remove(&key);
                state.base.remove(&key);
            }
            pending
        };
        for child in pending {
            child.commit_with(visited);
        }
        self.emit(Event::Commit);
    }

    /// Discards all staged changes here and in every materialized child, then
    /// notifies [`Event::Rollback`] listeners. The base is not touched.
    pub fn rollback(&self) {
        let mut visited = create_set();
        self.rollback_with(&mut visited);
    }

    fn rollback_with(&self, visited: &mut Visited) {
        if !visited.insert(self.id()) {
            return;
        }
        let pending = {
            let mut state = self.0.borrow_mut();
            let delta = std::mem::take(&mut state.delta);
            debug!(
                writes = delta.write_count(),
                deletes = delta.tombstone_count(),
                children = state.children.len(),
                "rollback overlay"
            );
            state.materialized()
        };
        for child in pending {
            child.rollback_with(visited);
        }
        self.emit(Event::Rollback);
    }

    /// Creates an independent overlay over the same base, starting from a
    /// copy of this overlay's staged writes and deletions.
    ///
    /// Children and listeners are not copied.
    pub fn fork(&self) -> Overlay {
        let state = self.0.borrow();
        debug!(
            writes = state.delta.write_count(),
            deletes = state.delta.tombstone_count(),
            "fork overlay"
        );
        Self::with_state(state.base.clone(), state.delta.clone(), Weak::new())
    }

    /// Visible entries for rendering the staged view: staged writes replace
    /// base values, tombstoned keys are skipped, and compound base values are
    /// replaced by their child overlay if one was materialized.
    pub(crate) fn view(&self) -> Vec<(Key, Value)> {
        let keys = self.keys();
        let state = self.0.borrow();
        keys.into_iter()
            .filter_map(|key| {
                if let Some(staged) = state.delta.get(&key) {
                    return Some((key, staged.clone()));
                }
                let value = state.base.get(&key)?;
                let value = match state.children.get(&key).and_then(Child::upgrade) {
                    Some(child) if value.is_compound() => Value::Overlay(child),
                    _ => value,
                };
                Some((key, value))
            })
            .collect()
    }
}

impl OverlayState {
    fn materialized(&self) -> Vec<Overlay> {
        self.children.values().filter_map(Child::upgrade).collect()
    }
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(state) = self.0.try_borrow() else {
            return f.write_str("Overlay(<borrowed>)");
        };
        f.debug_struct("Overlay")
            .field("base", &state.base)
            .field("delta", &state.delta)
            .field("children", &state.children.keys().collect::<Vec<_>>())
            .finish()
    }
}
