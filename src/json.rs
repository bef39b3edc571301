// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! JSON representation
//!
//! Values convert from [`serde_json::Value`] into fresh nodes, and nodes,
//! values and overlays render back to JSON snapshots. Rendering an
//! [`Overlay`] shows its staged view: tombstoned keys are left out, staged
//! writes are shown, and children that were materialized are rendered through
//! their own staged view. Rendering never materializes new children.
//!
//! # Examples
//!
//! ## A staged edit
//!
//! Given the base `{"a": 1, "b": 2}`, staging `a = 5` and deleting `b`
//! renders the overlay as:
//!
//! ```json
//! { "a": 5 }
//! ```
//!
//! while the base still renders as `{"a": 1, "b": 2}` until commit.
//!
//! Arrays render holes as `null`; named keys on array nodes are not rendered.
//! Byte strings render as standard base64.
use crate::{Key, Node, NodeKind, Overlay, Value};
use std::{error, fmt};

/// Error returned when a snapshot cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The value reaches itself; `path` is where the cycle closes.
    Cycle { path: String },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Cycle { path } => {
                write!(f, "cannot render cyclic value, {path} refers back to an ancestor")
            }
        }
    }
}

impl error::Error for SnapshotError {}

/// Converts a [`serde_json::Value`] into a [`Value`], building new nodes for
/// objects and arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::U64(u)
                } else if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else {
                    n.as_f64().map_or(Value::Null, Value::Double)
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Node(Node::from_items(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(map) => Value::Node(Node::from_entries(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl Value {
    /// Renders the value as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, SnapshotError> {
        Renderer::default().value(self)
    }
}

impl Node {
    /// Renders the node's current contents as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, SnapshotError> {
        Renderer::default().node(self)
    }
}

impl Overlay {
    /// Renders the staged view of the overlay as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, SnapshotError> {
        Renderer::default().overlay(self)
    }
}

/// Tracks the path being rendered, to report and stop at cycles.
#[derive(Default)]
struct Renderer {
    path: Vec<Key>,
    // identities of the nodes enclosing the current position
    enclosing: Vec<usize>,
}

impl Renderer {
    fn value(&mut self, value: &Value) -> Result<serde_json::Value, SnapshotError> {
        Ok(match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => (*v).into(),
            Value::U64(v) => (*v).into(),
            Value::I64(v) => (*v).into(),
            Value::Double(v) => (*v).into(),
            Value::String(v) => v.as_str().into(),
            Value::Bytes(v) => {
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, v).into()
            }
            Value::Node(node) => self.node(node)?,
            Value::Overlay(overlay) => self.overlay(overlay)?,
        })
    }

    fn node(&mut self, node: &Node) -> Result<serde_json::Value, SnapshotError> {
        self.compound(node.id(), node.kind(), node.len(), node.entries())
    }

    fn overlay(&mut self, overlay: &Overlay) -> Result<serde_json::Value, SnapshotError> {
        let base = overlay.base();
        // keyed by the base, so an overlay and its base close the same cycle
        self.compound(base.id(), base.kind(), overlay.len(), overlay.view())
    }

    fn compound(
        &mut self,
        id: usize,
        kind: NodeKind,
        len: usize,
        entries: Vec<(Key, Value)>,
    ) -> Result<serde_json::Value, SnapshotError> {
        if self.enclosing.contains(&id) {
            return Err(SnapshotError::Cycle {
                path: self.path_string(),
            });
        }
        self.enclosing.push(id);
        let rendered = match kind {
            NodeKind::Array => {
                let mut items = vec![serde_json::Value::Null; len];
                for (key, value) in entries {
                    let Some(index) = key.as_index() else {
                        continue;
                    };
                    let item = self.entry(key, &value)?;
                    if let Some(slot) = items.get_mut(index) {
                        *slot = item;
                    }
                }
                serde_json::Value::Array(items)
            }
            NodeKind::Object => {
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    let name = key.to_string();
                    map.insert(name, self.entry(key, &value)?);
                }
                serde_json::Value::Object(map)
            }
        };
        self.enclosing.pop();
        Ok(rendered)
    }

    fn entry(&mut self, key: Key, value: &Value) -> Result<serde_json::Value, SnapshotError> {
        self.path.push(key);
        let rendered = self.value(value)?;
        self.path.pop();
        Ok(rendered)
    }

    fn path_string(&self) -> String {
        let mut path = String::from("$");
        for key in &self.path {
            match key {
                Key::Index(i) => path.push_str(&format!("[{i}]")),
                Key::Name(name) => {
                    path.push('.');
                    path.push_str(name);
                }
            }
        }
        path
    }
}
