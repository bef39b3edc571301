// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for building a [`Node`](crate::Node) tree.
///
/// Objects use `{ "key" => value, .. }`, arrays use `[value, ..]`, and they
/// nest. Any other value is an expression converted with
/// [`Value::from`](crate::Value); wrap multi-token expressions such as `-3`
/// in parentheses.
///
/// ```rust
/// # use overlay_tx::{node_literal, NodeKind, Value};
/// let person = node_literal!({
///     "name" => { "name" => "Marcus", "info" => { "city" => "Kyiv" } },
///     "born" => 121,
///     "tags" => ["emperor", (-1)]
/// });
/// assert_eq!(person.kind(), NodeKind::Object);
/// assert_eq!(person.get(&"born".into()), Some(Value::from(121)));
/// ```
///
/// Top-level arrays work the same way:
/// ```rust
/// # use overlay_tx::node_literal;
/// let list = node_literal!([1, 2, { "three" => 3 }]);
/// assert_eq!(list.len(), 3);
/// ```
#[macro_export]
macro_rules! node_literal {
    // Object
    ({$($k:literal => $v:tt),* $(,)?}) => {
        {
            let node = $crate::Node::object();
            $( node.insert($k, $crate::node_literal!(@value $v)); )*
            node
        }
    };

    // Array
    ([$($v:tt),* $(,)?]) => {
        {
            let node = $crate::Node::array();
            $( node.push($crate::node_literal!(@value $v)); )*
            node
        }
    };

    // Helpers for nested values
    (@value {$($inner:tt)*}) => {
        $crate::Value::Node($crate::node_literal!({$($inner)*}))
    };

    (@value [$($inner:tt)*]) => {
        $crate::Value::Node($crate::node_literal!([$($inner)*]))
    };

    (@value $v:expr) => {
        $crate::Value::from($v)
    };
}
