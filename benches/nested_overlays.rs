#![cfg_attr(not(target_os = "linux"), allow(dead_code, unused_imports))]

use iai_callgrind::{library_benchmark, library_benchmark_group, main};
use overlay_tx::{Key, Node, Overlay, Value};
use std::hint::black_box;

/// Builds `{ level1: { level2: { ... { value: 0 } } } }` with `depth` levels.
fn setup_nested(depth: usize) -> Node {
    overlay_tx::enable_determinism();

    let leaf = Node::from_entries([("value", 0u64)]);
    (1..=depth).rev().fold(leaf, |inner, level| {
        Node::from_entries([(format!("level{level}"), inner)])
    })
}

/// Builds an array of `n` small objects.
fn setup_list(n: usize) -> Node {
    overlay_tx::enable_determinism();

    Node::from_items((0..n).map(|i| Node::from_entries([("id", i as u64)])))
}

#[library_benchmark]
#[bench::shallow(setup_nested(3))]
#[bench::deep(setup_nested(32))]
fn nested_write_and_commit(base: Node) {
    let tx = Overlay::new(black_box(base));
    let mut current = tx.clone();
    let mut level = 1;
    while let Some(child) = current.read_overlay(format!("level{level}")) {
        current = child;
        level += 1;
    }
    current.write("value", 42u64);
    tx.commit();
    black_box(tx);
}

#[library_benchmark]
#[bench::shallow(setup_nested(3))]
#[bench::deep(setup_nested(32))]
fn nested_write_and_rollback(base: Node) {
    let tx = Overlay::new(black_box(base));
    let mut current = tx.clone();
    let mut level = 1;
    while let Some(child) = current.read_overlay(format!("level{level}")) {
        current = child;
        level += 1;
    }
    current.write("value", 42u64);
    tx.rollback();
    black_box(tx);
}

#[library_benchmark]
#[bench::medium(setup_list(255))]
fn list_update_every_item(base: Node) {
    let tx = Overlay::new(black_box(base));
    for (key, value) in tx.entries() {
        if let Value::Overlay(item) = value {
            item.write("seen", true);
        }
        black_box(key);
    }
    tx.commit();
}

#[library_benchmark]
#[bench::medium(setup_list(255))]
fn list_keys_with_staged_edits(base: Node) {
    let tx = Overlay::new(black_box(base));
    tx.delete(Key::Index(128));
    tx.push(Value::Null);
    black_box(tx.keys());
}

library_benchmark_group!(
    name = nested_overlay_benches;
    benchmarks =
        nested_write_and_commit,
        nested_write_and_rollback,
        list_update_every_item,
        list_keys_with_staged_edits
);

#[cfg(target_os = "linux")]
main!(library_benchmark_groups = nested_overlay_benches);

#[cfg(not(target_os = "linux"))]
fn main() {}
