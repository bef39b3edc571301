//! Integration tests for the dataset transaction adapter.

use overlay_tx::{DatasetTransaction, Key, Node, Value, node_literal};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // RUST_LOG=overlay_tx=trace shows every staged operation
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn dataset() -> Node {
    node_literal!([
        { "name" => "Marcus Aurelius", "born" => 121 },
        { "name" => "Lucius Verus", "born" => 130 },
        { "name" => "Commodus", "born" => 161 }
    ])
}

fn name_at(list: &Node, index: usize) -> Option<Value> {
    let item = list.get(&Key::Index(index))?;
    match item {
        Value::Node(node) => node.get(&"name".into()),
        Value::Overlay(overlay) => overlay.base().get(&"name".into()),
        _ => None,
    }
}

#[test]
fn delete_out_of_range_then_first() {
    init_tracing();
    let data = dataset();
    let tx = DatasetTransaction::start(&data);

    assert!(!tx.delete(5));
    assert!(tx.dataset().is_clean());
    assert!(tx.delete(0));
    assert_eq!(tx.dataset().read(0), None);
    assert_eq!(tx.dataset().len(), 3);

    tx.commit();
    assert_eq!(name_at(&data, 0), None);
    assert_eq!(name_at(&data, 1), Some(Value::from("Lucius Verus")));
    assert_eq!(data.keys(), vec![Key::Index(1), Key::Index(2)]);
}

#[test]
fn add_edit_and_commit() {
    init_tracing();
    let data = dataset();
    let tx = DatasetTransaction::start(&data);

    tx.add(node_literal!({ "name" => "Faustina", "born" => 130 }));
    let added = tx.dataset().read_overlay(3).unwrap();
    added.write("born", 125);

    let first = tx.dataset().read_overlay(0).unwrap();
    first.write("name", "Marcus");
    first.delete("born");

    // nothing lands before commit
    assert_eq!(data.len(), 3);
    assert_eq!(name_at(&data, 0), Some(Value::from("Marcus Aurelius")));

    tx.commit();
    assert_eq!(data.len(), 4);
    assert_eq!(name_at(&data, 0), Some(Value::from("Marcus")));
    assert_eq!(name_at(&data, 3), Some(Value::from("Faustina")));
    assert_eq!(added.base().get(&"born".into()), Some(Value::from(125)));
    let stored_first = data.get(&Key::Index(0)).unwrap();
    assert!(!stored_first.as_node().unwrap().contains_key(&"born".into()));
}

#[test]
fn add_many_items_at_once() {
    init_tracing();
    let data = Node::array();
    let tx = DatasetTransaction::start(&data);
    tx.add(node_literal!([
        { "name" => "Annia" },
        { "name" => "Vibia" }
    ]));
    assert_eq!(tx.dataset().len(), 2);
    tx.add(node_literal!({ "name" => "Fadilla" }));
    assert_eq!(tx.dataset().len(), 3);

    tx.commit();
    assert_eq!(name_at(&data, 1), Some(Value::from("Vibia")));
    assert_eq!(name_at(&data, 2), Some(Value::from("Fadilla")));
}

#[test]
fn rollback_leaves_dataset_untouched() {
    init_tracing();
    let data = dataset();
    let tx = DatasetTransaction::start(&data);

    tx.add(node_literal!({ "name" => "Faustina" }));
    tx.delete(2);
    tx.dataset()
        .read_overlay(1)
        .unwrap()
        .write("name", "Lucius");
    tx.rollback();
    tx.commit();

    assert_eq!(data.len(), 3);
    assert_eq!(name_at(&data, 1), Some(Value::from("Lucius Verus")));
    assert_eq!(name_at(&data, 2), Some(Value::from("Commodus")));
}

#[test]
fn commit_listeners_on_the_root_see_the_wrapper() {
    init_tracing();
    let data = dataset();
    let tx = DatasetTransaction::start(&data);
    let expected = data.clone();
    tx.root().on("commit", move |root| {
        let stored = root.get(&"dataset".into()).unwrap();
        assert!(stored.as_node().unwrap().ptr_eq(&expected));
    });
    tx.delete(1);
    tx.commit();
}

#[cfg(feature = "json")]
#[test]
fn snapshot_after_commit() {
    init_tracing();
    let data = dataset();
    let tx = DatasetTransaction::start(&data);
    tx.delete(0);
    tx.add(node_literal!({ "name" => "Faustina" }));
    tx.dataset()
        .read_overlay(1)
        .unwrap()
        .write("born", 131);

    insta::assert_snapshot!(
        serde_json::to_string(&tx.dataset().to_json().unwrap()).unwrap(),
        @r#"[null,{"born":131,"name":"Lucius Verus"},{"born":161,"name":"Commodus"},{"name":"Faustina"}]"#
    );
    tx.commit();
    insta::assert_snapshot!(
        serde_json::to_string(&data.to_json().unwrap()).unwrap(),
        @r#"[null,{"born":131,"name":"Lucius Verus"},{"born":161,"name":"Commodus"},{"name":"Faustina"}]"#
    );
}
