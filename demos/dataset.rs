use overlay_tx::{DatasetTransaction, Node, Value, node_literal};
use tracing_subscriber::EnvFilter;

fn print(label: &str, data: &Node) {
    match data.to_json() {
        Ok(json) => println!("{label}: {json}"),
        Err(err) => println!("{label}: {err}"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let data = node_literal!([
        { "name" => "Marcus Aurelius", "born" => 121 },
        {
            "name" => { "name" => "Marcus", "info" => { "city" => "Kyiv", "language" => "JS" } },
            "born" => 121
        },
        { "name" => "Marcus Aurelius", "born" => 121 }
    ]);

    let tx = DatasetTransaction::start(&data);

    // Edit every person through the overlay
    for (_, person) in tx.dataset().entries() {
        let Value::Overlay(person) = person else {
            continue;
        };
        person.write("city", "Shaoshan");
        person.delete("born");
    }

    tx.add(node_literal!({ "city" => "Hanoi" }));
    tx.add(1);
    tx.delete(0);

    // Nested edits on the second person
    let second = tx.dataset().read_overlay(1).expect("second person exists");
    let name = second.read_overlay("name").expect("name is an object");
    name.write("name", "Tin");
    let info = name.read_overlay("info").expect("info is an object");
    info.write("city", "Odessa");
    info.delete("language");

    match tx.dataset().to_json() {
        Ok(json) => println!("staged: {json}"),
        Err(err) => println!("staged: {err}"),
    }
    print("before commit", &data);

    // Use tx.rollback() instead to discard everything above
    tx.commit();

    print("after commit", &data);
}
