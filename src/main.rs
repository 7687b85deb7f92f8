use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use rowstore::schema::{ColumnDef, IndexDef, MemorySchema, TableDef};
use rowstore::storage::btree::{BtreeEngine, MemoryBtree};
use rowstore::table::DataTable;
use rowstore::tuple::{NamedFields, Value};
use rowstore::{ErrorCode, Result, StoreOptions};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rowstore=info")),
        )
        .init();

    println!("Rowstore - SQLite-compatible row store");
    println!("======================================\n");

    let engine = Arc::new(MemoryBtree::new(StoreOptions::default()));
    let schema = MemorySchema::new();
    let def = TableDef::builder("people")
        .column(ColumnDef::new("id").type_name("INTEGER").primary_key())
        .column(ColumnDef::new("name").type_name("TEXT").unique())
        .column(ColumnDef::new("city").type_name("TEXT"))
        .build()?;
    schema.create_table(&*engine, def)?;
    schema.create_index(&*engine, IndexDef::new("idx_city", "people").column("city"))?;
    info!(sync = %engine.options().sync, "created table people");

    let people = DataTable::open(Arc::clone(&engine), &schema, "people", true)?;
    let unique = "sqlite_autoindex_people_1";

    // A duplicate name is rejected
    let alice = people.insert(vec![Value::Null, Value::from("alice"), Value::from("oslo")])?;
    println!("Inserted alice as rowid {}", alice);
    match people.insert(vec![Value::Null, Value::from("alice"), Value::from("rome")]) {
        Err(err) if err.code() == ErrorCode::Constraint => println!("Rejected duplicate: {}", err),
        other => println!("Unexpected result: {:?}", other),
    }

    // Explicit rowids are honoured and auto-assignment continues past them
    let bob = people.insert(vec![Value::Integer(5), Value::from("bob"), Value::from("oslo")])?;
    let carol = people.insert(
        NamedFields::new()
            .with("name", "carol")
            .with("city", "lima"),
    )?;
    println!("Inserted bob as rowid {}, carol as rowid {}", bob, carol);

    // An update moves the index entry
    people.update(alice.get(), vec![Value::Null, Value::from("dora"), Value::from("oslo")])?;
    println!(
        "After update: lookup(alice) = {:?}, lookup(dora) = {:?}",
        people.lookup_index(unique, false, &[Value::from("alice")])?,
        people.lookup_index(unique, false, &[Value::from("dora")])?
    );

    // A delete removes the row and its index entries
    people.delete(alice.get())?;
    println!(
        "After delete: row {} present = {}, lookup(dora) = {:?}",
        alice,
        people.go_to_row(alice.get())?,
        people.lookup_index(unique, false, &[Value::from("dora")])?
    );

    println!("\nRows:");
    let mut more = people.first()?;
    while more {
        let row = people.row()?;
        let values: Vec<String> = row.values().iter().map(Value::to_string).collect();
        println!("  - {}: {}", row.rowid(), values.join(", "));
        more = people.next()?;
    }

    println!("\nidx_city:");
    for (key, rowid) in people.index_entries("idx_city")? {
        println!("  - {} -> {}", key[0], rowid);
    }

    people.close()?;
    println!("\nDemo completed successfully!");
    Ok(())
}
