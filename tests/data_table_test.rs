use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;

use rowstore::common::{ErrorCode, RowId, StoreOptions, TextEncoding};
use rowstore::schema::{ColumnDef, IndexDef, MemorySchema, Schema, TableDef};
use rowstore::storage::btree::MemoryBtree;
use rowstore::table::DataTable;
use rowstore::tuple::{NamedFields, RowBuilder, Value};

struct Fixture {
    engine: Arc<MemoryBtree>,
    schema: MemorySchema,
}

impl Fixture {
    fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    fn with_options(options: StoreOptions) -> Self {
        Self {
            engine: Arc::new(MemoryBtree::new(options)),
            schema: MemorySchema::new(),
        }
    }

    fn create(&self, def: TableDef) {
        self.schema.create_table(&*self.engine, def).unwrap();
    }

    fn index(&self, def: IndexDef) {
        self.schema.create_index(&*self.engine, def).unwrap();
    }

    fn open(&self, name: &str, write: bool) -> DataTable<MemoryBtree> {
        DataTable::open(Arc::clone(&self.engine), &self.schema, name, write).unwrap()
    }
}

/// T(id INTEGER PRIMARY KEY, name TEXT UNIQUE)
fn people_table() -> (Fixture, DataTable<MemoryBtree>) {
    let fx = Fixture::new();
    fx.create(
        TableDef::builder("t")
            .column(ColumnDef::new("id").type_name("INTEGER").primary_key())
            .column(ColumnDef::new("name").type_name("TEXT").unique())
            .build()
            .unwrap(),
    );
    let table = fx.open("t", true);
    (fx, table)
}

const NAME_INDEX: &str = "sqlite_autoindex_t_1";

fn rowid(id: i64) -> RowId {
    RowId::new(id).unwrap()
}

fn row_count(table: &DataTable<MemoryBtree>) -> usize {
    let mut count = 0;
    let mut more = table.first().unwrap();
    while more {
        count += 1;
        more = table.next().unwrap();
    }
    count
}

/// Every index holds exactly the keys projected from the current rows.
fn assert_indexes_consistent(table: &DataTable<MemoryBtree>) {
    let def = Arc::clone(table.definition());
    for (name, index) in table.index_definitions() {
        let columns: Vec<usize> = def
            .index_columns(index)
            .iter()
            .map(|c| def.column_index(c).unwrap())
            .collect();

        let mut expected = BTreeSet::new();
        let mut more = table.first().unwrap();
        while more {
            let row = table.row().unwrap();
            let key: Vec<String> = columns.iter().map(|&i| row.values()[i].to_string()).collect();
            expected.insert((key, row.rowid()));
            more = table.next().unwrap();
        }

        let actual: BTreeSet<(Vec<String>, RowId)> = table
            .index_entries(name)
            .unwrap()
            .into_iter()
            .map(|(key, rowid)| (key.iter().map(Value::to_string).collect(), rowid))
            .collect();
        assert_eq!(actual, expected, "index {} out of step with rows", name);
    }
}

#[test]
fn test_duplicate_unique_value_rejected() {
    let (_fx, table) = people_table();

    let first = table.insert(vec![Value::Null, Value::from("alice")]).unwrap();
    assert_eq!(first, 1);

    let err = table
        .insert(vec![Value::Null, Value::from("alice")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Constraint);
    assert!(err.to_string().contains(NAME_INDEX));

    assert_eq!(row_count(&table), 1);
    assert_indexes_consistent(&table);
}

#[test]
fn test_explicit_rowid_then_auto_assign() {
    let (_fx, table) = people_table();

    assert_eq!(table.insert(vec![Value::Integer(5), Value::from("bob")]).unwrap(), 5);
    assert_eq!(table.insert(vec![Value::Null, Value::from("carol")]).unwrap(), 6);
    assert!(table.go_to_row(5).unwrap());
    assert_eq!(table.value("name").unwrap(), Value::from("bob"));
    assert_eq!(table.value("id").unwrap(), Value::Integer(5));
}

#[test]
fn test_update_moves_index_entry() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Null, Value::from("alice")]).unwrap();

    table.update(1, vec![Value::Null, Value::from("bob")]).unwrap();

    assert_eq!(table.lookup_index(NAME_INDEX, false, &[Value::from("alice")]).unwrap(), None);
    assert_eq!(
        table.lookup_index(NAME_INDEX, false, &[Value::from("bob")]).unwrap(),
        Some(rowid(1))
    );
    assert_indexes_consistent(&table);
}

#[test]
fn test_delete_removes_row_and_keys() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Null, Value::from("alice")]).unwrap();
    table.insert(vec![Value::Null, Value::from("bob")]).unwrap();

    table.delete(1).unwrap();

    assert!(!table.go_to_row(1).unwrap());
    assert_eq!(table.lookup_index(NAME_INDEX, false, &[Value::from("alice")]).unwrap(), None);
    assert_eq!(
        table.lookup_index(NAME_INDEX, false, &[Value::from("bob")]).unwrap(),
        Some(rowid(2))
    );
    assert_indexes_consistent(&table);
}

#[test]
fn test_non_positive_rowid_rejected() {
    let (_fx, table) = people_table();
    for bad in [0, -1, i64::MIN] {
        let err = table
            .insert(vec![Value::Integer(bad), Value::from("x")])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Misuse);
    }
    assert_eq!(row_count(&table), 0);
    assert!(table.index_entries(NAME_INDEX).unwrap().is_empty());
}

#[test]
fn test_non_integer_rowid_value() {
    let (_fx, table) = people_table();
    let err = table
        .insert(vec![Value::from("seven"), Value::from("x")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn test_explicit_rowid_collision() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Integer(3), Value::from("a")]).unwrap();
    let err = table
        .insert(vec![Value::Integer(3), Value::from("b")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Constraint);
    assert!(err.to_string().contains("PRIMARY KEY"));
    assert_eq!(table.lookup_index(NAME_INDEX, false, &[Value::from("b")]).unwrap(), None);
}

#[test]
fn test_atomic_rejection_across_indexes() {
    let fx = Fixture::new();
    fx.create(
        TableDef::builder("users")
            .column(ColumnDef::new("email").type_name("TEXT").unique())
            .column(ColumnDef::new("handle").type_name("TEXT").unique())
            .column(ColumnDef::new("age").type_name("INT"))
            .build()
            .unwrap(),
    );
    fx.index(IndexDef::new("idx_age", "users").column("age"));
    let users = fx.open("users", true);

    users
        .insert(vec![Value::from("a@x"), Value::from("ann"), Value::Integer(30)])
        .unwrap();
    users
        .insert(vec![Value::from("b@x"), Value::from("ben"), Value::Integer(40)])
        .unwrap();

    // email is new but handle collides: nothing may be written anywhere
    let before: Vec<_> = users
        .index_definitions()
        .keys()
        .map(|name| users.index_entries(name).unwrap())
        .collect();
    let err = users
        .insert(vec![Value::from("c@x"), Value::from("ben"), Value::Integer(50)])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Constraint);
    assert!(err.to_string().contains("sqlite_autoindex_users_2"));

    let after: Vec<_> = users
        .index_definitions()
        .keys()
        .map(|name| users.index_entries(name).unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(row_count(&users), 2);

    // an update colliding on one unique index leaves the old keys in place
    let err = users
        .update(1, vec![Value::from("z@x"), Value::from("ben"), Value::Integer(31)])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Constraint);
    assert!(users.go_to_row(1).unwrap());
    assert_eq!(users.value("email").unwrap(), Value::from("a@x"));
    assert_eq!(
        users
            .lookup_index("sqlite_autoindex_users_1", false, &[Value::from("a@x")])
            .unwrap(),
        Some(rowid(1))
    );
    assert_eq!(
        users.lookup_index("idx_age", false, &[Value::Integer(30)]).unwrap(),
        Some(rowid(1))
    );
    assert_indexes_consistent(&users);
}

#[test]
fn test_update_keeping_own_unique_key() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Null, Value::from("alice")]).unwrap();
    table
        .update(1, NamedFields::new().with("name", "alice"))
        .unwrap();
    assert!(table.go_to_row(1).unwrap());
    assert_eq!(table.value("name").unwrap(), Value::from("alice"));
    assert_indexes_consistent(&table);
}

#[test]
fn test_update_changes_rowid() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Null, Value::from("alice")]).unwrap();
    table.insert(vec![Value::Null, Value::from("bob")]).unwrap();

    table.update(1, vec![Value::Integer(10), Value::from("alice")]).unwrap();
    assert!(!table.go_to_row(1).unwrap());
    assert!(table.go_to_row(10).unwrap());
    assert_eq!(
        table.lookup_index(NAME_INDEX, false, &[Value::from("alice")]).unwrap(),
        Some(rowid(10))
    );

    let err = table
        .update(10, vec![Value::Integer(2), Value::from("alice")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Constraint);
    assert_eq!(table.row_id().unwrap(), 10);
    assert_indexes_consistent(&table);
}

#[test]
fn test_update_and_delete_missing_row() {
    let (_fx, table) = people_table();
    let err = table.update(42, vec![Value::Null, Value::from("x")]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    let err = table.delete(42).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    let err = table.delete_current().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
}

#[test]
fn test_current_row_mutations() {
    let (_fx, table) = people_table();
    for name in ["a", "b", "c"] {
        table.insert(vec![Value::Null, Value::from(name)]).unwrap();
    }

    assert!(table.go_to_row(2).unwrap());
    table
        .update_current(vec![Value::Null, Value::from("bee")])
        .unwrap();
    assert_eq!(table.row_id().unwrap(), 2);

    table.delete_current().unwrap();
    // the cursor moves on to the following row
    assert_eq!(table.row_id().unwrap(), 3);
    assert_eq!(row_count(&table), 2);
    assert_indexes_consistent(&table);
}

#[test]
fn test_null_unique_values_do_not_conflict() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Null, Value::Null]).unwrap();
    table.insert(vec![Value::Null]).unwrap();
    assert_eq!(row_count(&table), 2);
    assert_eq!(table.index_entries(NAME_INDEX).unwrap().len(), 2);
}

#[test]
fn test_not_null_enforced_on_insert_and_update() {
    let fx = Fixture::new();
    fx.create(
        TableDef::builder("notes")
            .column(ColumnDef::new("id").type_name("INTEGER").primary_key().not_null())
            .column(ColumnDef::new("body").type_name("TEXT").not_null())
            .build()
            .unwrap(),
    );
    let notes = fx.open("notes", true);

    let err = notes.insert(vec![Value::Null]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    assert!(err.to_string().contains("notes.body"));
    assert_eq!(row_count(&notes), 0);

    // the rowid alias may be NULL: it is assigned
    let id = notes.insert(vec![Value::Null, Value::from("hi")]).unwrap();
    let err = notes
        .update(id.get(), NamedFields::new().with("id", id.get()))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    assert!(notes.go_to_row(id.get()).unwrap());
    assert_eq!(notes.value("body").unwrap(), Value::from("hi"));
}

#[test]
fn test_composite_index() {
    let fx = Fixture::new();
    fx.create(
        TableDef::builder("visits")
            .column(ColumnDef::new("city").type_name("TEXT"))
            .column(ColumnDef::new("day").type_name("INT"))
            .column(ColumnDef::new("who").type_name("TEXT"))
            .unique(&["city", "day"])
            .build()
            .unwrap(),
    );
    fx.index(IndexDef::new("idx_who_day", "visits").column("who").column("day"));
    let visits = fx.open("visits", true);
    let unique = "sqlite_autoindex_visits_1";

    visits
        .insert(vec![Value::from("oslo"), Value::Integer(1), Value::from("ann")])
        .unwrap();
    visits
        .insert(vec![Value::from("oslo"), Value::Integer(2), Value::from("ann")])
        .unwrap();
    visits
        .insert(vec![Value::from("rome"), Value::Integer(1), Value::from("bo")])
        .unwrap();

    let err = visits
        .insert(vec![Value::from("oslo"), Value::Integer(2), Value::from("cy")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Constraint);

    assert_eq!(
        visits
            .lookup_index(unique, false, &[Value::from("rome"), Value::Integer(1)])
            .unwrap(),
        Some(rowid(3))
    );
    // a leading-column prefix finds the first matching entry
    assert_eq!(
        visits.lookup_index(unique, false, &[Value::from("oslo")]).unwrap(),
        Some(rowid(1))
    );
    let keys: Vec<Vec<Value>> = visits
        .index_entries("idx_who_day")
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(
        keys,
        vec![
            vec![Value::from("ann"), Value::Integer(1)],
            vec![Value::from("ann"), Value::Integer(2)],
            vec![Value::from("bo"), Value::Integer(1)],
        ]
    );
    assert_indexes_consistent(&visits);
}

#[test]
fn test_non_rowid_primary_key() {
    let fx = Fixture::new();
    fx.create(
        TableDef::builder("codes")
            .column(ColumnDef::new("code").type_name("TEXT").primary_key())
            .column(ColumnDef::new("label").type_name("TEXT"))
            .build()
            .unwrap(),
    );
    let codes = fx.open("codes", true);
    assert!(!codes.is_rowid_primary_key());
    assert_eq!(codes.primary_key_index(), Some("sqlite_autoindex_codes_1"));

    codes.insert(vec![Value::from("NO"), Value::from("Norway")]).unwrap();
    let err = codes
        .insert(vec![Value::from("NO"), Value::from("Nope")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Constraint);
}

#[test]
fn test_auto_rowids_increase_past_deletes() {
    let (_fx, table) = people_table();
    let mut last = 0;
    for i in 0..20 {
        let id = table
            .insert(vec![Value::Null, Value::from(format!("n{}", i))])
            .unwrap();
        assert!(id.get() > last);
        last = id.get();
        // gaps below the maximum are not reused
        if i % 3 == 1 {
            table.delete(id.get() - 1).unwrap();
        }
    }
    assert_indexes_consistent(&table);
}

#[test]
fn test_autoincrement_flag() {
    let fx = Fixture::new();
    fx.create(
        TableDef::builder("log")
            .column(ColumnDef::new("id").type_name("INTEGER").autoincrement())
            .column(ColumnDef::new("msg"))
            .build()
            .unwrap(),
    );
    let log = fx.open("log", true);
    assert!(log.is_autoincrement());
    assert!(log.is_rowid_primary_key());
    assert!(log.index_definitions().is_empty());
    assert_eq!(log.insert(vec![Value::Null, Value::from("x")]).unwrap(), 1);
}

#[test]
fn test_locate_and_check_index() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Integer(10), Value::from("amy")]).unwrap();
    table.insert(vec![Value::Integer(20), Value::from("cal")]).unwrap();

    assert!(table.locate(Some(NAME_INDEX), false, &[Value::from("cal")]).unwrap());
    assert_eq!(table.row_id().unwrap(), 20);
    assert!(table.check_index(Some(NAME_INDEX), &[Value::from("cal")]).unwrap());
    assert!(!table.check_index(Some(NAME_INDEX), &[Value::from("amy")]).unwrap());
    assert!(table.check_index(None, &[Value::Integer(20)]).unwrap());

    assert!(!table.locate(Some(NAME_INDEX), false, &[Value::from("bob")]).unwrap());
    assert!(table.locate(Some(NAME_INDEX), true, &[Value::from("bob")]).unwrap());
    assert_eq!(table.row_id().unwrap(), 20);

    assert!(table.locate(None, false, &[Value::Integer(10)]).unwrap());
    assert!(!table.locate(None, false, &[Value::Integer(15)]).unwrap());
    assert!(table.locate(None, true, &[Value::Integer(15)]).unwrap());
    assert_eq!(table.row_id().unwrap(), 20);
    assert!(!table.locate(None, true, &[Value::Integer(25)]).unwrap());

    let err = table
        .locate(None, false, &[Value::Integer(1), Value::Integer(2)])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    let err = table.locate(Some("no_such_index"), false, &[Value::Null]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    assert!(!table.is_index_exists("no_such_index"));
    assert!(table.is_index_exists(NAME_INDEX));
}

#[test]
fn test_index_key_wider_than_index() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Null, Value::from("alice")]).unwrap();

    // the extra value would otherwise be compared against the stored rowid
    for key in [
        vec![Value::from("alice"), Value::Integer(1)],
        vec![Value::from("alice"), Value::Integer(99)],
    ] {
        let err = table.locate(Some(NAME_INDEX), false, &key).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Misuse);
    }
    let err = table
        .lookup_index(NAME_INDEX, false, &[Value::from("alice"), Value::from("zzz")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);

    assert!(table.locate(Some(NAME_INDEX), false, &[Value::from("alice")]).unwrap());
    let err = table
        .lookup_index("no_such_index", false, &[Value::from("alice")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
}

#[test]
fn test_named_and_builder_input() {
    let (_fx, table) = people_table();
    let row = RowBuilder::new(Arc::clone(table.definition()))
        .set("name", "zed")
        .build()
        .unwrap();
    let id = table.insert(row).unwrap();
    assert!(table.go_to_row(id.get()).unwrap());
    assert_eq!(table.row().unwrap().value_by_name("name"), Some(&Value::from("zed")));

    let err = table
        .insert(NamedFields::new().with("nickname", "z"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    // a misspelt column or a value past the last column never reaches the table
    let err = RowBuilder::new(Arc::clone(table.definition()))
        .set("nmae", "typo")
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    let err = RowBuilder::new(Arc::clone(table.definition()))
        .null()
        .value("yan")
        .value("extra")
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(row_count(&table), 1);

    let fields = table.named_fields(&[Value::Integer(4), Value::from("q")]).unwrap();
    let index = Arc::clone(&table.index_definitions()[NAME_INDEX]);
    assert_eq!(table.key_for_index(&fields, &index), vec![Value::from("q")]);
}

#[test]
fn test_read_only_handle() {
    let (fx, table) = people_table();
    table.insert(vec![Value::Null, Value::from("amy")]).unwrap();

    let reader = fx.open("t", false);
    assert!(reader.go_to_row(1).unwrap());
    assert_eq!(reader.value("name").unwrap(), Value::from("amy"));

    let err = reader.insert(vec![Value::Null, Value::from("bo")]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    let err = reader.delete(1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Misuse);
    assert_eq!(row_count(&table), 1);
}

#[test]
fn test_clone_and_close() {
    let (_fx, table) = people_table();
    table.insert(vec![Value::Null, Value::from("amy")]).unwrap();
    table.insert(vec![Value::Null, Value::from("bo")]).unwrap();
    assert!(table.go_to_row(2).unwrap());

    let copy = table.try_clone().unwrap();
    assert_eq!(copy.row_id().unwrap(), 2);
    assert!(Arc::ptr_eq(copy.definition(), table.definition()));

    copy.insert(vec![Value::Null, Value::from("cy")]).unwrap();
    assert!(table.go_to_row(3).unwrap());

    table.close().unwrap();
    assert!(table.eof());
    assert!(table.first().is_err());
    // closing again is harmless
    table.close().unwrap();

    assert_eq!(
        copy.lookup_index(NAME_INDEX, false, &[Value::from("cy")]).unwrap(),
        Some(rowid(3))
    );
    assert_indexes_consistent(&copy);
}

#[test]
fn test_handle_shared_across_threads() {
    let (_fx, table) = people_table();
    let table = Arc::new(table);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for i in 0..25 {
                    table
                        .insert(vec![Value::Null, Value::from(format!("{}-{}", t, i))])
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(row_count(&table), 100);
    assert_indexes_consistent(&table);
}

#[test]
fn test_utf16_database() {
    let fx = Fixture::with_options(StoreOptions::new().encoding(TextEncoding::Utf16Le));
    fx.create(
        TableDef::builder("words")
            .column(ColumnDef::new("w").type_name("TEXT").unique())
            .build()
            .unwrap(),
    );
    let words = fx.open("words", true);
    for w in ["über", "apple", "zebra"] {
        words.insert(vec![Value::from(w)]).unwrap();
    }
    let keys: Vec<Value> = words
        .index_entries("sqlite_autoindex_words_1")
        .unwrap()
        .into_iter()
        .map(|(mut key, _)| key.remove(0))
        .collect();
    assert_eq!(keys[0], Value::from("apple"));
    assert!(words.go_to_row(1).unwrap());
    assert_eq!(words.value("w").unwrap(), Value::from("über"));
}

#[test]
fn test_open_unknown_table() {
    let fx = Fixture::new();
    let err = DataTable::open(Arc::clone(&fx.engine), &fx.schema, "nope", true)
        .err()
        .unwrap();
    assert_eq!(err.code(), ErrorCode::Misuse);
    assert!(fx.schema.table("nope").is_err());
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Option<i64>, Option<u8>),
    Update(i64, Option<u8>),
    Delete(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (proptest::option::of(1i64..12), proptest::option::of(0u8..6))
            .prop_map(|(id, name)| Op::Insert(id, name)),
        (1i64..12, proptest::option::of(0u8..6)).prop_map(|(id, name)| Op::Update(id, name)),
        (1i64..12).prop_map(Op::Delete),
    ]
}

fn name_value(name: Option<u8>) -> Value {
    name.map_or(Value::Null, |n| Value::from(format!("n{}", n)))
}

fn tag_value(name: Option<u8>) -> Value {
    name.map_or(Value::Null, |n| Value::Integer(i64::from(n % 2)))
}

fn stored_names(table: &DataTable<MemoryBtree>) -> BTreeMap<i64, Value> {
    let mut rows = BTreeMap::new();
    let mut more = table.first().unwrap();
    while more {
        let row = table.row().unwrap();
        rows.insert(row.rowid().get(), row.values()[1].clone());
        more = table.next().unwrap();
    }
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_indexes_follow_any_mutation_sequence(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let fx = Fixture::new();
        fx.create(
            TableDef::builder("tags")
                .column(ColumnDef::new("id").type_name("INTEGER").primary_key())
                .column(ColumnDef::new("name").type_name("TEXT").unique())
                .column(ColumnDef::new("tag").type_name("INT"))
                .build()
                .unwrap(),
        );
        fx.index(IndexDef::new("idx_tag", "tags").column("tag"));
        let table = fx.open("tags", true);
        let mut model: BTreeMap<i64, Option<u8>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(id, name) => {
                    let result = table.insert(vec![
                        id.map_or(Value::Null, Value::Integer),
                        name_value(name),
                        tag_value(name),
                    ]);
                    let taken = name.is_some() && model.values().any(|n| *n == name);
                    let collides = id.is_some_and(|id| model.contains_key(&id));
                    if taken || collides {
                        prop_assert_eq!(result.unwrap_err().code(), ErrorCode::Constraint);
                    } else {
                        let expected = id.unwrap_or_else(|| {
                            model.keys().next_back().map_or(1, |max| max + 1)
                        });
                        prop_assert_eq!(result.unwrap().get(), expected);
                        model.insert(expected, name);
                    }
                }
                Op::Update(id, name) => {
                    let result = table.update(id, vec![Value::Null, name_value(name), tag_value(name)]);
                    if !model.contains_key(&id) {
                        prop_assert_eq!(result.unwrap_err().code(), ErrorCode::Misuse);
                    } else if name.is_some() && model.iter().any(|(other, n)| *other != id && *n == name) {
                        prop_assert_eq!(result.unwrap_err().code(), ErrorCode::Constraint);
                    } else {
                        result.unwrap();
                        model.insert(id, name);
                    }
                }
                Op::Delete(id) => {
                    let result = table.delete(id);
                    if model.remove(&id).is_some() {
                        result.unwrap();
                    } else {
                        prop_assert_eq!(result.unwrap_err().code(), ErrorCode::Misuse);
                    }
                }
            }

            assert_indexes_consistent(&table);
            let expected: BTreeMap<i64, Value> =
                model.iter().map(|(&id, &name)| (id, name_value(name))).collect();
            prop_assert_eq!(stored_names(&table), expected);
        }
    }
}
