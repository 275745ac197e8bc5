#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::setup_test_db;
use proptest::prelude::*;
use tabula_core::{
    Cardinality, FetchMode, JoinMode, Predicate, Predicates, QueryCompiler, RawEntity, Root,
    SqlType, SqlValue,
};
use tabula_store::{Database, DatabaseConfiguration};

#[derive(Debug, Clone)]
struct Library {
    publishers: Vec<Option<String>>,
    /// Publisher index (reduced modulo the publisher count) and price
    books: Vec<(Option<usize>, i64)>,
}

fn library_strategy() -> impl Strategy<Value = Library> {
    (
        prop::collection::vec(prop::option::of("[a-c]"), 0..4),
        prop::collection::vec((prop::option::of(0usize..4), 0i64..20), 0..6),
    )
        .prop_map(|(publishers, books)| Library { publishers, books })
}

fn load(db: &Database, library: &Library) {
    let em = db.entity_manager();
    for name in &library.publishers {
        em.native_query(
            "INSERT INTO publisher (name) VALUES (?)",
            &[SqlValue::from(name.clone())],
        )
        .unwrap();
    }
    let count = library.publishers.len();
    for (publisher, price) in &library.books {
        let publisher_id = match (publisher, count) {
            (Some(i), n) if n > 0 => SqlValue::Integer((i % n) as i64 + 1),
            _ => SqlValue::Null,
        };
        em.native_query(
            "INSERT INTO book (title, price, publisher_id) VALUES ('t', ?, ?)",
            &[SqlValue::Integer(*price), publisher_id],
        )
        .unwrap();
    }
}

fn sorted_ids(rows: Vec<tabula_core::Row>) -> Vec<Option<i64>> {
    let mut ids: Vec<Option<i64>> = rows
        .iter()
        .map(|r| r.get_index(0).and_then(SqlValue::as_i64))
        .collect();
    ids.sort();
    ids
}

fn emulated(db: &Database, predicates: &Predicates) -> Vec<Option<i64>> {
    let mut root = Root::new("Book").with_alias("b");
    root.join("publisher", "p", JoinMode::Full);
    let compiled = QueryCompiler::new(db.registry(), db.graph())
        .compile(&root, predicates)
        .unwrap();
    sorted_ids(
        db.entity_manager()
            .native_query(&compiled.sql, &compiled.params)
            .unwrap(),
    )
}

fn native(db: &Database, filter: &str, params: &[SqlValue]) -> Vec<Option<i64>> {
    let sql = format!(
        "SELECT b.id FROM book AS b FULL OUTER JOIN publisher AS p ON b.publisher_id = p.id{}",
        filter
    );
    sorted_ids(db.entity_manager().native_query(&sql, params).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_full_join_matches_native(library in library_strategy()) {
        let db = setup_test_db();
        load(&db, &library);

        let expected = native(&db, "", &[]);
        prop_assert_eq!(emulated(&db, &Predicates::new()), expected);
    }

    #[test]
    fn prop_filtered_full_join_matches_native(
        library in library_strategy(),
        threshold in 0i64..20,
    ) {
        let db = setup_test_db();
        load(&db, &library);

        let mut predicates = Predicates::new();
        predicates.add(Predicate::or(vec![
            Predicate::is_null("p.name"),
            Predicate::gt("b.price", threshold),
        ]));

        let expected = native(
            &db,
            " WHERE (p.name IS NULL OR b.price > ?)",
            &[SqlValue::Integer(threshold)],
        );
        prop_assert_eq!(emulated(&db, &predicates), expected);
    }
}

/// Shelf -> Bay -> Room, both many-to-one
fn warehouse_db() -> Database {
    let entities = vec![
        RawEntity::new("Shelf")
            .id("id")
            .field("label", SqlType::Text)
            .relation("bay", "Bay", Cardinality::ManyToOne, FetchMode::Lazy),
        RawEntity::new("Bay")
            .id("id")
            .field("label", SqlType::Text)
            .relation("room", "Room", Cardinality::ManyToOne, FetchMode::Lazy),
        RawEntity::new("Room").id("id").field("label", SqlType::Text),
    ];
    Database::open(DatabaseConfiguration::default(), &entities).unwrap()
}

#[derive(Debug, Clone)]
struct Warehouse {
    rooms: usize,
    /// Room index per bay, reduced modulo the room count
    bays: Vec<Option<usize>>,
    /// Bay index per shelf, reduced modulo the bay count
    shelves: Vec<Option<usize>>,
}

fn warehouse_strategy() -> impl Strategy<Value = Warehouse> {
    (
        0usize..4,
        prop::collection::vec(prop::option::of(0usize..4), 0..5),
        prop::collection::vec(prop::option::of(0usize..5), 0..6),
    )
        .prop_map(|(rooms, bays, shelves)| Warehouse {
            rooms,
            bays,
            shelves,
        })
}

fn reference(index: Option<usize>, count: usize) -> SqlValue {
    match index {
        Some(i) if count > 0 => SqlValue::Integer((i % count) as i64 + 1),
        _ => SqlValue::Null,
    }
}

fn load_warehouse(db: &Database, warehouse: &Warehouse) {
    let em = db.entity_manager();
    for _ in 0..warehouse.rooms {
        em.native_query("INSERT INTO room (label) VALUES ('r')", &[])
            .unwrap();
    }
    for room in &warehouse.bays {
        em.native_query(
            "INSERT INTO bay (label, room_id) VALUES ('b', ?)",
            &[reference(*room, warehouse.rooms)],
        )
        .unwrap();
    }
    for bay in &warehouse.shelves {
        em.native_query(
            "INSERT INTO shelf (label, bay_id) VALUES ('s', ?)",
            &[reference(*bay, warehouse.bays.len())],
        )
        .unwrap();
    }
}

fn join_mode_strategy() -> impl Strategy<Value = JoinMode> {
    prop_oneof![
        Just(JoinMode::Inner),
        Just(JoinMode::Left),
        Just(JoinMode::Full)
    ]
}

fn native_keyword(mode: JoinMode) -> &'static str {
    match mode {
        JoinMode::Inner => "INNER JOIN",
        JoinMode::Left => "LEFT JOIN",
        JoinMode::Full => "FULL OUTER JOIN",
    }
}

fn emulated_chain(db: &Database, first: JoinMode, second: JoinMode) -> Vec<Option<i64>> {
    let mut root = Root::new("Shelf").with_alias("s");
    root.join("bay", "b", first);
    root.join("b.room", "r", second);
    let compiled = QueryCompiler::new(db.registry(), db.graph())
        .compile(&root, &Predicates::new())
        .unwrap();
    sorted_ids(
        db.entity_manager()
            .native_query(&compiled.sql, &compiled.params)
            .unwrap(),
    )
}

fn native_chain(db: &Database, first: JoinMode, second: JoinMode) -> Vec<Option<i64>> {
    let sql = format!(
        concat!(
            "SELECT s.id FROM shelf AS s {} bay AS b ON b.id = s.bay_id",
            " {} room AS r ON r.id = b.room_id"
        ),
        native_keyword(first),
        native_keyword(second)
    );
    sorted_ids(db.entity_manager().native_query(&sql, &[]).unwrap())
}

fn emulated_many_to_many(db: &Database) -> Vec<Option<i64>> {
    let mut root = Root::new("Person").with_alias("p");
    root.join("books", "k", JoinMode::Full);
    let compiled = QueryCompiler::new(db.registry(), db.graph())
        .compile(&root, &Predicates::new())
        .unwrap();
    sorted_ids(
        db.entity_manager()
            .native_query(&compiled.sql, &compiled.params)
            .unwrap(),
    )
}

fn native_many_to_many(db: &Database) -> Vec<Option<i64>> {
    let sql = "SELECT p.id FROM person AS p FULL OUTER JOIN (
                   SELECT l.person_id AS person_id, k.id AS book_id
                   FROM book_person AS l INNER JOIN book AS k ON k.id = l.book_id
               ) AS x ON x.person_id = p.id";
    sorted_ids(db.entity_manager().native_query(sql, &[]).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chained_joins_match_native(
        warehouse in warehouse_strategy(),
        first in join_mode_strategy(),
        second in join_mode_strategy(),
    ) {
        let db = warehouse_db();
        load_warehouse(&db, &warehouse);

        prop_assert_eq!(
            emulated_chain(&db, first, second),
            native_chain(&db, first, second)
        );
    }

    #[test]
    fn prop_many_to_many_full_join_matches_native(
        people in 0usize..4,
        books in 0usize..4,
        links in prop::collection::vec((0usize..4, 0usize..4), 0..8),
    ) {
        let db = setup_test_db();
        let em = db.entity_manager();
        for _ in 0..people {
            em.native_query("INSERT INTO person (name, age) VALUES ('p', 1)", &[]).unwrap();
        }
        for _ in 0..books {
            em.native_query("INSERT INTO book (title, price) VALUES ('t', 1.0)", &[]).unwrap();
        }
        if people > 0 && books > 0 {
            for (person, book) in links {
                em.native_query(
                    "INSERT OR IGNORE INTO book_person (person_id, book_id) VALUES (?, ?)",
                    &[
                        SqlValue::Integer((person % people) as i64 + 1),
                        SqlValue::Integer((book % books) as i64 + 1),
                    ],
                )
                .unwrap();
            }
        }

        prop_assert_eq!(emulated_many_to_many(&db), native_many_to_many(&db));
    }
}

#[test]
fn test_chained_full_joins_count_orphans_once() {
    let db = warehouse_db();
    // One room, one bay in it, no shelf pointing at the bay
    load_warehouse(
        &db,
        &Warehouse {
            rooms: 1,
            bays: vec![Some(0)],
            shelves: vec![],
        },
    );

    assert_eq!(
        emulated_chain(&db, JoinMode::Full, JoinMode::Full),
        vec![None]
    );
    assert_eq!(
        native_chain(&db, JoinMode::Full, JoinMode::Full),
        vec![None]
    );
}

#[test]
fn test_full_join_keeps_unmatched_rows_from_both_sides() {
    let db = setup_test_db();
    load(
        &db,
        &Library {
            publishers: vec![Some("a".to_string()), Some("b".to_string())],
            books: vec![(Some(0), 5), (None, 7)],
        },
    );

    // Book 1 with publisher 1, book 2 alone, publisher 2 alone
    assert_eq!(
        emulated(&db, &Predicates::new()),
        vec![None, Some(1), Some(2)]
    );
}
