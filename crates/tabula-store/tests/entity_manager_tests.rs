#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{book, library_descriptors, person, setup_test_db};
use tabula_core::{
    Cardinality, Entity, ExErrorKind, FetchMode, JoinMode, Predicate, RawEntity, Related,
    SortDirection, SqlType, SqlValue,
};
use tabula_store::{Database, DatabaseConfiguration};

fn count_rows(db: &Database, table: &str) -> i64 {
    db.entity_manager()
        .native_query(&format!("SELECT COUNT(*) AS n FROM \"{}\"", table), &[])
        .unwrap()[0]
        .get("n")
        .and_then(SqlValue::as_i64)
        .unwrap()
}

#[test]
fn test_store_assigns_ids_and_round_trips() {
    let db = setup_test_db();
    let em = db.entity_manager();

    let mut john = person("john", 40, vec![book("Dune", 9.5), book("Emma", 7.0)]);
    let id = em.store(&mut john).unwrap();

    assert_eq!(john.id, Some(id));
    assert!(john.many("books").iter().all(|b| b.id.is_some()));

    let loaded = em.find_by_id("Person", id).unwrap().unwrap();
    assert_eq!(loaded, john);
}

#[test]
fn test_find_by_name_returns_one_person_with_both_books() {
    let db = setup_test_db();
    let em = db.entity_manager();
    em.store(&mut person("john", 40, vec![book("Dune", 9.5), book("Emma", 7.0)]))
        .unwrap();
    em.store(&mut person("mary", 31, vec![book("Ulysses", 12.0)]))
        .unwrap();

    let found = em
        .find("Person", |root, p| {
            root.join("books", "b", JoinMode::Inner);
            p.add(Predicate::eq("name", "john"));
        })
        .unwrap();

    assert_eq!(found.len(), 1);
    let titles: Vec<&str> = found[0]
        .many("books")
        .iter()
        .map(|b| b.get("title").and_then(SqlValue::as_str).unwrap())
        .collect();
    assert_eq!(titles, vec!["Dune", "Emma"]);
}

#[test]
fn test_update_existing_entity() {
    let db = setup_test_db();
    let em = db.entity_manager();
    let mut john = person("john", 40, vec![book("Dune", 9.5)]);
    let id = em.store(&mut john).unwrap();

    john.set("age", 41);
    john.set_many("books", vec![book("Emma", 7.0)]);
    assert_eq!(em.store(&mut john).unwrap(), id);

    let loaded = em.find_by_id("Person", id).unwrap().unwrap();
    assert_eq!(loaded.get("age"), Some(&SqlValue::Integer(41)));
    assert_eq!(loaded.many("books").len(), 1);
    assert_eq!(count_rows(&db, "book"), 2);
    assert_eq!(count_rows(&db, "book_person"), 1);
}

#[test]
fn test_lazy_relation_fetched_on_demand() {
    let db = setup_test_db();
    let em = db.entity_manager();
    let mut dune = book("Dune", 9.5).with_one(
        "publisher",
        Some(Entity::new("Publisher").with("name", "Chilton")),
    );
    let book_id = em.store(&mut dune).unwrap();
    let publisher_id = dune.one("publisher").unwrap().id.unwrap();

    let loaded = em.find_by_id("Book", book_id).unwrap().unwrap();
    assert_eq!(loaded.relation("publisher"), &Related::Unloaded);

    let Related::One(Some(publisher)) = em.fetch_relation("Book", book_id, "publisher").unwrap()
    else {
        panic!("publisher not loaded");
    };
    assert_eq!(publisher.id, Some(publisher_id));

    let catalogue = em.fetch_relation("Publisher", publisher_id, "catalogue").unwrap();
    assert!(matches!(catalogue, Related::Many(ref books) if books.len() == 1));
}

#[test]
fn test_one_to_many_store_sets_foreign_key() {
    let db = setup_test_db();
    let em = db.entity_manager();
    let mut publisher = Entity::new("Publisher")
        .with("name", "Chilton")
        .with_many("catalogue", vec![book("Dune", 9.5), book("Emma", 7.0)]);
    let id = em.store(&mut publisher).unwrap();

    let books = em
        .find("Book", |_, p| {
            p.add(Predicate::eq("publisher_id", id));
        })
        .unwrap();
    assert_eq!(books.len(), 2);

    // Dropping a book from the slot detaches it
    publisher.set_many("catalogue", vec![publisher.many("catalogue")[0].clone()]);
    em.store(&mut publisher).unwrap();
    assert_eq!(
        em.count("Book", |_, p| {
            p.add(Predicate::is_null("publisher_id"));
        })
        .unwrap(),
        1
    );
}

#[test]
fn test_failed_cascade_leaves_no_rows() {
    let db = setup_test_db();
    let em = db.entity_manager();
    let missing = book("Ghost", 1.0).with_id(999);
    let mut john = person("john", 40, vec![book("Dune", 9.5), missing]);

    let err = em.store(&mut john).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(count_rows(&db, "person"), 0);
    assert_eq!(count_rows(&db, "book"), 0);
    assert_eq!(count_rows(&db, "book_person"), 0);
}

#[test]
fn test_delete_cascades_to_owned_dependents() {
    let db = setup_test_db();
    let em = db.entity_manager();
    let mut publisher = Entity::new("Publisher")
        .with("name", "Chilton")
        .with_many("catalogue", vec![book("Dune", 9.5)]);
    let publisher_id = em.store(&mut publisher).unwrap();
    let book_id = publisher.many("catalogue")[0].id.unwrap();

    let mut john = person("john", 40, vec![publisher.many("catalogue")[0].clone()]);
    let john_id = em.store(&mut john).unwrap();
    assert_eq!(count_rows(&db, "book_person"), 1);

    em.delete("Publisher", publisher_id).unwrap();
    assert!(em.find_by_id("Book", book_id).unwrap().is_none());
    assert_eq!(count_rows(&db, "book_person"), 0);
    assert!(em.find_by_id("Person", john_id).unwrap().is_some());
}

#[test]
fn test_delete_keeps_many_to_one_target() {
    let db = setup_test_db();
    let em = db.entity_manager();
    let mut dune = book("Dune", 9.5).with_one(
        "publisher",
        Some(Entity::new("Publisher").with("name", "Chilton")),
    );
    let book_id = em.store(&mut dune).unwrap();

    em.delete("Book", book_id).unwrap();
    assert_eq!(count_rows(&db, "publisher"), 1);

    let err = em.delete("Book", book_id).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_sort_paging_and_count() {
    let db = setup_test_db();
    let em = db.entity_manager();
    for (name, age) in [("ann", 30), ("bob", 25), ("cid", 30), ("dee", 41)] {
        em.store(&mut person(name, age, vec![])).unwrap();
    }

    let page = em
        .find("Person", |_, p| {
            p.sort(SortDirection::Desc, ["age"])
                .sort(SortDirection::Asc, ["name"])
                .set_page(2)
                .set_page_size(2);
        })
        .unwrap();
    let names: Vec<&str> = page
        .iter()
        .map(|e| e.get("name").and_then(SqlValue::as_str).unwrap())
        .collect();
    assert_eq!(names, vec!["cid", "bob"]);

    let over_thirty = em
        .count("Person", |_, p| {
            p.add(Predicate::ge("age", 30));
        })
        .unwrap();
    assert_eq!(over_thirty, 3);
}

#[test]
fn test_invalid_filter_is_compilation_error() {
    let db = setup_test_db();
    let err = db
        .entity_manager()
        .find("Person", |_, p| {
            p.add(Predicate::in_list("age", Vec::<i64>::new()));
        })
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::QueryCompilation);

    let err = db
        .entity_manager()
        .find("Person", |_, p| {
            p.set_page(0).set_page_size(10);
        })
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::QueryCompilation);
}

#[test]
fn test_native_queries() {
    let db = setup_test_db();
    let em = db.entity_manager();
    em.store(&mut person("john", 40, vec![])).unwrap();

    let rows = em
        .native_query("SELECT name, age FROM person WHERE age > ?", &[SqlValue::Integer(18)])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].column_names().collect::<Vec<_>>(), vec!["name", "age"]);

    let names = em
        .native_query_map("SELECT name FROM person", &[], |row| {
            Ok(row.get("name").and_then(SqlValue::as_str).unwrap_or_default().to_uppercase())
        })
        .unwrap();
    assert_eq!(names, vec!["JOHN".to_string()]);

    let err = em.native_query("SELECT * FROM nowhere", &[]).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Execution);
}

fn mutual_eager() -> Vec<RawEntity> {
    let mut entities = library_descriptors();
    entities[1].relations[1].fetch = FetchMode::Eager;
    entities
}

fn depth_of(entity: &Entity, field_a: &str, field_b: &str) -> usize {
    match entity.relation(field_a) {
        Related::Many(targets) => targets.first().map_or(1, |t| 1 + depth_of(t, field_b, field_a)),
        _ => 0,
    }
}

#[test]
fn test_mutual_eager_relations_stop_at_fetch_depth() {
    for depth in [1usize, 2, 3] {
        let config = DatabaseConfiguration::default().with_fetch_depth(depth);
        let db = Database::open(config, &mutual_eager()).unwrap();
        let em = db.entity_manager();
        let id = em.store(&mut person("john", 40, vec![book("Dune", 9.5)])).unwrap();

        let loaded = em.find_by_id("Person", id).unwrap().unwrap();
        assert_eq!(depth_of(&loaded, "books", "readers"), depth);
    }
}

#[test]
fn test_one_to_one_owning_side() {
    let entities = vec![
        RawEntity::new("User")
            .id("id")
            .field("login", SqlType::Text)
            .relation("profile", "Profile", Cardinality::OneToOne, FetchMode::Eager),
        RawEntity::new("Profile")
            .id("id")
            .field("bio", SqlType::Text)
            .relation("user", "User", Cardinality::OneToOne, FetchMode::Lazy),
    ];
    let db = Database::open(DatabaseConfiguration::default(), &entities).unwrap();
    let em = db.entity_manager();

    let mut user = Entity::new("User")
        .with("login", "jdoe")
        .with_one("profile", Some(Entity::new("Profile").with("bio", "hi")));
    let id = em.store(&mut user).unwrap();
    assert_eq!(em.find_by_id("User", id).unwrap().unwrap(), user);

    let profile_id = user.one("profile").unwrap().id.unwrap();
    let Related::One(Some(owner)) = em.fetch_relation("Profile", profile_id, "user").unwrap() else {
        panic!("owner not loaded");
    };
    assert_eq!(owner.id, Some(id));

    em.delete("User", id).unwrap();
    assert!(em.find_by_id("Profile", profile_id).unwrap().is_none());
}
