use std::path::Path;
use tabula_core::{Cardinality, Entity, FetchMode, RawEntity, SqlType};
use tabula_store::{Database, DatabaseConfiguration};

/// Person ↔ Book many-to-many (EAGER from Person), Book → Publisher
/// many-to-one, Publisher → Book one-to-many (paired)
#[allow(dead_code)]
pub fn library_descriptors() -> Vec<RawEntity> {
    vec![
        RawEntity::new("Person")
            .id("id")
            .field("name", SqlType::Text)
            .field("age", SqlType::Integer)
            .relation("books", "Book", Cardinality::ManyToMany, FetchMode::Eager),
        RawEntity::new("Book")
            .id("id")
            .field("title", SqlType::Text)
            .field("price", SqlType::Real)
            .relation("publisher", "Publisher", Cardinality::ManyToOne, FetchMode::Lazy)
            .relation("readers", "Person", Cardinality::ManyToMany, FetchMode::Lazy),
        RawEntity::new("Publisher")
            .id("id")
            .field("name", SqlType::Text)
            .relation("catalogue", "Book", Cardinality::OneToMany, FetchMode::Lazy),
    ]
}

#[allow(dead_code)]
pub fn setup_test_db() -> Database {
    Database::open(DatabaseConfiguration::default(), &library_descriptors()).unwrap()
}

#[allow(dead_code)]
pub fn file_config(dir: &Path, version: i64) -> DatabaseConfiguration {
    let path = dir.join("tabula.db");
    DatabaseConfiguration::new(path.to_str().unwrap(), version)
}

#[allow(dead_code)]
pub fn book(title: &str, price: f64) -> Entity {
    Entity::new("Book").with("title", title).with("price", price)
}

#[allow(dead_code)]
pub fn person(name: &str, age: i64, books: Vec<Entity>) -> Entity {
    Entity::new("Person")
        .with("name", name)
        .with("age", age)
        .with_many("books", books)
}
