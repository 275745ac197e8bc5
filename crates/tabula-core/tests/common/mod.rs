use tabula_core::{
    Cardinality, FetchMode, MetadataRegistry, RawEntity, RelationGraph, SqlType,
};

/// Person ↔ Book many-to-many, Book → Publisher many-to-one,
/// Publisher → Book one-to-many (paired)
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
pub fn library() -> (MetadataRegistry, RelationGraph) {
    let registry = MetadataRegistry::resolve(&library_descriptors()).unwrap();
    let graph = RelationGraph::resolve(&registry).unwrap();
    (registry, graph)
}
