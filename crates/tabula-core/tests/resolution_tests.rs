#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{library, library_descriptors};
use proptest::prelude::*;
use tabula_core::relations::FkPlacement;
use tabula_core::schema::ddl::create_statements;
use tabula_core::{
    Cardinality, Catalogue, ExError, ExErrorKind, FetchMode, MetadataRegistry, RawEntity,
    RelationGraph, SqlType,
};

#[test]
fn test_library_placement() {
    let (_, graph) = library();

    let publisher = graph.edge("Book", "publisher").unwrap();
    let catalogue = graph.edge("Publisher", "catalogue").unwrap();
    assert_eq!(publisher.inverse.as_deref(), Some("catalogue"));
    assert!(catalogue.owning);
    assert_eq!(
        catalogue.placement,
        FkPlacement::Target {
            column: "publisher_id".to_string()
        }
    );

    let readers = graph.edge("Book", "readers").unwrap();
    assert!(!readers.owning);
    assert_eq!(readers.join_table(), Some("book_person"));
    assert_eq!(readers.foreign_key(), "book_id");
}

#[test]
fn test_metadata_errors_convert_to_structured_errors() {
    let err = MetadataRegistry::resolve(&[RawEntity::new("Tag")]).unwrap_err();
    let ex: ExError = err.into();
    assert_eq!(ex.kind(), ExErrorKind::Metadata);
    assert_eq!(ex.code(), "ERR_METADATA");
    assert_eq!(ex.entity(), Some("Tag"));
}

#[test]
fn test_ddl_is_identical_across_runs() {
    let (registry, graph) = library();
    let first = create_statements(&Catalogue::build(&registry, &graph));
    let (registry, graph) = library();
    let second = create_statements(&Catalogue::build(&registry, &graph));
    assert_eq!(first, second);
}

fn cardinality() -> impl Strategy<Value = Cardinality> {
    prop_oneof![
        Just(Cardinality::OneToOne),
        Just(Cardinality::ManyToOne),
        Just(Cardinality::OneToMany),
        Just(Cardinality::ManyToMany),
    ]
}

/// Up to four entities with random relations among them
fn descriptor_sets() -> impl Strategy<Value = Vec<RawEntity>> {
    (1usize..5).prop_flat_map(|n| {
        prop::collection::vec(
            prop::collection::vec((0..n, cardinality(), any::<bool>()), 0..4),
            n,
        )
        .prop_map(move |relations| {
            relations
                .into_iter()
                .enumerate()
                .map(|(i, rels)| {
                    let mut entity = RawEntity::new(format!("Entity{}", i))
                        .id("id")
                        .field("label", SqlType::Text);
                    for (r, (target, card, eager)) in rels.into_iter().enumerate() {
                        let fetch = if eager { FetchMode::Eager } else { FetchMode::Lazy };
                        entity = entity.relation(
                            format!("rel{}", r),
                            format!("Entity{}", target),
                            card,
                            fetch,
                        );
                    }
                    entity
                })
                .collect()
        })
    })
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(raw in descriptor_sets()) {
        let first = MetadataRegistry::resolve(&raw)
            .and_then(|r| RelationGraph::resolve(&r).map(|g| (r, g)));
        let second = MetadataRegistry::resolve(&raw)
            .and_then(|r| RelationGraph::resolve(&r).map(|g| (r, g)));
        prop_assert_eq!(&first, &second);

        if let Ok((registry, graph)) = first {
            let a = Catalogue::build(&registry, &graph);
            let b = Catalogue::build(&registry, &graph);
            prop_assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        }
    }

    #[test]
    fn prop_to_many_edges_never_hold_the_key(raw in descriptor_sets()) {
        let registry = MetadataRegistry::resolve(&raw).unwrap();
        if let Ok(graph) = RelationGraph::resolve(&registry) {
            for edge in graph.edges() {
                let holds_key = matches!(edge.placement, FkPlacement::Source { .. });
                if matches!(edge.cardinality, Cardinality::OneToMany | Cardinality::ManyToMany) {
                    prop_assert!(!holds_key);
                }
            }
        }
    }
}

#[test]
fn test_library_descriptors_resolve() {
    assert_eq!(MetadataRegistry::resolve(&library_descriptors()).unwrap().len(), 3);
}
