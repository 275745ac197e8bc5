//! Entity records
//!
//! `Entity` is the dynamic shape every query returns and every store call
//! accepts. Typed structs convert through `EntityType`.

pub mod entity;
pub mod entity_type;

pub use entity::{Entity, Related};
pub use entity_type::EntityType;
