use super::entity::Entity;
use crate::errors::Result;
use crate::metadata::RawEntity;

/// A Rust type persisted as an entity
///
/// Supplies the descriptor that would otherwise come from a scanner, and the
/// conversion to and from the dynamic `Entity` record.
pub trait EntityType: Sized {
    /// Type name used in the registry
    const NAME: &'static str;

    fn descriptor() -> RawEntity;

    fn to_entity(&self) -> Entity;

    /// # Errors
    ///
    /// Returns a Serialization-kind error when a field cannot be converted.
    fn from_entity(entity: &Entity) -> Result<Self>;
}
