//! Typed repository over the entity manager

use crate::entity_manager::EntityManager;
use crate::errors::Result;
use std::marker::PhantomData;
use tabula_core::{EntityType, Predicates, Root};

/// CRUD for one `EntityType`, selected at compile time
pub struct Repository<T: EntityType> {
    manager: EntityManager,
    _marker: PhantomData<fn() -> T>,
}

impl<T: EntityType> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self::new(self.manager.clone())
    }
}

impl<T: EntityType> Repository<T> {
    pub fn new(manager: EntityManager) -> Self {
        Self {
            manager,
            _marker: PhantomData,
        }
    }

    /// Store `value` and refresh it with the assigned identifiers
    ///
    /// # Errors
    ///
    /// Same as `EntityManager::store`, plus conversion failures.
    pub fn store(&self, value: &mut T) -> Result<i64> {
        let mut entity = value.to_entity();
        let id = self.manager.store(&mut entity)?;
        *value = T::from_entity(&entity)?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error if the query or the conversion fails.
    pub fn find_by_id(&self, id: i64) -> Result<Option<T>> {
        match self.manager.find_by_id(T::NAME, id)? {
            Some(entity) => Ok(Some(T::from_entity(&entity)?)),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns an error for an invalid filter, a failed query or a failed
    /// conversion.
    pub fn find<F>(&self, build: F) -> Result<Vec<T>>
    where
        F: FnOnce(&mut Root, &mut Predicates),
    {
        self.manager
            .find(T::NAME, build)?
            .iter()
            .map(|e| T::from_entity(e).map_err(Into::into))
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query or a conversion fails.
    pub fn find_all(&self) -> Result<Vec<T>> {
        self.find(|_, _| {})
    }

    /// # Errors
    ///
    /// Returns an error for an invalid filter or a failed query.
    pub fn count<F>(&self, build: F) -> Result<i64>
    where
        F: FnOnce(&mut Root, &mut Predicates),
    {
        self.manager.count(T::NAME, build)
    }

    /// # Errors
    ///
    /// Returns a NotFound error when no row has the identifier.
    pub fn delete(&self, id: i64) -> Result<()> {
        self.manager.delete(T::NAME, id)
    }
}
