use crate::errors::{Result, TabulaError};
use crate::types::SqlValue;
use std::collections::BTreeMap;

/// State of one relation slot
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Related {
    /// Not fetched (LAZY, or beyond the fetch depth); store leaves it alone
    #[default]
    Unloaded,
    One(Option<Box<Entity>>),
    Many(Vec<Entity>),
}

impl Related {
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Related::Unloaded)
    }
}

/// A dynamic entity instance
///
/// `id` is `None` until the entity is stored. Fields hold scalar values keyed
/// by logical field name; relation slots are keyed by relation field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub entity_type: String,
    pub id: Option<i64>,
    pub fields: BTreeMap<String, SqlValue>,
    pub relations: BTreeMap<String, Related>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            fields: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Builder form of `set`
    pub fn with(mut self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn with_one(mut self, field: impl Into<String>, target: Option<Entity>) -> Self {
        self.set_one(field, target);
        self
    }

    pub fn with_many(mut self, field: impl Into<String>, targets: Vec<Entity>) -> Self {
        self.set_many(field, targets);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<SqlValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn set_one(&mut self, field: impl Into<String>, target: Option<Entity>) {
        self.relations
            .insert(field.into(), Related::One(target.map(Box::new)));
    }

    pub fn set_many(&mut self, field: impl Into<String>, targets: Vec<Entity>) {
        self.relations.insert(field.into(), Related::Many(targets));
    }

    pub fn get(&self, field: &str) -> Option<&SqlValue> {
        self.fields.get(field)
    }

    /// Like `get`, treating an absent field as an error
    ///
    /// # Errors
    ///
    /// Returns `FieldConversion` when the field is not set.
    pub fn require(&self, field: &str) -> Result<&SqlValue> {
        self.fields.get(field).ok_or_else(|| TabulaError::FieldConversion {
            entity: self.entity_type.clone(),
            field: field.to_string(),
            value_type: "missing".to_string(),
            reason: "field is not set".to_string(),
        })
    }

    pub fn relation(&self, field: &str) -> &Related {
        static UNLOADED: Related = Related::Unloaded;
        self.relations.get(field).unwrap_or(&UNLOADED)
    }

    /// Loaded to-one target, if any
    pub fn one(&self, field: &str) -> Option<&Entity> {
        match self.relation(field) {
            Related::One(Some(target)) => Some(target),
            _ => None,
        }
    }

    /// Loaded to-many targets; empty when unloaded
    pub fn many(&self, field: &str) -> &[Entity] {
        match self.relation(field) {
            Related::Many(targets) => targets,
            _ => &[],
        }
    }
}
