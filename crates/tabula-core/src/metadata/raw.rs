//! Raw descriptor input
//!
//! This is the data contract with the scanner collaborator. It is plain data,
//! serde-deserializable, and validated only when resolved.

use serde::{Deserialize, Serialize};

/// Declared SQL type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
    /// Stored as INTEGER 0/1
    Boolean,
}

impl SqlType {
    /// Column type used in generated DDL
    pub fn ddl(&self) -> &'static str {
        match self {
            SqlType::Integer | SqlType::Boolean => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
            SqlType::Boolean => "BOOLEAN",
        }
    }
}

/// Relation cardinality, seen from the declaring entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl Cardinality {
    /// Whether the declaring side refers to at most one target
    pub fn is_to_one(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }

    /// Cardinality of the matching inverse declaration
    pub fn inverse(&self) -> Cardinality {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchMode {
    Eager,
    #[default]
    Lazy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    /// Explicit column name; derived from `name` when absent
    #[serde(default)]
    pub column: Option<String>,
    pub sql_type: SqlType,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub transient: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelation {
    pub field: String,
    /// Type name of the target entity
    pub target: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub fetch: FetchMode,
}

/// One candidate type as reported by the scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub type_name: String,
    /// Explicit table name; derived from `type_name` when absent
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub fields: Vec<RawField>,
    #[serde(default)]
    pub relations: Vec<RawRelation>,
}

impl RawEntity {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declare the numeric identifier field
    pub fn id(mut self, name: impl Into<String>) -> Self {
        self.fields.push(RawField {
            name: name.into(),
            column: None,
            sql_type: SqlType::Integer,
            id: true,
            transient: false,
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.fields.push(RawField {
            name: name.into(),
            column: None,
            sql_type,
            id: false,
            transient: false,
        });
        self
    }

    /// Declare a field with an explicit column name
    pub fn column(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        sql_type: SqlType,
    ) -> Self {
        self.fields.push(RawField {
            name: name.into(),
            column: Some(column.into()),
            sql_type,
            id: false,
            transient: false,
        });
        self
    }

    pub fn transient(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.fields.push(RawField {
            name: name.into(),
            column: None,
            sql_type,
            id: false,
            transient: true,
        });
        self
    }

    pub fn relation(
        mut self,
        field: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
        fetch: FetchMode,
    ) -> Self {
        self.relations.push(RawRelation {
            field: field.into(),
            target: target.into(),
            cardinality,
            fetch,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_fields_in_order() {
        let raw = RawEntity::new("Person")
            .id("id")
            .field("name", SqlType::Text)
            .transient("nickname", SqlType::Text);

        let names: Vec<&str> = raw.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "nickname"]);
        assert!(raw.fields[0].id);
        assert!(raw.fields[2].transient);
    }

    #[test]
    fn test_json_contract() {
        let json = r#"{
            "type_name": "Person",
            "fields": [
                {"name": "id", "sql_type": "INTEGER", "id": true},
                {"name": "fullName", "column": "full_name", "sql_type": "TEXT"}
            ],
            "relations": [
                {"field": "books", "target": "Book", "cardinality": "MANY_TO_MANY", "fetch": "EAGER"}
            ]
        }"#;
        let raw: RawEntity = serde_json::from_str(json).unwrap();

        assert_eq!(raw.table, None);
        assert_eq!(raw.fields[1].column.as_deref(), Some("full_name"));
        assert_eq!(raw.relations[0].cardinality, Cardinality::ManyToMany);
        assert_eq!(raw.relations[0].fetch, FetchMode::Eager);
    }

    #[test]
    fn test_fetch_defaults_to_lazy() {
        let json = r#"{"field": "owner", "target": "Person", "cardinality": "MANY_TO_ONE"}"#;
        let rel: RawRelation = serde_json::from_str(json).unwrap();
        assert_eq!(rel.fetch, FetchMode::Lazy);
    }

    #[test]
    fn test_inverse_cardinality() {
        assert_eq!(Cardinality::ManyToOne.inverse(), Cardinality::OneToMany);
        assert_eq!(Cardinality::ManyToMany.inverse(), Cardinality::ManyToMany);
        assert!(Cardinality::OneToOne.is_to_one());
        assert!(!Cardinality::OneToMany.is_to_one());
    }
}
