use thiserror::Error;

/// Result type alias using TabulaError
pub type Result<T> = std::result::Result<T, TabulaError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers can match on without
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    /// Malformed entity/relation descriptors (fatal at open)
    Metadata,
    /// Schema creation/update/rollback cannot complete (fatal at open)
    Migration,
    /// Invalid filter construction (per query)
    QueryCompilation,
    /// The underlying database call failed
    Execution,
    NotFound,
    Serialization,
    Configuration,
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Metadata => "ERR_METADATA",
            ExErrorKind::Migration => "ERR_MIGRATION",
            ExErrorKind::QueryCompilation => "ERR_QUERY_COMPILATION",
            ExErrorKind::Execution => "ERR_EXECUTION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification plus enough mapping context (entity, table,
/// column) to diagnose a failure without re-running it.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    table: Option<String>,
    column: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            table: None,
            column: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity type context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add column context
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(column) = &self.column {
            write!(f, " (column: {})", column)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for the mapping kernel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TabulaError {
    // ===== Metadata Errors =====
    #[error("Entity {entity} declares no identifier field")]
    MissingIdentifier { entity: String },

    #[error("Entity {entity} declares more than one identifier field: {fields:?}")]
    MultipleIdentifiers { entity: String, fields: Vec<String> },

    #[error("Identifier {field} of entity {entity} must be INTEGER, found {sql_type}")]
    NonNumericIdentifier {
        entity: String,
        field: String,
        sql_type: String,
    },

    #[error("Identifier {field} of entity {entity} cannot be transient")]
    TransientIdentifier { entity: String, field: String },

    #[error("Relation {entity}.{field} references unregistered type {target}")]
    UnknownRelationTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("Entity type {entity} is declared more than once")]
    DuplicateEntity { entity: String },

    #[error("Entities {first} and {second} both map to table {table}")]
    DuplicateTable {
        table: String,
        first: String,
        second: String,
    },

    #[error("Entity {entity} maps more than one field to column {column}")]
    DuplicateColumn { entity: String, column: String },

    #[error("Invalid name '{name}' for entity {entity}: {reason}")]
    InvalidName {
        entity: String,
        name: String,
        reason: String,
    },

    // ===== Migration Errors =====
    #[error("Destructive change on table {table}: {reason}")]
    DestructiveChange { table: String, reason: String },

    #[error("Column {table}.{column} changed type from {from} to {to}")]
    IncompatibleColumn {
        table: String,
        column: String,
        from: String,
        to: String,
    },

    #[error("No rollback snapshot available for schema version {version}")]
    NoRollbackSnapshot { version: i64 },

    #[error("No rollback snapshot matches the entity descriptors (target version {version})")]
    IncompatibleSnapshot { version: i64 },

    #[error("Rollback is not allowed by the configuration")]
    RollbackDisabled,

    #[error("Schema at version {version} differs from the entity descriptors; bump the version")]
    SchemaDrift { version: i64 },

    #[error("Schema catalogue checksum mismatch: expected {expected}, got {actual}")]
    CatalogueChecksumMismatch { expected: String, actual: String },

    // ===== Query Compilation Errors =====
    #[error("Page must be >= 1, got {page}")]
    InvalidPage { page: i64 },

    #[error("Page size must be > 0, got {page_size}")]
    InvalidPageSize { page_size: i64 },

    #[error("Page {page} requested without a page size")]
    MissingPageSize { page: i64 },

    #[error("Operator {op} on column {column} expects {expected} value(s), got {actual}")]
    WrongArity {
        op: String,
        column: String,
        expected: String,
        actual: usize,
    },

    #[error("Unknown join path {path}")]
    UnknownJoinPath { path: String },

    #[error("Unknown alias {alias}")]
    UnknownAlias { alias: String },

    #[error("Alias {alias} is bound more than once")]
    DuplicateAlias { alias: String },

    #[error("Alias {alias:?} must be non-empty and contain neither '.' nor '__'")]
    InvalidAlias { alias: String },

    #[error("Unknown column {column} on entity {entity}")]
    UnknownColumn { entity: String, column: String },

    #[error("Unknown entity type {entity}")]
    UnknownEntity { entity: String },

    // ===== Mapping Errors =====
    #[error("Relation {field} is not declared on entity {entity}")]
    UnknownRelation { entity: String, field: String },

    #[error("Field {field} of entity {entity} cannot hold {value_type}: {reason}")]
    FieldConversion {
        entity: String,
        field: String,
        value_type: String,
        reason: String,
    },

    #[error("Entity {entity} with id {id} not found")]
    EntityNotFound { entity: String, id: i64 },

    // ===== Generic Errors =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TabulaError {
    /// Classify this error in the canonical taxonomy
    pub fn kind(&self) -> ExErrorKind {
        match self {
            TabulaError::MissingIdentifier { .. }
            | TabulaError::MultipleIdentifiers { .. }
            | TabulaError::NonNumericIdentifier { .. }
            | TabulaError::TransientIdentifier { .. }
            | TabulaError::UnknownRelationTarget { .. }
            | TabulaError::DuplicateEntity { .. }
            | TabulaError::DuplicateTable { .. }
            | TabulaError::DuplicateColumn { .. }
            | TabulaError::InvalidName { .. } => ExErrorKind::Metadata,

            TabulaError::DestructiveChange { .. }
            | TabulaError::IncompatibleColumn { .. }
            | TabulaError::NoRollbackSnapshot { .. }
            | TabulaError::IncompatibleSnapshot { .. }
            | TabulaError::RollbackDisabled
            | TabulaError::SchemaDrift { .. }
            | TabulaError::CatalogueChecksumMismatch { .. } => ExErrorKind::Migration,

            TabulaError::InvalidPage { .. }
            | TabulaError::InvalidPageSize { .. }
            | TabulaError::MissingPageSize { .. }
            | TabulaError::WrongArity { .. }
            | TabulaError::UnknownJoinPath { .. }
            | TabulaError::UnknownAlias { .. }
            | TabulaError::DuplicateAlias { .. }
            | TabulaError::InvalidAlias { .. }
            | TabulaError::UnknownColumn { .. }
            | TabulaError::UnknownEntity { .. } => ExErrorKind::QueryCompilation,

            TabulaError::UnknownRelation { .. } => ExErrorKind::QueryCompilation,
            TabulaError::FieldConversion { .. } => ExErrorKind::Serialization,
            TabulaError::EntityNotFound { .. } => ExErrorKind::NotFound,
            TabulaError::Serialization { .. } => ExErrorKind::Serialization,
            TabulaError::Configuration { .. } => ExErrorKind::Configuration,
            TabulaError::Internal { .. } => ExErrorKind::Internal,
        }
    }
}

impl From<TabulaError> for ExError {
    fn from(err: TabulaError) -> Self {
        let base = ExError::new(err.kind()).with_message(err.to_string());
        match err {
            TabulaError::MissingIdentifier { entity }
            | TabulaError::MultipleIdentifiers { entity, .. }
            | TabulaError::DuplicateEntity { entity }
            | TabulaError::InvalidName { entity, .. }
            | TabulaError::UnknownEntity { entity } => base.with_entity(entity),

            TabulaError::NonNumericIdentifier { entity, field, .. }
            | TabulaError::TransientIdentifier { entity, field }
            | TabulaError::UnknownRelationTarget { entity, field, .. }
            | TabulaError::UnknownRelation { entity, field }
            | TabulaError::FieldConversion { entity, field, .. } => {
                base.with_entity(entity).with_column(field)
            }

            TabulaError::DuplicateColumn { entity, column }
            | TabulaError::UnknownColumn { entity, column } => {
                base.with_entity(entity).with_column(column)
            }

            TabulaError::DuplicateTable { table, first, .. } => {
                base.with_entity(first).with_table(table)
            }

            TabulaError::DestructiveChange { table, .. } => {
                base.with_op("migrate").with_table(table)
            }

            TabulaError::IncompatibleColumn { table, column, .. } => base
                .with_op("migrate")
                .with_table(table)
                .with_column(column),

            TabulaError::NoRollbackSnapshot { .. }
            | TabulaError::IncompatibleSnapshot { .. }
            | TabulaError::RollbackDisabled
            | TabulaError::SchemaDrift { .. }
            | TabulaError::CatalogueChecksumMismatch { .. } => base.with_op("migrate"),

            TabulaError::WrongArity { column, .. } => base.with_op("compile").with_column(column),

            TabulaError::InvalidPage { .. }
            | TabulaError::InvalidPageSize { .. }
            | TabulaError::MissingPageSize { .. }
            | TabulaError::UnknownJoinPath { .. }
            | TabulaError::UnknownAlias { .. }
            | TabulaError::DuplicateAlias { .. }
            | TabulaError::InvalidAlias { .. } => base.with_op("compile"),

            TabulaError::EntityNotFound { entity, .. } => base.with_entity(entity),

            TabulaError::Serialization { .. }
            | TabulaError::Configuration { .. }
            | TabulaError::Internal { .. } => base,
        }
    }
}
