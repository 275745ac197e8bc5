/// Alias given to the root entity when none is chosen
pub const DEFAULT_ROOT_ALIAS: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    Inner,
    Left,
    /// Emulated; SQLite builds without native FULL JOIN are supported
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// `"alias.field"`, or `"field"` relative to the root alias
    pub path: String,
    pub alias: String,
    pub mode: JoinMode,
}

/// Root entity of a query plus the joins hanging off it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    entity: String,
    alias: String,
    joins: Vec<Join>,
}

impl Root {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            alias: DEFAULT_ROOT_ALIAS.to_string(),
            joins: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Join a relation of an already-bound alias; joins render in call order
    pub fn join(
        &mut self,
        path: impl Into<String>,
        alias: impl Into<String>,
        mode: JoinMode,
    ) -> &mut Self {
        self.joins.push(Join {
            path: path.into(),
            alias: alias.into(),
            mode,
        });
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }
}
