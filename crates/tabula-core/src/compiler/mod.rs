//! Predicate compiler
//!
//! Turns a `Root` plus `Predicates` into parameterized SQL. Compilation is
//! pure: the same input always yields the same SQL and parameter order.
//!
//! ## FULL joins
//!
//! FULL joins are emulated so that SQLite builds without `FULL OUTER JOIN`
//! work. The first branch renders every FULL join as LEFT. Each FULL join
//! then adds one anti-join branch selecting the joined table's rows that
//! match nothing in the preceding chain; in that branch every preceding alias
//! is bound to a single all-NULL row. The preceding chain is itself the
//! emulated one, so rows contributed by earlier FULL joins count as matches
//! and joins associate to the left. Branches are combined with `UNION ALL`,
//! and the union is wrapped so ORDER BY and LIMIT apply to the whole result.

mod render;
mod scope;

use crate::criteria::{JoinMode, Predicates, Root};
use crate::errors::{Result, TabulaError};
use crate::metadata::MetadataRegistry;
use crate::relations::RelationGraph;
use crate::schema::quote;
use crate::types::SqlValue;
use render::{render_filter, Rendered};
use scope::{physical_columns, qualified, Scope};

/// SQL ready to execute, with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// Root entity type the rows map to
    pub entity: String,
}

pub struct QueryCompiler<'a> {
    registry: &'a MetadataRegistry,
    graph: &'a RelationGraph,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a MetadataRegistry, graph: &'a RelationGraph) -> Self {
        Self { registry, graph }
    }

    /// Compile a row-returning query
    ///
    /// The select list is the root's identifier, its persistent columns and
    /// the foreign-key columns stored on its table.
    ///
    /// # Errors
    ///
    /// Returns a QueryCompilation-kind error for an unknown entity, alias,
    /// relation or column, a duplicate alias, wrong operator arity, or
    /// invalid paging.
    pub fn compile(&self, root: &Root, predicates: &Predicates) -> Result<CompiledQuery> {
        let paging = paging_clause(predicates)?;
        let plan = self.plan(root, predicates)?;
        let (mut sql, params) = plan.select(true);
        sql.push_str(&paging);

        tracing::debug!(
            entity = %plan.scope.root.type_name,
            param_count = params.len(),
            "Compiled query"
        );

        Ok(CompiledQuery {
            sql,
            params,
            entity: plan.scope.root.type_name.clone(),
        })
    }

    /// Compile a count of distinct root entities matching the filter
    ///
    /// Sorting and paging are ignored.
    ///
    /// # Errors
    ///
    /// Same as `compile`, minus paging validation.
    pub fn compile_count(&self, root: &Root, predicates: &Predicates) -> Result<CompiledQuery> {
        let plan = self.plan(root, predicates)?;
        let (body, params) = plan.select(false);
        let sql = format!(
            "SELECT COUNT(DISTINCT {}) FROM ({}) AS \"__count\"",
            quote(&plan.scope.root.id_column().column),
            body
        );
        Ok(CompiledQuery {
            sql,
            params,
            entity: plan.scope.root.type_name.clone(),
        })
    }

    fn plan(&self, root: &Root, predicates: &Predicates) -> Result<Plan<'a>> {
        let scope = Scope::build(self.registry, self.graph, root)?;
        let filter = render_filter(&scope, self.graph, predicates.predicates())?;
        let sorts = predicates
            .sorts()
            .iter()
            .map(|s| {
                scope
                    .column(self.graph, &s.column)
                    .map(|expr| (expr, s.direction.sql()))
            })
            .collect::<Result<Vec<_>>>()?;
        let columns = physical_columns(scope.root, self.graph);
        Ok(Plan {
            scope,
            graph: self.graph,
            filter,
            sorts,
            columns,
        })
    }
}

fn paging_clause(predicates: &Predicates) -> Result<String> {
    if let Some(page) = predicates.page() {
        if page < 1 {
            return Err(TabulaError::InvalidPage { page });
        }
    }
    let Some(size) = predicates.page_size() else {
        return match predicates.page() {
            Some(page) => Err(TabulaError::MissingPageSize { page }),
            None => Ok(String::new()),
        };
    };
    if size <= 0 {
        return Err(TabulaError::InvalidPageSize { page_size: size });
    }
    let page = predicates.page().unwrap_or(1);
    let offset = (page - 1).checked_mul(size).ok_or(TabulaError::InvalidPage { page })?;
    Ok(format!(" LIMIT {} OFFSET {}", size, offset))
}

struct Plan<'a> {
    scope: Scope<'a>,
    graph: &'a RelationGraph,
    filter: Option<Rendered>,
    /// Qualified expression and direction keyword
    sorts: Vec<(String, &'static str)>,
    /// Physical root columns, in select order
    columns: Vec<String>,
}

impl Plan<'_> {
    fn select(&self, with_sorts: bool) -> (String, Vec<SqlValue>) {
        if self.scope.has_full_join() {
            self.select_union(with_sorts)
        } else {
            self.select_simple(with_sorts)
        }
    }

    fn projection(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| format!("{} AS {}", qualified(&self.scope.root_alias, c), quote(c)))
            .collect()
    }

    fn root_from(&self) -> String {
        format!(
            "{} AS {}",
            quote(&self.scope.root.table),
            quote(&self.scope.root_alias)
        )
    }

    fn select_simple(&self, with_sorts: bool) -> (String, Vec<SqlValue>) {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.projection().join(", "),
            self.root_from()
        );
        for step in &self.scope.steps {
            sql.push_str(&step.render());
        }
        let mut params = Vec::new();
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
            params.extend(filter.params.iter().cloned());
        }
        if with_sorts && !self.sorts.is_empty() {
            let keys: Vec<String> = self
                .sorts
                .iter()
                .map(|(expr, dir)| format!("{} {}", expr, dir))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }
        (sql, params)
    }

    /// `(SELECT NULL AS "c1", ...) AS "alias"`
    fn null_row(&self, entity: &crate::metadata::EntityDescriptor, alias: &str) -> String {
        let columns: Vec<String> = physical_columns(entity, self.graph)
            .iter()
            .map(|c| format!("NULL AS {}", quote(c)))
            .collect();
        format!("(SELECT {}) AS {}", columns.join(", "), quote(alias))
    }

    /// Root and `steps[..k]` bound to all-NULL rows, then `steps[k]`'s table
    fn unmatched_from(&self, k: usize) -> String {
        let steps = &self.scope.steps;
        let mut from = self.null_row(self.scope.root, &self.scope.root_alias);
        for prior in &steps[..k] {
            from.push_str(" CROSS JOIN ");
            from.push_str(&self.null_row(prior.target, &prior.alias));
        }
        from.push_str(&format!(
            " CROSS JOIN {} AS {}",
            quote(&steps[k].target.table),
            quote(&steps[k].alias)
        ));
        from
    }

    /// FROM clauses, each with an optional restriction, whose union is the
    /// joined rows of the root and `steps[..end]`
    ///
    /// The first source renders FULL as LEFT; each FULL step adds the rows
    /// of its table that match nothing before it.
    fn chain_sources(&self, end: usize) -> Vec<(String, Option<String>)> {
        let steps = &self.scope.steps[..end];
        let mut main = self.root_from();
        for step in steps {
            main.push_str(&step.render());
        }

        let mut sources = vec![(main, None)];
        for (j, step) in steps.iter().enumerate() {
            if step.mode != JoinMode::Full {
                continue;
            }
            let mut from = self.unmatched_from(j);
            for later in &steps[j + 1..] {
                from.push_str(&later.render());
            }
            sources.push((from, Some(self.no_match(j))));
        }
        sources
    }

    /// Condition on `steps[k]`'s alias: no row of the chain before it joins
    /// the row, counting rows earlier FULL joins contributed
    fn no_match(&self, k: usize) -> String {
        let step = &self.scope.steps[k];
        let tests: Vec<String> = self
            .chain_sources(k)
            .into_iter()
            .map(|(mut from, restriction)| {
                if let Some(link) = &step.link {
                    from.push_str(&format!(
                        " INNER JOIN {} AS {} ON {}",
                        quote(&link.table),
                        quote(&link.alias),
                        link.on
                    ));
                }
                let condition = match restriction {
                    Some(restriction) => format!("{} AND {}", restriction, step.on),
                    None => step.on.clone(),
                };
                format!("NOT EXISTS (SELECT 1 FROM {} WHERE {})", from, condition)
            })
            .collect();
        tests.join(" AND ")
    }

    fn select_union(&self, with_sorts: bool) -> (String, Vec<SqlValue>) {
        let mut projection = self.projection();
        if with_sorts {
            projection.extend(
                self.sorts
                    .iter()
                    .enumerate()
                    .map(|(i, (expr, _))| format!("{} AS \"__sort_{}\"", expr, i)),
            );
        }
        let projection = projection.join(", ");
        let mut params = Vec::new();

        let branches: Vec<String> = self
            .chain_sources(self.scope.steps.len())
            .into_iter()
            .map(|(from, restriction)| {
                let mut branch = format!("SELECT {} FROM {}", projection, from);
                match (restriction, &self.filter) {
                    (Some(restriction), Some(filter)) => {
                        branch.push_str(&format!(" WHERE {} AND ({})", restriction, filter.sql));
                    }
                    (Some(restriction), None) => {
                        branch.push_str(&format!(" WHERE {}", restriction));
                    }
                    (None, Some(filter)) => {
                        branch.push_str(&format!(" WHERE {}", filter.sql));
                    }
                    (None, None) => {}
                }
                if let Some(filter) = &self.filter {
                    params.extend(filter.params.iter().cloned());
                }
                branch
            })
            .collect();

        let outer: Vec<String> = self.columns.iter().map(|c| quote(c)).collect();
        let mut sql = format!(
            "SELECT {} FROM ({}) AS \"__full\"",
            outer.join(", "),
            branches.join(" UNION ALL ")
        );
        if with_sorts && !self.sorts.is_empty() {
            let keys: Vec<String> = self
                .sorts
                .iter()
                .enumerate()
                .map(|(i, (_, dir))| format!("\"__sort_{}\" {}", i, dir))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }
        (sql, params)
    }
}
