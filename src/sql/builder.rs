//! Statement model and rendering to parameterized SQL.
//! Statements are built unqualified; pre-hooks (see `hooks`) decide the table expression before rendering.

use crate::error::DataError;
use serde_json::Value;
use std::any::TypeId;

/// Quote identifier for PostgreSQL: embedded quotes are doubled.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Query,
    Create,
    Update,
    Delete,
}

impl StatementKind {
    pub const ALL: [StatementKind; 4] = [
        StatementKind::Query,
        StatementKind::Create,
        StatementKind::Update,
        StatementKind::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Query => "query",
            StatementKind::Create => "create",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
        }
    }
}

/// Rust type a statement operates on; used to look up its `EntityDescriptor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelRef {
    pub id: TypeId,
    pub name: &'static str,
}

impl ModelRef {
    pub fn of<T: 'static>() -> Self {
        ModelRef {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

#[derive(Clone, Debug)]
pub struct Statement {
    pub kind: StatementKind,
    pub model: Option<ModelRef>,
    /// Unqualified table name set by the caller.
    pub table: Option<String>,
    /// Final table expression. Once set, hooks leave the statement alone.
    pub table_expr: Option<String>,
    /// Select list for queries, RETURNING list otherwise. Empty selects `*` / returns nothing.
    pub columns: Vec<String>,
    pub filters: Vec<(String, Value)>,
    /// Fixed predicates with no parameters, e.g. `domain IS NOT NULL`.
    pub predicates: Vec<&'static str>,
    /// Insert values or update assignments.
    pub values: Vec<(String, Value)>,
    pub order_by: Option<String>,
    pub limit: Option<u32>,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Statement {
            kind,
            model: None,
            table: None,
            table_expr: None,
            columns: Vec::new(),
            filters: Vec::new(),
            predicates: Vec::new(),
            values: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn query() -> Self {
        Self::new(StatementKind::Query)
    }

    pub fn create() -> Self {
        Self::new(StatementKind::Create)
    }

    pub fn update() -> Self {
        Self::new(StatementKind::Update)
    }

    pub fn delete() -> Self {
        Self::new(StatementKind::Delete)
    }

    pub fn model<T: 'static>(mut self) -> Self {
        self.model = Some(ModelRef::of::<T>());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Custom table expression, used verbatim. Routing hooks skip such statements.
    pub fn table_expr(mut self, expr: impl Into<String>) -> Self {
        self.table_expr = Some(expr.into());
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn predicate(mut self, predicate: &'static str) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    fn target(&self) -> Result<String, DataError> {
        if let Some(expr) = &self.table_expr {
            return Ok(expr.clone());
        }
        let table = self.table.as_deref().ok_or(DataError::NoTable)?;
        // Already schema-qualified names are quoted part by part.
        Ok(table.split('.').map(quoted).collect::<Vec<_>>().join("."))
    }

    fn select_list(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn returning_clause(&self) -> String {
        if self.columns.is_empty() {
            String::new()
        } else {
            format!(" RETURNING {}", self.select_list())
        }
    }

    fn where_clause(&self, q: &mut QueryBuf) -> String {
        let mut parts: Vec<String> = Vec::new();
        for (col, val) in &self.filters {
            let n = q.push_param(val.clone());
            parts.push(format!("{} = ${}", quoted(col), n));
        }
        parts.extend(self.predicates.iter().map(|p| p.to_string()));
        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    /// Render to SQL with `$n` placeholders; params are bound in order.
    pub fn render(&self) -> Result<QueryBuf, DataError> {
        let mut q = QueryBuf::new();
        let target = self.target()?;
        q.sql = match self.kind {
            StatementKind::Query => {
                let where_clause = self.where_clause(&mut q);
                let order_clause = self
                    .order_by
                    .as_deref()
                    .map(|c| format!(" ORDER BY {}", quoted(c)))
                    .unwrap_or_default();
                let limit_clause = self.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
                format!(
                    "SELECT {} FROM {}{}{}{}",
                    self.select_list(),
                    target,
                    where_clause,
                    order_clause,
                    limit_clause
                )
            }
            StatementKind::Create => {
                let mut cols = Vec::with_capacity(self.values.len());
                let mut placeholders = Vec::with_capacity(self.values.len());
                for (col, val) in &self.values {
                    let n = q.push_param(val.clone());
                    cols.push(quoted(col));
                    placeholders.push(format!("${}", n));
                }
                format!(
                    "INSERT INTO {} ({}) VALUES ({}){}",
                    target,
                    cols.join(", "),
                    placeholders.join(", "),
                    self.returning_clause()
                )
            }
            StatementKind::Update => {
                if self.values.is_empty() {
                    return Err(DataError::EmptyUpdate);
                }
                let mut sets = Vec::with_capacity(self.values.len());
                for (col, val) in &self.values {
                    let n = q.push_param(val.clone());
                    sets.push(format!("{} = ${}", quoted(col), n));
                }
                let where_clause = self.where_clause(&mut q);
                format!(
                    "UPDATE {} SET {}{}{}",
                    target,
                    sets.join(", "),
                    where_clause,
                    self.returning_clause()
                )
            }
            StatementKind::Delete => {
                let where_clause = self.where_clause(&mut q);
                format!("DELETE FROM {}{}{}", target, where_clause, self.returning_clause())
            }
        };
        Ok(q)
    }
}
