//! Schema registry: table metadata and the relation-edge graph.
//!
//! The deletion collector walks foreign-key edges backwards (from referenced
//! table to referencing table), so the registry indexes edges by their
//! target. Edges carry an explicit [`OnDelete`] policy; a foreign key
//! declared without one defaults to `Cascade`.

use relwrite_core::{Error, FieldInfo, Model, OnDelete, Result, UniqueConstraintInfo};
use std::collections::{HashMap, HashSet};

/// Metadata for one registered table.
#[derive(Debug, Clone)]
pub struct TableMeta {
    /// Table name, also used as the model label in outcomes and errors.
    pub table: &'static str,
    /// Primary key column.
    pub pk_column: &'static str,
    /// All column metadata.
    pub fields: &'static [FieldInfo],
    /// Declared multi-column unique constraints.
    pub unique_constraints: &'static [UniqueConstraintInfo],
}

impl TableMeta {
    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.column_name).collect()
    }
}

/// A foreign-key edge between two registered tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationEdge {
    /// Referencing table.
    pub source_table: &'static str,
    /// Foreign key column on the referencing table.
    pub fk_column: &'static str,
    /// Whether the foreign key column is nullable.
    pub fk_nullable: bool,
    /// Referenced table.
    pub target_table: &'static str,
    /// Referenced column (normally the target's primary key).
    pub target_column: &'static str,
    /// What happens to referencing rows when the referenced row dies.
    pub on_delete: OnDelete,
}

/// Registry of tables and the relation edges between them.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<&'static str, TableMeta>,
    edges: Vec<RelationEdge>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, extracting its relation edges from field metadata.
    ///
    /// Rejects a `SetNull` policy on a non-nullable foreign key: the sweep
    /// it implies could never execute.
    #[allow(clippy::result_large_err)]
    pub fn register_model<M: Model>(&mut self) -> Result<()> {
        let pk_column = M::PRIMARY_KEY.first().copied().ok_or_else(|| {
            Error::config(format!("model '{}' declares no primary key", M::TABLE_NAME))
        })?;

        for field in M::fields() {
            let Some((target_table, target_column)) = field.fk_target() else {
                continue;
            };
            let on_delete = field.on_delete.unwrap_or_default();
            if on_delete == OnDelete::SetNull && !field.nullable {
                return Err(Error::config(format!(
                    "field '{}.{}' uses SET NULL but is not nullable",
                    M::TABLE_NAME,
                    field.name
                )));
            }
            self.edges.push(RelationEdge {
                source_table: M::TABLE_NAME,
                fk_column: field.column_name,
                fk_nullable: field.nullable,
                target_table,
                target_column,
                on_delete,
            });
        }

        self.tables.insert(
            M::TABLE_NAME,
            TableMeta {
                table: M::TABLE_NAME,
                pk_column,
                fields: M::fields(),
                unique_constraints: M::UNIQUE_CONSTRAINTS,
            },
        );
        Ok(())
    }

    /// Look up a registered table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(name)
    }

    /// Look up a registered table, or fail with a configuration error.
    #[allow(clippy::result_large_err)]
    pub fn require_table(&self, name: &str) -> Result<&TableMeta> {
        self.table(name)
            .ok_or_else(|| Error::config(format!("table '{name}' is not registered")))
    }

    /// All edges pointing into the given table, in registration order.
    ///
    /// Only edges whose source table is itself registered are returned;
    /// the collector cannot fetch rows it has no metadata for.
    pub fn edges_into(&self, table: &str) -> impl Iterator<Item = &RelationEdge> {
        self.edges
            .iter()
            .filter(move |e| e.target_table == table && self.tables.contains_key(e.source_table))
    }

    /// Does anything other than a `DoNothing` edge point into the table?
    #[must_use]
    pub fn has_active_edges_into(&self, table: &str) -> bool {
        self.edges_into(table)
            .any(|e| e.on_delete != OnDelete::DoNothing)
    }

    /// Order a set of tables children-first.
    ///
    /// For every edge source -> target with both endpoints in the set, the
    /// source (referencing table) comes before the target, so deleting in
    /// the returned order never leaves a dangling reference. Tables on a
    /// dependency cycle keep their relative input order.
    #[must_use]
    pub fn sorted_tables(&self, tables: &[&'static str]) -> Vec<&'static str> {
        let in_set: HashSet<&'static str> = tables.iter().copied().collect();

        // indegree[t] = number of distinct in-set tables referencing t.
        let mut indegree: HashMap<&'static str, usize> =
            tables.iter().map(|&t| (t, 0)).collect();
        let mut counted: HashSet<(&'static str, &'static str)> = HashSet::new();
        for edge in &self.edges {
            if edge.source_table == edge.target_table {
                continue;
            }
            if in_set.contains(edge.source_table)
                && in_set.contains(edge.target_table)
                && counted.insert((edge.source_table, edge.target_table))
            {
                *indegree.entry(edge.target_table).or_insert(0) += 1;
            }
        }

        let mut result = Vec::with_capacity(tables.len());
        let mut remaining: Vec<&'static str> = tables.to_vec();
        while !remaining.is_empty() {
            let Some(pos) = remaining
                .iter()
                .position(|t| indegree.get(t).copied().unwrap_or(0) == 0)
            else {
                // Cycle: flush what is left in input order.
                result.extend(remaining.drain(..));
                break;
            };
            let table = remaining.remove(pos);
            result.push(table);
            for edge in &self.edges {
                if edge.source_table == table
                    && edge.target_table != table
                    && counted.remove(&(edge.source_table, edge.target_table))
                {
                    if let Some(count) = indegree.get_mut(edge.target_table) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
        result
    }

    /// Detect a dependency cycle among the registered tables.
    ///
    /// Returns the tables along the first cycle found, for diagnostics.
    pub fn find_cycle(&self) -> Option<Vec<&'static str>> {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        let mut path = Vec::new();

        for &table in self.tables.keys() {
            if !visited.contains(table)
                && self.cycle_dfs(table, &mut visited, &mut stack, &mut path)
            {
                return Some(path);
            }
        }
        None
    }

    fn cycle_dfs(
        &self,
        table: &'static str,
        visited: &mut HashSet<&'static str>,
        stack: &mut HashSet<&'static str>,
        path: &mut Vec<&'static str>,
    ) -> bool {
        visited.insert(table);
        stack.insert(table);
        path.push(table);

        for edge in self.edges.iter().filter(|e| e.source_table == table) {
            let next = edge.target_table;
            if next == table || !self.tables.contains_key(next) {
                continue;
            }
            if !visited.contains(next) {
                if self.cycle_dfs(next, visited, stack, path) {
                    return true;
                }
            } else if stack.contains(next) {
                path.push(next);
                return true;
            }
        }

        stack.remove(table);
        path.pop();
        false
    }
}
