//! Conflict resolution for bulk inserts.
//!
//! An insert can either skip rows that hit a uniqueness violation or turn
//! the violation into an update of named fields (upsert). The mode is
//! validated against the model's metadata and the backend's capabilities
//! before any SQL is generated; violations surface as configuration or
//! capability errors with nothing sent to the database.

use relwrite_core::{BackendFeatures, Dialect, Error, Model, Result};

/// What to do when an inserted row violates a unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnConflict {
    /// Skip conflicting rows; the statement reports only the rows actually
    /// inserted.
    Ignore,

    /// Update the named fields of the conflicting row in place.
    Update {
        /// Fields to overwrite on conflict. Must be concrete non-relation,
        /// non-primary-key fields.
        update_fields: Vec<&'static str>,
        /// Fields identifying the unique constraint to target. Required on
        /// backends whose upsert form takes an explicit conflict target.
        unique_fields: Vec<&'static str>,
    },
}

/// Rendered conflict handling, spliced into the INSERT statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictClause {
    /// Statement keyword: `INSERT` or the MySQL `INSERT IGNORE` form.
    pub insert_keyword: &'static str,
    /// Clause appended after the VALUES list (empty when none).
    pub suffix: String,
}

impl ConflictClause {
    /// Plain insert with no conflict handling.
    #[must_use]
    pub fn none() -> Self {
        Self {
            insert_keyword: "INSERT",
            suffix: String::new(),
        }
    }

    /// Skip-on-conflict clause for the given dialect.
    ///
    /// Also used directly for link-table inserts, which have no model type
    /// to resolve fields through.
    #[must_use]
    pub fn ignore(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres | Dialect::Sqlite => Self {
                insert_keyword: "INSERT",
                suffix: " ON CONFLICT DO NOTHING".to_string(),
            },
            Dialect::Mysql => Self {
                insert_keyword: "INSERT IGNORE",
                suffix: String::new(),
            },
        }
    }
}

impl OnConflict {
    /// Validate this mode against the model's metadata and the backend.
    ///
    /// Configuration problems (bad field lists) raise `Error::Config`;
    /// missing backend capabilities raise `Error::Unsupported` naming the
    /// feature. Called before any statement is built.
    #[allow(clippy::result_large_err)]
    pub fn validate<M: Model>(&self, features: &BackendFeatures) -> Result<()> {
        match self {
            OnConflict::Ignore => {
                if !features.supports_ignore_conflicts {
                    return Err(Error::unsupported(
                        "ignore_conflicts",
                        "this backend cannot skip conflicting rows",
                    ));
                }
                Ok(())
            }
            OnConflict::Update {
                update_fields,
                unique_fields,
            } => {
                if !features.supports_update_conflicts {
                    return Err(Error::unsupported(
                        "update_conflicts",
                        "this backend cannot update conflicting rows",
                    ));
                }
                if update_fields.is_empty() {
                    return Err(Error::config(
                        "update_conflicts requires a non-empty update_fields list",
                    ));
                }
                for name in update_fields {
                    let field = M::field(name).ok_or_else(|| {
                        Error::config(format!("unknown field '{name}' in update_fields"))
                    })?;
                    if field.primary_key {
                        return Err(Error::config(format!(
                            "primary key field '{name}' cannot be an update_conflicts target"
                        )));
                    }
                    if field.is_relation() {
                        return Err(Error::config(format!(
                            "relation field '{name}' cannot be an update_conflicts target"
                        )));
                    }
                }

                if features.supports_update_conflicts_with_target {
                    self.validate_unique_target::<M>(unique_fields)
                } else if unique_fields.is_empty() {
                    Ok(())
                } else {
                    Err(Error::unsupported(
                        "update_conflicts_with_target",
                        "this backend cannot target a specific unique constraint",
                    ))
                }
            }
        }
    }

    #[allow(clippy::result_large_err)]
    fn validate_unique_target<M: Model>(&self, unique_fields: &[&'static str]) -> Result<()> {
        if unique_fields.is_empty() {
            return Err(Error::config(
                "unique_fields identifying the conflict target are required on this backend",
            ));
        }
        for name in unique_fields {
            let field = M::field(name)
                .ok_or_else(|| Error::config(format!("unknown field '{name}' in unique_fields")))?;
            if field.is_relation() {
                return Err(Error::config(format!(
                    "relation field '{name}' cannot identify a unique constraint"
                )));
            }
        }

        // The target must resolve to an actual uniqueness guarantee: the
        // primary key, a single unique column, or a declared constraint.
        let matches_pk = unique_fields.len() == M::PRIMARY_KEY.len()
            && unique_fields.iter().all(|f| M::PRIMARY_KEY.contains(f));
        if matches_pk {
            return Ok(());
        }

        if unique_fields.len() == 1 {
            if let Some(field) = M::field(unique_fields[0]) {
                if field.unique {
                    return Ok(());
                }
            }
        }

        match M::UNIQUE_CONSTRAINTS
            .iter()
            .find(|constraint| constraint.covers(unique_fields))
        {
            Some(constraint) if constraint.condition.is_some() => Err(Error::config(
                "a partial unique constraint cannot be an upsert conflict target",
            )),
            Some(_) => Ok(()),
            None => Err(Error::config(format!(
                "unique_fields [{}] do not match a unique constraint on '{}'",
                unique_fields.join(", "),
                M::TABLE_NAME
            ))),
        }
    }

    /// Render the clause for the given dialect.
    ///
    /// Assumes [`validate`](Self::validate) has passed; field names resolve
    /// to column names through the model's metadata.
    #[must_use]
    pub fn clause<M: Model>(&self, dialect: Dialect) -> ConflictClause {
        match self {
            OnConflict::Ignore => ConflictClause::ignore(dialect),
            OnConflict::Update {
                update_fields,
                unique_fields,
            } => {
                let column_of =
                    |name: &'static str| M::field(name).map_or(name, |f| f.column_name);
                match dialect {
                    Dialect::Postgres | Dialect::Sqlite => {
                        let target: Vec<String> = unique_fields
                            .iter()
                            .map(|&f| dialect.quote_identifier(column_of(f)))
                            .collect();
                        let assignments: Vec<String> = update_fields
                            .iter()
                            .map(|&f| {
                                let column = dialect.quote_identifier(column_of(f));
                                format!("{column} = EXCLUDED.{column}")
                            })
                            .collect();
                        ConflictClause {
                            insert_keyword: "INSERT",
                            suffix: format!(
                                " ON CONFLICT ({}) DO UPDATE SET {}",
                                target.join(", "),
                                assignments.join(", ")
                            ),
                        }
                    }
                    Dialect::Mysql => {
                        let assignments: Vec<String> = update_fields
                            .iter()
                            .map(|&f| {
                                let column = dialect.quote_identifier(column_of(f));
                                format!("{column} = VALUES({column})")
                            })
                            .collect();
                        ConflictClause {
                            insert_keyword: "INSERT",
                            suffix: format!(" ON DUPLICATE KEY UPDATE {}", assignments.join(", ")),
                        }
                    }
                }
            }
        }
    }
}
