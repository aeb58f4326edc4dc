//! Relationship metadata and the per-instance prefetch cache.
//!
//! Relationships are defined as static metadata on each `Model`, letting the
//! link manager and deletion collector generate correct SQL without runtime
//! reflection.

use crate::field::OnDelete;
use crate::value::{hash_values, Value};
use std::collections::HashSet;
use std::sync::Mutex;

/// The type of relationship between two models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationshipKind {
    /// One-to-one.
    OneToOne,
    /// Many-to-one: many rows point at one target.
    #[default]
    ManyToOne,
    /// One-to-many: the reverse side of many-to-one.
    OneToMany,
    /// Many-to-many via a link table.
    ManyToMany,
}

/// Information about a link/join table for many-to-many relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTableInfo {
    /// The link table name (e.g., `"track_genres"`).
    pub table_name: &'static str,

    /// Column in the link table pointing to the local model (e.g., `"track_id"`).
    pub local_column: &'static str,

    /// Column in the link table pointing to the remote model (e.g., `"genre_id"`).
    pub remote_column: &'static str,
}

impl LinkTableInfo {
    /// Create a new link-table definition.
    #[must_use]
    pub const fn new(
        table_name: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            table_name,
            local_column,
            remote_column,
        }
    }
}

/// Metadata about a relationship between models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipInfo {
    /// Name of the relationship field.
    pub name: &'static str,

    /// The related model's table name.
    pub related_table: &'static str,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// Local foreign key column (for ManyToOne).
    pub local_key: Option<&'static str>,

    /// Remote foreign key column (for OneToMany).
    pub remote_key: Option<&'static str>,

    /// Link table for ManyToMany relationships.
    pub link_table: Option<LinkTableInfo>,

    /// Deletion policy for this edge (ManyToOne side).
    pub on_delete: Option<OnDelete>,
}

impl RelationshipInfo {
    /// Create a new relationship with required fields.
    #[must_use]
    pub const fn new(
        name: &'static str,
        related_table: &'static str,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            name,
            related_table,
            kind,
            local_key: None,
            remote_key: None,
            link_table: None,
            on_delete: None,
        }
    }

    /// Set the local foreign key column (ManyToOne).
    #[must_use]
    pub const fn local_key(mut self, key: &'static str) -> Self {
        self.local_key = Some(key);
        self
    }

    /// Set the remote foreign key column (OneToMany).
    #[must_use]
    pub const fn remote_key(mut self, key: &'static str) -> Self {
        self.remote_key = Some(key);
        self
    }

    /// Set the link table metadata (ManyToMany).
    #[must_use]
    pub const fn link_table(mut self, info: LinkTableInfo) -> Self {
        self.link_table = Some(info);
        self
    }

    /// Set the deletion policy for this edge.
    #[must_use]
    pub const fn on_delete(mut self, policy: OnDelete) -> Self {
        self.on_delete = Some(policy);
        self
    }
}

/// Cached target ids of a to-many relation on an in-memory instance.
///
/// Loaded lazily by query layers; every membership-changing operation on the
/// link manager invalidates the cache so stale target sets are never
/// observed. Identity is by value hash, so heterogeneous pk types are fine.
#[derive(Debug, Default)]
pub struct RelatedIds {
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: bool,
    ids: Vec<Value>,
    id_hashes: HashSet<u64>,
}

impl RelatedIds {
    /// Create an empty, unloaded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Has the relation been fetched into the cache?
    pub fn is_loaded(&self) -> bool {
        self.state.lock().expect("cache lock poisoned").loaded
    }

    /// Replace the cache contents with a freshly-fetched id set.
    pub fn set_loaded(&self, ids: Vec<Value>) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.id_hashes = ids.iter().map(|v| hash_values(std::slice::from_ref(v))).collect();
        state.ids = ids;
        state.loaded = true;
    }

    /// Get the cached ids, or `None` when not loaded.
    pub fn get(&self) -> Option<Vec<Value>> {
        let state = self.state.lock().expect("cache lock poisoned");
        state.loaded.then(|| state.ids.clone())
    }

    /// Is the given id in the cached set? `None` when not loaded.
    pub fn contains(&self, id: &Value) -> Option<bool> {
        let state = self.state.lock().expect("cache lock poisoned");
        state
            .loaded
            .then(|| state.id_hashes.contains(&hash_values(std::slice::from_ref(id))))
    }

    /// Drop the cached set; the next read must refetch.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.loaded = false;
        state.ids.clear();
        state.id_hashes.clear();
    }
}
