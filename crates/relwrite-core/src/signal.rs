//! Lifecycle signal dispatch.
//!
//! Receivers are registered per (signal kind, table) pair. The write path
//! consults [`SignalHub::has_receivers`] before choosing its fast paths: a
//! bulk insert can only skip reading generated keys back, and a delete can
//! only skip fetching rows, when nothing is listening.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;

/// Points in the row lifecycle where receivers can attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Before a row is inserted.
    PreSave,
    /// After a row has been inserted.
    PostSave,
    /// Before a row is deleted.
    PreDelete,
    /// After a row has been deleted.
    PostDelete,
}

/// Payload passed to signal receivers.
#[derive(Debug)]
pub struct SignalEvent<'a> {
    /// Which lifecycle point fired.
    pub kind: SignalKind,
    /// Table label of the affected row.
    pub table: &'static str,
    /// Primary key value(s) of the affected row.
    pub pk: &'a [Value],
    /// The full row, when the operation fetched it.
    pub row: Option<&'a Row>,
}

type Receiver = Box<dyn Fn(&SignalEvent<'_>) -> Result<()> + Send + Sync>;

/// Runtime registry of lifecycle receivers.
///
/// A receiver returning `Err` aborts the surrounding operation; for
/// pre-signals this happens before any statement touches the affected row.
#[derive(Default)]
pub struct SignalHub {
    receivers: HashMap<(SignalKind, &'static str), Vec<Receiver>>,
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHub")
            .field("registrations", &self.receivers.len())
            .finish()
    }
}

impl SignalHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a receiver for a (kind, table) pair.
    pub fn connect(
        &mut self,
        kind: SignalKind,
        table: &'static str,
        receiver: impl Fn(&SignalEvent<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.receivers
            .entry((kind, table))
            .or_default()
            .push(Box::new(receiver));
    }

    /// Are any receivers attached for this (kind, table) pair?
    #[must_use]
    pub fn has_receivers(&self, kind: SignalKind, table: &'static str) -> bool {
        self.receivers
            .get(&(kind, table))
            .is_some_and(|list| !list.is_empty())
    }

    /// Are any receivers attached for the table under any of the given kinds?
    #[must_use]
    pub fn has_any_receivers(&self, kinds: &[SignalKind], table: &'static str) -> bool {
        kinds.iter().any(|kind| self.has_receivers(*kind, table))
    }

    /// Fire all receivers for the event, in registration order.
    #[allow(clippy::result_large_err)]
    pub fn send(&self, event: &SignalEvent<'_>) -> Result<()> {
        if let Some(list) = self.receivers.get(&(event.kind, event.table)) {
            tracing::trace!(
                kind = ?event.kind,
                table = event.table,
                receivers = list.len(),
                "dispatching signal"
            );
            for receiver in list {
                receiver(event)?;
            }
        }
        Ok(())
    }
}
