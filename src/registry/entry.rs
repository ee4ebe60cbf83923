//! Subscription entity and per-connection entry types
//!
//! This module defines the subscription stored in the registry and the
//! per-connection entry that groups subscriptions under one connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;

use crate::connection::Connection;
use crate::payload::UpdatePayload;
use crate::query::Document;

/// Delivery callback invoked with each matching update
pub type DeliverFn = Arc<dyn Fn(UpdatePayload) + Send + Sync>;

/// Build a deliverer that forwards payloads into an unbounded channel
///
/// Payloads sent after the receiver is dropped are silently discarded.
pub fn channel_deliverer(tx: UnboundedSender<UpdatePayload>) -> DeliverFn {
    Arc::new(move |payload| {
        let _ = tx.send(payload);
    })
}

/// A subscription candidate, and after admission the stored entity
///
/// Callers fill the public fields and pass the candidate to
/// [`SubscriptionRegistry::add_subscription`](super::SubscriptionRegistry::add_subscription).
/// Admission validates the candidate exhaustively, so `connection` and
/// `deliver` stay optional here; both are guaranteed present on every
/// registered subscription. The parsed `document` and extracted `fields`
/// are populated by admission and readable through accessors.
pub struct Subscription {
    /// Client-chosen subscription ID, unique per connection
    pub id: String,

    /// Raw query text
    pub query: String,

    /// Variable values supplied with the query
    pub variables: HashMap<String, serde_json::Value>,

    /// Which operation in the document to run, if the client named one
    pub operation_name: Option<String>,

    /// The connection this subscription belongs to
    pub connection: Option<Arc<dyn Connection>>,

    /// Callback that pushes updates to the subscriber
    pub deliver: Option<DeliverFn>,

    /// Parsed document, populated by admission
    document: Option<Document>,

    /// Extracted top-level field names, populated by admission
    fields: Vec<String>,
}

impl Subscription {
    /// Create a candidate with the given ID and query text
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            variables: HashMap::new(),
            operation_name: None,
            connection: None,
            deliver: None,
            document: None,
            fields: Vec::new(),
        }
    }

    /// Set the variable values
    pub fn variables(mut self, variables: HashMap<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Set the operation name
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Attach the owning connection
    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Attach the delivery callback
    pub fn deliver(mut self, deliver: DeliverFn) -> Self {
        self.deliver = Some(deliver);
        self
    }

    /// The parsed document, present once admitted
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// The extracted top-level field names, empty until admitted
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether this subscription selects the given top-level field
    ///
    /// Always false before admission populates the document and fields.
    pub fn matches_field(&self, field: &str) -> bool {
        self.document.is_some() && self.fields.iter().any(|f| f == field)
    }

    /// Store the admission results
    pub(super) fn admit(&mut self, document: Document, fields: Vec<String>) {
        self.document = Some(document);
        self.fields = fields;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("operation_name", &self.operation_name)
            .field("fields", &self.fields)
            .field("admitted", &self.document.is_some())
            .finish()
    }
}

/// Per-connection entry in the registry's outer map
///
/// The inner mutex serializes subscription admission and removal for one
/// connection. `retired` marks an entry that has been removed from the
/// outer map; an admission that captured the entry before its removal sees
/// the flag and retries against a fresh entry.
pub(crate) struct ConnectionEntry {
    pub(crate) inner: Mutex<EntryInner>,
}

pub(crate) struct EntryInner {
    /// Subscriptions keyed by ID
    pub(crate) subs: HashMap<String, Arc<Subscription>>,
    /// Set when this entry has been unlinked from the outer map
    pub(crate) retired: bool,
}

impl ConnectionEntry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(EntryInner {
                subs: HashMap::new(),
                retired: false,
            }),
        }
    }
}
