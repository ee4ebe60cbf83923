//! # fieldcast
//!
//! Subscription registry and field-match dispatch for query-driven pub/sub.
//!
//! Clients register subscriptions written in a small query language. Each
//! candidate is parsed, validated against a [`Schema`], and stored in a
//! concurrent two-level registry keyed by connection and subscription ID.
//! When a data field changes, a [`FieldDispatcher`] fans the update out to
//! every subscription whose top-level selections include that field.
//!
//! Transports, connection lifecycle and query execution live outside this
//! crate; they plug in through the [`Connection`] trait and the
//! [`DeliverFn`] callback.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use fieldcast::{
//!     channel_deliverer, Connection, FieldDef, FieldDispatcher, ObjectType, Schema,
//!     Subscription, SubscriptionRegistry, UpdatePayload,
//! };
//!
//! struct Ws(String);
//!
//! impl Connection for Ws {
//!     fn id(&self) -> String {
//!         self.0.clone()
//!     }
//!     fn send_data(&self, _payload: &UpdatePayload) {}
//! }
//!
//! let schema = Schema::builder()
//!     .object(ObjectType::new("Message").field(FieldDef::scalar("body")))
//!     .subscription(
//!         ObjectType::new("Subscription")
//!             .field(FieldDef::object("messageAdded", "Message").argument("channel")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let registry = Arc::new(SubscriptionRegistry::new(schema));
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! registry
//!     .add_subscription(
//!         Subscription::new("sub-1", "{ messageAdded(channel: \"general\") { body } }")
//!             .connection(Arc::new(Ws("conn-1".into())))
//!             .deliver(channel_deliverer(tx)),
//!     )
//!     .unwrap();
//!
//! let dispatcher = FieldDispatcher::new(registry);
//! let notified = dispatcher.dispatch(
//!     "messageAdded",
//!     UpdatePayload::data(serde_json::json!({"messageAdded": {"body": "hi"}})),
//! );
//! assert_eq!(notified, 1);
//! assert!(rx.try_recv().is_ok());
//! ```

pub mod connection;
pub mod dispatch;
pub mod payload;
pub mod query;
pub mod registry;
pub mod schema;

pub use connection::{Connection, ConnectionId};
pub use dispatch::FieldDispatcher;
pub use payload::UpdatePayload;
pub use query::{Document, SchemaViolation, SyntaxError};
pub use registry::{
    channel_deliverer, AdmissionError, DeliverFn, RegistryConfig, Subscription,
    SubscriptionRegistry,
};
pub use schema::{FieldDef, FieldKind, ObjectType, Schema, SchemaBuilder, SchemaError};
