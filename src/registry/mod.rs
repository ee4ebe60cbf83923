//! Subscription registry
//!
//! The registry admits subscription candidates, stores them keyed by
//! connection and subscription ID, and answers field-match queries for the
//! dispatcher.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<SubscriptionRegistry>
//!                 ┌────────────────────────────────┐
//!                 │ connections: RwLock<HashMap<   │
//!                 │   ConnectionId,                │
//!                 │   Arc<ConnectionEntry> ────────┼──► Mutex<{
//!                 │ >>                             │      subs: HashMap<id,
//!                 │ schema, config                 │        Arc<Subscription>>,
//!                 └───────────────┬────────────────┘      retired: bool }>
//!                                 │
//!            ┌────────────────────┼────────────────────┐
//!            │                    │                    │
//!            ▼                    ▼                    ▼
//!     add_subscription     remove_subscription    matching(field)
//!     parse ► validate     unlink empty entries   FieldDispatcher
//!     ► extract ► insert                          fan-out
//! ```
//!
//! Admission runs the whole query pipeline before taking any lock, so lock
//! hold times stay bounded by map operations.

mod admission;

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{channel_deliverer, DeliverFn, Subscription};
pub use error::AdmissionError;
pub use store::SubscriptionRegistry;
