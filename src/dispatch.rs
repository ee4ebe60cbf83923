//! Field-match dispatch
//!
//! Fans an update payload out to every subscription whose field list
//! matches the updated field. Dispatch performs no filtering beyond the
//! field match and no execution of the subscription's query; producing the
//! payload is the caller's business.

use std::sync::Arc;

use crate::payload::UpdatePayload;
use crate::registry::SubscriptionRegistry;

/// Fan-out consumer of a [`SubscriptionRegistry`]
pub struct FieldDispatcher {
    registry: Arc<SubscriptionRegistry>,
}

impl FieldDispatcher {
    /// Create a dispatcher over the given registry
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver a payload to every subscription matching the field
    ///
    /// Each subscriber receives its own clone of the payload. Returns the
    /// number of subscribers notified.
    pub fn dispatch(&self, field: &str, payload: UpdatePayload) -> usize {
        let matches = self.registry.matching(field);

        for sub in &matches {
            if let Some(ref deliver) = sub.deliver {
                deliver(payload.clone());
            }
        }

        tracing::debug!(
            field = field,
            subscribers = matches.len(),
            "Update dispatched"
        );
        matches.len()
    }
}
