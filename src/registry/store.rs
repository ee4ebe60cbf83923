//! Subscription registry implementation
//!
//! The central registry that tracks every admitted subscription, keyed by
//! connection and subscription ID.
//!
//! # Locking
//!
//! The outer map is behind an `RwLock`; each connection's subscriptions sit
//! behind their own `Mutex`. Admissions for distinct connections only share
//! the outer read lock, so they proceed in parallel. Admissions for the
//! same connection serialize on the inner mutex, which is held across the
//! duplicate check, the cap check and the insert. Parsing and validation
//! run before any lock is taken.
//!
//! Removing a connection's last subscription marks its entry `retired` and
//! unlinks it under the outer write lock. An admission that captured the
//! entry before the unlink sees the flag and retries against a fresh entry,
//! so a subscription admitted concurrently with that removal is never lost.
//!
//! # Panics
//!
//! All methods panic if an internal lock was poisoned by a panicking
//! thread. No registry operation panics otherwise, so poisoning indicates
//! a bug in this crate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::connection::ConnectionId;
use crate::schema::Schema;

use super::admission::{admit_query, validate_candidate};
use super::config::RegistryConfig;
use super::entry::{ConnectionEntry, Subscription};
use super::error::AdmissionError;

/// Central registry for admitted subscriptions
pub struct SubscriptionRegistry {
    /// Map of connection ID to that connection's entry
    connections: RwLock<HashMap<ConnectionId, Arc<ConnectionEntry>>>,

    /// Schema that admission validates queries against
    schema: Schema,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriptionRegistry {
    /// Create a registry with default configuration
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(schema: Schema, config: RegistryConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            schema,
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Admit a subscription candidate
    ///
    /// Validates the candidate's shape, parses and validates its query, and
    /// stores it under its connection. On rejection the complete list of
    /// failures is returned and the registry is left untouched.
    pub fn add_subscription(&self, candidate: Subscription) -> Result<(), Vec<AdmissionError>> {
        let shape_errors = validate_candidate(&candidate);
        if !shape_errors.is_empty() {
            tracing::debug!(
                subscription = %candidate.id,
                errors = shape_errors.len(),
                "Subscription candidate rejected"
            );
            return Err(shape_errors);
        }

        let mut candidate = candidate;
        let (document, fields) = admit_query(&candidate.query, &self.schema)?;
        candidate.admit(document, fields);

        let conn_id = match candidate.connection.as_deref() {
            Some(conn) => ConnectionId::new(conn.id()),
            None => return Err(vec![AdmissionError::MissingConnection]),
        };

        let id = candidate.id.clone();
        let sub = Arc::new(candidate);

        loop {
            let entry = self.entry_for(&conn_id);
            let mut inner = entry.inner.lock().unwrap();

            if inner.retired {
                // lost a race with the removal of this connection's last
                // subscription; the entry is gone from the outer map
                continue;
            }

            if inner.subs.contains_key(&id) {
                tracing::debug!(
                    conn = %conn_id,
                    subscription = %id,
                    "Duplicate subscription rejected"
                );
                return Err(vec![AdmissionError::Duplicate { id }]);
            }

            let limit = self.config.max_subscriptions_per_connection;
            if limit != 0 && inner.subs.len() >= limit {
                tracing::debug!(
                    conn = %conn_id,
                    subscription = %id,
                    limit = limit,
                    "Subscription limit reached"
                );
                return Err(vec![AdmissionError::SubscriptionLimit { limit }]);
            }

            inner.subs.insert(id.clone(), Arc::clone(&sub));
            tracing::info!(
                conn = %conn_id,
                subscription = %id,
                fields = ?sub.fields(),
                "Subscription added"
            );
            return Ok(());
        }
    }

    /// Get the entry for a connection, creating it if absent
    fn entry_for(&self, conn_id: &ConnectionId) -> Arc<ConnectionEntry> {
        if let Some(entry) = self.connections.read().unwrap().get(conn_id) {
            return Arc::clone(entry);
        }

        let mut connections = self.connections.write().unwrap();
        Arc::clone(
            connections
                .entry(conn_id.clone())
                .or_insert_with(|| Arc::new(ConnectionEntry::new())),
        )
    }

    /// Remove a single subscription
    ///
    /// Unknown connections and unknown subscription IDs are logged no-ops.
    /// Removing a connection's last subscription also removes its entry
    /// from the outer map.
    pub fn remove_subscription(&self, conn_id: &ConnectionId, id: &str) {
        let entry = {
            let connections = self.connections.read().unwrap();
            match connections.get(conn_id) {
                Some(entry) => Arc::clone(entry),
                None => {
                    tracing::debug!(
                        conn = %conn_id,
                        subscription = id,
                        "Removal for unknown connection ignored"
                    );
                    return;
                }
            }
        };

        let now_empty = {
            let mut inner = entry.inner.lock().unwrap();
            if inner.subs.remove(id).is_none() {
                tracing::debug!(
                    conn = %conn_id,
                    subscription = id,
                    "Removal for unknown subscription ignored"
                );
                return;
            }
            tracing::info!(conn = %conn_id, subscription = id, "Subscription removed");
            inner.subs.is_empty()
        };

        if now_empty {
            self.retire_if_empty(conn_id, &entry);
        }
    }

    /// Remove every subscription for a connection
    ///
    /// Idempotent: removing an unknown connection is a logged no-op.
    pub fn remove_connection(&self, conn_id: &ConnectionId) {
        let mut connections = self.connections.write().unwrap();
        let Some(entry) = connections.get(conn_id).map(Arc::clone) else {
            tracing::debug!(conn = %conn_id, "Removal for unknown connection ignored");
            return;
        };

        let mut inner = entry.inner.lock().unwrap();
        inner.retired = true;
        let removed = inner.subs.len();
        inner.subs.clear();
        drop(inner);

        connections.remove(conn_id);
        tracing::info!(conn = %conn_id, removed = removed, "Connection subscriptions removed");
    }

    /// Unlink a connection entry that is still empty
    ///
    /// Re-checks emptiness under the outer write lock so an admission that
    /// slipped in between the caller's check and this call wins.
    fn retire_if_empty(&self, conn_id: &ConnectionId, entry: &Arc<ConnectionEntry>) {
        let mut connections = self.connections.write().unwrap();

        let still_linked = connections
            .get(conn_id)
            .is_some_and(|current| Arc::ptr_eq(current, entry));
        if !still_linked {
            return;
        }

        let mut inner = entry.inner.lock().unwrap();
        if inner.subs.is_empty() {
            inner.retired = true;
            drop(inner);
            connections.remove(conn_id);
            tracing::debug!(conn = %conn_id, "Connection entry removed");
        }
    }

    /// Snapshot of every registered subscription, grouped by connection
    ///
    /// Weakly consistent: concurrent mutations may or may not be visible,
    /// but every subscription in the snapshot was fully admitted.
    pub fn subscriptions(&self) -> HashMap<ConnectionId, HashMap<String, Arc<Subscription>>> {
        let connections = self.connections.read().unwrap();
        connections
            .iter()
            .map(|(conn_id, entry)| {
                let inner = entry.inner.lock().unwrap();
                (conn_id.clone(), inner.subs.clone())
            })
            .collect()
    }

    /// Snapshot of one connection's subscriptions
    pub fn subscriptions_for(
        &self,
        conn_id: &ConnectionId,
    ) -> Option<HashMap<String, Arc<Subscription>>> {
        let connections = self.connections.read().unwrap();
        connections.get(conn_id).map(|entry| {
            let inner = entry.inner.lock().unwrap();
            inner.subs.clone()
        })
    }

    /// Collect every subscription whose field list matches the given field
    pub fn matching(&self, field: &str) -> Vec<Arc<Subscription>> {
        let connections = self.connections.read().unwrap();
        let mut matches = Vec::new();
        for entry in connections.values() {
            let inner = entry.inner.lock().unwrap();
            for sub in inner.subs.values() {
                if sub.matches_field(field) {
                    matches.push(Arc::clone(sub));
                }
            }
        }
        matches
    }

    /// Total number of registered subscriptions
    pub fn subscription_count(&self) -> usize {
        let connections = self.connections.read().unwrap();
        connections
            .values()
            .map(|entry| entry.inner.lock().unwrap().subs.len())
            .sum()
    }

    /// Number of connections with at least one subscription
    pub fn connection_count(&self) -> usize {
        self.connections.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connection::Connection;
    use crate::payload::UpdatePayload;
    use crate::schema::{FieldDef, ObjectType};

    struct FakeConnection {
        id: String,
    }

    impl FakeConnection {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self { id: id.to_string() })
        }
    }

    impl Connection for FakeConnection {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn send_data(&self, _payload: &UpdatePayload) {}
    }

    fn chat_schema() -> Schema {
        Schema::builder()
            .object(
                ObjectType::new("Message")
                    .field(FieldDef::scalar("body"))
                    .field(FieldDef::scalar("sender")),
            )
            .subscription(
                ObjectType::new("Subscription")
                    .field(FieldDef::object("messageAdded", "Message").argument("channel"))
                    .field(FieldDef::scalar("userCount")),
            )
            .build()
            .unwrap()
    }

    fn registry() -> SubscriptionRegistry {
        SubscriptionRegistry::new(chat_schema())
    }

    fn candidate(conn: &Arc<FakeConnection>, id: &str) -> Subscription {
        Subscription::new(id, "{ messageAdded(channel: \"general\") { body } }")
            .connection(Arc::clone(conn) as Arc<dyn Connection>)
            .deliver(Arc::new(|_| {}))
    }

    #[test]
    fn test_admission_populates_document_and_fields() {
        let registry = registry();
        let conn = FakeConnection::new("conn-1");

        registry.add_subscription(candidate(&conn, "sub-1")).unwrap();

        let subs = registry
            .subscriptions_for(&ConnectionId::from("conn-1"))
            .unwrap();
        let sub = subs.get("sub-1").unwrap();
        assert!(sub.document().is_some());
        assert_eq!(sub.fields(), ["messageAdded"]);
        assert!(sub.matches_field("messageAdded"));
    }

    #[test]
    fn test_candidate_validation_is_exhaustive_and_mutates_nothing() {
        let registry = registry();

        let errors = registry
            .add_subscription(Subscription::new("", ""))
            .unwrap_err();

        assert_eq!(
            errors,
            vec![
                AdmissionError::MissingId,
                AdmissionError::MissingConnection,
                AdmissionError::EmptyQuery,
                AdmissionError::MissingDeliverer,
            ]
        );
        assert_eq!(registry.subscription_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_syntax_rejection_mutates_nothing() {
        let registry = registry();
        let conn = FakeConnection::new("conn-1");

        let errors = registry
            .add_subscription(
                Subscription::new("sub-1", "{ messageAdded(")
                    .connection(conn as Arc<dyn Connection>)
                    .deliver(Arc::new(|_| {})),
            )
            .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AdmissionError::Syntax(_)));
        assert_eq!(registry.subscription_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_schema_rejection_reports_all_violations() {
        let registry = registry();
        let conn = FakeConnection::new("conn-1");

        let errors = registry
            .add_subscription(
                Subscription::new("sub-1", "{ nonsense userCount { x } }")
                    .connection(conn as Arc<dyn Connection>)
                    .deliver(Arc::new(|_| {})),
            )
            .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, AdmissionError::Schema(_))));
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = registry();
        let conn = FakeConnection::new("conn-1");

        registry.add_subscription(candidate(&conn, "sub-1")).unwrap();
        let errors = registry
            .add_subscription(candidate(&conn, "sub-1"))
            .unwrap_err();

        assert_eq!(
            errors,
            vec![AdmissionError::Duplicate {
                id: "sub-1".to_string()
            }]
        );
        assert_eq!(registry.subscription_count(), 1);

        // same ID on another connection is fine
        let other = FakeConnection::new("conn-2");
        registry.add_subscription(candidate(&other, "sub-1")).unwrap();
        assert_eq!(registry.subscription_count(), 2);
    }

    #[test]
    fn test_removal_and_cleanup_invariant() {
        let registry = registry();
        let conn = FakeConnection::new("conn-1");
        let conn_id = ConnectionId::from("conn-1");

        registry.add_subscription(candidate(&conn, "sub-1")).unwrap();
        registry.add_subscription(candidate(&conn, "sub-2")).unwrap();

        registry.remove_subscription(&conn_id, "sub-1");
        assert_eq!(registry.subscription_count(), 1);
        assert_eq!(registry.connection_count(), 1);

        registry.remove_subscription(&conn_id, "sub-2");
        assert_eq!(registry.subscription_count(), 0);
        assert_eq!(registry.connection_count(), 0);
        assert!(registry.subscriptions_for(&conn_id).is_none());
    }

    #[test]
    fn test_removal_of_unknown_targets_is_noop() {
        let registry = registry();
        let conn = FakeConnection::new("conn-1");
        let conn_id = ConnectionId::from("conn-1");

        registry.remove_subscription(&conn_id, "sub-1");
        registry.remove_connection(&conn_id);

        registry.add_subscription(candidate(&conn, "sub-1")).unwrap();
        registry.remove_subscription(&conn_id, "not-there");
        assert_eq!(registry.subscription_count(), 1);
    }

    #[test]
    fn test_bulk_removal_is_idempotent() {
        let registry = registry();
        let conn = FakeConnection::new("conn-1");
        let conn_id = ConnectionId::from("conn-1");

        registry.add_subscription(candidate(&conn, "sub-1")).unwrap();
        registry.add_subscription(candidate(&conn, "sub-2")).unwrap();

        registry.remove_connection(&conn_id);
        assert_eq!(registry.subscription_count(), 0);
        assert_eq!(registry.connection_count(), 0);

        registry.remove_connection(&conn_id);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_snapshot_accessor() {
        let registry = registry();
        let conn1 = FakeConnection::new("conn-1");
        let conn2 = FakeConnection::new("conn-2");

        registry.add_subscription(candidate(&conn1, "sub-1")).unwrap();
        registry.add_subscription(candidate(&conn1, "sub-2")).unwrap();
        registry.add_subscription(candidate(&conn2, "sub-1")).unwrap();

        let snapshot = registry.subscriptions();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&ConnectionId::from("conn-1")].len(), 2);
        assert_eq!(snapshot[&ConnectionId::from("conn-2")].len(), 1);
    }

    #[test]
    fn test_matching_collects_across_connections() {
        let registry = registry();
        let conn1 = FakeConnection::new("conn-1");
        let conn2 = FakeConnection::new("conn-2");

        registry.add_subscription(candidate(&conn1, "sub-1")).unwrap();
        registry
            .add_subscription(
                Subscription::new("sub-2", "{ userCount }")
                    .connection(conn2 as Arc<dyn Connection>)
                    .deliver(Arc::new(|_| {})),
            )
            .unwrap();

        assert_eq!(registry.matching("messageAdded").len(), 1);
        assert_eq!(registry.matching("userCount").len(), 1);
        assert!(registry.matching("somethingElse").is_empty());
    }

    #[test]
    fn test_per_connection_cap() {
        let config = RegistryConfig::default().max_subscriptions_per_connection(1);
        let registry = SubscriptionRegistry::with_config(chat_schema(), config);
        let conn = FakeConnection::new("conn-1");

        registry.add_subscription(candidate(&conn, "sub-1")).unwrap();
        let errors = registry
            .add_subscription(candidate(&conn, "sub-2"))
            .unwrap_err();

        assert_eq!(errors, vec![AdmissionError::SubscriptionLimit { limit: 1 }]);
        assert_eq!(registry.subscription_count(), 1);

        // other connections are unaffected
        let other = FakeConnection::new("conn-2");
        registry.add_subscription(candidate(&other, "sub-1")).unwrap();
        assert_eq!(registry.subscription_count(), 2);
    }

    #[test]
    fn test_concurrent_same_key_admission_has_one_winner() {
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let conn = FakeConnection::new("conn-1");
                    registry.add_subscription(candidate(&conn, "sub-1"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();

        assert_eq!(winners, 1);
        assert_eq!(registry.subscription_count(), 1);
        for result in results {
            if let Err(errors) = result {
                assert_eq!(
                    errors,
                    vec![AdmissionError::Duplicate {
                        id: "sub-1".to_string()
                    }]
                );
            }
        }
    }

    #[test]
    fn test_concurrent_distinct_key_admissions_all_land() {
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let conn = FakeConnection::new(&format!("conn-{}", t));
                    for i in 0..25 {
                        registry
                            .add_subscription(candidate(&conn, &format!("sub-{}", i)))
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.connection_count(), 4);
        assert_eq!(registry.subscription_count(), 100);
    }

    #[test]
    fn test_remove_last_vs_add_race_never_loses_the_add() {
        for _ in 0..100 {
            let registry = Arc::new(registry());
            let conn = FakeConnection::new("conn-1");
            let conn_id = ConnectionId::from("conn-1");

            registry.add_subscription(candidate(&conn, "sub-old")).unwrap();

            let remover = {
                let registry = Arc::clone(&registry);
                let conn_id = conn_id.clone();
                std::thread::spawn(move || {
                    registry.remove_subscription(&conn_id, "sub-old");
                })
            };
            let adder = {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let conn = FakeConnection::new("conn-1");
                    registry.add_subscription(candidate(&conn, "sub-new")).unwrap();
                })
            };

            remover.join().unwrap();
            adder.join().unwrap();

            let subs = registry.subscriptions_for(&conn_id).unwrap();
            assert!(subs.contains_key("sub-new"));
            assert!(!subs.contains_key("sub-old"));
            assert_eq!(registry.connection_count(), 1);
        }
    }
}
