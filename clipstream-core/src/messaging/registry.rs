use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::frames::ServerFrame;
use crate::models::UserId;

/// Sender half of a connection's outbound frame channel
pub type FrameSender = mpsc::Sender<ServerFrame>;

/// A registered client connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: String,
    pub user_id: UserId,
    pub sender: FrameSender,
}

impl ConnectionHandle {
    #[must_use]
    pub const fn new(connection_id: String, user_id: UserId, sender: FrameSender) -> Self {
        Self {
            connection_id,
            user_id,
            sender,
        }
    }
}

/// Identity-keyed registry of live connections
///
/// Holds at most one handle per user id. Registering an identity that is
/// already present silently replaces the old handle; the orphaned
/// connection's outbound channel closes once its writer task winds down.
/// The map is sharded (`DashMap`), so lookups and mutations are safe from
/// any number of runtime threads without an outer lock.
#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<UserId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Register a connection, replacing any existing handle for the same
    /// identity. Returns the replaced handle when there was one.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let user_id = handle.user_id.clone();
        let connection_id = handle.connection_id.clone();
        let replaced = self.connections.insert(user_id.clone(), handle);

        if let Some(old) = &replaced {
            info!(
                user_id = %user_id.as_str(),
                connection_id = %connection_id,
                replaced_connection_id = %old.connection_id,
                "Connection registered, replacing existing handle"
            );
        } else {
            info!(
                user_id = %user_id.as_str(),
                connection_id = %connection_id,
                total_connections = self.connections.len(),
                "Connection registered"
            );
        }

        replaced
    }

    /// Remove the mapping for an identity, but only while it still points at
    /// the given connection. A teardown racing a silent replace must not
    /// evict the replacement handle.
    pub fn unregister(&self, user_id: &UserId, connection_id: &str) {
        let removed = self
            .connections
            .remove_if(user_id, |_, handle| handle.connection_id == connection_id);

        if let Some((_, handle)) = removed {
            info!(
                user_id = %user_id.as_str(),
                connection_id = %handle.connection_id,
                total_connections = self.connections.len(),
                "Connection unregistered"
            );
        } else {
            debug!(
                user_id = %user_id.as_str(),
                connection_id = %connection_id,
                "Unregister skipped, no matching connection"
            );
        }
    }

    /// Look up the live handle for an identity
    #[must_use]
    pub fn lookup(&self, user_id: &UserId) -> Option<ConnectionHandle> {
        self.connections
            .get(user_id)
            .map(|entry| entry.value().clone())
    }

    /// Snapshot of every registered handle at the time of the call
    ///
    /// Mutations after the snapshot do not affect the returned list.
    #[must_use]
    pub fn all(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Get total number of registered connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(connection_id: &str, user_id: &str) -> (ConnectionHandle, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(
            connection_id.to_string(),
            UserId::from_string(user_id.to_string()),
            tx,
        );
        (handle, rx)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (h, _rx) = handle("conn1", "alice");

        assert!(registry.register(h).is_none());
        assert_eq!(registry.connection_count(), 1);

        let found = registry.lookup(&UserId::from_string("alice".to_string())).unwrap();
        assert_eq!(found.connection_id, "conn1");

        assert!(registry
            .lookup(&UserId::from_string("nobody".to_string()))
            .is_none());
    }

    #[test]
    fn test_register_replaces_existing_handle() {
        let registry = ConnectionRegistry::new();
        let alice = UserId::from_string("alice".to_string());
        let (h1, _rx1) = handle("conn1", "alice");
        let (h2, _rx2) = handle("conn2", "alice");

        assert!(registry.register(h1).is_none());
        let replaced = registry.register(h2).unwrap();

        assert_eq!(replaced.connection_id, "conn1");
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.lookup(&alice).unwrap().connection_id, "conn2");
    }

    #[test]
    fn test_stale_unregister_keeps_replacement() {
        let registry = ConnectionRegistry::new();
        let alice = UserId::from_string("alice".to_string());
        let (h1, _rx1) = handle("conn1", "alice");
        let (h2, _rx2) = handle("conn2", "alice");

        registry.register(h1);
        registry.register(h2);

        // Teardown of the replaced connection must not evict the new one
        registry.unregister(&alice, "conn1");
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.lookup(&alice).unwrap().connection_id, "conn2");

        registry.unregister(&alice, "conn2");
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let alice = UserId::from_string("alice".to_string());
        let (h, _rx) = handle("conn1", "alice");

        registry.register(h);
        registry.unregister(&alice, "conn1");
        registry.unregister(&alice, "conn1");
        registry.unregister(&UserId::from_string("never_seen".to_string()), "conn9");

        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_all_is_a_point_in_time_snapshot() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = handle("conn1", "alice");
        let (h2, _rx2) = handle("conn2", "bob");

        registry.register(h1);
        let snapshot = registry.all();
        registry.register(h2);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.all().len(), 2);
        assert_eq!(snapshot[0].user_id.as_str(), "alice");
    }
}
