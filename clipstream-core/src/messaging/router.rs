use chrono::Utc;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, warn};

use super::frames::{ClientFrame, ServerFrame};
use super::registry::{ConnectionHandle, ConnectionRegistry};
use crate::models::UserId;

/// Why a single delivery attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving half of the connection channel is gone
    Closed,
    /// The channel stayed full past the configured send timeout
    Timeout,
}

/// One failed delivery inside a fan-out
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub user_id: UserId,
    pub connection_id: String,
    pub reason: DeliveryError,
}

/// Outcome of a broadcast fan-out
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

/// Routes inbound client frames to connected peers
///
/// Fan-out is concurrent and failure-isolated: every recipient in the
/// snapshot is attempted, per-recipient outcomes are collected into a
/// [`BroadcastReport`], and one failed send never cancels the rest.
/// Handles whose channel turns out to be closed are evicted from the
/// registry as part of the fan-out.
#[derive(Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
    send_timeout: Duration,
}

impl MessageRouter {
    #[must_use]
    pub const fn new(registry: ConnectionRegistry, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Dispatch one inbound frame on behalf of `sender`
    pub async fn route(&self, sender: &UserId, frame: ClientFrame) {
        match frame {
            ClientFrame::Chat { message } => {
                self.broadcast_chat(sender, message).await;
            }
            ClientFrame::Notification {
                target_user_id,
                message,
            } => {
                self.notify(&UserId::from_string(target_user_id), message)
                    .await;
            }
            ClientFrame::Unknown => {
                debug!(
                    user_id = %sender.as_str(),
                    "Skipping frame with unrecognized type"
                );
            }
        }
    }

    /// Broadcast a chat line to every registered connection, sender included
    pub async fn broadcast_chat(&self, sender: &UserId, message: String) -> BroadcastReport {
        let frame = ServerFrame::Chat {
            user_id: sender.clone(),
            message,
            timestamp: Utc::now(),
        };

        let recipients = self.registry.all();
        let report = self.fan_out(&recipients, &frame).await;

        debug!(
            user_id = %sender.as_str(),
            attempted = report.attempted,
            delivered = report.delivered,
            "Chat broadcast complete"
        );

        report
    }

    /// Deliver a notification to one user
    ///
    /// An absent target is dropped without an error; the sender gets no
    /// receipt either way. Returns whether the frame was handed to the
    /// target's channel.
    pub async fn notify(&self, target: &UserId, message: String) -> bool {
        let Some(handle) = self.registry.lookup(target) else {
            debug!(
                user_id = %target.as_str(),
                "Notification target not connected, dropping"
            );
            return false;
        };

        let frame = ServerFrame::Notification { message };

        match handle.sender.send_timeout(frame, self.send_timeout).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    user_id = %target.as_str(),
                    connection_id = %handle.connection_id,
                    error = %err,
                    "Failed to deliver notification"
                );
                if matches!(err, SendTimeoutError::Closed(_)) {
                    self.registry
                        .unregister(&handle.user_id, &handle.connection_id);
                }
                false
            }
        }
    }

    /// Attempt delivery to every recipient concurrently, collecting outcomes
    async fn fan_out(
        &self,
        recipients: &[ConnectionHandle],
        frame: &ServerFrame,
    ) -> BroadcastReport {
        let attempts = recipients.iter().map(|handle| async move {
            match handle
                .sender
                .send_timeout(frame.clone(), self.send_timeout)
                .await
            {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Closed(_)) => Err(DeliveryFailure {
                    user_id: handle.user_id.clone(),
                    connection_id: handle.connection_id.clone(),
                    reason: DeliveryError::Closed,
                }),
                Err(SendTimeoutError::Timeout(_)) => Err(DeliveryFailure {
                    user_id: handle.user_id.clone(),
                    connection_id: handle.connection_id.clone(),
                    reason: DeliveryError::Timeout,
                }),
            }
        });

        let outcomes = join_all(attempts).await;

        let mut report = BroadcastReport {
            attempted: recipients.len(),
            ..BroadcastReport::default()
        };

        for outcome in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    warn!(
                        user_id = %failure.user_id.as_str(),
                        connection_id = %failure.connection_id,
                        reason = ?failure.reason,
                        frame_type = %frame.frame_type(),
                        "Failed to deliver frame, collecting in report"
                    );
                    if failure.reason == DeliveryError::Closed {
                        self.registry
                            .unregister(&failure.user_id, &failure.connection_id);
                    }
                    report.failures.push(failure);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::registry::ConnectionHandle;
    use tokio::sync::mpsc;

    fn registered(
        registry: &ConnectionRegistry,
        connection_id: &str,
        user_id: &str,
        capacity: usize,
    ) -> mpsc::Receiver<ServerFrame> {
        let (tx, rx) = mpsc::channel(capacity);
        registry.register(ConnectionHandle::new(
            connection_id.to_string(),
            UserId::from_string(user_id.to_string()),
            tx,
        ));
        rx
    }

    fn router(registry: &ConnectionRegistry) -> MessageRouter {
        MessageRouter::new(registry.clone(), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_including_sender() {
        let registry = ConnectionRegistry::new();
        let mut rx_alice = registered(&registry, "conn1", "alice", 8);
        let mut rx_bob = registered(&registry, "conn2", "bob", 8);
        let router = router(&registry);

        let alice = UserId::from_string("alice".to_string());
        let report = router.broadcast_chat(&alice, "Hello!".to_string()).await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);
        assert!(report.failures.is_empty());

        for rx in [&mut rx_alice, &mut rx_bob] {
            let frame = rx.recv().await.unwrap();
            if let ServerFrame::Chat {
                user_id, message, ..
            } = frame
            {
                assert_eq!(user_id.as_str(), "alice");
                assert_eq!(message, "Hello!");
            } else {
                panic!("Expected Chat frame");
            }
        }
    }

    #[tokio::test]
    async fn test_closed_recipient_is_reported_and_evicted() {
        let registry = ConnectionRegistry::new();
        let mut rx_alice = registered(&registry, "conn1", "alice", 8);
        let rx_bob = registered(&registry, "conn2", "bob", 8);
        drop(rx_bob);
        let router = router(&registry);

        let alice = UserId::from_string("alice".to_string());
        let report = router.broadcast_chat(&alice, "Hello!".to_string()).await;

        // Bob's failure never blocks Alice's delivery
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id.as_str(), "bob");
        assert_eq!(report.failures[0].reason, DeliveryError::Closed);

        assert!(rx_alice.recv().await.is_some());
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_stuck_recipient_times_out_without_eviction() {
        let registry = ConnectionRegistry::new();
        let _rx_bob = registered(&registry, "conn1", "bob", 1);
        let router = router(&registry);

        // Fill Bob's channel so the next send cannot complete
        let bob = registry
            .lookup(&UserId::from_string("bob".to_string()))
            .unwrap();
        bob.sender
            .try_send(ServerFrame::Notification {
                message: "filler".to_string(),
            })
            .unwrap();

        let alice = UserId::from_string("alice".to_string());
        let report = router.broadcast_chat(&alice, "Hello!".to_string()).await;

        assert_eq!(report.delivered, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].reason, DeliveryError::Timeout);

        // A slow consumer stays registered, only a closed one is evicted
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_notify_reaches_only_the_target() {
        let registry = ConnectionRegistry::new();
        let mut rx_alice = registered(&registry, "conn1", "alice", 8);
        let mut rx_bob = registered(&registry, "conn2", "bob", 8);
        let router = router(&registry);

        let delivered = router
            .notify(&UserId::from_string("bob".to_string()), "ping".to_string())
            .await;
        assert!(delivered);

        let frame = rx_bob.recv().await.unwrap();
        if let ServerFrame::Notification { message } = frame {
            assert_eq!(message, "ping");
        } else {
            panic!("Expected Notification frame");
        }

        let nothing =
            tokio::time::timeout(Duration::from_millis(100), rx_alice.recv()).await;
        assert!(nothing.is_err(), "Alice should not have received the frame");
    }

    #[tokio::test]
    async fn test_notify_absent_target_is_silently_dropped() {
        let registry = ConnectionRegistry::new();
        let router = router(&registry);

        let delivered = router
            .notify(
                &UserId::from_string("ghost".to_string()),
                "anyone there?".to_string(),
            )
            .await;

        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_route_dispatches_chat_and_notification() {
        let registry = ConnectionRegistry::new();
        let mut rx_alice = registered(&registry, "conn1", "alice", 8);
        let mut rx_bob = registered(&registry, "conn2", "bob", 8);
        let router = router(&registry);

        let alice = UserId::from_string("alice".to_string());
        router
            .route(
                &alice,
                ClientFrame::Chat {
                    message: "hi".to_string(),
                },
            )
            .await;

        assert!(matches!(
            rx_alice.recv().await.unwrap(),
            ServerFrame::Chat { .. }
        ));
        assert!(matches!(
            rx_bob.recv().await.unwrap(),
            ServerFrame::Chat { .. }
        ));

        router
            .route(
                &alice,
                ClientFrame::Notification {
                    target_user_id: "bob".to_string(),
                    message: "psst".to_string(),
                },
            )
            .await;

        assert!(matches!(
            rx_bob.recv().await.unwrap(),
            ServerFrame::Notification { .. }
        ));
    }

    #[tokio::test]
    async fn test_route_skips_unknown_frames() {
        let registry = ConnectionRegistry::new();
        let mut rx_alice = registered(&registry, "conn1", "alice", 8);
        let router = router(&registry);

        let alice = UserId::from_string("alice".to_string());
        router.route(&alice, ClientFrame::Unknown).await;

        let nothing =
            tokio::time::timeout(Duration::from_millis(100), rx_alice.recv()).await;
        assert!(nothing.is_err(), "Unknown frames should not be delivered");
    }
}
