//! Concurrent connection index with per-bucket fine-grained locking.
//!
//! [`ConnectionRegistry`] stores live connections in a two-level map
//! (owner → key → bucket) where each bucket is individually protected
//! by a [`tokio::sync::RwLock`]. The outer index lock is held only long
//! enough to locate or create a bucket, so registration churn and sends
//! on unrelated (owner, key) pairs do not block each other.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::RwLock;

use super::connection::{ConnectionHandle, Payload};
use super::delivery::{DeliveryReport, TargetDelivery};
use super::identity::{ChannelKey, OwnerId};
use super::registration::{InboundHandler, Registration, RegistrationId};

/// One (owner, key) bucket: registrations in insertion order.
///
/// Insertion order is irrelevant to fan-out but kept for deterministic
/// removal.
type Bucket = Arc<RwLock<Vec<Registration>>>;

/// Registry-wide counters for the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct RegistryStats {
    /// Number of owners with at least one registration.
    pub owners: usize,
    /// Number of (owner, key) buckets.
    pub channels: usize,
    /// Total number of live registrations.
    pub connections: usize,
}

/// Central index of live connections.
///
/// Constructed once at process startup and shared by reference with the
/// WebSocket acceptor and the REST broadcast handler.
///
/// # Concurrency
///
/// - `register` and `deregister` mutate one bucket; `send` and
///   `send_all` read snapshots of one or many buckets.
/// - Lock order is always outer index first, then bucket; bucket
///   contents are snapshotted before any transport write is awaited, so
///   no lock is held across I/O.
/// - Registrations added or removed while a fan-out is in flight are
///   not retroactively included or excluded.
#[derive(Debug)]
pub struct ConnectionRegistry {
    index: RwLock<HashMap<OwnerId, HashMap<ChannelKey, Bucket>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a connection under (owner, key).
    ///
    /// Ensures the bucket exists and appends a new [`Registration`].
    /// After this returns, the connection is reachable by [`send`]
    /// targeting its (owner, key) until it is deregistered. Does not
    /// validate that the connection is open; that is the caller's
    /// responsibility.
    ///
    /// [`send`]: Self::send
    pub async fn register(
        &self,
        owner: OwnerId,
        key: ChannelKey,
        handle: ConnectionHandle,
        on_data: Option<InboundHandler>,
    ) -> RegistrationId {
        let registration = Registration::new(handle, on_data);
        let id = registration.id;

        let bucket = {
            let mut index = self.index.write().await;
            Arc::clone(
                index
                    .entry(owner)
                    .or_default()
                    .entry(key)
                    .or_insert_with(|| Arc::new(RwLock::new(Vec::new()))),
            )
        };
        bucket.write().await.push(registration);
        id
    }

    /// Removes a registration from its bucket.
    ///
    /// Idempotent: returns `true` if the registration was present and
    /// removed, `false` if it was already gone. Both the close and the
    /// error path of a connection funnel here; firing both results in
    /// exactly one removal. Empty buckets and owner maps are garbage
    /// collected (an empty bucket is equivalent to an absent one).
    pub async fn deregister(
        &self,
        owner: &OwnerId,
        key: &ChannelKey,
        id: RegistrationId,
    ) -> bool {
        let mut index = self.index.write().await;
        let Some(channels) = index.get_mut(owner) else {
            return false;
        };
        let Some(bucket) = channels.get(key) else {
            return false;
        };

        let removed;
        let now_empty;
        {
            let mut registrations = bucket.write().await;
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed = registrations.len() < before;
            now_empty = registrations.is_empty();
        }

        if now_empty {
            channels.remove(key);
            if channels.is_empty() {
                index.remove(owner);
            }
        }
        removed
    }

    /// Invokes the registration's inbound handler with `payload`.
    ///
    /// The handler is called outside all registry locks. Returns `true`
    /// if a handler was invoked; `false` when the registration is gone
    /// or has no handler (inbound data discarded).
    pub async fn dispatch_inbound(
        &self,
        owner: &OwnerId,
        key: &ChannelKey,
        id: RegistrationId,
        payload: &Payload,
    ) -> bool {
        let handler = {
            let Some(bucket) = self.bucket(owner, key).await else {
                return false;
            };
            let registrations = bucket.read().await;
            registrations
                .iter()
                .find(|r| r.id == id)
                .and_then(|r| r.on_data.as_ref().map(Arc::clone))
        };
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Sends `payload` to every connection registered under (owner, key).
    ///
    /// The target set is the bucket's contents at the moment of the
    /// call; all per-connection writes are issued concurrently, and the
    /// returned report resolves once every write has completed or
    /// failed. An absent or empty bucket yields an empty (trivially
    /// complete) report. Failed targets are reported but never removed
    /// here; removal happens only through the connection's own
    /// termination path.
    pub async fn send(
        &self,
        owner: &OwnerId,
        key: &ChannelKey,
        payload: Payload,
    ) -> DeliveryReport {
        let targets = match self.bucket(owner, key).await {
            Some(bucket) => snapshot(&bucket).await,
            None => Vec::new(),
        };
        fan_out(targets, payload).await
    }

    /// Broadcasts `payload` to every connection under `key` across all
    /// owners.
    ///
    /// Iterates a snapshot of the owner set at call time and applies
    /// the same fan-out as [`send`] to each owner's bucket, merging the
    /// per-owner outcomes into one report. There is no separate global
    /// bucket; this is the sole broadcast mechanism.
    ///
    /// [`send`]: Self::send
    pub async fn send_all(&self, key: &ChannelKey, payload: Payload) -> DeliveryReport {
        let buckets: Vec<Bucket> = {
            let index = self.index.read().await;
            index
                .values()
                .filter_map(|channels| channels.get(key).map(Arc::clone))
                .collect()
        };

        let mut targets = Vec::new();
        for bucket in &buckets {
            targets.extend(snapshot(bucket).await);
        }
        fan_out(targets, payload).await
    }

    /// Number of registrations currently under (owner, key).
    pub async fn connection_count(&self, owner: &OwnerId, key: &ChannelKey) -> usize {
        match self.bucket(owner, key).await {
            Some(bucket) => bucket.read().await.len(),
            None => 0,
        }
    }

    /// Registry-wide counters.
    pub async fn stats(&self) -> RegistryStats {
        let buckets: Vec<Bucket> = {
            let index = self.index.read().await;
            index
                .values()
                .flat_map(|channels| channels.values().map(Arc::clone))
                .collect()
        };
        let owners = self.index.read().await.len();
        let mut connections = 0;
        for bucket in &buckets {
            connections += bucket.read().await.len();
        }
        RegistryStats {
            owners,
            channels: buckets.len(),
            connections,
        }
    }

    /// Clones the bucket handle for (owner, key), if present.
    async fn bucket(&self, owner: &OwnerId, key: &ChannelKey) -> Option<Bucket> {
        let index = self.index.read().await;
        index
            .get(owner)
            .and_then(|channels| channels.get(key))
            .map(Arc::clone)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshots a bucket into (id, handle) pairs, releasing the lock
/// before any write is awaited.
async fn snapshot(bucket: &Bucket) -> Vec<(RegistrationId, ConnectionHandle)> {
    let registrations = bucket.read().await;
    registrations
        .iter()
        .map(|r| (r.id, r.handle.clone()))
        .collect()
}

/// Issues one write per target concurrently and collects the outcomes.
async fn fan_out(
    targets: Vec<(RegistrationId, ConnectionHandle)>,
    payload: Payload,
) -> DeliveryReport {
    let writes = targets.into_iter().map(|(id, handle)| {
        let payload = payload.clone();
        async move {
            TargetDelivery {
                registration: id,
                result: handle.send(payload).await,
            }
        }
    });
    DeliveryReport::from_results(join_all(writes).await)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::connection::SendError;

    /// Spawns a writer task that acks every frame and records payloads.
    fn acking_connection(capacity: usize) -> (ConnectionHandle, Arc<Mutex<Vec<Payload>>>) {
        let (handle, mut rx) = ConnectionHandle::channel(capacity);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Ok(mut seen) = sink.lock() {
                    seen.push(frame.payload.clone());
                }
                let _ = frame.ack.send(Ok(()));
            }
        });
        (handle, received)
    }

    /// A connection whose writer task fails every frame.
    fn failing_connection() -> ConnectionHandle {
        let (handle, mut rx) = ConnectionHandle::channel(4);
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let _ = frame
                    .ack
                    .send(Err(SendError::Transport("write failed".to_string())));
            }
        });
        handle
    }

    fn owner(s: &str) -> OwnerId {
        let Ok(owner) = OwnerId::new(s) else {
            panic!("valid owner");
        };
        owner
    }

    fn key(s: &str) -> ChannelKey {
        let Ok(key) = ChannelKey::new(s) else {
            panic!("valid key");
        };
        key
    }

    fn text(s: &str) -> Payload {
        Payload::Text(s.to_string())
    }

    fn received(log: &Arc<Mutex<Vec<Payload>>>) -> Vec<Payload> {
        match log.lock() {
            Ok(seen) => seen.clone(),
            Err(_) => panic!("poisoned payload log"),
        }
    }

    #[tokio::test]
    async fn send_delivers_exact_payload() {
        let registry = ConnectionRegistry::new();
        let (handle, log) = acking_connection(4);
        registry
            .register(owner("b"), key("messaging"), handle, None)
            .await;

        let report = registry
            .send(&owner("b"), &key("messaging"), text("hello"))
            .await;

        assert!(report.is_complete());
        assert_eq!(report.attempted(), 1);
        assert_eq!(received(&log), vec![text("hello")]);
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let registry = ConnectionRegistry::new();
        let (handle, log) = acking_connection(4);
        registry
            .register(owner("o1"), key("k"), handle, None)
            .await;

        let report = registry.send(&owner("o2"), &key("k"), text("x")).await;

        assert!(report.is_complete());
        assert_eq!(report.attempted(), 0);
        assert!(received(&log).is_empty());
    }

    #[tokio::test]
    async fn fan_out_reaches_every_registration() {
        let registry = ConnectionRegistry::new();
        let mut logs = Vec::new();
        for _ in 0..5 {
            let (handle, log) = acking_connection(4);
            registry
                .register(owner("a"), key("k"), handle, None)
                .await;
            logs.push(log);
        }

        let report = registry.send(&owner("a"), &key("k"), text("ping")).await;

        assert!(report.is_complete());
        assert_eq!(report.attempted(), 5);
        assert_eq!(report.delivered(), 5);
        for log in &logs {
            assert_eq!(received(log), vec![text("ping")]);
        }
    }

    #[tokio::test]
    async fn broadcast_is_union_of_owners() {
        let registry = ConnectionRegistry::new();
        let (c1, log1) = acking_connection(4);
        let (c2, log2) = acking_connection(4);
        let (c3, log3) = acking_connection(4);
        registry
            .register(owner("a"), key("messaging"), c1, None)
            .await;
        registry
            .register(owner("b"), key("messaging"), c2, None)
            .await;
        registry.register(owner("a"), key("other"), c3, None).await;

        let report = registry.send_all(&key("messaging"), text("ping")).await;

        assert!(report.is_complete());
        assert_eq!(report.attempted(), 2);
        assert_eq!(received(&log1), vec![text("ping")]);
        assert_eq!(received(&log2), vec![text("ping")]);
        assert!(received(&log3).is_empty());
    }

    #[tokio::test]
    async fn empty_bucket_send_is_a_noop() {
        let registry = ConnectionRegistry::new();

        let direct = registry.send(&owner("a"), &key("k"), text("x")).await;
        let broadcast = registry.send_all(&key("k"), text("x")).await;

        assert!(direct.is_complete());
        assert_eq!(direct.attempted(), 0);
        assert!(broadcast.is_complete());
        assert_eq!(broadcast.attempted(), 0);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _log) = acking_connection(4);
        let id = registry
            .register(owner("a"), key("k"), handle, None)
            .await;

        // Close and error paths both fire.
        assert!(registry.deregister(&owner("a"), &key("k"), id).await);
        assert!(!registry.deregister(&owner("a"), &key("k"), id).await);

        let report = registry.send(&owner("a"), &key("k"), text("x")).await;
        assert_eq!(report.attempted(), 0);
    }

    #[tokio::test]
    async fn concurrent_termination_removes_once() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, _log) = acking_connection(4);
        let id = registry
            .register(owner("a"), key("k"), handle, None)
            .await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.deregister(&owner("a"), &key("k"), id).await
            }));
        }
        let mut removals = 0;
        for task in tasks {
            if let Ok(true) = task.await {
                removals += 1;
            }
        }
        assert_eq!(removals, 1);
    }

    #[tokio::test]
    async fn deregister_leaves_siblings_reachable() {
        let registry = ConnectionRegistry::new();
        let (c1, log1) = acking_connection(4);
        let (c2, log2) = acking_connection(4);
        let id1 = registry.register(owner("a"), key("k"), c1, None).await;
        registry.register(owner("a"), key("k"), c2, None).await;

        registry.deregister(&owner("a"), &key("k"), id1).await;
        let report = registry.send(&owner("a"), &key("k"), text("x")).await;

        assert_eq!(report.attempted(), 1);
        assert!(received(&log1).is_empty());
        assert_eq!(received(&log2), vec![text("x")]);
    }

    #[tokio::test]
    async fn send_failure_reports_target_without_removing_it() {
        let registry = ConnectionRegistry::new();
        let (good, log) = acking_connection(4);
        let bad = failing_connection();
        registry.register(owner("a"), key("k"), good, None).await;
        let bad_id = registry.register(owner("a"), key("k"), bad, None).await;

        let report = registry.send(&owner("a"), &key("k"), text("x")).await;

        assert_eq!(report.attempted(), 2);
        assert_eq!(report.delivered(), 1);
        assert!(!report.is_complete());
        let failures: Vec<_> = report
            .results()
            .iter()
            .filter(|t| t.result.is_err())
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures.first().map(|t| t.registration), Some(bad_id));
        // Sibling still got the payload; failed target stays registered.
        assert_eq!(received(&log), vec![text("x")]);
        assert_eq!(registry.connection_count(&owner("a"), &key("k")).await, 2);
    }

    #[tokio::test]
    async fn inbound_dispatch_invokes_handler() {
        let registry = ConnectionRegistry::new();
        let (handle, _log) = acking_connection(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let on_data: InboundHandler = Arc::new(move |payload| {
            assert_eq!(payload, &Payload::Text("hi".to_string()));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let id = registry
            .register(owner("a"), key("k"), handle, Some(on_data))
            .await;

        let dispatched = registry
            .dispatch_inbound(&owner("a"), &key("k"), id, &text("hi"))
            .await;

        assert!(dispatched);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inbound_without_handler_is_discarded() {
        let registry = ConnectionRegistry::new();
        let (handle, _log) = acking_connection(4);
        let id = registry
            .register(owner("a"), key("k"), handle, None)
            .await;

        let dispatched = registry
            .dispatch_inbound(&owner("a"), &key("k"), id, &text("hi"))
            .await;
        assert!(!dispatched);

        // Gone registrations are also a no-op.
        registry.deregister(&owner("a"), &key("k"), id).await;
        let dispatched = registry
            .dispatch_inbound(&owner("a"), &key("k"), id, &text("hi"))
            .await;
        assert!(!dispatched);
    }

    #[tokio::test]
    async fn relay_between_registered_owners() {
        // Directed-relay pattern: a's inbound handler parses the
        // envelope and re-sends to the recipient under the same key.
        let registry = Arc::new(ConnectionRegistry::new());
        let (c1, _log1) = acking_connection(4);
        let (c2, log2) = acking_connection(4);

        let relay_registry = Arc::downgrade(&registry);
        let on_data: InboundHandler = Arc::new(move |payload| {
            let Payload::Text(text) = payload else {
                return;
            };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
                return;
            };
            let Some(recipient) = value.get("recipient").and_then(|v| v.as_str()) else {
                return;
            };
            let Ok(recipient) = OwnerId::new(recipient) else {
                return;
            };
            let forwarded = serde_json::json!({
                "message": value.get("message"),
                "from": "a",
            })
            .to_string();
            let Some(registry) = relay_registry.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                let Ok(channel) = ChannelKey::new("messaging") else {
                    return;
                };
                registry
                    .send(&recipient, &channel, Payload::Text(forwarded))
                    .await;
            });
        });

        let a_id = registry
            .register(owner("a"), key("messaging"), c1, Some(on_data))
            .await;
        registry
            .register(owner("b"), key("messaging"), c2, None)
            .await;

        registry
            .dispatch_inbound(
                &owner("a"),
                &key("messaging"),
                a_id,
                &text(r#"{"message":"hi","recipient":"b"}"#),
            )
            .await;

        // The relay send runs on a spawned task.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let delivered = received(&log2);
        assert_eq!(delivered.len(), 1);
        let Some(Payload::Text(json)) = delivered.first() else {
            panic!("expected a text payload");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
            panic!("expected JSON payload");
        };
        assert_eq!(value.get("message").and_then(|v| v.as_str()), Some("hi"));
        assert_eq!(value.get("from").and_then(|v| v.as_str()), Some("a"));
    }

    #[tokio::test]
    async fn stats_count_owners_channels_connections() {
        let registry = ConnectionRegistry::new();
        let (c1, _l1) = acking_connection(4);
        let (c2, _l2) = acking_connection(4);
        let (c3, _l3) = acking_connection(4);
        registry.register(owner("a"), key("k1"), c1, None).await;
        registry.register(owner("a"), key("k2"), c2, None).await;
        registry.register(owner("b"), key("k1"), c3, None).await;

        let stats = registry.stats().await;
        assert_eq!(
            stats,
            RegistryStats {
                owners: 2,
                channels: 3,
                connections: 3,
            }
        );
    }

    #[tokio::test]
    async fn empty_buckets_are_garbage_collected() {
        let registry = ConnectionRegistry::new();
        let (handle, _log) = acking_connection(4);
        let id = registry
            .register(owner("a"), key("k"), handle, None)
            .await;
        registry.deregister(&owner("a"), &key("k"), id).await;

        let stats = registry.stats().await;
        assert_eq!(stats.owners, 0);
        assert_eq!(stats.channels, 0);
        assert_eq!(stats.connections, 0);
    }
}
