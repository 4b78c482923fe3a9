//! Process-local registry of live connections and the fan-out to them.
//!
//! [`ConnectionRegistry`] maps each [`ConnectionId`] to the transport handle
//! it exclusively owns. A single [`tokio::sync::Mutex`] guards the map:
//! `connect`, `disconnect`, and the whole send loop of `broadcast` run
//! under it, so a broadcast never sees a half-updated map and two
//! broadcasts never interleave on the same handle.
//!
//! Slow I/O is kept out of the critical section where it can be: durable
//! bookkeeping through the [`ChatStore`] and handle closes happen after the
//! lock is released. Sends themselves run concurrently inside the lock,
//! each bounded by the configured send timeout. Store calls are bounded by
//! their own timeout.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{Mutex, oneshot};

use super::{ClientSink, ConnectionId};
use crate::error::{DuplicateConnectionError, TransportSendError};
use crate::persistence::{ChatStore, DEFAULT_STORE_TIMEOUT, bounded};

/// Outcome of one [`ConnectionRegistry::broadcast`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of handles the payload was written to.
    pub delivered: usize,
    /// Connections whose send failed; they have been released.
    pub dropped: Vec<ConnectionId>,
}

/// Resolves once the registry has released the connection it was issued
/// for, whether by [`ConnectionRegistry::disconnect`] or after a failed
/// send.
///
/// The transport's read side waits on it so that a connection dropped by
/// the registry stops accepting frames.
#[derive(Debug)]
pub struct Released(oneshot::Receiver<()>);

impl Future for Released {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // A dropped sender means the entry is gone too.
        Pin::new(&mut self.0).poll(cx).map(|_| ())
    }
}

struct Entry {
    sink: Box<dyn ClientSink>,
    released: oneshot::Sender<()>,
}

/// Owner of every locally held connection.
///
/// One instance exists per process and is shared by reference with the
/// WebSocket handler, the request handlers, and the notification listener.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Entry>>,
    store: Arc<dyn ChatStore>,
    send_timeout: Duration,
    store_timeout: Duration,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("store", &self.store)
            .field("send_timeout", &self.send_timeout)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    ///
    /// `send_timeout` bounds every individual send and close on a handle.
    /// Store calls use [`DEFAULT_STORE_TIMEOUT`] unless overridden with
    /// [`Self::with_store_timeout`].
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, send_timeout: Duration) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            store,
            send_timeout,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Sets the bound on each open-connection table write.
    #[must_use]
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Registers a handshake-completed handle under `id`.
    ///
    /// The id is recorded as open in the durable store before the handle
    /// becomes visible to broadcasts, so a release can never run ahead of
    /// the record it deletes. A failure of that write is logged and does
    /// not prevent the live registration.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateConnectionError`] if `id` is already registered in
    /// this process. The rejected handle is dropped.
    pub async fn connect(
        &self,
        id: ConnectionId,
        handle: Box<dyn ClientSink>,
    ) -> Result<Released, DuplicateConnectionError> {
        if self.connections.lock().await.contains_key(&id) {
            return Err(DuplicateConnectionError(id));
        }

        if let Err(e) = bounded(self.store_timeout, self.store.register_connection(&id)).await {
            tracing::warn!(connection_id = %id, error = %e, "failed to record open connection");
        }

        let (released_tx, released_rx) = oneshot::channel();
        {
            let mut map = self.connections.lock().await;
            // Lost a race with a concurrent connect of the same id; its
            // record is the one in the store.
            if map.contains_key(&id) {
                return Err(DuplicateConnectionError(id));
            }
            map.insert(
                id.clone(),
                Entry {
                    sink: handle,
                    released: released_tx,
                },
            );
        }

        tracing::info!(connection_id = %id, "connection registered");
        Ok(Released(released_rx))
    }

    /// Removes `id`, closes its handle, and drops it from the durable store.
    ///
    /// Idempotent: returns `false` without side effects when `id` is not
    /// registered, so repeated disconnect signals never double-close or
    /// double-delete.
    pub async fn disconnect(&self, id: &ConnectionId) -> bool {
        let removed = self.connections.lock().await.remove(id);
        match removed {
            Some(entry) => {
                self.release(id.clone(), entry).await;
                true
            }
            None => false,
        }
    }

    /// Delivers `payload` to every registered handle.
    ///
    /// Sends run concurrently, each bounded by the send timeout. A handle
    /// whose send fails or times out is removed within the same critical
    /// section and then released like [`Self::disconnect`]; the remaining
    /// handles are unaffected. Releases also run concurrently, so the call
    /// is bounded by one send timeout plus one release.
    pub async fn broadcast(&self, payload: &str) -> BroadcastReport {
        let timeout = self.send_timeout;
        let mut map = self.connections.lock().await;

        let sends = map.iter_mut().map(|(id, entry)| async move {
            let outcome = bounded_send(entry.sink.as_mut(), payload, timeout).await;
            (id, outcome)
        });
        let outcomes = join_all(sends).await;

        let mut report = BroadcastReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "dropping dead connection");
                    report.dropped.push(id.clone());
                }
            }
        }

        let dead: Vec<_> = report
            .dropped
            .iter()
            .filter_map(|id| map.remove_entry(id))
            .collect();
        drop(map);

        join_all(dead.into_iter().map(|(id, entry)| self.release(id, entry))).await;

        tracing::debug!(
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "broadcast complete"
        );
        report
    }

    /// Sends a single frame to one local connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportSendError::Closed`] if `id` is not registered, or
    /// the send failure, in which case the connection is released.
    pub async fn send_to(&self, id: &ConnectionId, text: &str) -> Result<(), TransportSendError> {
        let mut map = self.connections.lock().await;
        let entry = map.get_mut(id).ok_or(TransportSendError::Closed)?;
        let outcome = bounded_send(entry.sink.as_mut(), text, self.send_timeout).await;

        if let Err(e) = outcome {
            let removed = map.remove(id);
            drop(map);
            if let Some(entry) = removed {
                tracing::warn!(connection_id = %id, error = %e, "dropping dead connection");
                self.release(id.clone(), entry).await;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Returns the number of live local connections.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Returns the ids of all live local connections, sorted.
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        let map = self.connections.lock().await;
        let mut ids: Vec<_> = map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Tears down an entry that has already left the map: signals the
    /// reader, closes the handle, and forgets the id.
    async fn release(&self, id: ConnectionId, entry: Entry) {
        let Entry {
            mut sink,
            released,
        } = entry;
        // The reader may already be gone.
        let _ = released.send(());

        if tokio::time::timeout(self.send_timeout, sink.close())
            .await
            .is_err()
        {
            tracing::debug!(connection_id = %id, "close timed out");
        }
        if let Err(e) = bounded(self.store_timeout, self.store.remove_connection(&id)).await {
            tracing::warn!(connection_id = %id, error = %e, "failed to remove open connection");
        }
        tracing::info!(connection_id = %id, "connection released");
    }
}

/// Runs one send under `timeout`.
async fn bounded_send(
    handle: &mut dyn ClientSink,
    text: &str,
    timeout: Duration,
) -> Result<(), TransportSendError> {
    match tokio::time::timeout(timeout, handle.send_text(text)).await {
        Ok(result) => result,
        Err(_) => Err(TransportSendError::TimedOut(timeout)),
    }
}
