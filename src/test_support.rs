//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::channel::{NotificationChannel, Subscription};
use crate::domain::{ClientSink, ConnectionId, MessageRecord};
use crate::error::{NotifyError, PersistenceError, TransportSendError};
use crate::persistence::{ChatStore, InMemoryChatStore, OpenConnection};

/// How a [`RecordingSink`] reacts to sends.
#[derive(Debug, Clone, Copy)]
pub enum SinkBehavior {
    Ok,
    Fail,
    Hang,
    Delay(Duration),
}

#[derive(Debug, Default)]
struct SinkLog {
    frames: Vec<String>,
    closes: usize,
}

/// Read side of a [`RecordingSink`], kept by the test.
#[derive(Debug, Clone, Default)]
pub struct SinkProbe(Arc<Mutex<SinkLog>>);

impl SinkProbe {
    pub fn frames(&self) -> Vec<String> {
        self.0.lock().map(|log| log.frames.clone()).unwrap_or_default()
    }

    pub fn close_count(&self) -> usize {
        self.0.lock().map(|log| log.closes).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

/// [`ClientSink`] that records frames instead of writing them.
#[derive(Debug)]
pub struct RecordingSink {
    behavior: SinkBehavior,
    log: SinkProbe,
}

impl RecordingSink {
    pub fn new(behavior: SinkBehavior) -> (Self, SinkProbe) {
        let probe = SinkProbe::default();
        let sink = Self {
            behavior,
            log: probe.clone(),
        };
        (sink, probe)
    }
}

#[async_trait]
impl ClientSink for RecordingSink {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportSendError> {
        match self.behavior {
            SinkBehavior::Ok => {}
            SinkBehavior::Fail => return Err(TransportSendError::Failed("broken pipe".into())),
            SinkBehavior::Hang => std::future::pending::<()>().await,
            SinkBehavior::Delay(delay) => tokio::time::sleep(delay).await,
        }
        if let Ok(mut log) = self.log.0.lock() {
            log.frames.push(text.to_string());
        }
        Ok(())
    }

    async fn close(&mut self) {
        if let Ok(mut log) = self.log.0.lock() {
            log.closes += 1;
        }
    }
}

/// Store that rejects every call.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait]
impl ChatStore for FailingStore {
    async fn append(&self, _: &str, _: &str) -> Result<MessageRecord, PersistenceError> {
        Err(PersistenceError("database unavailable".into()))
    }

    async fn register_connection(&self, _: &ConnectionId) -> Result<(), PersistenceError> {
        Err(PersistenceError("database unavailable".into()))
    }

    async fn remove_connection(&self, _: &ConnectionId) -> Result<(), PersistenceError> {
        Err(PersistenceError("database unavailable".into()))
    }

    async fn list_open_connections(&self) -> Result<Vec<ConnectionId>, PersistenceError> {
        Err(PersistenceError("database unavailable".into()))
    }

    async fn find_connection(
        &self,
        _: &ConnectionId,
    ) -> Result<Option<OpenConnection>, PersistenceError> {
        Err(PersistenceError("database unavailable".into()))
    }

    async fn recent_messages(&self, _: u32) -> Result<Vec<MessageRecord>, PersistenceError> {
        Err(PersistenceError("database unavailable".into()))
    }
}

/// Store whose calls never complete.
#[derive(Debug)]
pub struct HangingStore;

#[async_trait]
impl ChatStore for HangingStore {
    async fn append(&self, _: &str, _: &str) -> Result<MessageRecord, PersistenceError> {
        std::future::pending().await
    }

    async fn register_connection(&self, _: &ConnectionId) -> Result<(), PersistenceError> {
        std::future::pending().await
    }

    async fn remove_connection(&self, _: &ConnectionId) -> Result<(), PersistenceError> {
        std::future::pending().await
    }

    async fn list_open_connections(&self) -> Result<Vec<ConnectionId>, PersistenceError> {
        std::future::pending().await
    }

    async fn find_connection(
        &self,
        _: &ConnectionId,
    ) -> Result<Option<OpenConnection>, PersistenceError> {
        std::future::pending().await
    }

    async fn recent_messages(&self, _: u32) -> Result<Vec<MessageRecord>, PersistenceError> {
        std::future::pending().await
    }
}

/// In-memory store whose `register_connection` takes `delay` to land.
#[derive(Debug)]
pub struct SlowRegisterStore {
    inner: Arc<InMemoryChatStore>,
    delay: Duration,
}

impl SlowRegisterStore {
    pub fn new(inner: Arc<InMemoryChatStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl ChatStore for SlowRegisterStore {
    async fn append(&self, username: &str, body: &str) -> Result<MessageRecord, PersistenceError> {
        self.inner.append(username, body).await
    }

    async fn register_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.register_connection(id).await
    }

    async fn remove_connection(&self, id: &ConnectionId) -> Result<(), PersistenceError> {
        self.inner.remove_connection(id).await
    }

    async fn list_open_connections(&self) -> Result<Vec<ConnectionId>, PersistenceError> {
        self.inner.list_open_connections().await
    }

    async fn find_connection(
        &self,
        id: &ConnectionId,
    ) -> Result<Option<OpenConnection>, PersistenceError> {
        self.inner.find_connection(id).await
    }

    async fn recent_messages(&self, limit: u32) -> Result<Vec<MessageRecord>, PersistenceError> {
        self.inner.recent_messages(limit).await
    }
}

/// Store that only counts connection-table calls.
#[derive(Debug, Default)]
pub struct CountingStore {
    registered: AtomicUsize,
    removed: AtomicUsize,
}

impl CountingStore {
    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatStore for CountingStore {
    async fn append(&self, username: &str, body: &str) -> Result<MessageRecord, PersistenceError> {
        Ok(MessageRecord {
            id: 1,
            username: username.to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn register_connection(&self, _: &ConnectionId) -> Result<(), PersistenceError> {
        self.registered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_connection(&self, _: &ConnectionId) -> Result<(), PersistenceError> {
        self.removed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_open_connections(&self) -> Result<Vec<ConnectionId>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn find_connection(
        &self,
        _: &ConnectionId,
    ) -> Result<Option<OpenConnection>, PersistenceError> {
        Ok(None)
    }

    async fn recent_messages(&self, _: u32) -> Result<Vec<MessageRecord>, PersistenceError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum ChannelBehavior {
    #[default]
    Ok,
    Fail,
    Hang,
}

/// Channel that records publishes and never delivers them.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    behavior: ChannelBehavior,
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            behavior: ChannelBehavior::Fail,
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: ChannelBehavior::Hang,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn publish_count(&self) -> usize {
        self.published().len()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError> {
        if let Ok(mut published) = self.published.lock() {
            published.push((channel.to_string(), payload.to_string()));
        }
        match self.behavior {
            ChannelBehavior::Ok => Ok(()),
            ChannelBehavior::Fail => Err(NotifyError::Publish("connection refused".into())),
            ChannelBehavior::Hang => std::future::pending().await,
        }
    }

    async fn subscribe(&self, _: &str) -> Result<Box<dyn Subscription>, NotifyError> {
        Err(NotifyError::Subscribe("connection refused".into()))
    }
}

/// Polls `condition` every 10ms for up to two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
