//! Process-scoped notification listener.
//!
//! One [`NotificationListener`] runs per process. It holds the only
//! subscription to the notification channel and pushes every payload into
//! the process's [`ConnectionRegistry`]. Connections come and go without
//! touching the subscription.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::channel::{NotificationChannel, Subscription};
use crate::domain::ConnectionRegistry;
use crate::error::NotifyError;

/// Exponential backoff used when re-subscribing after a channel outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first re-subscribe attempt.
    pub initial: Duration,
    /// Upper bound for the doubling delay.
    pub max: Duration,
}

impl RetryPolicy {
    /// Returns the delay following `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(10),
        }
    }
}

/// Handle to the running listener task.
///
/// Dropping the handle without calling [`Self::stop`] also stops the task,
/// but without waiting for the unsubscribe to finish.
#[derive(Debug)]
pub struct NotificationListener {
    channel_name: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl NotificationListener {
    /// Subscribes to `channel_name` and starts forwarding payloads to
    /// `registry`.
    ///
    /// # Errors
    ///
    /// Returns the [`NotifyError`] of the initial subscribe. Later
    /// disconnects are retried in the background with `retry`.
    pub async fn start(
        channel: Arc<dyn NotificationChannel>,
        channel_name: &str,
        registry: Arc<ConnectionRegistry>,
        retry: RetryPolicy,
    ) -> Result<Self, NotifyError> {
        let subscription = channel.subscribe(channel_name).await?;
        let (shutdown, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            channel,
            channel_name: channel_name.to_string(),
            registry,
            retry,
        };
        let task = tokio::spawn(worker.run(subscription, shutdown_rx));

        tracing::info!(channel = channel_name, "notification listener started");
        Ok(Self {
            channel_name: channel_name.to_string(),
            shutdown,
            task,
        })
    }

    /// Returns the channel this listener is subscribed to.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Unsubscribes and waits for the listener task to finish.
    pub async fn stop(self) {
        // The task may already have exited.
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::error!(channel = %self.channel_name, error = %e, "listener task failed");
        }
        tracing::info!(channel = %self.channel_name, "notification listener stopped");
    }
}

struct Worker {
    channel: Arc<dyn NotificationChannel>,
    channel_name: String,
    registry: Arc<ConnectionRegistry>,
    retry: RetryPolicy,
}

impl Worker {
    async fn run(
        self,
        mut subscription: Box<dyn Subscription>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            let received = tokio::select! {
                _ = &mut shutdown => None,
                received = subscription.recv() => Some(received),
            };

            match received {
                None => {
                    subscription.unsubscribe().await;
                    return;
                }
                Some(Ok(payload)) => {
                    self.registry.broadcast(&payload).await;
                }
                Some(Err(e)) => {
                    tracing::warn!(channel = %self.channel_name, error = %e, "subscription lost, payloads published until re-subscribe are missed");
                    drop(subscription);
                    match self.resubscribe(&mut shutdown).await {
                        Some(fresh) => subscription = fresh,
                        None => return,
                    }
                }
            }
        }
    }

    /// Retries the subscribe with backoff. Returns `None` on shutdown.
    async fn resubscribe(
        &self,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Option<Box<dyn Subscription>> {
        let mut delay = self.retry.initial;
        loop {
            tokio::select! {
                _ = &mut *shutdown => return None,
                () = tokio::time::sleep(delay) => {}
            }

            match self.channel.subscribe(&self.channel_name).await {
                Ok(subscription) => {
                    tracing::info!(channel = %self.channel_name, "re-subscribed");
                    return Some(subscription);
                }
                Err(e) => {
                    delay = self.retry.next_delay(delay);
                    tracing::warn!(channel = %self.channel_name, error = %e, retry_in = ?delay, "re-subscribe failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::channel::{InMemoryNotificationChannel, NOTIFICATION_CHANNEL};
    use crate::domain::ConnectionId;
    use crate::persistence::InMemoryChatStore;
    use crate::test_support::{RecordingChannel, RecordingSink, SinkBehavior, wait_until};

    const FAST_RETRY: RetryPolicy = RetryPolicy {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(40),
    };

    fn make_registry() -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new(
            Arc::new(InMemoryChatStore::new()),
            Duration::from_millis(200),
        ))
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let policy = RetryPolicy {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
        };
        let second = policy.next_delay(policy.initial);
        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(policy.next_delay(second), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn forwards_payloads_to_registry() {
        let hub = InMemoryNotificationChannel::new(16);
        let registry = make_registry();
        let (sink, frames) = RecordingSink::new(SinkBehavior::Ok);
        let _ = registry.connect(ConnectionId::from("x"), Box::new(sink)).await;

        let Ok(listener) = NotificationListener::start(
            Arc::new(hub.clone()),
            NOTIFICATION_CHANNEL,
            Arc::clone(&registry),
            FAST_RETRY,
        )
        .await
        else {
            panic!("listener failed to start");
        };

        let _ = hub.publish(NOTIFICATION_CHANNEL, "one").await;
        let _ = hub.publish(NOTIFICATION_CHANNEL, "two").await;

        assert!(wait_until(|| frames.frames().len() == 2).await);
        assert_eq!(frames.frames(), vec!["one".to_string(), "two".to_string()]);
        listener.stop().await;
    }

    #[tokio::test]
    async fn stop_unsubscribes() {
        let hub = InMemoryNotificationChannel::new(16);
        let Ok(listener) = NotificationListener::start(
            Arc::new(hub.clone()),
            NOTIFICATION_CHANNEL,
            make_registry(),
            FAST_RETRY,
        )
        .await
        else {
            panic!("listener failed to start");
        };
        assert_eq!(listener.channel_name(), NOTIFICATION_CHANNEL);
        assert_eq!(hub.subscriber_count(NOTIFICATION_CHANNEL).await, 1);

        listener.stop().await;
        assert_eq!(hub.subscriber_count(NOTIFICATION_CHANNEL).await, 0);
    }

    #[tokio::test]
    async fn resubscribes_after_channel_outage() {
        let hub = InMemoryNotificationChannel::new(16);
        let registry = make_registry();
        let (sink, frames) = RecordingSink::new(SinkBehavior::Ok);
        let _ = registry.connect(ConnectionId::from("x"), Box::new(sink)).await;

        let Ok(listener) = NotificationListener::start(
            Arc::new(hub.clone()),
            NOTIFICATION_CHANNEL,
            Arc::clone(&registry),
            FAST_RETRY,
        )
        .await
        else {
            panic!("listener failed to start");
        };

        hub.sever().await;
        let mut resubscribed = false;
        for _ in 0..100 {
            if hub.subscriber_count(NOTIFICATION_CHANNEL).await == 1 {
                resubscribed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(resubscribed);

        let _ = hub.publish(NOTIFICATION_CHANNEL, "after outage").await;
        assert!(wait_until(|| frames.frames() == vec!["after outage".to_string()]).await);
        listener.stop().await;
    }

    #[tokio::test]
    async fn initial_subscribe_failure_is_returned() {
        let channel = Arc::new(RecordingChannel::failing());
        let result =
            NotificationListener::start(channel, NOTIFICATION_CHANNEL, make_registry(), FAST_RETRY)
                .await;
        assert!(matches!(result, Err(NotifyError::Subscribe(_))));
    }

    /// Hub that can be told to refuse new subscriptions.
    #[derive(Debug)]
    struct RefusingChannel {
        hub: InMemoryNotificationChannel,
        refuse: AtomicBool,
    }

    #[async_trait]
    impl NotificationChannel for RefusingChannel {
        async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError> {
            self.hub.publish(channel, payload).await
        }

        async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, NotifyError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(NotifyError::Subscribe("connection refused".into()));
            }
            self.hub.subscribe(channel).await
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            self.0
                .lock()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut bytes) = self.0.lock() {
                bytes.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_resubscribe_logs_upcoming_delay() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let hub = InMemoryNotificationChannel::new(16);
        let channel = Arc::new(RefusingChannel {
            hub: hub.clone(),
            refuse: AtomicBool::new(false),
        });
        let Ok(listener) = NotificationListener::start(
            Arc::clone(&channel) as Arc<dyn NotificationChannel>,
            NOTIFICATION_CHANNEL,
            make_registry(),
            FAST_RETRY,
        )
        .await
        else {
            panic!("listener failed to start");
        };

        channel.refuse.store(true, Ordering::SeqCst);
        hub.sever().await;
        assert!(wait_until(|| logs.contents().contains("re-subscribe failed")).await);

        let contents = logs.contents();
        let Some(first_failure) = contents.lines().find(|l| l.contains("re-subscribe failed"))
        else {
            panic!("no failure logged");
        };
        // The first attempt waited FAST_RETRY.initial; the next one waits double.
        assert!(first_failure.contains("retry_in=20ms"), "{first_failure}");
        listener.stop().await;
    }
}
