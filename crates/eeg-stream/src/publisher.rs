//! Best-effort fan-out of classification results
//!
//! Each result is serialized once and offered to every subscriber. A sink
//! that reports itself disconnected is evicted; nothing a subscriber does is
//! ever surfaced to the publisher's caller.

use dashmap::DashMap;
use eeg_core::ClassificationResult;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Opaque handle identifying one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        SubscriberId(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One result as delivered to subscribers
#[derive(Debug, Clone)]
pub struct Published {
    pub result: Arc<ClassificationResult>,
    /// `{"timestamp", "features", "label"}` JSON record
    pub payload: Arc<str>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Subscriber is gone; it will be evicted
    #[error("subscriber disconnected")]
    Disconnected,
    /// Subscriber is alive but not keeping up; this record is dropped for it
    #[error("subscriber queue full")]
    Full,
    /// Transport-level send failure; treated as a disconnect
    #[error("send failed: {0}")]
    Failed(String),
}

/// Transport-facing end of a subscription
///
/// `send` must not block; slow transports should queue.
pub trait ResultSink: Send + Sync {
    fn send(&self, record: &Published) -> Result<(), SinkError>;
}

/// Sink backed by a bounded tokio channel
pub struct ChannelSink {
    sender: mpsc::Sender<Published>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<Published>) -> Self {
        Self { sender }
    }
}

impl ResultSink for ChannelSink {
    fn send(&self, record: &Published) -> Result<(), SinkError> {
        self.sender.try_send(record.clone()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Disconnected,
        })
    }
}

/// Receiving end handed out by [`StreamPublisher::subscribe`]
///
/// Dropping it disconnects; the publisher evicts it on the next publish.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Published>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next record in publish order, `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<Published> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Published> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    pub evicted: usize,
}

/// Registry of live subscribers
///
/// Publishing iterates a snapshot of the registry, so subscribe and
/// unsubscribe may run concurrently with a publish without blocking it.
pub struct StreamPublisher {
    subscribers: DashMap<SubscriberId, Arc<dyn ResultSink>>,
    queue_capacity: usize,
    published: AtomicU64,
    evicted: AtomicU64,
}

impl StreamPublisher {
    /// `queue_capacity` bounds each [`subscribe`](Self::subscribe) queue
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
            published: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Join with a fresh bounded queue
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = self.subscribe_sink(Arc::new(ChannelSink::new(sender)));
        Subscription { id, receiver }
    }

    /// Join with a caller-provided transport
    pub fn subscribe_sink(&self, sink: Arc<dyn ResultSink>) -> SubscriberId {
        let id = SubscriberId::new();
        self.subscribers.insert(id, sink);
        info!(subscriber = %id, total = self.subscribers.len(), "subscriber added");
        id
    }

    /// Returns false if the handle was already gone
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            info!(subscriber = %id, total = self.subscribers.len(), "subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Serialize once and offer to every current subscriber
    pub fn publish(&self, result: &ClassificationResult) -> PublishReport {
        let payload: Arc<str> = match result.to_json() {
            Ok(json) => json.into(),
            Err(err) => {
                error!(error = %err, "failed to serialize result");
                return PublishReport::default();
            }
        };
        let record = Published {
            result: Arc::new(result.clone()),
            payload,
        };

        let targets: Vec<(SubscriberId, Arc<dyn ResultSink>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (id, sink) in targets {
            match sink.send(&record) {
                Ok(()) => report.delivered += 1,
                Err(SinkError::Full) => {
                    report.dropped += 1;
                    warn!(subscriber = %id, "subscriber lagging, record dropped");
                }
                Err(err) => {
                    debug!(subscriber = %id, error = %err, "send failed");
                    failed.push(id);
                }
            }
        }

        for id in failed {
            // A concurrent unsubscribe may have removed it already
            if self.subscribers.remove(&id).is_some() {
                report.evicted += 1;
                warn!(subscriber = %id, "subscriber evicted");
            }
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        self.evicted.fetch_add(report.evicted as u64, Ordering::Relaxed);
        report
    }
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::FeatureVector;
    use std::sync::Mutex;

    fn result(label: &str) -> ClassificationResult {
        let features = FeatureVector::from_powers([0.1, 0.2, 0.3, 0.4]).unwrap();
        ClassificationResult::new(features, label, 1_700_000_000.0)
    }

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn send(&self, _record: &Published) -> Result<(), SinkError> {
            Err(SinkError::Failed("connection reset".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        labels: Mutex<Vec<String>>,
    }

    impl ResultSink for RecordingSink {
        fn send(&self, record: &Published) -> Result<(), SinkError> {
            self.labels
                .lock()
                .map_err(|_| SinkError::Failed("poisoned".to_string()))?
                .push(record.result.label.clone());
            Ok(())
        }
    }

    #[test]
    fn test_failing_subscriber_evicted_others_still_receive() {
        let publisher = StreamPublisher::new(8);
        let mut healthy = publisher.subscribe();
        let recording = Arc::new(RecordingSink::default());
        publisher.subscribe_sink(recording.clone());
        publisher.subscribe_sink(Arc::new(FailingSink));
        assert_eq!(publisher.subscriber_count(), 3);

        let report = publisher.publish(&result("calm"));
        assert_eq!(report, PublishReport { delivered: 2, dropped: 0, evicted: 1 });
        assert_eq!(publisher.subscriber_count(), 2);

        let report = publisher.publish(&result("anxious"));
        assert_eq!(report.evicted, 0);

        assert_eq!(healthy.try_recv().unwrap().result.label, "calm");
        assert_eq!(healthy.try_recv().unwrap().result.label, "anxious");
        assert_eq!(*recording.labels.lock().unwrap(), vec!["calm", "anxious"]);
        assert_eq!(publisher.evicted_count(), 1);
    }

    #[test]
    fn test_dropped_subscription_is_evicted() {
        let publisher = StreamPublisher::new(8);
        let subscription = publisher.subscribe();
        drop(subscription);

        let report = publisher.publish(&result("calm"));
        assert_eq!(report.evicted, 1);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_full_queue_drops_without_eviction() {
        let publisher = StreamPublisher::new(1);
        let mut slow = publisher.subscribe();

        publisher.publish(&result("first"));
        let report = publisher.publish(&result("second"));

        assert_eq!(report.dropped, 1);
        assert_eq!(publisher.subscriber_count(), 1);
        assert_eq!(slow.try_recv().unwrap().result.label, "first");
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn test_unsubscribe() {
        let publisher = StreamPublisher::default();
        let mut subscription = publisher.subscribe();

        assert!(publisher.unsubscribe(subscription.id()));
        assert!(!publisher.unsubscribe(subscription.id()));
        assert_eq!(publisher.publish(&result("calm")), PublishReport::default());
        assert!(subscription.try_recv().is_none());
    }

    #[test]
    fn test_payload_is_wire_record() {
        let publisher = StreamPublisher::default();
        let mut subscription = publisher.subscribe();
        publisher.publish(&result("calm"));

        let record = subscription.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&record.payload).unwrap();
        assert_eq!(value["label"], "calm");
        assert_eq!(value["timestamp"], 1_700_000_000.0);
        assert_eq!(value["features"]["beta"], 0.4);
    }

    #[test]
    fn test_concurrent_membership_changes_during_publish() {
        let publisher = Arc::new(StreamPublisher::new(1024));
        let churn = {
            let publisher = publisher.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let subscription = publisher.subscribe();
                    publisher.unsubscribe(subscription.id());
                }
            })
        };

        let mut steady = publisher.subscribe();
        for i in 0..500 {
            publisher.publish(&result(&i.to_string()));
        }
        churn.join().unwrap();

        for i in 0..500 {
            assert_eq!(steady.try_recv().unwrap().result.label, i.to_string());
        }
    }
}
