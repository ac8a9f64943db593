use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use autocut_core::{CameraScore, Narration, SwitchDecision};

/// Default per-subscriber queue depth. Slow subscribers lose the oldest
/// events and a counter is bumped; publishers never block.
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Counters for events dropped on lagging subscribers, per topic.
#[derive(Debug, Default)]
pub struct DroppedCounters {
    pub scores: AtomicU64,
    pub switches: AtomicU64,
    pub narration: AtomicU64,
}

/// In-process pub/sub carrying the three logical topics. One instance per
/// run, shared by handle.
pub struct Bus {
    scores_tx: broadcast::Sender<CameraScore>,
    switch_tx: broadcast::Sender<SwitchDecision>,
    narration_tx: broadcast::Sender<Narration>,
    dropped: Arc<DroppedCounters>,
}

impl Bus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (scores_tx, _) = broadcast::channel(capacity);
        let (switch_tx, _) = broadcast::channel(capacity);
        let (narration_tx, _) = broadcast::channel(capacity);
        Self {
            scores_tx,
            switch_tx,
            narration_tx,
            dropped: Arc::new(DroppedCounters::default()),
        }
    }

    /// Publish a score. No receivers is not an error.
    pub fn publish_score(&self, score: CameraScore) {
        let _ = self.scores_tx.send(score);
    }

    pub fn publish_decision(&self, decision: SwitchDecision) {
        let _ = self.switch_tx.send(decision);
    }

    pub fn publish_narration(&self, narration: Narration) {
        let _ = self.narration_tx.send(narration);
    }

    pub fn subscribe_scores(&self) -> Subscription<CameraScore> {
        Subscription::new(self.scores_tx.subscribe(), self.dropped.clone(), Topic::Scores)
    }

    pub fn subscribe_switches(&self) -> Subscription<SwitchDecision> {
        Subscription::new(self.switch_tx.subscribe(), self.dropped.clone(), Topic::Switches)
    }

    pub fn subscribe_narration(&self) -> Subscription<Narration> {
        Subscription::new(
            self.narration_tx.subscribe(),
            self.dropped.clone(),
            Topic::Narration,
        )
    }

    pub fn dropped(&self) -> &DroppedCounters {
        &self.dropped
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum Topic {
    Scores,
    Switches,
    Narration,
}

/// A bounded subscription to one topic. Lag (dropped events) is counted and
/// the stream resumes at the oldest retained event rather than erroring.
pub struct Subscription<T> {
    stream: Pin<Box<BroadcastStream<T>>>,
    dropped: Arc<DroppedCounters>,
    topic: Topic,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    fn new(rx: broadcast::Receiver<T>, dropped: Arc<DroppedCounters>, topic: Topic) -> Self {
        Self {
            stream: Box::pin(BroadcastStream::new(rx)),
            dropped,
            topic,
        }
    }

    fn count_lag(&self, n: u64) {
        let counter = match self.topic {
            Topic::Scores => &self.dropped.scores,
            Topic::Switches => &self.dropped.switches,
            Topic::Narration => &self.dropped.narration,
        };
        counter.fetch_add(n, Ordering::Relaxed);
        tracing::debug!("subscriber lagged, dropped {} events", n);
    }
}

impl<T: Clone + Send + 'static> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.get_mut();
        loop {
            match me.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(item)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(n)))) => {
                    me.count_lag(n);
                    continue;
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
