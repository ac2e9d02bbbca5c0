//! Replay-latest fan-out of price records
//!
//! Every new subscription is first handed the most recent record of each
//! ticker, then attached to a bounded `tokio::sync::broadcast` channel for
//! live updates. Taking the replay snapshot and attaching the receiver happen
//! under the same lock `publish` holds, so a subscriber sees every record
//! exactly once: either in its replay or live.
//!
//! A subscriber that falls more than `capacity` records behind is brought back
//! to the present: everything it missed collapses to the newest record per
//! ticker, and live delivery resumes from there. The publisher never waits on
//! a subscriber.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use uuid::Uuid;

use crate::{
    metrics::MetricsCollector,
    types::{EngineEvent, PriceRecord, Ticker},
};

/// Latest record per ticker plus the publish sequence it arrived at
#[derive(Default)]
struct ReplayState {
    latest: HashMap<Ticker, (u64, Arc<PriceRecord>)>,
    next_seq: u64,
}

impl ReplayState {
    /// Latest records in the order they were published
    fn snapshot(&self, filter: Option<&Ticker>) -> VecDeque<Arc<PriceRecord>> {
        let mut entries: Vec<_> = self
            .latest
            .iter()
            .filter(|(ticker, _)| filter.map_or(true, |f| f == *ticker))
            .map(|(_, (seq, record))| (*seq, record.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, record)| record).collect()
    }
}

/// Fans out price records to any number of independent subscribers
pub struct PriceBroadcaster {
    state: Mutex<ReplayState>,
    tx: broadcast::Sender<Arc<PriceRecord>>,
    events: broadcast::Sender<EngineEvent>,
    metrics: Arc<MetricsCollector>,
}

impl PriceBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` records per subscriber
    pub fn new(
        capacity: usize,
        events: broadcast::Sender<EngineEvent>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(ReplayState::default()),
            tx,
            events,
            metrics,
        }
    }

    fn state(&self) -> MutexGuard<'_, ReplayState> {
        // The guarded map stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes a record to every live subscriber
    ///
    /// # Returns
    /// The number of subscribers the record was queued for (0 when nobody is
    /// listening, which is not an error)
    pub(crate) fn publish(&self, record: Arc<PriceRecord>) -> usize {
        let mut state = self.state();
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .latest
            .insert(record.ticker().clone(), (seq, record.clone()));

        self.tx.send(record).unwrap_or(0)
    }

    /// Opens a subscription over every ticker
    pub fn subscribe(&self) -> Subscription {
        self.open(None)
    }

    /// Opens a subscription that only yields records for `ticker`
    pub fn subscribe_ticker(&self, ticker: Ticker) -> Subscription {
        self.open(Some(ticker))
    }

    fn open(&self, filter: Option<Ticker>) -> Subscription {
        let (replay, rx) = {
            let state = self.state();
            (state.snapshot(filter.as_ref()), self.tx.subscribe())
        };

        let subscription = Subscription {
            id: Uuid::new_v4(),
            filter,
            replay,
            rx,
            metrics: self.metrics.clone(),
            events: self.events.clone(),
            delivered: 0,
            skipped: 0,
        };

        tracing::info!(
            subscription_id = %subscription.id,
            ticker = subscription.filter.as_ref().map(Ticker::symbol),
            replayed = subscription.replay.len(),
            subscribers = self.subscriber_count(),
            "Subscription opened"
        );

        subscription
    }

    /// Most recent record of every ticker, in publish order
    pub fn latest(&self) -> Vec<Arc<PriceRecord>> {
        self.state().snapshot(None).into_iter().collect()
    }

    /// Number of subscriptions currently alive
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One consumer of the broadcast stream
///
/// Yields the replayed latest records first, then live records in publish
/// order. Dropping the subscription detaches it immediately.
pub struct Subscription {
    id: Uuid,
    filter: Option<Ticker>,
    replay: VecDeque<Arc<PriceRecord>>,
    rx: broadcast::Receiver<Arc<PriceRecord>>,
    metrics: Arc<MetricsCollector>,
    events: broadcast::Sender<EngineEvent>,
    delivered: u64,
    skipped: u64,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Records handed to this consumer so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Records this consumer lost by falling behind
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Waits for the next record
    ///
    /// # Returns
    /// `None` only once the broadcaster itself has been dropped
    pub async fn recv(&mut self) -> Option<Arc<PriceRecord>> {
        if let Some(record) = self.replay.pop_front() {
            self.delivered += 1;
            return Some(record);
        }

        loop {
            match self.rx.recv().await {
                Ok(record) => {
                    if self.accepts(&record) {
                        self.delivered += 1;
                        return Some(record);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    let skipped = missed + self.catch_up();
                    tracing::warn!(
                        subscription_id = %self.id,
                        skipped = skipped,
                        "Subscriber fell behind, dropping to latest"
                    );
                    self.skipped += skipped;
                    self.metrics.record_overrun(skipped).await;

                    if let Some(record) = self.replay.pop_front() {
                        self.delivered += 1;
                        return Some(record);
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Drains the backlog, queueing only the newest record of each ticker
    ///
    /// Returns how many backlog records were superseded or lost meanwhile.
    fn catch_up(&mut self) -> u64 {
        let mut newest: Vec<Arc<PriceRecord>> = Vec::new();
        let mut dropped = 0;

        loop {
            match self.rx.try_recv() {
                Ok(record) => {
                    if !self.accepts(&record) {
                        continue;
                    }
                    if let Some(pos) = newest.iter().position(|r| r.ticker() == record.ticker()) {
                        newest.remove(pos);
                        dropped += 1;
                    }
                    newest.push(record);
                }
                Err(TryRecvError::Lagged(missed)) => dropped += missed,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        self.replay.extend(newest);
        dropped
    }

    fn accepts(&self, record: &PriceRecord) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |ticker| ticker == record.ticker())
    }

    /// Turns the subscription into a lazy `Stream` of records
    pub fn into_stream(self) -> impl Stream<Item = Arc<PriceRecord>> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            let record = subscription.recv().await?;
            Some((record, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::info!(
            subscription_id = %self.id,
            delivered = self.delivered,
            skipped = self.skipped,
            "Subscription closed"
        );
        let _ = self.events.send(EngineEvent::SubscriptionClosed {
            id: Uuid::new_v4(),
            subscription_id: self.id,
            delivered: self.delivered,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rand::Rng;
    use std::time::Duration;
    use tokio::time::timeout;

    fn broadcaster(capacity: usize) -> (PriceBroadcaster, Arc<MetricsCollector>) {
        let metrics = Arc::new(MetricsCollector::new("mock"));
        let (events, _) = broadcast::channel(16);
        (
            PriceBroadcaster::new(capacity, events, metrics.clone()),
            metrics,
        )
    }

    fn record(ticker: &str, price: f64) -> Arc<PriceRecord> {
        Arc::new(PriceRecord::new(Ticker::new(ticker), price))
    }

    async fn next_price(subscription: &mut Subscription) -> (String, f64) {
        let record = timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("record expected")
            .expect("broadcaster alive");
        (record.ticker().to_string(), record.price())
    }

    async fn assert_idle(subscription: &mut Subscription) {
        assert!(
            timeout(Duration::from_millis(50), subscription.recv())
                .await
                .is_err(),
            "no further record expected"
        );
    }

    #[tokio::test]
    async fn test_new_subscriber_gets_latest_per_ticker_only() {
        let (broadcaster, _) = broadcaster(16);
        broadcaster.publish(record("APPLE", 91.0));
        broadcaster.publish(record("APPLE", 92.0));
        broadcaster.publish(record("GOOGLE", 95.0));

        let mut subscription = broadcaster.subscribe();
        assert_eq!(next_price(&mut subscription).await, ("APPLE".to_string(), 92.0));
        assert_eq!(next_price(&mut subscription).await, ("GOOGLE".to_string(), 95.0));
        assert_idle(&mut subscription).await;

        broadcaster.publish(record("APPLE", 93.0));
        assert_eq!(next_price(&mut subscription).await, ("APPLE".to_string(), 93.0));
        assert_eq!(subscription.delivered(), 3);
    }

    #[tokio::test]
    async fn test_no_duplicates_between_replay_and_live() {
        let (broadcaster, _) = broadcaster(16);
        broadcaster.publish(record("APPLE", 90.0));

        let mut subscription = broadcaster.subscribe();
        broadcaster.publish(record("APPLE", 91.0));

        assert_eq!(next_price(&mut subscription).await, ("APPLE".to_string(), 90.0));
        assert_eq!(next_price(&mut subscription).await, ("APPLE".to_string(), 91.0));
        assert_idle(&mut subscription).await;
    }

    #[tokio::test]
    async fn test_subscribers_see_same_live_sequence() {
        let (broadcaster, _) = broadcaster(16);
        let mut early = broadcaster.subscribe();
        broadcaster.publish(record("APPLE", 90.0));
        let mut late = broadcaster.subscribe();

        // The late subscriber replays APPLE 90; drain it and the early live copy
        assert_eq!(next_price(&mut early).await, ("APPLE".to_string(), 90.0));
        assert_eq!(next_price(&mut late).await, ("APPLE".to_string(), 90.0));

        for price in [94.0, 96.0, 98.0] {
            broadcaster.publish(record("GOOGLE", price));
        }

        let mut seen_early = Vec::new();
        let mut seen_late = Vec::new();
        for _ in 0..3 {
            seen_early.push(next_price(&mut early).await);
            seen_late.push(next_price(&mut late).await);
        }
        assert_eq!(seen_early, seen_late);
        assert_eq!(seen_early[2], ("GOOGLE".to_string(), 98.0));
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_to_latest() {
        let (broadcaster, metrics) = broadcaster(2);
        let mut slow = broadcaster.subscribe();

        for price in 1..=5 {
            broadcaster.publish(record("APPLE", f64::from(price)));
        }

        assert_eq!(next_price(&mut slow).await, ("APPLE".to_string(), 5.0));
        assert_idle(&mut slow).await;
        assert_eq!(slow.skipped(), 4);
        assert_eq!(metrics.get_metrics().await.overrun_records, 4);

        broadcaster.publish(record("APPLE", 6.0));
        assert_eq!(next_price(&mut slow).await, ("APPLE".to_string(), 6.0));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_resumes_at_newest_per_ticker() {
        let (broadcaster, _) = broadcaster(4);
        let mut slow = broadcaster.subscribe();

        // Five cycles over three tickers overflow the four-slot buffer
        for cycle in 1..=5 {
            for (i, ticker) in ["APPLE", "GOOGLE", "AMAZON"].into_iter().enumerate() {
                broadcaster.publish(record(ticker, f64::from(cycle * 10 + i as u32)));
            }
        }

        assert_eq!(next_price(&mut slow).await, ("APPLE".to_string(), 50.0));
        assert_eq!(next_price(&mut slow).await, ("GOOGLE".to_string(), 51.0));
        assert_eq!(next_price(&mut slow).await, ("AMAZON".to_string(), 52.0));
        assert_idle(&mut slow).await;
        assert_eq!(slow.skipped(), 12);

        broadcaster.publish(record("GOOGLE", 61.0));
        assert_eq!(next_price(&mut slow).await, ("GOOGLE".to_string(), 61.0));
        assert_eq!(slow.delivered(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_sees_no_gaps_or_duplicates() {
        const LAST: u32 = 500;
        let (broadcaster, _) = broadcaster(1024);
        let broadcaster = Arc::new(broadcaster);

        let publisher = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move {
                for seq in 1..=LAST {
                    broadcaster.publish(record("APPLE", f64::from(seq)));
                    if seq % 8 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let readers: Vec<_> = (0..16)
            .map(|_| {
                let broadcaster = broadcaster.clone();
                tokio::spawn(async move {
                    let pause = rand::rng().random_range(0..64);
                    for _ in 0..pause {
                        tokio::task::yield_now().await;
                    }

                    let mut subscription = broadcaster.subscribe();
                    let mut seen = Vec::new();
                    loop {
                        let (_, price) = next_price(&mut subscription).await;
                        seen.push(price);
                        if price == f64::from(LAST) {
                            break seen;
                        }
                    }
                })
            })
            .collect();

        publisher.await.unwrap();
        for reader in readers {
            let seen = reader.await.unwrap();
            assert!(
                seen.windows(2).all(|pair| pair[1] == pair[0] + 1.0),
                "gap or duplicate in {:?}",
                seen
            );
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_hold_back_others() {
        let (broadcaster, _) = broadcaster(2);
        let _stalled = broadcaster.subscribe();
        let mut active = broadcaster.subscribe();

        for price in 1..=10 {
            assert_eq!(broadcaster.publish(record("GOOGLE", f64::from(price))), 2);
            assert_eq!(
                next_price(&mut active).await,
                ("GOOGLE".to_string(), f64::from(price))
            );
        }
    }

    #[tokio::test]
    async fn test_subscriber_count_tracks_drops() {
        let (broadcaster, _) = broadcaster(16);
        assert_eq!(broadcaster.subscriber_count(), 0);

        let first = broadcaster.subscribe();
        let second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(first);
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(second);
        assert_eq!(broadcaster.subscriber_count(), 0);

        // Publishing into the void only refreshes the replay state
        assert_eq!(broadcaster.publish(record("APPLE", 99.0)), 0);
        assert_eq!(broadcaster.latest().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_reports_closed_event() {
        let metrics = Arc::new(MetricsCollector::new("mock"));
        let (events, mut events_rx) = broadcast::channel(16);
        let broadcaster = PriceBroadcaster::new(16, events, metrics);
        broadcaster.publish(record("APPLE", 90.0));

        let mut subscription = broadcaster.subscribe();
        let id = subscription.id();
        subscription.recv().await.unwrap();
        drop(subscription);

        match events_rx.recv().await.unwrap() {
            EngineEvent::SubscriptionClosed {
                subscription_id,
                delivered,
                ..
            } => {
                assert_eq!(subscription_id, id);
                assert_eq!(delivered, 1);
            }
            other => panic!("unexpected event: {}", other),
        }
    }

    #[tokio::test]
    async fn test_ticker_filter() {
        let (broadcaster, _) = broadcaster(16);
        broadcaster.publish(record("APPLE", 90.0));
        broadcaster.publish(record("GOOGLE", 91.0));

        let mut subscription = broadcaster.subscribe_ticker(Ticker::new("GOOGLE"));
        assert_eq!(next_price(&mut subscription).await, ("GOOGLE".to_string(), 91.0));

        broadcaster.publish(record("APPLE", 92.0));
        broadcaster.publish(record("GOOGLE", 93.0));
        assert_eq!(next_price(&mut subscription).await, ("GOOGLE".to_string(), 93.0));
        assert_idle(&mut subscription).await;
    }

    #[tokio::test]
    async fn test_stream_ends_when_broadcaster_dropped() {
        let (broadcaster, _) = broadcaster(16);
        broadcaster.publish(record("APPLE", 90.0));
        let stream = broadcaster.subscribe().into_stream();
        broadcaster.publish(record("APPLE", 91.0));
        drop(broadcaster);

        let prices: Vec<f64> = stream.map(|r| r.price()).collect().await;
        assert_eq!(prices, vec![90.0, 91.0]);
    }
}
