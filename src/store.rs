//! In-memory store holding the latest price per ticker

use crate::types::{PriceRecord, Ticker};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Type alias for the price map (ticker -> latest record)
type PriceMap = HashMap<Ticker, Arc<PriceRecord>>;

/// In-memory store for the most recent price of every ticker
///
/// Writers swap whole `Arc<PriceRecord>` values, so a reader always sees
/// either the previous record or the new one, never a mix of the two.
pub struct LatestPriceStore {
    prices: RwLock<PriceMap>,
}

impl LatestPriceStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Stores a record, replacing whatever was held for its ticker
    ///
    /// # Returns
    /// The record that was replaced, if any
    pub async fn put(&self, record: Arc<PriceRecord>) -> Option<Arc<PriceRecord>> {
        let mut prices = self.prices.write().await;
        let previous = prices.insert(record.ticker().clone(), record.clone());
        tracing::debug!(
            ticker = %record.ticker(),
            price = record.price(),
            "Updated latest price"
        );
        previous
    }

    /// Gets the latest record for a ticker
    pub async fn get(&self, ticker: &Ticker) -> Option<Arc<PriceRecord>> {
        self.prices.read().await.get(ticker).cloned()
    }

    /// Gets every stored record
    pub async fn get_all(&self) -> HashMap<Ticker, Arc<PriceRecord>> {
        self.prices.read().await.clone()
    }

    /// Checks if a record exists for a ticker (regardless of age)
    pub async fn has_price(&self, ticker: &Ticker) -> bool {
        self.prices.read().await.contains_key(ticker)
    }

    /// Checks if the record for a ticker is older than `threshold`
    ///
    /// # Returns
    /// True if the record is stale or doesn't exist
    pub async fn is_stale(&self, ticker: &Ticker, threshold: Duration) -> bool {
        match self.prices.read().await.get(ticker) {
            Some(record) => record.is_stale(threshold),
            None => true,
        }
    }

    /// Number of tickers with a stored record
    pub async fn len(&self) -> usize {
        self.prices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.prices.read().await.is_empty()
    }
}

impl Default for LatestPriceStore {
    fn default() -> Self {
        Self::new()
    }
}
