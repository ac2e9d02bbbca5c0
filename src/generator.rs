//! Generator abstraction for producing ticker prices

use crate::{error::GeneratorError, types::Ticker};
use async_trait::async_trait;

/// Trait for price sources
///
/// The engine ships a synthetic implementation; a real market data feed
/// plugs in behind the same trait.
#[async_trait]
pub trait PriceGenerator: Send + Sync {
    /// Produces a fresh price for a single ticker
    ///
    /// # Arguments
    /// * `ticker` - The ticker to price
    ///
    /// # Returns
    /// The new price, or an error if the source cannot produce one. A failing
    /// source must return an error rather than repeat an older price.
    async fn generate(&self, ticker: &Ticker) -> Result<f64, GeneratorError>;

    /// Returns the name of this generator
    fn generator_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock generator for testing
    pub struct MockGenerator {
        responses: Arc<Mutex<HashMap<Ticker, Result<f64, GeneratorError>>>>,
        call_count: Arc<Mutex<usize>>,
        delay: Option<Duration>,
    }

    impl Default for MockGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockGenerator {
        pub fn new() -> Self {
            Self {
                responses: Arc::new(Mutex::new(HashMap::new())),
                call_count: Arc::new(Mutex::new(0)),
                delay: None,
            }
        }

        /// Makes every `generate` call sleep before answering
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn set_price(&self, ticker: &str, price: f64) {
            self.responses
                .lock()
                .unwrap()
                .insert(Ticker::new(ticker), Ok(price));
        }

        pub fn set_error(&self, ticker: &str, error: GeneratorError) {
            self.responses
                .lock()
                .unwrap()
                .insert(Ticker::new(ticker), Err(error));
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl PriceGenerator for MockGenerator {
        async fn generate(&self, ticker: &Ticker) -> Result<f64, GeneratorError> {
            *self.call_count.lock().unwrap() += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let responses = self.responses.lock().unwrap();
            match responses.get(ticker) {
                Some(result) => result.clone(),
                None => Err(GeneratorError::UnsupportedTicker(ticker.to_string())),
            }
        }

        fn generator_name(&self) -> &'static str {
            "mock"
        }
    }
}
