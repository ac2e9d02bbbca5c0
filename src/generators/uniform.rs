//! Synthetic uniformly distributed price generator

use crate::{
    error::GeneratorError,
    generator::PriceGenerator,
    types::{PriceRange, Ticker},
};
use async_trait::async_trait;
use rand::Rng;

/// Draws a uniformly distributed whole price from an inclusive range
///
/// Holds no per-ticker state, so concurrent calls for different tickers
/// never interfere with each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformPriceGenerator {
    range: PriceRange,
}

impl UniformPriceGenerator {
    /// Creates a generator for the given range
    pub fn new(range: PriceRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> PriceRange {
        self.range
    }
}

#[async_trait]
impl PriceGenerator for UniformPriceGenerator {
    async fn generate(&self, _ticker: &Ticker) -> Result<f64, GeneratorError> {
        let price = rand::rng().random_range(self.range.low()..=self.range.high());
        Ok(price as f64)
    }

    fn generator_name(&self) -> &'static str {
        "uniform"
    }
}
