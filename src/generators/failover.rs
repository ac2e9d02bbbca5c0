//! Failover price generator implementation

use crate::{error::GeneratorError, generator::PriceGenerator, types::Ticker};
use async_trait::async_trait;
use std::sync::Arc;

/// Price generator that asks several generators in order until one succeeds
pub struct FailoverGenerator {
    generators: Vec<Arc<dyn PriceGenerator>>,
}

impl FailoverGenerator {
    /// Creates a new failover generator
    ///
    /// The generators are tried in the order they are provided.
    pub fn new(generators: Vec<Arc<dyn PriceGenerator>>) -> Self {
        Self { generators }
    }
}

#[async_trait]
impl PriceGenerator for FailoverGenerator {
    async fn generate(&self, ticker: &Ticker) -> Result<f64, GeneratorError> {
        let mut last_error = None;

        for generator in &self.generators {
            match generator.generate(ticker).await {
                Ok(price) => return Ok(price),
                Err(e) => {
                    tracing::warn!(
                        generator = generator.generator_name(),
                        ticker = %ticker,
                        error = %e,
                        "Generator failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GeneratorError::Unavailable("No generators configured for failover".to_string())
        }))
    }

    fn generator_name(&self) -> &'static str {
        "failover"
    }
}
