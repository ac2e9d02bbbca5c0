//! Price generator implementations

pub mod failover;
pub mod uniform;

pub use failover::FailoverGenerator;
pub use uniform::UniformPriceGenerator;
