//! Jupiter Adapter
//!
//! Live `SwapAggregator` backed by the Jupiter DEX aggregator.

mod client;
mod quote;
mod swap;

pub use client::{JupiterClient, JupiterConfig};
pub use quote::{QuoteRequest, QuoteResponse};
pub use swap::{SwapRequest, SwapResponse};
