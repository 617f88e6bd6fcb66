//! AI completion adapters

mod client;

pub use client::{LlmClient, LlmProvider};
