//! Strategy Layer - Signal derivation
//!
//! - `indicators`: SMA, EMA, Wilder RSI and volatility over daily closes
//! - `prompt`: completion prompt embedding the technical snapshot
//! - `signal_grammar`: line grammar that turns a completion into signal fields
//! - `rsi_rule`: deterministic fallback when no AI signal is available

pub mod indicators;
pub mod prompt;
pub mod rsi_rule;
pub mod signal_grammar;

pub use indicators::{IndicatorError, TechnicalSnapshot};
pub use prompt::{build_signal_prompt, SYSTEM_PROMPT};
pub use rsi_rule::{classify_rsi, technical_signal};
pub use signal_grammar::{extract_signal, Extraction, ParsedSignal};
