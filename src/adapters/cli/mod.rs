//! CLI Adapter
//!
//! Command-line interface for the tradedesk binary.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    AuthorityCmd, CliApp, Command, HistoryCmd, OutputFormat, PortfolioCmd, PositionRef, PriceCmd,
    SignalCmd, StrategyCmd, StrategyRef, TradeCmd,
};
