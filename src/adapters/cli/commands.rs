//! CLI Command Definitions
//!
//! Argument parsing for the tradedesk binary. Handlers live in `main.rs`,
//! where the services are wired.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::domain::strategy::RiskLevel;

/// TradeDesk - strategy execution and signal engine
#[derive(Parser, Debug)]
#[command(
    name = "tradedesk",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Strategy execution and signal engine for Solana tokens",
    long_about = "TradeDesk resolves market data with fallback, generates AI or RSI signals, \
                  custodies delegated trading keys and runs strategy positions on a \
                  paper ledger or live through Jupiter."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// User the command acts for
    #[arg(short, long, value_name = "USER", default_value = "local", global = true)]
    pub user: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Current price of one or more tokens
    Price(PriceCmd),

    /// Generate trading signals
    Signal(SignalCmd),

    /// List strategy templates
    Templates,

    /// Manage the user's strategies
    #[command(subcommand)]
    Strategy(StrategyCmd),

    /// Manage the user's delegated trading authority
    #[command(subcommand)]
    Authority(AuthorityCmd),

    /// Execute a swap, optionally on behalf of a strategy
    Trade(TradeCmd),

    /// List the positions of a strategy
    Positions(StrategyRef),

    /// Close an open position with a reverse trade
    Close(PositionRef),

    /// Cancel an open position without trading
    Cancel(PositionRef),

    /// Mark open positions to market
    Refresh(StrategyRef),

    /// Performance statistics of a strategy
    Stats(StrategyRef),

    /// Recent trades of the user
    History(HistoryCmd),

    /// Value the user's holdings
    Portfolio(PortfolioCmd),
}

#[derive(Args, Debug)]
pub struct PriceCmd {
    /// Token symbols, mints or CoinGecko ids
    #[arg(value_name = "TOKEN", required = true)]
    pub tokens: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SignalCmd {
    /// Token symbols, mints or CoinGecko ids
    #[arg(value_name = "TOKEN", required = true)]
    pub tokens: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum StrategyCmd {
    /// Subscribe to a template
    Create {
        /// Template id (conservative, balanced, aggressive)
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Override the template's risk level
        #[arg(long, value_name = "LEVEL")]
        risk: Option<RiskLevel>,
    },

    /// List the user's strategies
    List,

    /// Stop a strategy from trading
    Pause(StrategyRef),

    /// Let a paused strategy trade again
    Resume(StrategyRef),
}

#[derive(Subcommand, Debug)]
pub enum AuthorityCmd {
    /// Show the public key and permission level
    Show,

    /// Create a delegated authority
    Create {
        /// Grant full instead of limited permission
        #[arg(long)]
        full: bool,
    },

    /// Delete the delegated authority
    Revoke,
}

#[derive(Args, Debug)]
pub struct TradeCmd {
    /// Input token symbol (e.g., USDC)
    #[arg(value_name = "INPUT")]
    pub input_token: String,

    /// Output token symbol (e.g., SOL)
    #[arg(value_name = "OUTPUT")]
    pub output_token: String,

    /// Amount of the input token
    #[arg(value_name = "AMOUNT")]
    pub amount: f64,

    /// Slippage tolerance in basis points (default: 50 = 0.5%)
    #[arg(long, value_name = "BPS", default_value = "50")]
    pub slippage: u16,

    /// Fill as a limit order (no simulated noise)
    #[arg(long)]
    pub limit: bool,

    /// Trade for this strategy, sized by a fresh signal on the output token
    #[arg(long, value_name = "ID")]
    pub strategy: Option<String>,
}

#[derive(Args, Debug)]
pub struct StrategyRef {
    /// User strategy id
    #[arg(value_name = "STRATEGY_ID")]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct PositionRef {
    /// Position id
    #[arg(value_name = "POSITION_ID")]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct HistoryCmd {
    /// Maximum number of trades to show
    #[arg(short, long, value_name = "N", default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct PortfolioCmd {
    /// Tokens to value (every supported token when omitted)
    #[arg(value_name = "TOKEN")]
    pub tokens: Vec<String>,
}
