//! TradeDesk - strategy execution and signal engine
//!
//! Wires the services once from configuration and dispatches CLI commands.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use tradedesk::adapters::cli::{
    AuthorityCmd, CliApp, Command, HistoryCmd, OutputFormat, PortfolioCmd, StrategyCmd, TradeCmd,
};
use tradedesk::adapters::{
    CoinGeckoConfig, CoinGeckoSource, InMemoryCache, InMemoryStore, JsonFileStore, JupiterClient,
    JupiterConfig, JupiterPriceClient, LlmClient, LlmProvider, PaperLedger, SolanaBalanceOracle,
    SolanaClient,
};
use tradedesk::application::{
    CustodyCipher, ExecutionBackend, ExecutorSettings, MarketDataService, MarketDataTtls,
    OrchestratorSettings, PortfolioValuator, RetryPolicy, SignalGenerator, SignalSettings,
    SimulationParams, StrategyOrchestrator, TradeExecutor, TradingAuthorityManager,
};
use tradedesk::config::{
    custody_secret, load_config, Config, ExecutionMode, SignalProviderKind, StorageBackend,
};
use tradedesk::domain::{
    OrderType, PermissionLevel, StrategyStatus, TokenRegistry, TradingStrategy,
};
use tradedesk::ports::{BalanceOracle, Cache, CompletionProvider, MarketDataSource, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = match &app.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let market = MarketServices::build(&config)?;
    let user = app.user.as_str();
    let format = app.format;

    match app.command {
        Command::Price(cmd) => {
            let prices = market.market_data.get_token_prices(&cmd.tokens).await;
            emit(format, &prices, || {
                for p in &prices {
                    println!(
                        "{:<8} ${:<14.6} {:+.2}% (24h)",
                        p.symbol, p.current_price, p.price_change_percentage_24h
                    );
                }
            })
        }
        Command::Signal(cmd) => {
            let signals = market.signals.generate_signals(&cmd.tokens).await;
            emit(format, &signals, || {
                for s in &signals {
                    println!(
                        "{:<8} {:<5} confidence {:>3.0} {:?}/{:?} [{:?}]",
                        s.token, s.action, s.confidence, s.direction, s.timeframe, s.source
                    );
                    println!("         {}", s.reasoning);
                }
            })
        }
        Command::Templates => {
            let templates = TradingStrategy::builtin_templates();
            emit(format, &templates, || {
                for t in &templates {
                    println!(
                        "{:<13} risk {:<6} tp {:>4.1}% sl {:>4.1}% tokens {}",
                        t.id,
                        t.risk_level,
                        t.target_profit_percentage,
                        t.stop_loss_percentage,
                        t.tokens.join(",")
                    );
                }
            })
        }
        command => {
            let trading = TradingServices::build(&config, &market)?;
            run_trading_command(command, &trading, &market, user, format).await
        }
    }
}

fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Services that need no custody secret
struct MarketServices {
    cache: Arc<dyn Cache>,
    market_data: MarketDataService,
    signals: SignalGenerator,
}

impl MarketServices {
    fn build(config: &Config) -> Result<Self> {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::with_capacity(config.cache.max_entries));
        let timeout = Duration::from_secs(config.market_data.request_timeout_secs);

        let mut sources: Vec<Arc<dyn MarketDataSource>> = Vec::new();
        if config.market_data.coingecko_enabled {
            let coingecko = CoinGeckoSource::new(CoinGeckoConfig {
                api_base_url: config.market_data.coingecko_api_url.clone(),
                api_key: config.market_data.get_coingecko_api_key(),
                timeout,
            })
            .context("Failed to create CoinGecko client")?;
            sources.push(Arc::new(coingecko));
        }
        if config.market_data.jupiter_price_enabled {
            let jupiter = JupiterPriceClient::new(config.execution.get_jupiter_api_key())
                .context("Failed to create Jupiter price client")?;
            sources.push(Arc::new(jupiter));
        }
        if sources.is_empty() {
            tracing::warn!("No market data source enabled, serving synthetic prices only");
        }

        let market_data = MarketDataService::new(sources, cache.clone(), MarketDataTtls::from(&config.cache));
        let provider = build_completion_provider(config)?;
        let signals = SignalGenerator::new(
            market_data.clone(),
            provider,
            cache.clone(),
            RetryPolicy::from(&config.signals),
            SignalSettings::from(&config.signals),
        );

        Ok(Self {
            cache,
            market_data,
            signals,
        })
    }
}

fn build_completion_provider(config: &Config) -> Result<Option<Arc<dyn CompletionProvider>>> {
    let signals = &config.signals;
    if signals.provider == SignalProviderKind::None {
        return Ok(None);
    }
    let Some(api_key) = signals.get_api_key() else {
        tracing::warn!(provider = ?signals.provider, "No API key set, using technical signals only");
        return Ok(None);
    };

    let model = signals.model_name();
    let provider = match signals.provider {
        SignalProviderKind::Groq => LlmProvider::groq(&model, api_key),
        _ => LlmProvider::anthropic(&model, api_key),
    };
    let client = LlmClient::new(provider, Duration::from_secs(signals.timeout_secs))
        .context("Failed to create completion client")?
        .with_temperature(signals.temperature)
        .with_max_tokens(signals.max_tokens);
    Ok(Some(Arc::new(client)))
}

/// Custody, execution and strategy services
struct TradingServices {
    authorities: TradingAuthorityManager,
    executor: TradeExecutor,
    orchestrator: StrategyOrchestrator,
    portfolio: PortfolioValuator,
}

impl TradingServices {
    fn build(config: &Config, market: &MarketServices) -> Result<Self> {
        let store: Arc<dyn Store> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryStore::new()),
            StorageBackend::Json => {
                let path = config.storage.resolved_path()?;
                Arc::new(JsonFileStore::open(path).context("Failed to open store")?)
            }
        };

        let secret = custody_secret().context("CUSTODY_SECRET must be set for custody operations")?;
        let cipher = CustodyCipher::new(&secret).context("Invalid CUSTODY_SECRET")?;
        let authorities = TradingAuthorityManager::new(store.clone(), market.cache.clone(), cipher);

        let (backend, balances): (ExecutionBackend, Arc<dyn BalanceOracle>) = match config.execution.mode {
            ExecutionMode::Disabled => (
                ExecutionBackend::Disabled,
                Arc::new(PaperLedger::new(HashMap::new())),
            ),
            ExecutionMode::Paper => (
                ExecutionBackend::Simulated(SimulationParams {
                    noise: config.execution.simulation_noise,
                }),
                Arc::new(PaperLedger::new(config.execution.paper_balances.clone())),
            ),
            ExecutionMode::Live => {
                tracing::warn!("LIVE TRADING MODE - swaps are signed and submitted on-chain");
                let solana = SolanaClient::new(config.solana.get_rpc_url());
                let jupiter = JupiterClient::new(
                    JupiterConfig {
                        api_base_url: config.execution.jupiter_api_url.clone(),
                        api_key: config.execution.get_jupiter_api_key(),
                        timeout: Duration::from_secs(config.market_data.request_timeout_secs.max(30)),
                        max_retries: config.execution.max_retries,
                        priority_fee_lamports: config.execution.priority_fee_lamports,
                    },
                    solana.clone(),
                )
                .context("Failed to create Jupiter client")?;
                (
                    ExecutionBackend::Live(Arc::new(jupiter)),
                    Arc::new(SolanaBalanceOracle::new(solana)),
                )
            }
        };

        let executor = TradeExecutor::new(
            backend,
            authorities.clone(),
            balances.clone(),
            store.clone(),
            market.cache.clone(),
            ExecutorSettings::from(config),
        );
        let orchestrator = StrategyOrchestrator::new(
            TradingStrategy::builtin_templates(),
            store,
            market.cache.clone(),
            market.market_data.clone(),
            authorities.clone(),
            executor.clone(),
            OrchestratorSettings::from(config),
        );
        let portfolio = PortfolioValuator::new(balances, market.market_data.clone(), authorities.clone());

        Ok(Self {
            authorities,
            executor,
            orchestrator,
            portfolio,
        })
    }
}

async fn run_trading_command(
    command: Command,
    trading: &TradingServices,
    market: &MarketServices,
    user: &str,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Command::Strategy(cmd) => strategy_command(cmd, trading, user, format).await,
        Command::Authority(cmd) => authority_command(cmd, trading, user, format).await,
        Command::Trade(cmd) => trade_command(cmd, trading, market, user, format).await,
        Command::Positions(r) => {
            let positions = trading.orchestrator.get_positions(&r.id).await?;
            emit(format, &positions, || {
                for p in &positions {
                    println!(
                        "{} {:?} {} {} -> {} {} entry ${:.6} pnl {:+.4} ({:+.2}%)",
                        p.id,
                        p.status,
                        p.input_amount,
                        p.input_token,
                        p.output_amount,
                        p.output_token,
                        p.entry_price,
                        p.total_pnl(),
                        p.realized_pnl_percentage.unwrap_or(p.unrealized_pnl_percentage)
                    );
                }
            })
        }
        Command::Close(r) => {
            let closed = trading.orchestrator.close_position(user, &r.id).await?;
            emit(format, &closed, || {
                println!("{}", closed.trade);
                match closed.position.realized_pnl {
                    Some(pnl) => println!("Position {} closed, realized {:+.4}", closed.position.id, pnl),
                    None => println!("Position {} remains open", closed.position.id),
                }
            })
        }
        Command::Cancel(r) => {
            let position = trading.orchestrator.cancel_position(user, &r.id).await?;
            emit(format, &position, || println!("Position {} cancelled", position.id))
        }
        Command::Refresh(r) => {
            let refresh = trading.orchestrator.update_positions(&r.id).await?;
            emit(format, &refresh, || {
                println!("{} open positions marked to market", refresh.updated.len());
                for alert in &refresh.alerts {
                    println!(
                        "  {} {} {:?}: {:+.2}% (threshold {:.1}%)",
                        alert.position_id,
                        alert.token,
                        alert.kind,
                        alert.unrealized_pnl_percentage,
                        alert.threshold_percentage
                    );
                }
            })
        }
        Command::Stats(r) => {
            let stats = trading.orchestrator.get_strategy_stats(&r.id).await?;
            emit(format, &stats, || {
                println!(
                    "positions {} (open {}, closed {}, cancelled {})",
                    stats.total_positions, stats.open_positions, stats.closed_positions, stats.cancelled_positions
                );
                println!(
                    "successful trades {}, profitable {}",
                    stats.successful_trades, stats.profitable_trades
                );
                println!(
                    "pnl {:+.4} ({:+.2}% of {:.4} deposited)",
                    stats.total_pnl, stats.pnl_percentage, stats.total_deposited
                );
            })
        }
        Command::History(HistoryCmd { limit }) => {
            let history = trading.executor.get_trade_history(user, limit).await;
            emit(format, &history, || {
                for record in &history {
                    println!("{} {}", record.result.executed_at.format("%Y-%m-%d %H:%M:%S"), record.result);
                }
            })
        }
        Command::Portfolio(PortfolioCmd { tokens }) => {
            let tokens = if tokens.is_empty() {
                TokenRegistry::all().iter().map(|t| t.symbol.to_string()).collect()
            } else {
                tokens
            };
            let valuation = trading.portfolio.value_portfolio(user, &tokens).await;
            emit(format, &valuation, || {
                for h in valuation.holdings.iter().filter(|h| h.quantity > 0.0) {
                    println!(
                        "{:<8} {:>18.6} @ ${:<12.6} = ${:.2}",
                        h.symbol,
                        h.quantity,
                        h.price_usd,
                        h.value_usd()
                    );
                }
                println!("Total: ${:.2}", valuation.total_value_usd());
            })
        }
        Command::Price(_) | Command::Signal(_) | Command::Templates => {
            bail!("market command routed to trading services")
        }
    }
}

async fn strategy_command(
    cmd: StrategyCmd,
    trading: &TradingServices,
    user: &str,
    format: OutputFormat,
) -> Result<()> {
    let orchestrator = &trading.orchestrator;
    let strategies = match cmd {
        StrategyCmd::Create { template, risk } => {
            vec![orchestrator.create_user_strategy(user, &template, risk).await?]
        }
        StrategyCmd::List => orchestrator.get_user_strategies(user).await?,
        StrategyCmd::Pause(r) => {
            vec![orchestrator.set_strategy_status(user, &r.id, StrategyStatus::Paused).await?]
        }
        StrategyCmd::Resume(r) => {
            vec![orchestrator.set_strategy_status(user, &r.id, StrategyStatus::Active).await?]
        }
    };

    emit(format, &strategies, || {
        for s in &strategies {
            println!(
                "{} {:<13} {:?} pnl {:+.4} ({:+.2}%) deposited {:.4}",
                s.id, s.strategy_id, s.status, s.performance_pnl, s.performance_percentage, s.total_deposited
            );
        }
    })
}

async fn authority_command(
    cmd: AuthorityCmd,
    trading: &TradingServices,
    user: &str,
    format: OutputFormat,
) -> Result<()> {
    let authorities = &trading.authorities;
    match cmd {
        AuthorityCmd::Show => {
            let info = authorities.get_authority(user).await?;
            emit(format, &info, || match &info {
                Some(i) => println!("{} ({}) since {}", i.public_key, i.permission_level, i.created_at),
                None => println!("No delegated authority for {}", user),
            })
        }
        AuthorityCmd::Create { full } => {
            let level = if full { PermissionLevel::Full } else { PermissionLevel::Limited };
            let public_key = authorities.create_delegated_authority(user, level).await?;
            emit(format, &public_key, || println!("Delegated authority: {}", public_key))
        }
        AuthorityCmd::Revoke => {
            let removed = authorities.revoke_authority(user).await?;
            emit(format, &removed, || {
                if removed {
                    println!("Delegated authority revoked");
                } else {
                    println!("No delegated authority for {}", user);
                }
            })
        }
    }
}

async fn trade_command(
    cmd: TradeCmd,
    trading: &TradingServices,
    market: &MarketServices,
    user: &str,
    format: OutputFormat,
) -> Result<()> {
    if let Some(strategy_id) = &cmd.strategy {
        let signal = market.signals.generate_signal(&cmd.output_token).await;
        let outcome = trading
            .orchestrator
            .execute_strategy_trade(user, strategy_id, &cmd.input_token, &cmd.output_token, cmd.amount, &signal)
            .await?;
        return emit(format, &outcome, || {
            println!(
                "Signal {} {:.0} sized x{:.3}",
                signal.action, signal.confidence, outcome.sizing_multiplier
            );
            println!("{}", outcome.trade);
            if let Some(p) = &outcome.position {
                println!("Opened position {} at ${:.6}", p.id, p.entry_price);
            }
        });
    }

    let order_type = if cmd.limit { OrderType::Limit } else { OrderType::Market };
    let result = trading
        .executor
        .execute_trade_for_user(
            user,
            &cmd.input_token,
            &cmd.output_token,
            cmd.amount,
            cmd.slippage,
            order_type,
        )
        .await?;
    emit(format, &result, || {
        println!("{}", result);
        if let Some(sig) = &result.tx_signature {
            println!("Signature: {}", sig);
        }
    })
}

/// Print `value` as JSON, or run the text renderer
fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).context("Failed to encode output")?);
        }
        OutputFormat::Text => text(),
    }
    Ok(())
}
