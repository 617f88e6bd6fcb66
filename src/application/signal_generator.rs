//! Signal Generator
//!
//! Technical snapshot from 30 days of history, then either an AI completion
//! parsed through the line grammar or the deterministic RSI rule. Never
//! fails: unrecoverable errors produce a short-lived neutral hold.

use chrono::{Duration as ChronoDuration, Utc};
use std::fmt;
use std::sync::Arc;

use super::market_data_service::MarketDataService;
use super::retry::RetryPolicy;
use crate::domain::signal::{AISignal, Sentiment, SignalSource};
use crate::domain::token::TokenRegistry;
use crate::ports::cache::{keys, Cache};
use crate::ports::completion::{CompletionError, CompletionProvider};
use crate::strategy::indicators::TechnicalSnapshot;
use crate::strategy::prompt::{build_signal_prompt, SYSTEM_PROMPT};
use crate::strategy::rsi_rule::technical_signal;
use crate::strategy::signal_grammar::{extract_signal, Extraction, ParsedSignal};

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSettings {
    /// Days of daily closes fed to the indicators
    pub history_days: u32,
    pub ttl_minutes: i64,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            history_days: 30,
            ttl_minutes: AISignal::DEFAULT_TTL_MINUTES,
        }
    }
}

/// Why one AI attempt produced no signal
#[derive(Debug)]
enum AttemptError {
    Provider(CompletionError),
    Extraction(String),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Provider(e) => e.is_transient(),
            AttemptError::Extraction(_) => true,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Provider(e) => write!(f, "provider: {}", e),
            AttemptError::Extraction(reason) => write!(f, "extraction: {}", reason),
        }
    }
}

#[derive(Clone)]
pub struct SignalGenerator {
    market_data: MarketDataService,
    provider: Option<Arc<dyn CompletionProvider>>,
    cache: Arc<dyn Cache>,
    retry: RetryPolicy,
    settings: SignalSettings,
}

impl SignalGenerator {
    pub fn new(
        market_data: MarketDataService,
        provider: Option<Arc<dyn CompletionProvider>>,
        cache: Arc<dyn Cache>,
        retry: RetryPolicy,
        settings: SignalSettings,
    ) -> Self {
        Self {
            market_data,
            provider,
            cache,
            retry,
            settings,
        }
    }

    /// Unexpired cached signal, without generating one
    pub async fn cached_signal(&self, token: &str) -> Option<AISignal> {
        let key = keys::signal(&TokenRegistry::canonical_key(token));
        self.cache
            .get_typed::<AISignal>(&key)
            .await
            .filter(|signal| !signal.is_expired())
    }

    pub async fn generate_signal(&self, token: &str) -> AISignal {
        if let Some(cached) = self.cached_signal(token).await {
            return cached;
        }

        let symbol = TokenRegistry::canonical_key(token);
        let signal = match self.build_signal(token, &symbol).await {
            Ok(signal) => signal,
            Err(reason) => {
                tracing::warn!(token = %symbol, "Signal generation failed, returning neutral: {}", reason);
                AISignal::neutral(&symbol, format!("Signal unavailable: {}", reason))
            }
        };

        let ttl = signal.remaining_ttl();
        if !ttl.is_zero() {
            self.cache.set_typed(&keys::signal(&symbol), &signal, ttl).await;
        }

        tracing::info!(
            token = %symbol,
            action = %signal.action,
            confidence = signal.confidence,
            source = ?signal.source,
            "Signal generated"
        );
        signal
    }

    /// One signal per token, in input order
    pub async fn generate_signals(&self, tokens: &[String]) -> Vec<AISignal> {
        let mut signals = Vec::with_capacity(tokens.len());
        for token in tokens {
            signals.push(self.generate_signal(token).await);
        }
        signals
    }

    async fn build_signal(&self, token: &str, symbol: &str) -> Result<AISignal, String> {
        let history = self
            .market_data
            .get_token_price_history(token, self.settings.history_days)
            .await;
        let closes: Vec<f64> = history.iter().map(|p| p.price).collect();
        let snapshot = TechnicalSnapshot::compute(&closes).map_err(|e| e.to_string())?;

        if let Some(provider) = &self.provider {
            match self.ask_provider(provider.as_ref(), symbol, &snapshot).await {
                Ok(parsed) => return Ok(self.ai_signal(symbol, parsed)),
                Err(e) => {
                    tracing::warn!(token = symbol, "AI signal failed, using RSI rule: {}", e);
                }
            }
        }

        Ok(technical_signal(symbol, &snapshot, self.settings.ttl_minutes))
    }

    async fn ask_provider(
        &self,
        provider: &dyn CompletionProvider,
        symbol: &str,
        snapshot: &TechnicalSnapshot,
    ) -> Result<ParsedSignal, AttemptError> {
        let prompt = build_signal_prompt(symbol, snapshot);
        self.retry
            .retry(AttemptError::is_retryable, || async {
                let text = provider
                    .complete(SYSTEM_PROMPT, &prompt)
                    .await
                    .map_err(AttemptError::Provider)?;
                match extract_signal(&text) {
                    Extraction::Parsed(parsed) => Ok(parsed),
                    Extraction::Failed(reason) => Err(AttemptError::Extraction(reason)),
                }
            })
            .await
    }

    fn ai_signal(&self, symbol: &str, parsed: ParsedSignal) -> AISignal {
        let now = Utc::now();
        AISignal {
            token: symbol.to_string(),
            action: parsed.action,
            confidence: parsed.confidence,
            direction: parsed.direction,
            timeframe: parsed.timeframe,
            reasoning: parsed.reasoning,
            indicators: parsed.indicators,
            sentiment: Sentiment::new(parsed.social_sentiment, parsed.news_sentiment),
            source: SignalSource::Ai,
            timestamp: now,
            expires_at: now + ChronoDuration::minutes(self.settings.ttl_minutes),
        }
    }
}
