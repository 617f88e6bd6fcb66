//! Prompt construction for AI-assisted signals

use super::indicators::TechnicalSnapshot;

pub const SYSTEM_PROMPT: &str = "You are a cryptocurrency trading analyst. \
You answer strictly in the requested line format without extra commentary.";

/// Structured prompt embedding the computed technicals and the response grammar
pub fn build_signal_prompt(token: &str, snapshot: &TechnicalSnapshot) -> String {
    let trend = if snapshot.is_uptrend() { "uptrend" } else { "downtrend" };

    format!(
        "Analyze {token} and produce a trading signal.\n\
\n\
Technical data (30 days):\n\
- Current price: ${price:.6}\n\
- 30d change: {change:+.2}%\n\
- SMA(7): {sma_s:.6}\n\
- SMA(25): {sma_l:.6} ({trend})\n\
- EMA(12): {ema_f:.6}\n\
- EMA(26): {ema_s:.6}\n\
- MACD: {macd:.6}\n\
- RSI(14): {rsi:.2}\n\
- Daily volatility: {vol:.2}%\n\
\n\
Respond using exactly these lines:\n\
ACTION: BUY or SELL or HOLD\n\
CONFIDENCE: number from 0 to 100\n\
DIRECTION: BULLISH or BEARISH or NEUTRAL\n\
TIMEFRAME: SHORT or MEDIUM or LONG\n\
REASONING: one short paragraph\n\
INDICATORS:\n\
- <indicator name>: <value and whether it is bullish, bearish or neutral>\n\
SOCIAL_SENTIMENT: number from 0 to 100\n\
NEWS_SENTIMENT: number from 0 to 100\n",
        token = token,
        price = snapshot.current_price,
        change = snapshot.price_change_pct,
        sma_s = snapshot.sma_short,
        sma_l = snapshot.sma_long,
        trend = trend,
        ema_f = snapshot.ema_fast,
        ema_s = snapshot.ema_slow,
        macd = snapshot.macd(),
        rsi = snapshot.rsi,
        vol = snapshot.volatility_pct,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_technicals_and_grammar() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let snapshot = TechnicalSnapshot::compute(&prices).unwrap();
        let prompt = build_signal_prompt("SOL", &snapshot);

        assert!(prompt.contains("Analyze SOL"));
        assert!(prompt.contains("RSI(14): 100.00"));
        assert!(prompt.contains("uptrend"));
        assert!(prompt.contains("ACTION: BUY or SELL or HOLD"));
        assert!(prompt.contains("NEWS_SENTIMENT"));
    }
}
