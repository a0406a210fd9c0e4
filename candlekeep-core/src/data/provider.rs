//! Candle source trait and structured fetch errors.
//!
//! `CandleSource` abstracts the exchange API so the daily update can be driven
//! by a canned source in tests.

use crate::domain::RawCandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("request rejected by exchange: {0}")]
    Rejected(String),

    #[error("hard stop: exchange has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("fetch error: {0}")]
    Other(String),
}

/// A source of published one-minute candles for a currency pair.
pub trait CandleSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch at most `limit` candles with timestamps in `[start, end]`, ascending.
    fn fetch(
        &self,
        pair: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError>;

    /// Whether the source is currently accepting requests.
    fn is_available(&self) -> bool;
}
