//! Bitstamp OHLC provider.
//!
//! Fetches one-minute candles from the v2 `ohlc/{pair}` endpoint. Handles rate
//! limiting, retries with exponential backoff, response parsing, and the
//! circuit breaker. Bitstamp returns every numeric field as a string.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{CandleSource, FetchError};
use crate::domain::RawCandle;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct OhlcResponse {
    data: Option<OhlcData>,
    status: Option<String>,
    reason: Option<serde_json::Value>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OhlcData {
    #[serde(default)]
    ohlc: Vec<OhlcEntry>,
}

#[derive(Debug, Deserialize)]
struct OhlcEntry {
    timestamp: Number,
    open: Option<Number>,
    high: Option<Number>,
    low: Option<Number>,
    close: Option<Number>,
    volume: Option<Number>,
}

/// Numeric field that may arrive quoted or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Text(String),
    Float(f64),
}

impl Number {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Number::Text(s) => s.trim().parse().ok(),
            Number::Float(f) => Some(*f),
        }
    }
}

pub struct BitstampSource {
    client: reqwest::blocking::Client,
    circuit_breaker: CircuitBreaker,
    base_url: String,
    step_secs: i64,
    max_retries: u32,
    base_delay: Duration,
}

impl BitstampSource {
    pub fn new(
        base_url: &str,
        step_secs: i64,
        timeout: Duration,
        max_retries: u32,
        circuit_breaker: CircuitBreaker,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("candlekeep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: base_url.trim_end_matches('/').to_string(),
            step_secs,
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Time until the circuit breaker admits requests again; zero when closed.
    pub fn remaining_cooldown(&self) -> Duration {
        self.circuit_breaker.remaining_cooldown()
    }

    fn ohlc_url(&self, pair: &str, start: i64, end: i64, limit: usize) -> String {
        format!(
            "{}/ohlc/{pair}/?step={}&start={start}&end={end}&limit={limit}",
            self.base_url, self.step_secs
        )
    }

    /// Parse an OHLC response body into ascending raw candles.
    fn parse_response(resp: OhlcResponse) -> Result<Vec<RawCandle>, FetchError> {
        if resp.status.as_deref() == Some("error") {
            let reason = resp
                .reason
                .map(|r| r.to_string())
                .or(resp.code)
                .unwrap_or_else(|| "unspecified".into());
            return Err(FetchError::Rejected(reason));
        }

        let data = resp
            .data
            .ok_or_else(|| FetchError::ResponseFormatChanged("no data object".into()))?;

        let mut candles = data
            .ohlc
            .into_iter()
            .map(|e| {
                let timestamp = e
                    .timestamp
                    .as_f64()
                    .filter(|t| t.fract() == 0.0)
                    .ok_or_else(|| {
                        FetchError::ResponseFormatChanged(format!(
                            "invalid timestamp: {:?}",
                            e.timestamp
                        ))
                    })? as i64;
                let value = |n: &Option<Number>| n.as_ref().and_then(Number::as_f64);
                Ok(RawCandle {
                    timestamp,
                    open: value(&e.open),
                    high: value(&e.high),
                    low: value(&e.low),
                    close: value(&e.close),
                    volume: value(&e.volume),
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    /// Execute one request with retry and circuit breaker logic.
    fn fetch_with_retry(&self, url: &str) -> Result<Vec<RawCandle>, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(FetchError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(FetchError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(FetchError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(FetchError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(FetchError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(FetchError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status.is_server_error() {
                self.circuit_breaker.record_failure();
                last_error = Some(FetchError::Other(format!("HTTP {status}")));
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Rejected(format!("HTTP {status}")));
            }

            let body: OhlcResponse = resp.json().map_err(|e| {
                FetchError::ResponseFormatChanged(format!("failed to parse response: {e}"))
            })?;

            let candles = Self::parse_response(body)?;
            self.circuit_breaker.record_success();
            return Ok(candles);
        }

        Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
    }
}

impl CandleSource for BitstampSource {
    fn name(&self) -> &str {
        "bitstamp"
    }

    fn fetch(
        &self,
        pair: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let url = self.ohlc_url(pair, start, end, limit);
        tracing::debug!(%url, "fetching ohlc page");
        self.fetch_with_retry(&url)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
