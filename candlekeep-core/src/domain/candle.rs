//! Candle — one minute of exchange trading activity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of one candle in seconds.
pub const MINUTE_SECS: i64 = 60;

/// A complete OHLCV candle keyed by its opening Unix timestamp (seconds).
///
/// Every published dataset is a strictly increasing run of these, one step apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A candle as read from disk or the network, before validation.
///
/// Price and volume cells may be blank or `NaN` in the source; those become `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// The value columns of a candle, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl RawCandle {
    /// Value of a single column, with `NaN` treated as absent.
    pub fn get(&self, field: Field) -> Option<f64> {
        let value = match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
        };
        value.filter(|v| !v.is_nan())
    }

    /// First column (in file order) that has no value.
    pub fn first_missing(&self) -> Option<Field> {
        Field::ALL.into_iter().find(|&f| self.get(f).is_none())
    }

    /// Returns the complete candle, or `None` if any column is absent.
    pub fn complete(&self) -> Option<Candle> {
        Some(Candle {
            timestamp: self.timestamp,
            open: self.get(Field::Open)?,
            high: self.get(Field::High)?,
            low: self.get(Field::Low)?,
            close: self.get(Field::Close)?,
            volume: self.get(Field::Volume)?,
        })
    }
}

impl From<Candle> for RawCandle {
    fn from(c: Candle) -> Self {
        Self {
            timestamp: c.timestamp,
            open: Some(c.open),
            high: Some(c.high),
            low: Some(c.low),
            close: Some(c.close),
            volume: Some(c.volume),
        }
    }
}

impl Candle {
    /// Flat candle carrying `price` forward into an empty minute.
    pub fn flat(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}
