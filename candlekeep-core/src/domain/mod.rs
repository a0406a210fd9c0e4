//! Domain types for candlekeep

pub mod candle;

pub use candle::{Candle, Field, RawCandle, MINUTE_SECS};
