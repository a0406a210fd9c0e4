//! Dataset files, the exchange provider, and recent-file repair.

pub mod bitstamp;
pub mod circuit_breaker;
pub mod dataset;
pub mod fill;
pub mod meta;
pub mod provider;
pub mod schema;

pub use bitstamp::BitstampSource;
pub use circuit_breaker::CircuitBreaker;
pub use dataset::{is_gzip, last_timestamp, read_candles, scan, write_candles, DatasetError};
pub use fill::fill_missing_minutes;
pub use meta::{DatasetMeta, MetaError};
pub use provider::{CandleSource, FetchError};
pub use schema::CandleSchema;
