//! Candlekeep Core — minute-candle history reconciliation and upkeep.
//!
//! This crate contains everything the `candlekeep` binary drives:
//! - Domain types (complete and partially-populated candles)
//! - Integrity: primary-wins merge, structural validation, continuity scan
//! - Dataset I/O (CSV, optionally gzipped) and a metadata sidecar
//! - The exchange provider used by the daily update
//! - Onboarding, update and inspection pipelines

pub mod config;
pub mod data;
pub mod domain;
pub mod integrity;
pub mod pipeline;
