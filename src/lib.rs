//! # Wende - renewable share dashboard core for Germany
//!
//! Combines renewable generation (ENTSO-E), grid load (SMARD) and weather
//! (Open-Meteo) into today's renewable share and a running yearly average
//! measured against the expansion target.
//!
//! ## Architecture
//!
//! - `series`: time points, grids and aligned series
//! - `sources`: upstream adapters behind async traits
//! - `filter`: bottleneck filtering of generation against consumption
//! - `share`: per-interval renewable share and mean-of-ratios tallies
//! - `aggregator`: incremental yearly average with a finalized and a volatile segment
//! - `cache`: keyed values with explicit time-to-live
//! - `calendar`: Berlin public holidays and day classification
//! - `dashboard`: `update(now)` driver and read-only accessors
//! - `web`: HTTP API
//! - `config`, `logging`, `error`: ambient plumbing

pub mod aggregator;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod logging;
pub mod series;
pub mod share;
pub mod sources;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{Result, WendeError};
