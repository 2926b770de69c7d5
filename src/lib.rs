//! Transform-and-load core for a small weather data platform.
//!
//! Raw provider payloads are normalized into a canonical record shape,
//! validated and cleaned, then appended to one of several interchangeable
//! storage backends (CSV, JSON, Parquet, SQLite, PostgreSQL).

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod utils;
pub mod validate;

pub use error::{EtlError, Result};
