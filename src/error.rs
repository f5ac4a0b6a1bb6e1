// src/error.rs
//! Error taxonomy for the classification, rendering and history layers.
//!
//! Outer layers (config, sources, notifiers, the binary) use `anyhow`; the
//! core keeps typed errors so callers can decide retry policy per kind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The keyword set could not be compiled into a matcher.
    #[error("invalid keyword pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A single notice could not be rendered. Record-local, never fatal.
    #[error("render failed for `{title}`: {reason}")]
    RenderFailure { title: String, reason: String },

    #[error("history storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("unsupported history schema version {found}, max supported {supported}")]
    UnsupportedSchema { found: i64, supported: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure part-way through `HistoryStore::insert`.
///
/// Entries before the failing one are committed; `inserted` counts the
/// genuinely new ones among them.
#[derive(Debug, Error)]
#[error("history insert aborted after {inserted} new entries: {source}")]
pub struct InsertError {
    pub inserted: usize,
    #[source]
    pub source: Error,
}
