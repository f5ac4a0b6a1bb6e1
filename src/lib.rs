// src/lib.rs
// Public library surface for the watcher binary and integration tests.

pub mod classify;
pub mod config;
pub mod error;
pub mod history;
pub mod matcher;
pub mod notice;
pub mod render;

// Delivery loop around the core: sources, notifiers, poll cycle, timers
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::classify::{classify, ClassifiedBatch};
pub use crate::error::{Error, InsertError};
pub use crate::history::{HistoryEntry, HistoryStore, RetentionPolicy};
pub use crate::matcher::KeywordPattern;
pub use crate::notice::Notice;
pub use crate::render::{render, Category};
