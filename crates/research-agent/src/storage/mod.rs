//! Storage module for persistent data storage
//!
//! SQLite-backed persistence for chat sessions and document metadata, plus
//! the on-disk layout of uploaded files and extracted text.

mod documents;
mod sessions;

pub use documents::DocumentStore;
pub use sessions::SessionStore;

use crate::error::{Error, Result};

/// Run a blocking database call off the async runtime
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort as strings
pub(crate) fn format_timestamp(t: &chrono::DateTime<chrono::Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}
