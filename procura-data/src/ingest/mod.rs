//! Incremental ingestion of entities and contracts.
//!
//! Each resource kind has its own loop. A loop resumes at the highest block
//! present in the page cache, walks blocks in order until the remote source
//! reports the end of data, and hands every record to the persistence
//! collaborator. Re-running a loop is always safe: complete cached blocks are
//! replayed without remote traffic and persistence is idempotent.

mod driver;

pub use driver::{IngestError, IngestReport, IngestionDriver, StopSignal};

#[cfg(test)]
mod tests;
