//! Acquisition side of the procura pipeline.
//!
//! Responsibilities:
//! - Mirror remote list pages and item details into a durable [`cache`].
//! - Fetch blocks, items and reference vocabularies over HTTP ([`remote`]).
//! - Sequence block retrieval, normalisation and persistence ([`ingest`]).
//!
//! Boundaries:
//! - Field semantics and canonical values live in `procura-core`.
//! - Persistence is reached only through `procura_core::ProcurementStore`.
//!
//! Invariants:
//! - Only fully fetched, non-empty blocks are written to the cache.
//! - Block `n + 1` is never requested before block `n` has been resolved.
//! - No global mutable state; the resume point is recomputed from the cache.

pub mod cache;
pub mod ingest;
pub mod remote;
mod retrieve;
mod vocabulary;

#[doc(hidden)]
pub mod test_support;

pub use cache::{CacheError, FsPageCache, PageCache, highest_cached_block};
pub use ingest::{IngestError, IngestReport, IngestionDriver, StopSignal};
pub use remote::{
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT, HttpRemoteConfig, HttpRemoteSource, RemoteBuildError,
    RemoteSource, TransportError, Vocabulary, VocabularyItem,
};
pub use retrieve::{BlockRetriever, ItemRetriever, RetrieveError};
pub use vocabulary::{
    HOME_COUNTRY, HOME_COUNTRY_REMOTE_ID, VocabularyError, VocabularySummary,
    sync_reference_vocabularies,
};
