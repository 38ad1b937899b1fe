//! Facade crate for the procura procurement mirror.
//!
//! This crate re-exports the core domain types and exposes the ingestion
//! pipeline and SQLite store behind feature flags.

#![forbid(unsafe_code)]

pub use procura_core::{
    AssociationRole, BLOCK_SIZE, Block, CanonicalContract, CanonicalEntity, ContractOutcome,
    ExternalId, LookupKey, NormalizeError, Place, ProcurementStore, RawRecord, ReferenceEntry,
    ReferenceId, ReferenceKind, ReferenceLookup, ResourceKind, StoreError, normalize,
};

#[cfg(feature = "store-sqlite")]
pub use procura_core::{SchemaError, SqliteStore};

#[cfg(feature = "ingest")]
pub use procura_data::{
    FsPageCache, HttpRemoteConfig, HttpRemoteSource, IngestError, IngestReport, IngestionDriver,
    PageCache, RemoteSource, StopSignal, VocabularySummary, sync_reference_vocabularies,
};
