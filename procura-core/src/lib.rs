//! Core domain types for the procura ingestion pipeline.
//!
//! The crate models the public-procurement records mirrored from the remote
//! source: the resource kinds that are paginated in fixed-size blocks, the raw
//! loosely-typed records the source returns, and the canonical values the
//! [`normalize`] layer derives from them. Persistence is expressed through the
//! [`ReferenceLookup`] and [`ProcurementStore`] capability traits so the
//! normalizer never depends on a concrete database.
//!
//! Invariants:
//! - A block is complete only when it holds exactly [`BLOCK_SIZE`] records.
//! - Canonical contracts keep the external id they were created with.
#![forbid(unsafe_code)]

mod kind;
mod model;
pub mod normalize;
mod record;
mod reference;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use kind::{BLOCK_SIZE, ResourceKind};
pub use model::{
    AssociationRole, CanonicalContract, CanonicalEntity, ContractOutcome, ExternalId, Place,
    ReferenceId,
};
pub use normalize::{
    Canonical, NormalizeError, normalize, normalize_contract, normalize_entity, parse_cpv_code,
    parse_date, parse_price,
};
pub use record::{Block, RawRecord};
pub use reference::{
    LookupKey, ProcurementStore, ReferenceEntry, ReferenceKind, ReferenceLookup, StoreError,
};

#[cfg(feature = "store-sqlite")]
pub use store::{SCHEMA_VERSION, SchemaError, SqliteStore};
