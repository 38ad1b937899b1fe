//! Durable page cache for remote blocks and item details.
//!
//! The cache is append-only: entries are overwritten only when a block is
//! re-fetched, and nothing is ever evicted. Reads that find a corrupt entry
//! report a miss so the caller re-fetches it.

mod fs;

use std::io;

use procura_core::{Block, ExternalId, RawRecord, ResourceKind};
use thiserror::Error;

pub use fs::FsPageCache;

/// Errors raised when the cache storage itself fails.
///
/// Corrupt entries are not errors; they read back as misses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// A filesystem operation failed.
    #[error("failed to {operation} at {path}")]
    Io {
        /// Description of the failing operation.
        operation: &'static str,
        /// Cache-relative location of the entry.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// An entry could not be serialised for storage.
    #[error("failed to encode cache entry {path}")]
    Encode {
        /// Cache-relative location of the entry.
        path: String,
        /// Serialiser failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Storage for fetched blocks and items, keyed by resource kind.
///
/// Methods take `&self` so one cache can serve both ingestion loops;
/// implementations synchronise internally where they need to.
pub trait PageCache {
    /// Cached block `block` of `kind`, or `None` on a miss.
    fn get_block(&self, kind: ResourceKind, block: u64) -> Result<Option<Block>, CacheError>;

    /// Store `records` as block `block` of `kind`, replacing any previous entry.
    fn put_block(&self, kind: ResourceKind, block: u64, records: &Block) -> Result<(), CacheError>;

    /// Cached detail record `id` of `kind`, or `None` on a miss.
    fn get_item(&self, kind: ResourceKind, id: ExternalId) -> Result<Option<RawRecord>, CacheError>;

    /// Store the detail record `id` of `kind`.
    fn put_item(
        &self,
        kind: ResourceKind,
        id: ExternalId,
        record: &RawRecord,
    ) -> Result<(), CacheError>;

    /// Indices of every block of `kind` that has an entry, in any order.
    fn block_indices(&self, kind: ResourceKind) -> Result<Vec<u64>, CacheError>;
}

impl<C> PageCache for &C
where
    C: PageCache + ?Sized,
{
    fn get_block(&self, kind: ResourceKind, block: u64) -> Result<Option<Block>, CacheError> {
        (**self).get_block(kind, block)
    }

    fn put_block(&self, kind: ResourceKind, block: u64, records: &Block) -> Result<(), CacheError> {
        (**self).put_block(kind, block, records)
    }

    fn get_item(
        &self,
        kind: ResourceKind,
        id: ExternalId,
    ) -> Result<Option<RawRecord>, CacheError> {
        (**self).get_item(kind, id)
    }

    fn put_item(
        &self,
        kind: ResourceKind,
        id: ExternalId,
        record: &RawRecord,
    ) -> Result<(), CacheError> {
        (**self).put_item(kind, id, record)
    }

    fn block_indices(&self, kind: ResourceKind) -> Result<Vec<u64>, CacheError> {
        (**self).block_indices(kind)
    }
}

/// Highest block index of `kind` present in `cache`, if any.
///
/// This is the resume cursor: it is derived from the cache listing on every
/// call and never stored. Indices whose item range overflows are ignored.
///
/// # Examples
/// ```
/// use procura_core::{Block, ResourceKind};
/// use procura_data::{PageCache, highest_cached_block, test_support::MemoryPageCache};
///
/// let cache = MemoryPageCache::default();
/// assert_eq!(highest_cached_block(&cache, ResourceKind::Entities)?, None);
///
/// cache.put_block(ResourceKind::Entities, 3, &Block::default())?;
/// cache.put_block(ResourceKind::Entities, 7, &Block::default())?;
/// assert_eq!(highest_cached_block(&cache, ResourceKind::Entities)?, Some(7));
/// assert_eq!(highest_cached_block(&cache, ResourceKind::Contracts)?, None);
/// # Ok::<(), procura_data::CacheError>(())
/// ```
pub fn highest_cached_block<C>(cache: &C, kind: ResourceKind) -> Result<Option<u64>, CacheError>
where
    C: PageCache + ?Sized,
{
    Ok(cache
        .block_indices(kind)?
        .into_iter()
        .filter(|block| {
            let addressable = kind.is_addressable(*block);
            if !addressable {
                log::warn!("ignoring cached {kind} block {block} past the addressable item range");
            }
            addressable
        })
        .max())
}
