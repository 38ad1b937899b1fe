//! Cache-first retrieval of blocks and items.

use procura_core::{Block, ExternalId, RawRecord, ResourceKind};
use thiserror::Error;

use crate::{CacheError, PageCache, RemoteSource, TransportError};

/// Errors raised while retrieving a block or an item.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RetrieveError {
    /// The remote source returned no records for the block: end of data.
    #[error("no more {kind} after block {block}")]
    NoMoreEntries {
        /// Kind being paginated.
        kind: ResourceKind,
        /// Index of the empty block.
        block: u64,
    },
    /// The remote source could not be reached or answered with an error.
    #[error("remote source unavailable for {kind}")]
    Remote {
        /// Kind being fetched.
        kind: ResourceKind,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The page cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl RetrieveError {
    /// Whether this is the end-of-data signal rather than a failure.
    #[must_use]
    pub const fn is_end_of_data(&self) -> bool {
        matches!(self, Self::NoMoreEntries { .. })
    }
}

/// Returns complete blocks from the cache and re-fetches everything else.
///
/// A cached block is trusted only when it holds exactly
/// [`procura_core::BLOCK_SIZE`] records. Shorter cached blocks are fetched
/// again in full and the fresh result replaces the cached entry.
#[derive(Debug, Clone)]
pub struct BlockRetriever<C, R> {
    cache: C,
    remote: R,
}

impl<C, R> BlockRetriever<C, R>
where
    C: PageCache,
    R: RemoteSource,
{
    /// Combine a cache and a remote source.
    pub const fn new(cache: C, remote: R) -> Self {
        Self { cache, remote }
    }

    /// Retrieve block `block` of `kind`.
    ///
    /// # Errors
    ///
    /// [`RetrieveError::NoMoreEntries`] when the remote source returns an
    /// empty block; nothing is cached in that case.
    pub fn get_block(&self, kind: ResourceKind, block: u64) -> Result<Block, RetrieveError> {
        match self.cache.get_block(kind, block)? {
            Some(cached) if cached.is_complete() => {
                log::debug!("{kind} block {block}: cache hit");
                return Ok(cached);
            }
            Some(cached) => log::warn!(
                "{kind} block {block}: cached block holds {} records, fetching again",
                cached.len()
            ),
            None => log::debug!("{kind} block {block}: cache miss"),
        }

        let fetched = Block::new(
            self.remote
                .fetch_block(kind, block)
                .map_err(|source| RetrieveError::Remote { kind, source })?,
        );
        if fetched.is_empty() {
            log::info!("{kind} block {block}: no more entries");
            return Err(RetrieveError::NoMoreEntries { kind, block });
        }
        self.cache.put_block(kind, block, &fetched)?;
        Ok(fetched)
    }
}

/// Returns item details from the cache, fetching and storing them on a miss.
///
/// Cached items are trusted forever.
#[derive(Debug, Clone)]
pub struct ItemRetriever<C, R> {
    cache: C,
    remote: R,
}

impl<C, R> ItemRetriever<C, R>
where
    C: PageCache,
    R: RemoteSource,
{
    /// Combine a cache and a remote source.
    pub const fn new(cache: C, remote: R) -> Self {
        Self { cache, remote }
    }

    /// Retrieve the detail record `id` of `kind`.
    pub fn get_item(&self, kind: ResourceKind, id: ExternalId) -> Result<RawRecord, RetrieveError> {
        if let Some(cached) = self.cache.get_item(kind, id)? {
            return Ok(cached);
        }
        log::debug!("fetching {kind} item {id}");
        let fetched = self
            .remote
            .fetch_item(kind, id)
            .map_err(|source| RetrieveError::Remote { kind, source })?;
        self.cache.put_item(kind, id, &fetched)?;
        Ok(fetched)
    }
}
