//! Sequencing loops for entities and contracts.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use procura_core::{
    AssociationRole, Block, ContractOutcome, ExternalId, NormalizeError, ProcurementStore,
    RawRecord, ResourceKind, StoreError, normalize_contract, normalize_entity,
};
use thiserror::Error;

use crate::{BlockRetriever, CacheError, ItemRetriever, PageCache, RemoteSource, RetrieveError};
use crate::cache::highest_cached_block;

/// Errors that abort an ingestion loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The resume point could not be read from the cache.
    #[error("failed to scan the {kind} cache for a resume point")]
    ResumePoint {
        /// Kind being resumed.
        kind: ResourceKind,
        /// Cache failure.
        #[source]
        source: CacheError,
    },
    /// A block could not be retrieved.
    #[error("failed to retrieve {kind} block {block}")]
    Block {
        /// Kind being paginated.
        kind: ResourceKind,
        /// Index of the failing block.
        block: u64,
        /// Retrieval failure.
        #[source]
        source: RetrieveError,
    },
    /// A contract stub in a list block had no usable id.
    #[error("{kind} block {block} lists a record without an id: {label}")]
    MissingId {
        /// Kind being paginated.
        kind: ResourceKind,
        /// Index of the block holding the stub.
        block: u64,
        /// Rendering of the offending id field.
        label: String,
    },
    /// The detail record of a contract could not be retrieved.
    #[error("failed to retrieve contract {external_id}")]
    Item {
        /// Remote id of the contract.
        external_id: ExternalId,
        /// Retrieval failure.
        #[source]
        source: RetrieveError,
    },
    /// A record failed normalisation.
    #[error("failed to normalise {kind} record {external_id}")]
    Record {
        /// Kind of the record.
        kind: ResourceKind,
        /// Rendering of the record's id.
        external_id: String,
        /// Normalisation failure.
        #[source]
        source: NormalizeError,
    },
    /// The persistence collaborator rejected a record.
    #[error("failed to save {kind} record {external_id}")]
    Store {
        /// Kind of the record.
        kind: ResourceKind,
        /// Rendering of the record's id.
        external_id: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },
}

/// Cooperative cancellation flag checked between blocks.
///
/// Clones share the same flag, so one clone can be handed to a signal
/// handler while the driver polls another.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a signal that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running loops to stop before their next block.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Kind the loop walked.
    pub kind: ResourceKind,
    /// Block the loop resumed from.
    pub start_block: u64,
    /// Blocks processed.
    pub blocks: u64,
    /// Records normalised and saved.
    pub records: u64,
    /// Contracts created by this run.
    pub created: u64,
    /// Contracts that already existed and only had associations merged.
    pub existing: u64,
    /// Whether the loop ended because a stop was requested.
    pub stopped: bool,
}

impl IngestReport {
    const fn new(kind: ResourceKind, start_block: u64) -> Self {
        Self {
            kind,
            start_block,
            blocks: 0,
            records: 0,
            created: 0,
            existing: 0,
            stopped: false,
        }
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} blocks from block {}, {} records",
            self.kind, self.blocks, self.start_block, self.records
        )?;
        if self.kind == ResourceKind::Contracts {
            write!(f, " ({} new, {} already stored)", self.created, self.existing)?;
        }
        if self.stopped {
            f.write_str(", stopped early")?;
        }
        Ok(())
    }
}

/// Drives the entities and contracts loops over a cache and a remote source.
///
/// # Examples
/// ```
/// use procura_core::{ResourceKind, test_support::MemoryStore};
/// use procura_data::{
///     IngestionDriver,
///     test_support::{MemoryPageCache, StubRemoteSource, records},
/// };
///
/// let cache = MemoryPageCache::default();
/// let remote = StubRemoteSource::default().with_block(ResourceKind::Entities, 0, records(1, 3));
/// let mut store = MemoryStore::default();
///
/// let report = IngestionDriver::new(&cache, &remote).update_entities(&mut store)?;
/// assert_eq!(report.records, 3);
/// assert_eq!(store.entity_count(), 3);
/// # Ok::<(), procura_data::IngestError>(())
/// ```
#[derive(Debug)]
pub struct IngestionDriver<C, R> {
    cache: C,
    remote: R,
    stop: StopSignal,
}

impl<C, R> IngestionDriver<C, R>
where
    C: PageCache,
    R: RemoteSource,
{
    /// Create a driver over `cache` and `remote`.
    pub fn new(cache: C, remote: R) -> Self {
        Self {
            cache,
            remote,
            stop: StopSignal::new(),
        }
    }

    /// Use `stop` for cooperative cancellation.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Signal polled between blocks.
    #[must_use]
    pub const fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Block the next loop over `kind` starts from.
    ///
    /// This is the highest cached block, which is replayed so that a block
    /// interrupted mid-way is fully processed; `0` when nothing is cached.
    pub fn resume_point(&self, kind: ResourceKind) -> Result<u64, IngestError> {
        highest_cached_block(&self.cache, kind)
            .map(Option::unwrap_or_default)
            .map_err(|source| IngestError::ResumePoint { kind, source })
    }

    /// Walk entity blocks, upserting every entity.
    pub fn update_entities<S>(&self, store: &mut S) -> Result<IngestReport, IngestError>
    where
        S: ProcurementStore + ?Sized,
    {
        self.run_loop(ResourceKind::Entities, store, |store, _, page, report| {
            for record in page {
                save_entity(store, record)?;
                report.records += 1;
            }
            Ok(())
        })
    }

    /// Walk contract blocks, fetching each contract's detail and saving it.
    ///
    /// Contracts are created once; later runs only merge their associations.
    /// The first contract that fails aborts the loop, after its id is logged.
    pub fn update_contracts<S>(&self, store: &mut S) -> Result<IngestReport, IngestError>
    where
        S: ProcurementStore + ?Sized,
    {
        let items = ItemRetriever::new(&self.cache, &self.remote);
        self.run_loop(ResourceKind::Contracts, store, |store, block, page, report| {
            for stub in page {
                let external_id = stub_id(stub, block)?;
                let outcome = items
                    .get_item(ResourceKind::Contracts, external_id)
                    .map_err(|source| IngestError::Item {
                        external_id,
                        source,
                    })
                    .and_then(|detail| save_contract(store, &detail));
                match outcome {
                    Ok(ContractOutcome::Created(_)) => report.created += 1,
                    Ok(ContractOutcome::Existing(_)) => report.existing += 1,
                    Err(err) => {
                        log::error!("error on saving contract {external_id}: {err}");
                        return Err(err);
                    }
                }
                report.records += 1;
            }
            Ok(())
        })
    }

    /// Run the entities loop, then the contracts loop, against one store.
    pub fn update_all<S>(&self, store: &mut S) -> Result<(IngestReport, IngestReport), IngestError>
    where
        S: ProcurementStore + ?Sized,
    {
        let entities = self.update_entities(store)?;
        let contracts = self.update_contracts(store)?;
        Ok((entities, contracts))
    }

    /// Run both loops at the same time, each against its own store handle.
    ///
    /// The loops touch disjoint cache namespaces. When one loop fails the
    /// stop signal is raised so the other ends at its next block boundary;
    /// the entities error is reported first when both fail.
    pub fn update_concurrently<SE, SC>(
        &self,
        entity_store: &mut SE,
        contract_store: &mut SC,
    ) -> Result<(IngestReport, IngestReport), IngestError>
    where
        C: Sync,
        R: Sync,
        SE: ProcurementStore + Send + ?Sized,
        SC: ProcurementStore + Send + ?Sized,
    {
        let (entities, contracts) = thread::scope(|scope| {
            let entities = scope.spawn(|| self.stop_on_failure(self.update_entities(entity_store)));
            let contracts =
                scope.spawn(|| self.stop_on_failure(self.update_contracts(contract_store)));
            (join(entities), join(contracts))
        });
        Ok((entities?, contracts?))
    }

    fn stop_on_failure(
        &self,
        outcome: Result<IngestReport, IngestError>,
    ) -> Result<IngestReport, IngestError> {
        if outcome.is_err() {
            self.stop.request_stop();
        }
        outcome
    }

    fn run_loop<S, F>(
        &self,
        kind: ResourceKind,
        store: &mut S,
        mut process: F,
    ) -> Result<IngestReport, IngestError>
    where
        S: ProcurementStore + ?Sized,
        F: FnMut(&mut S, u64, &Block, &mut IngestReport) -> Result<(), IngestError>,
    {
        let start_block = self.resume_point(kind)?;
        let blocks = BlockRetriever::new(&self.cache, &self.remote);
        let mut report = IngestReport::new(kind, start_block);
        log::info!("updating {kind} from block {start_block}");

        let mut block = start_block;
        loop {
            if self.stop.is_stop_requested() {
                log::info!("stop requested; leaving {kind} before block {block}");
                report.stopped = true;
                break;
            }
            let page = match blocks.get_block(kind, block) {
                Ok(page) => page,
                Err(err) if err.is_end_of_data() => break,
                Err(source) => return Err(IngestError::Block { kind, block, source }),
            };
            log::info!("saving {kind} block {block} ({} records)", page.len());
            process(store, block, &page, &mut report)?;
            report.blocks += 1;
            block = match block.checked_add(1) {
                Some(next) if kind.is_addressable(next) => next,
                _ => break,
            };
        }
        Ok(report)
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

fn stub_id(stub: &RawRecord, block: u64) -> Result<ExternalId, IngestError> {
    stub.integer("id")
        .map(ExternalId::new)
        .ok_or_else(|| IngestError::MissingId {
            kind: ResourceKind::Contracts,
            block,
            label: stub.id_label(),
        })
}

fn save_entity<S>(store: &mut S, record: &RawRecord) -> Result<(), IngestError>
where
    S: ProcurementStore + ?Sized,
{
    let kind = ResourceKind::Entities;
    let entity = normalize_entity(record, &*store).map_err(|source| IngestError::Record {
        kind,
        external_id: record.id_label(),
        source,
    })?;
    store
        .upsert_entity(&entity)
        .map_err(|source| IngestError::Store {
            kind,
            external_id: entity.external_id.to_string(),
            source,
        })?;
    Ok(())
}

fn save_contract<S>(store: &mut S, detail: &RawRecord) -> Result<ContractOutcome, IngestError>
where
    S: ProcurementStore + ?Sized,
{
    let kind = ResourceKind::Contracts;
    let contract = normalize_contract(detail, &*store).map_err(|source| IngestError::Record {
        kind,
        external_id: detail.id_label(),
        source,
    })?;
    let external_id = contract.external_id;
    let store_error = |source| IngestError::Store {
        kind,
        external_id: external_id.to_string(),
        source,
    };

    let outcome = store
        .create_contract_if_absent(&contract)
        .map_err(store_error)?;
    match outcome {
        ContractOutcome::Created(_) => log::info!("contract {external_id} saved"),
        ContractOutcome::Existing(_) => log::info!("contract {external_id} already exists"),
    }
    for role in AssociationRole::ALL {
        let entities = match role {
            AssociationRole::Contractor => &contract.contractors,
            AssociationRole::Contracted => &contract.contracted,
        };
        if !entities.is_empty() {
            store
                .add_associations(outcome.id(), role, entities)
                .map_err(store_error)?;
        }
    }
    Ok(outcome)
}
