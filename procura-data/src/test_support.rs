//! Test doubles for the page cache and the remote source.
//!
//! [`MemoryPageCache`] and [`StubRemoteSource`] let retrieval and ingestion be
//! exercised deterministically without touching the filesystem or network.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io,
    sync::{Mutex, MutexGuard, PoisonError},
};

use procura_core::{Block, ExternalId, RawRecord, ResourceKind};
use serde_json::json;

use crate::{CacheError, PageCache, RemoteSource, TransportError, Vocabulary, VocabularyItem};

const STUB_URL: &str = "stub://remote";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Page cache held in memory.
#[derive(Debug, Default)]
pub struct MemoryPageCache {
    blocks: Mutex<BTreeMap<(ResourceKind, u64), Block>>,
    items: Mutex<HashMap<(ResourceKind, ExternalId), RawRecord>>,
}

impl MemoryPageCache {
    /// Number of cached blocks of `kind`.
    #[must_use]
    pub fn block_count(&self, kind: ResourceKind) -> usize {
        lock(&self.blocks)
            .keys()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .count()
    }

    /// Number of cached items of `kind`.
    #[must_use]
    pub fn item_count(&self, kind: ResourceKind) -> usize {
        lock(&self.items)
            .keys()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .count()
    }
}

impl PageCache for MemoryPageCache {
    fn get_block(&self, kind: ResourceKind, block: u64) -> Result<Option<Block>, CacheError> {
        Ok(lock(&self.blocks).get(&(kind, block)).cloned())
    }

    fn put_block(&self, kind: ResourceKind, block: u64, records: &Block) -> Result<(), CacheError> {
        lock(&self.blocks).insert((kind, block), records.clone());
        Ok(())
    }

    fn get_item(
        &self,
        kind: ResourceKind,
        id: ExternalId,
    ) -> Result<Option<RawRecord>, CacheError> {
        Ok(lock(&self.items).get(&(kind, id)).cloned())
    }

    fn put_item(
        &self,
        kind: ResourceKind,
        id: ExternalId,
        record: &RawRecord,
    ) -> Result<(), CacheError> {
        lock(&self.items).insert((kind, id), record.clone());
        Ok(())
    }

    fn block_indices(&self, kind: ResourceKind) -> Result<Vec<u64>, CacheError> {
        Ok(lock(&self.blocks)
            .keys()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .map(|(_, block)| *block)
            .collect())
    }
}

/// Scripted remote source.
///
/// Unscripted blocks are empty (end of data), unscripted items fail with a
/// 404, and unscripted vocabularies are empty. Every call is recorded.
#[derive(Debug, Default)]
pub struct StubRemoteSource {
    blocks: HashMap<(ResourceKind, u64), Vec<RawRecord>>,
    items: HashMap<(ResourceKind, ExternalId), RawRecord>,
    vocabularies: Vec<(Vocabulary, Vec<VocabularyItem>)>,
    failing_blocks: HashSet<(ResourceKind, u64)>,
    offline: bool,
    block_log: Mutex<Vec<(ResourceKind, u64)>>,
    item_log: Mutex<Vec<ExternalId>>,
}

impl StubRemoteSource {
    /// Script the records returned for block `block` of `kind`.
    #[must_use]
    pub fn with_block(mut self, kind: ResourceKind, block: u64, records: Vec<RawRecord>) -> Self {
        self.blocks.insert((kind, block), records);
        self
    }

    /// Script the detail record returned for `id`.
    #[must_use]
    pub fn with_item(mut self, kind: ResourceKind, id: ExternalId, record: RawRecord) -> Self {
        self.items.insert((kind, id), record);
        self
    }

    /// Script the entries returned for `vocabulary`.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary, items: Vec<VocabularyItem>) -> Self {
        self.vocabularies.push((vocabulary, items));
        self
    }

    /// Make block `block` of `kind` fail with a network error.
    #[must_use]
    pub fn with_failing_block(mut self, kind: ResourceKind, block: u64) -> Self {
        self.failing_blocks.insert((kind, block));
        self
    }

    /// Make every call fail with a network error.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Number of block fetches issued for `kind`.
    #[must_use]
    pub fn block_calls(&self, kind: ResourceKind) -> usize {
        self.fetched_blocks(kind).len()
    }

    /// Block indices fetched for `kind`, in call order.
    #[must_use]
    pub fn fetched_blocks(&self, kind: ResourceKind) -> Vec<u64> {
        lock(&self.block_log)
            .iter()
            .filter(|(entry_kind, _)| *entry_kind == kind)
            .map(|(_, block)| *block)
            .collect()
    }

    /// Number of item fetches issued.
    #[must_use]
    pub fn item_calls(&self) -> usize {
        lock(&self.item_log).len()
    }

    fn offline_error(path: &str) -> TransportError {
        TransportError::Network {
            url: format!("{STUB_URL}/{path}"),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "stub remote is offline"),
        }
    }
}

impl RemoteSource for StubRemoteSource {
    fn fetch_block(&self, kind: ResourceKind, block: u64) -> Result<Vec<RawRecord>, TransportError> {
        lock(&self.block_log).push((kind, block));
        if self.offline || self.failing_blocks.contains(&(kind, block)) {
            return Err(Self::offline_error(kind.path()));
        }
        Ok(self.blocks.get(&(kind, block)).cloned().unwrap_or_default())
    }

    fn fetch_item(&self, kind: ResourceKind, id: ExternalId) -> Result<RawRecord, TransportError> {
        lock(&self.item_log).push(id);
        let path = format!("{}/{id}", kind.path());
        if self.offline {
            return Err(Self::offline_error(&path));
        }
        self.items
            .get(&(kind, id))
            .cloned()
            .ok_or_else(|| TransportError::Http {
                url: format!("{STUB_URL}/{path}"),
                status: 404,
                message: "not scripted".to_owned(),
            })
    }

    fn fetch_vocabulary(
        &self,
        vocabulary: &Vocabulary,
    ) -> Result<Vec<VocabularyItem>, TransportError> {
        if self.offline {
            return Err(Self::offline_error(vocabulary.path()));
        }
        Ok(self
            .vocabularies
            .iter()
            .find(|(scripted, _)| scripted == vocabulary)
            .map(|(_, items)| items.clone())
            .unwrap_or_default())
    }
}

/// `count` entity records with consecutive ids starting at `first_id`.
#[must_use]
pub fn records(first_id: i64, count: u64) -> Vec<RawRecord> {
    (0..count)
        .filter_map(|offset| i64::try_from(offset).ok())
        .map(|offset| entity_record(first_id + offset))
        .collect()
}

/// Entity record as listed by the remote source.
#[must_use]
pub fn entity_record(id: i64) -> RawRecord {
    object(json!({
        "id": id,
        "description": format!("Entidade {id}"),
        "nif": format!("5{id:08}"),
        "country": "Portugal"
    }))
}

/// Contract list stub carrying only the fields the list endpoint returns.
#[must_use]
pub fn contract_stub(id: i64) -> RawRecord {
    object(json!({
        "id": id,
        "objectBriefDescription": format!("Contrato {id}"),
        "initialContractualPrice": "1.000,00 €"
    }))
}

/// Full contract detail linking the given entity ids.
#[must_use]
pub fn contract_detail(id: i64, contracting: &[i64], contracted: &[i64]) -> RawRecord {
    let refs = |ids: &[i64]| ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>();
    object(json!({
        "id": id,
        "contractingProcedureType": "Ajuste Direto",
        "contractTypes": "Aquisição de serviços",
        "objectBriefDescription": format!("Contrato {id}"),
        "description": "",
        "signingDate": "05-03-2014",
        "publicationDate": "07-03-2014",
        "cpvs": "79822500-7, Serviços de concepção gráfica",
        "initialContractualPrice": "1.234,56 €",
        "executionPlace": "Portugal, Faro, Castro Marim",
        "contracting": refs(contracting),
        "contracted": refs(contracted)
    }))
}

fn object(value: serde_json::Value) -> RawRecord {
    RawRecord::from_json(value).unwrap_or_default()
}
