//! Unit tests for the ingestion driver.

use procura_core::{BLOCK_SIZE, ExternalId, ResourceKind, test_support::MemoryStore};
use rstest::{fixture, rstest};

use super::{IngestError, IngestionDriver, StopSignal};
use crate::{
    PageCache,
    test_support::{
        MemoryPageCache, StubRemoteSource, contract_detail, contract_stub, records,
    },
};

const ENTITIES: ResourceKind = ResourceKind::Entities;
const CONTRACTS: ResourceKind = ResourceKind::Contracts;

fn full_block(block: u64) -> Vec<procura_core::RawRecord> {
    let first = i64::try_from(block * BLOCK_SIZE).expect("small block index");
    records(first + 1, BLOCK_SIZE)
}

/// Remote with `full` complete entity blocks followed by a short one.
fn entity_remote(full: u64, tail: u64) -> StubRemoteSource {
    let mut remote = StubRemoteSource::default();
    for block in 0..full {
        remote = remote.with_block(ENTITIES, block, full_block(block));
    }
    if tail > 0 {
        let first = i64::try_from(full * BLOCK_SIZE).expect("small block index");
        remote = remote.with_block(ENTITIES, full, records(first + 1, tail));
    }
    remote
}

/// Remote listing one contract per id, each awarded by entity 1 to entity 2.
fn contract_remote(ids: &[i64]) -> StubRemoteSource {
    let stubs = ids.iter().map(|id| contract_stub(*id)).collect();
    ids.iter().fold(
        StubRemoteSource::default().with_block(CONTRACTS, 0, stubs),
        |remote, id| {
            remote.with_item(
                CONTRACTS,
                ExternalId::new(*id),
                contract_detail(*id, &[1], &[2]),
            )
        },
    )
}

#[fixture]
fn store() -> MemoryStore {
    let mut store = MemoryStore::default();
    store.seed_entity(1, "Município de Castro Marim");
    store.seed_entity(2, "Gráfica do Sul");
    store
}

#[rstest]
fn entities_are_ingested_until_the_first_empty_block() {
    let cache = MemoryPageCache::default();
    let remote = entity_remote(2, 4);
    let mut store = MemoryStore::default();

    let report = IngestionDriver::new(&cache, &remote)
        .update_entities(&mut store)
        .expect("ingest entities");

    assert_eq!(report.start_block, 0);
    assert_eq!(report.blocks, 3);
    assert_eq!(report.records, 2 * BLOCK_SIZE + 4);
    assert!(!report.stopped);
    assert_eq!(store.entity_count(), 54);
    assert_eq!(remote.fetched_blocks(ENTITIES), vec![0, 1, 2, 3]);
    assert_eq!(cache.block_count(ENTITIES), 3, "empty block is not cached");
}

#[rstest]
fn resume_replays_the_highest_cached_block() {
    let cache = MemoryPageCache::default();
    cache
        .put_block(ENTITIES, 0, &full_block(0).into())
        .expect("seed block 0");
    cache
        .put_block(ENTITIES, 1, &full_block(1).into())
        .expect("seed block 1");
    let remote = entity_remote(3, 0);
    let driver = IngestionDriver::new(&cache, &remote);
    let mut store = MemoryStore::default();

    assert_eq!(driver.resume_point(ENTITIES).expect("resume point"), 1);
    let report = driver.update_entities(&mut store).expect("ingest");

    assert_eq!(report.start_block, 1);
    assert_eq!(report.blocks, 2);
    assert_eq!(remote.fetched_blocks(ENTITIES), vec![2, 3]);
    assert!(store.entity(26).is_some(), "replayed block is saved");
    assert!(store.entity(1).is_none(), "earlier blocks are skipped");
}

#[rstest]
fn empty_cache_resumes_from_the_first_block() {
    let cache = MemoryPageCache::default();
    let remote = StubRemoteSource::default();
    let driver = IngestionDriver::new(&cache, &remote);

    assert_eq!(driver.resume_point(CONTRACTS).expect("resume point"), 0);
    let report = driver
        .update_contracts(&mut MemoryStore::default())
        .expect("nothing to ingest");
    assert_eq!(report.blocks, 0);
    assert_eq!(report.records, 0);
}

#[rstest]
fn interrupted_run_then_resume_matches_a_single_run() {
    let uninterrupted = {
        let cache = MemoryPageCache::default();
        let mut store = MemoryStore::default();
        IngestionDriver::new(&cache, &entity_remote(4, 7))
            .update_entities(&mut store)
            .expect("single run");
        store
    };

    let cache = MemoryPageCache::default();
    let mut store = MemoryStore::default();
    let flaky = entity_remote(4, 7).with_failing_block(ENTITIES, 3);
    let err = IngestionDriver::new(&cache, &flaky)
        .update_entities(&mut store)
        .expect_err("remote fails mid-run");
    assert!(matches!(err, IngestError::Block { block: 3, .. }));

    let healthy = entity_remote(4, 7);
    let report = IngestionDriver::new(&cache, &healthy)
        .update_entities(&mut store)
        .expect("resumed run");
    assert_eq!(report.start_block, 2);
    assert_eq!(store, uninterrupted);
}

#[rstest]
fn contracts_are_created_once_and_associations_merge(store: MemoryStore) {
    let mut store = store;
    let cache = MemoryPageCache::default();
    let remote = contract_remote(&[100, 101]);
    let driver = IngestionDriver::new(&cache, &remote);

    let first = driver.update_contracts(&mut store).expect("first run");
    assert_eq!((first.created, first.existing), (2, 0));
    let after_first = store.clone();

    let second = driver.update_contracts(&mut store).expect("second run");
    assert_eq!((second.created, second.existing), (0, 2));
    assert_eq!(store, after_first, "re-ingestion changes nothing");
    assert_eq!(remote.item_calls(), 2, "details come from the cache");

    let contract = store.contract(100).expect("contract stored");
    assert_eq!(contract.contractors.len(), 1);
    assert_eq!(contract.contracted.len(), 1);
    assert_eq!(contract.price, 123_456);
}

#[rstest]
fn failing_contract_aborts_the_loop(store: MemoryStore) {
    let mut store = store.with_failing_contract(101);
    let cache = MemoryPageCache::default();
    let remote = contract_remote(&[100, 101, 102]);

    let err = IngestionDriver::new(&cache, &remote)
        .update_contracts(&mut store)
        .expect_err("store rejects contract 101");

    match err {
        IngestError::Store { external_id, .. } => assert_eq!(external_id, "101"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.contract(100).is_some());
    assert!(store.contract(102).is_none(), "loop stops at the failure");
}

#[rstest]
fn missing_contract_detail_is_reported(store: MemoryStore) {
    let mut store = store;
    let cache = MemoryPageCache::default();
    let remote =
        StubRemoteSource::default().with_block(CONTRACTS, 0, vec![contract_stub(404)]);

    let err = IngestionDriver::new(&cache, &remote)
        .update_contracts(&mut store)
        .expect_err("detail not scripted");
    assert!(matches!(
        err,
        IngestError::Item { external_id, .. } if external_id == ExternalId::new(404)
    ));
}

#[rstest]
fn stop_signal_halts_before_the_next_block() {
    let cache = MemoryPageCache::default();
    let remote = entity_remote(3, 0);
    let stop = StopSignal::new();
    stop.request_stop();

    let report = IngestionDriver::new(&cache, &remote)
        .with_stop_signal(stop.clone())
        .update_entities(&mut MemoryStore::default())
        .expect("stopped run");

    assert!(report.stopped);
    assert_eq!(report.blocks, 0);
    assert_eq!(remote.block_calls(ENTITIES), 0);
    assert!(report.to_string().ends_with("stopped early"));
}

#[rstest]
fn concurrent_loops_use_separate_stores(store: MemoryStore) {
    let cache = MemoryPageCache::default();
    let mut remote = entity_remote(1, 2);
    for id in [100, 101] {
        remote = remote.with_item(CONTRACTS, ExternalId::new(id), contract_detail(id, &[1], &[2]));
    }
    let remote = remote.with_block(
        CONTRACTS,
        0,
        vec![contract_stub(100), contract_stub(101)],
    );
    let mut entity_store = MemoryStore::default();
    let mut contract_store = store;

    let (entities, contracts) = IngestionDriver::new(&cache, &remote)
        .update_concurrently(&mut entity_store, &mut contract_store)
        .expect("both loops succeed");

    assert_eq!(entities.records, BLOCK_SIZE + 2);
    assert_eq!(contracts.created, 2);
    assert_eq!(entity_store.entity_count(), 27);
    assert_eq!(contract_store.contract_count(), 2);
}

#[rstest]
fn concurrent_failure_stops_the_sibling_loop(store: MemoryStore) {
    let cache = MemoryPageCache::default();
    let remote = contract_remote(&[100]).with_failing_block(ENTITIES, 0);
    let driver = IngestionDriver::new(&cache, &remote);
    let mut contract_store = store;

    let err = driver
        .update_concurrently(&mut MemoryStore::default(), &mut contract_store)
        .expect_err("entities loop fails");

    assert!(matches!(err, IngestError::Block { kind: ResourceKind::Entities, .. }));
    assert!(driver.stop_signal().is_stop_requested());
}
