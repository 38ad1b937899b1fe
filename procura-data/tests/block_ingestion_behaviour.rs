//! Behavioural tests for block ingestion over the filesystem page cache.
//!
//! The remote source is scripted with [`StubRemoteSource`]; the cache is a
//! real [`FsPageCache`] rooted in a temporary directory so resume behaviour is
//! exercised against what survives on disk.

use camino::Utf8PathBuf;
use procura_core::{BLOCK_SIZE, ExternalId, RawRecord, ResourceKind, test_support::MemoryStore};
use procura_data::{
    FsPageCache, IngestError, IngestReport, IngestionDriver, PageCache,
    test_support::{StubRemoteSource, contract_detail, contract_stub, records},
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;

const ENTITIES: ResourceKind = ResourceKind::Entities;
const CONTRACTS: ResourceKind = ResourceKind::Contracts;

/// Shared state threaded through the steps of one scenario.
struct Ingestion {
    dir: TempDir,
    remote: StubRemoteSource,
    store: MemoryStore,
    reports: Vec<Result<IngestReport, IngestError>>,
}

impl Ingestion {
    fn cache(&self) -> FsPageCache {
        let root = Utf8PathBuf::from_path_buf(self.dir.path().join("cache"))
            .expect("temporary directory path is UTF-8");
        FsPageCache::open(root).expect("open page cache")
    }

    fn last_report(&self) -> &IngestReport {
        self.reports
            .last()
            .expect("ingestion has run")
            .as_ref()
            .expect("ingestion succeeded")
    }
}

type World = RefCell<Ingestion>;

#[fixture]
fn world() -> World {
    let mut store = MemoryStore::default();
    store.seed_entity(1, "Município de Castro Marim");
    store.seed_entity(2, "Gráfica do Sul");
    RefCell::new(Ingestion {
        dir: TempDir::new().expect("create temp dir"),
        remote: StubRemoteSource::default(),
        store,
        reports: Vec::new(),
    })
}

fn entity_block(block: u64, count: u64) -> Vec<RawRecord> {
    let first = i64::try_from(block * BLOCK_SIZE).expect("small block index") + 1_000;
    records(first, count)
}

// --- Given steps ---

#[given("a remote source with two full entity blocks and a short third block")]
fn remote_with_entities(#[from(world)] world: &World) {
    let mut state = world.borrow_mut();
    state.remote = StubRemoteSource::default()
        .with_block(ENTITIES, 0, entity_block(0, BLOCK_SIZE))
        .with_block(ENTITIES, 1, entity_block(1, BLOCK_SIZE))
        .with_block(ENTITIES, 2, entity_block(2, 4));
}

#[given("a remote source listing two contracts")]
fn remote_with_contracts(#[from(world)] world: &World) {
    let mut state = world.borrow_mut();
    state.remote = [100, 101].into_iter().fold(
        StubRemoteSource::default()
            .with_block(CONTRACTS, 0, vec![contract_stub(100), contract_stub(101)]),
        |remote, id| {
            remote.with_item(CONTRACTS, ExternalId::new(id), contract_detail(id, &[1], &[2]))
        },
    );
}

#[given("an empty page cache")]
fn empty_cache(#[from(world)] world: &World) {
    let cache = world.borrow().cache();
    assert!(
        cache.block_indices(ENTITIES).expect("list blocks").is_empty(),
        "cache starts empty"
    );
}

#[given("a page cache holding the first two entity blocks")]
fn cache_with_two_blocks(#[from(world)] world: &World) {
    let cache = world.borrow().cache();
    for block in 0..2 {
        cache
            .put_block(ENTITIES, block, &entity_block(block, BLOCK_SIZE).into())
            .expect("seed cache");
    }
}

#[given("a page cache holding a truncated first entity block")]
fn cache_with_truncated_block(#[from(world)] world: &World) {
    world
        .borrow()
        .cache()
        .put_block(ENTITIES, 0, &entity_block(0, 10).into())
        .expect("seed cache");
}

// --- When steps ---

#[when("the entities are ingested")]
fn ingest_entities(#[from(world)] world: &World) {
    let mut guard = world.borrow_mut();
    let state = &mut *guard;
    let cache = state.cache();
    let report = IngestionDriver::new(&cache, &state.remote).update_entities(&mut state.store);
    state.reports.push(report);
}

#[when("the contracts are ingested twice")]
fn ingest_contracts_twice(#[from(world)] world: &World) {
    let mut guard = world.borrow_mut();
    let state = &mut *guard;
    let cache = state.cache();
    for _ in 0..2 {
        let report =
            IngestionDriver::new(&cache, &state.remote).update_contracts(&mut state.store);
        state.reports.push(report);
    }
}

// --- Then steps ---

#[then("54 entities are saved")]
fn entities_stored(#[from(world)] world: &World) {
    let state = world.borrow();
    // Two entities are seeded before every scenario.
    assert_eq!(state.store.entity_count(), 56);
    assert_eq!(state.last_report().records, 2 * BLOCK_SIZE + 4);
}

#[then("3 entity blocks are cached")]
fn blocks_cached(#[from(world)] world: &World) {
    let indices = world
        .borrow()
        .cache()
        .block_indices(ENTITIES)
        .expect("list blocks");
    assert_eq!(indices, vec![0, 1, 2]);
}

#[then("ingestion starts at block 1")]
fn starts_at_block_one(#[from(world)] world: &World) {
    assert_eq!(world.borrow().last_report().start_block, 1);
}

#[then("only blocks 2 and 3 are fetched")]
fn fetches_after_resume(#[from(world)] world: &World) {
    assert_eq!(world.borrow().remote.fetched_blocks(ENTITIES), vec![2, 3]);
}

#[then("block 0 is fetched again")]
fn refetches_block_zero(#[from(world)] world: &World) {
    let state = world.borrow();
    assert_eq!(state.remote.fetched_blocks(ENTITIES).first(), Some(&0));
    let cached = state
        .cache()
        .get_block(ENTITIES, 0)
        .expect("read cache")
        .expect("block cached");
    assert!(cached.is_complete());
}

#[then("2 contracts are stored")]
fn contracts_stored(#[from(world)] world: &World) {
    let state = world.borrow();
    assert_eq!(state.store.contract_count(), 2);
    let created: u64 = state
        .reports
        .iter()
        .map(|report| report.as_ref().expect("ingestion succeeded").created)
        .sum();
    assert_eq!(created, 2, "second run only finds existing contracts");
}

#[then("each contract keeps one contractor and one contracted entity")]
fn associations_merged(#[from(world)] world: &World) {
    let state = world.borrow();
    for id in [100, 101] {
        let contract = state.store.contract(id).expect("contract stored");
        assert_eq!(contract.contractors.len(), 1);
        assert_eq!(contract.contracted.len(), 1);
    }
}

#[then("contract details are fetched once")]
fn details_fetched_once(#[from(world)] world: &World) {
    assert_eq!(world.borrow().remote.item_calls(), 2);
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/block_ingestion.feature", name = $title)]
        fn $fn_name(world: World) {
            let _ = world;
        }
    };
}

register_scenario!(ingesting_from_empty_cache, "ingesting entities from an empty cache");
register_scenario!(resuming_from_highest_block, "resuming from the highest cached block");
register_scenario!(refetching_incomplete_block, "refetching an incomplete cached block");
register_scenario!(ingesting_contracts_twice, "ingesting the same contracts twice");
