//! Unit tests for the SQLite procurement store.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rstest::{fixture, rstest};
use rusqlite::Connection;
use tempfile::TempDir;

use super::{SCHEMA_VERSION, SchemaError, SqliteStore, initialise_schema};
use crate::{
    AssociationRole, CanonicalContract, CanonicalEntity, ContractOutcome, ExternalId, LookupKey,
    Place, ProcurementStore, ReferenceEntry, ReferenceKind, ReferenceLookup, StoreError,
};

#[fixture]
fn store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("open in-memory store")
}

fn entity(external_id: i64, name: &str) -> CanonicalEntity {
    CanonicalEntity {
        external_id: ExternalId::new(external_id),
        name: name.to_owned(),
        country: None,
        tax_id: "500000000".to_owned(),
    }
}

fn contract(external_id: i64, price: i64) -> CanonicalContract {
    CanonicalContract {
        external_id: ExternalId::new(external_id),
        procedure_type: None,
        contract_type: None,
        brief_description: "Cartazes".to_owned(),
        full_description: String::new(),
        signing_date: NaiveDate::from_ymd_opt(2014, 3, 5),
        publication_date: None,
        cpv_code: "79822500-7".to_owned(),
        price,
        place: Place::default(),
        category: None,
        contractors: BTreeSet::new(),
        contracted: BTreeSet::new(),
    }
}

fn associations(store: &SqliteStore, table: &str) -> Vec<(i64, i64)> {
    let mut statement = store
        .connection()
        .prepare(&format!(
            "SELECT contract_id, entity_id FROM {table} ORDER BY contract_id, entity_id"
        ))
        .expect("prepare association query");
    statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query associations")
        .collect::<Result<_, _>>()
        .expect("read associations")
}

#[rstest]
fn schema_records_version(store: SqliteStore) {
    let version: i64 = store
        .connection()
        .query_row("SELECT version FROM procura_schema_version", [], |row| {
            row.get(0)
        })
        .expect("schema version present");
    assert_eq!(version, SCHEMA_VERSION);
}

#[rstest]
fn schema_rejects_other_versions() {
    let mut connection = Connection::open_in_memory().expect("open in-memory database");
    initialise_schema(&mut connection).expect("create schema");
    connection
        .execute("UPDATE procura_schema_version SET version = 99", [])
        .expect("tamper with version");

    let err = initialise_schema(&mut connection).expect_err("version mismatch");
    assert!(matches!(
        err,
        SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: 99
        }
    ));
}

#[rstest]
fn ensure_exists_is_keyed_by_scope_and_name(mut store: SqliteStore) {
    let portugal = store
        .ensure_exists(&ReferenceEntry::new(ReferenceKind::Country, "Portugal").with_remote_id("187"))
        .expect("create country");
    let again = store
        .ensure_exists(&ReferenceEntry::new(ReferenceKind::Country, "Portugal"))
        .expect("reuse country");
    assert_eq!(portugal, again);

    let espanha = store
        .ensure_exists(&ReferenceEntry::new(ReferenceKind::Country, "Espanha"))
        .expect("create second country");
    let faro_pt = store
        .ensure_exists(&ReferenceEntry::new(ReferenceKind::District, "Faro").with_parent(portugal))
        .expect("create district");
    let faro_es = store
        .ensure_exists(&ReferenceEntry::new(ReferenceKind::District, "Faro").with_parent(espanha))
        .expect("create homonymous district");
    assert_ne!(faro_pt, faro_es);

    let found = store
        .lookup(&LookupKey::District {
            country: portugal,
            name: "Faro",
        })
        .expect("lookup district");
    assert_eq!(found, Some(faro_pt));
}

#[rstest]
fn ensure_exists_rejects_missing_parent(mut store: SqliteStore) {
    let err = store
        .ensure_exists(&ReferenceEntry::new(ReferenceKind::Council, "Castro Marim"))
        .expect_err("council without district");
    assert!(matches!(err, StoreError::InvalidScope { .. }));
}

#[rstest]
fn lookup_miss_is_not_an_error(store: SqliteStore) {
    let found = store
        .lookup(&LookupKey::ContractType {
            name: "Locação de bens",
        })
        .expect("lookup succeeds");
    assert_eq!(found, None);
}

#[rstest]
fn upsert_entity_overwrites_mutable_fields(mut store: SqliteStore) {
    let first = store
        .upsert_entity(&entity(10, "Câmara Municipal"))
        .expect("insert entity");
    let second = store
        .upsert_entity(&entity(10, "Município de Faro"))
        .expect("update entity");
    assert_eq!(first, second);

    let name: String = store
        .connection()
        .query_row("SELECT name FROM entities WHERE external_id = 10", [], |row| {
            row.get(0)
        })
        .expect("entity row");
    assert_eq!(name, "Município de Faro");
    assert_eq!(store.entity_count().expect("count entities"), 1);
    assert_eq!(
        store
            .lookup(&LookupKey::Entity {
                external_id: ExternalId::new(10)
            })
            .expect("lookup entity"),
        Some(first)
    );
}

#[rstest]
fn contracts_are_created_once(mut store: SqliteStore) {
    let created = store
        .create_contract_if_absent(&contract(1_000, 123_456))
        .expect("create contract");
    assert!(created.is_created());

    let existing = store
        .create_contract_if_absent(&contract(1_000, 1))
        .expect("reuse contract");
    assert_eq!(existing, ContractOutcome::Existing(created.id()));

    let (price, signed): (i64, Option<String>) = store
        .connection()
        .query_row(
            "SELECT price, signing_date FROM contracts WHERE external_id = 1000",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("contract row");
    assert_eq!(price, 123_456);
    assert_eq!(signed.as_deref(), Some("2014-03-05"));
    assert_eq!(store.contract_count().expect("count contracts"), 1);
}

#[rstest]
fn associations_are_unioned(mut store: SqliteStore) {
    let a = store.upsert_entity(&entity(1, "A")).expect("entity a");
    let b = store.upsert_entity(&entity(2, "B")).expect("entity b");
    let c = store.upsert_entity(&entity(3, "C")).expect("entity c");
    let id = store
        .create_contract_if_absent(&contract(1_000, 5))
        .expect("create contract")
        .id();

    store
        .add_associations(id, AssociationRole::Contracted, &BTreeSet::from([a, b]))
        .expect("first association batch");
    store
        .add_associations(id, AssociationRole::Contracted, &BTreeSet::from([b, c]))
        .expect("second association batch");
    store
        .add_associations(id, AssociationRole::Contractor, &BTreeSet::from([a]))
        .expect("contractor association");

    assert_eq!(
        associations(&store, "contract_contracted"),
        vec![(id.get(), a.get()), (id.get(), b.get()), (id.get(), c.get())]
    );
    assert_eq!(
        associations(&store, "contract_contractors"),
        vec![(id.get(), a.get())]
    );
}

#[rstest]
fn two_connections_share_one_file() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("procura.sqlite");
    let mut entities = SqliteStore::open(&path).expect("open first connection");
    let mut contracts = SqliteStore::open(&path).expect("open second connection");

    entities
        .upsert_entity(&entity(1, "A"))
        .expect("write through first connection");
    contracts
        .create_contract_if_absent(&contract(7, 1))
        .expect("write through second connection");

    assert_eq!(entities.contract_count().expect("count contracts"), 1);
    assert_eq!(contracts.entity_count().expect("count entities"), 1);
}
