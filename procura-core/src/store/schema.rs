#![forbid(unsafe_code)]

use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

use crate::ReferenceKind;

/// Version recorded in `procura_schema_version` by [`initialise_schema`].
pub const SCHEMA_VERSION: i64 = 1;

/// Table backing each reference vocabulary, with the column holding its parent scope.
pub(crate) const fn reference_table(kind: ReferenceKind) -> (&'static str, Option<&'static str>) {
    match kind {
        ReferenceKind::Country => ("countries", None),
        ReferenceKind::District => ("districts", Some("country_id")),
        ReferenceKind::Council => ("councils", Some("district_id")),
        ReferenceKind::ContractType => ("contract_types", None),
        ReferenceKind::ProcedureType => ("procedure_types", None),
        ReferenceKind::Category => ("categories", None),
    }
}

/// Initialise the procurement schema inside an existing SQLite database.
///
/// Foreign keys are enabled, every table is created in a single transaction,
/// and the schema version is recorded. A database carrying a different
/// version is rejected rather than silently reused.
///
/// # Examples
/// ```
/// use procura_core::store::initialise_schema;
/// use rusqlite::Connection;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create procurement schema");
/// initialise_schema(&mut conn).expect("schema creation is idempotent");
///
/// let version: i64 = conn
///     .query_row("SELECT version FROM procura_schema_version", [], |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, 1);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    connection
        .pragma_update(None, "foreign_keys", true)
        .map_err(|source| SchemaError::ForeignKeys { source })?;

    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_reference_tables(&transaction)?;
    create_record_tables(&transaction)?;
    create_association_tables(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_reference_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    for (step, sql) in [
        (
            "create countries",
            "CREATE TABLE IF NOT EXISTS countries (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                remote_id TEXT
            )",
        ),
        (
            "create districts",
            "CREATE TABLE IF NOT EXISTS districts (
                id INTEGER PRIMARY KEY,
                country_id INTEGER NOT NULL REFERENCES countries(id),
                name TEXT NOT NULL,
                remote_id TEXT,
                UNIQUE (country_id, name)
            )",
        ),
        (
            "create councils",
            "CREATE TABLE IF NOT EXISTS councils (
                id INTEGER PRIMARY KEY,
                district_id INTEGER NOT NULL REFERENCES districts(id),
                name TEXT NOT NULL,
                remote_id TEXT,
                UNIQUE (district_id, name)
            )",
        ),
        (
            "create contract_types",
            "CREATE TABLE IF NOT EXISTS contract_types (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                remote_id TEXT
            )",
        ),
        (
            "create procedure_types",
            "CREATE TABLE IF NOT EXISTS procedure_types (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                remote_id TEXT
            )",
        ),
        (
            "create categories",
            "CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                remote_id TEXT
            )",
        ),
    ] {
        run_migration_step(transaction, step, sql)?;
    }
    Ok(())
}

fn create_record_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create entities",
        "CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY,
            external_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            country_id INTEGER REFERENCES countries(id),
            tax_id TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "create contracts",
        "CREATE TABLE IF NOT EXISTS contracts (
            id INTEGER PRIMARY KEY,
            external_id INTEGER NOT NULL UNIQUE,
            procedure_type_id INTEGER REFERENCES procedure_types(id),
            contract_type_id INTEGER REFERENCES contract_types(id),
            brief_description TEXT NOT NULL,
            full_description TEXT NOT NULL,
            signing_date TEXT,
            publication_date TEXT,
            cpv_code TEXT NOT NULL,
            price INTEGER NOT NULL,
            country_id INTEGER REFERENCES countries(id),
            district_id INTEGER REFERENCES districts(id),
            council_id INTEGER REFERENCES councils(id),
            category_id INTEGER REFERENCES categories(id)
        )",
    )
}

fn create_association_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create contract_contractors",
        "CREATE TABLE IF NOT EXISTS contract_contractors (
            contract_id INTEGER NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
            entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            PRIMARY KEY (contract_id, entity_id)
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create contract_contracted",
        "CREATE TABLE IF NOT EXISTS contract_contracted (
            contract_id INTEGER NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
            entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            PRIMARY KEY (contract_id, entity_id)
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "index contract_contracted",
        "CREATE INDEX IF NOT EXISTS idx_contract_contracted_entity
            ON contract_contracted(entity_id, contract_id)",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS procura_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM procura_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO procura_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

/// Errors raised when initialising the procurement schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Enabling foreign key enforcement failed.
    #[error("failed to enable SQLite foreign keys")]
    ForeignKeys {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A schema statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Name of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was created by an incompatible release.
    #[error("expected procura schema version {expected} but found {found}; apply migrations before retrying")]
    VersionMismatch {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}
