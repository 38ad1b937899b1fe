//! SQLite-backed lookup and persistence collaborator.

use std::{collections::BTreeSet, fmt, path::Path, time::Duration};

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    AssociationRole, CanonicalContract, CanonicalEntity, ContractOutcome, LookupKey,
    ProcurementStore, ReferenceEntry, ReferenceId, ReferenceLookup, StoreError,
};

use super::schema::{initialise_schema, reference_table};

/// How long a writer waits for a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Procurement store persisted in a single SQLite database.
///
/// Each ingestion loop opens its own `SqliteStore`; SQLite serialises the
/// writes and the busy timeout lets concurrent loops wait for each other.
pub struct SqliteStore {
    connection: Connection,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.connection.path())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create the database at `path` and initialise its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(connection)
    }

    /// Create a private in-memory database, mostly useful in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Sqlite {
            operation: "open in-memory database",
            source,
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, StoreError> {
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|source| StoreError::Sqlite {
                operation: "configure busy timeout",
                source,
            })?;
        initialise_schema(&mut connection)?;
        Ok(Self { connection })
    }

    /// Borrow the underlying connection for ad-hoc queries.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Number of stored entities.
    pub fn entity_count(&self) -> Result<u64, StoreError> {
        self.count("entities", "count entities")
    }

    /// Number of stored contracts.
    pub fn contract_count(&self) -> Result<u64, StoreError> {
        self.count("contracts", "count contracts")
    }

    fn count(&self, table: &str, operation: &'static str) -> Result<u64, StoreError> {
        self.connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| u64::try_from(count).unwrap_or_default())
            .map_err(|source| StoreError::Sqlite { operation, source })
    }

    fn lookup_entity(&self, external_id: i64) -> Result<Option<ReferenceId>, StoreError> {
        self.connection
            .query_row(
                "SELECT id FROM entities WHERE external_id = ?1",
                [external_id],
                |row| row.get(0),
            )
            .optional()
            .map(|id| id.map(ReferenceId::new))
            .map_err(|source| StoreError::Sqlite {
                operation: "look up entity",
                source,
            })
    }
}

impl ReferenceLookup for SqliteStore {
    fn lookup(&self, key: &LookupKey<'_>) -> Result<Option<ReferenceId>, StoreError> {
        let Some((kind, parent, name)) = key.as_vocabulary() else {
            return match key {
                LookupKey::Entity { external_id } => self.lookup_entity(external_id.get()),
                _ => Ok(None),
            };
        };
        let (table, parent_column) = reference_table(kind);
        let found = match (parent_column, parent) {
            (Some(column), Some(parent)) => self
                .connection
                .query_row(
                    &format!("SELECT id FROM {table} WHERE {column} = ?1 AND name = ?2"),
                    params![parent.get(), name],
                    |row| row.get(0),
                )
                .optional(),
            (None, None) => self
                .connection
                .query_row(
                    &format!("SELECT id FROM {table} WHERE name = ?1"),
                    [name],
                    |row| row.get(0),
                )
                .optional(),
            _ => Ok(None),
        };
        found
            .map(|id| id.map(ReferenceId::new))
            .map_err(|source| StoreError::Sqlite {
                operation: "look up reference",
                source,
            })
    }
}

impl ProcurementStore for SqliteStore {
    fn ensure_exists(&mut self, entry: &ReferenceEntry) -> Result<ReferenceId, StoreError> {
        let Some(key) = entry.lookup_key() else {
            return Err(StoreError::InvalidScope {
                kind: entry.kind,
                name: entry.name.clone(),
            });
        };
        let (table, parent_column) = reference_table(entry.kind);
        let inserted = match (parent_column, entry.parent) {
            (Some(column), Some(parent)) => self.connection.execute(
                &format!(
                    "INSERT INTO {table} ({column}, name, remote_id) VALUES (?1, ?2, ?3)
                     ON CONFLICT DO NOTHING"
                ),
                params![parent.get(), entry.name, entry.remote_id],
            ),
            _ => self.connection.execute(
                &format!(
                    "INSERT INTO {table} (name, remote_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING"
                ),
                params![entry.name, entry.remote_id],
            ),
        }
        .map_err(|source| StoreError::Sqlite {
            operation: "insert reference",
            source,
        })?;
        if inserted > 0 {
            log::info!("created {} {:?}", entry.kind, entry.name);
        }
        self.lookup(&key)?.ok_or_else(|| StoreError::Sqlite {
            operation: "read back reference",
            source: rusqlite::Error::QueryReturnedNoRows,
        })
    }

    fn upsert_entity(&mut self, entity: &CanonicalEntity) -> Result<ReferenceId, StoreError> {
        self.connection
            .query_row(
                "INSERT INTO entities (external_id, name, country_id, tax_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (external_id) DO UPDATE SET
                     name = excluded.name,
                     country_id = excluded.country_id,
                     tax_id = excluded.tax_id
                 RETURNING id",
                params![
                    entity.external_id.get(),
                    entity.name,
                    entity.country.map(ReferenceId::get),
                    entity.tax_id,
                ],
                |row| row.get(0),
            )
            .map(ReferenceId::new)
            .map_err(|source| StoreError::Sqlite {
                operation: "upsert entity",
                source,
            })
    }

    fn create_contract_if_absent(
        &mut self,
        contract: &CanonicalContract,
    ) -> Result<ContractOutcome, StoreError> {
        let created: Option<i64> = self
            .connection
            .query_row(
                "INSERT INTO contracts (
                     external_id, procedure_type_id, contract_type_id, brief_description,
                     full_description, signing_date, publication_date, cpv_code, price,
                     country_id, district_id, council_id, category_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT (external_id) DO NOTHING
                 RETURNING id",
                params![
                    contract.external_id.get(),
                    contract.procedure_type.map(ReferenceId::get),
                    contract.contract_type.map(ReferenceId::get),
                    contract.brief_description,
                    contract.full_description,
                    contract.signing_date.map(|date| date.to_string()),
                    contract.publication_date.map(|date| date.to_string()),
                    contract.cpv_code,
                    contract.price,
                    contract.place.country.map(ReferenceId::get),
                    contract.place.district.map(ReferenceId::get),
                    contract.place.council.map(ReferenceId::get),
                    contract.category.map(ReferenceId::get),
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "insert contract",
                source,
            })?;
        if let Some(id) = created {
            return Ok(ContractOutcome::Created(ReferenceId::new(id)));
        }
        self.connection
            .query_row(
                "SELECT id FROM contracts WHERE external_id = ?1",
                [contract.external_id.get()],
                |row| row.get(0),
            )
            .map(|id| ContractOutcome::Existing(ReferenceId::new(id)))
            .map_err(|source| StoreError::Sqlite {
                operation: "read existing contract",
                source,
            })
    }

    fn add_associations(
        &mut self,
        contract: ReferenceId,
        role: AssociationRole,
        entities: &BTreeSet<ReferenceId>,
    ) -> Result<(), StoreError> {
        let sql = match role {
            AssociationRole::Contractor => {
                "INSERT OR IGNORE INTO contract_contractors (contract_id, entity_id) VALUES (?1, ?2)"
            }
            AssociationRole::Contracted => {
                "INSERT OR IGNORE INTO contract_contracted (contract_id, entity_id) VALUES (?1, ?2)"
            }
        };
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| StoreError::Sqlite {
                operation: "begin association transaction",
                source,
            })?;
        {
            let mut statement =
                transaction
                    .prepare_cached(sql)
                    .map_err(|source| StoreError::Sqlite {
                        operation: "prepare association insert",
                        source,
                    })?;
            for entity in entities {
                statement
                    .execute(params![contract.get(), entity.get()])
                    .map_err(|source| StoreError::Sqlite {
                        operation: "insert association",
                        source,
                    })?;
            }
        }
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit associations",
            source,
        })
    }
}
