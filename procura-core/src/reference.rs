//! Capability traits for reference lookups and persistence.
//!
//! The normalizer only needs [`ReferenceLookup`]; the ingestion driver writes
//! through [`ProcurementStore`]. Both are implemented by the SQLite store and by
//! the in-memory fake used in tests.

#[cfg(feature = "store-sqlite")]
use std::path::PathBuf;
use std::{collections::BTreeSet, error::Error as StdError, fmt};

use thiserror::Error;

use crate::{AssociationRole, CanonicalContract, CanonicalEntity, ContractOutcome, ExternalId, ReferenceId};

/// Reference vocabularies mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceKind {
    /// Countries, keyed by name.
    Country,
    /// Districts, keyed by name within a country.
    District,
    /// Councils, keyed by name within a district.
    Council,
    /// Contract types, keyed by name.
    ContractType,
    /// Contracting procedure types, keyed by name.
    ProcedureType,
    /// CPV categories, keyed by code.
    Category,
}

impl ReferenceKind {
    /// Kind of the parent scope, for hierarchical vocabularies.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::District => Some(Self::Country),
            Self::Council => Some(Self::District),
            _ => None,
        }
    }

    /// Short lowercase label used in logs and table names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::District => "district",
            Self::Council => "council",
            Self::ContractType => "contract type",
            Self::ProcedureType => "procedure type",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One lookup against the reference collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey<'a> {
    /// Country by exact name.
    Country {
        /// Country name.
        name: &'a str,
    },
    /// District by exact name within a resolved country.
    District {
        /// Resolved parent country.
        country: ReferenceId,
        /// District name.
        name: &'a str,
    },
    /// Council by exact name within a resolved district.
    Council {
        /// Resolved parent district.
        district: ReferenceId,
        /// Council name.
        name: &'a str,
    },
    /// Contract type by exact name.
    ContractType {
        /// Contract type name.
        name: &'a str,
    },
    /// Procedure type by exact name.
    ProcedureType {
        /// Procedure type name.
        name: &'a str,
    },
    /// Category by CPV code.
    Category {
        /// CPV code.
        code: &'a str,
    },
    /// Entity by remote identifier.
    Entity {
        /// Remote identifier.
        external_id: ExternalId,
    },
}

impl<'a> LookupKey<'a> {
    /// Decompose a vocabulary lookup into `(kind, parent, name)`.
    ///
    /// Returns `None` for entity lookups, which are keyed by external id.
    #[must_use]
    pub const fn as_vocabulary(&self) -> Option<(ReferenceKind, Option<ReferenceId>, &'a str)> {
        match *self {
            Self::Country { name } => Some((ReferenceKind::Country, None, name)),
            Self::District { country, name } => Some((ReferenceKind::District, Some(country), name)),
            Self::Council { district, name } => Some((ReferenceKind::Council, Some(district), name)),
            Self::ContractType { name } => Some((ReferenceKind::ContractType, None, name)),
            Self::ProcedureType { name } => Some((ReferenceKind::ProcedureType, None, name)),
            Self::Category { code } => Some((ReferenceKind::Category, None, code)),
            Self::Entity { .. } => None,
        }
    }
}

impl fmt::Display for LookupKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_vocabulary() {
            Some((kind, Some(parent), name)) => write!(f, "{kind} {name:?} under {parent}"),
            Some((kind, None, name)) => write!(f, "{kind} {name:?}"),
            None => match self {
                Self::Entity { external_id } => write!(f, "entity {external_id}"),
                _ => Ok(()),
            },
        }
    }
}

/// Natural key and attributes of a vocabulary entry to create if absent.
///
/// Entries are identified by `(kind, parent, name)`; `remote_id` is recorded
/// on creation only.
///
/// # Examples
/// ```
/// use procura_core::{ReferenceEntry, ReferenceKind};
///
/// let entry = ReferenceEntry::new(ReferenceKind::ContractType, "Empreitadas de obras públicas")
///     .with_remote_id("1");
/// assert_eq!(entry.remote_id.as_deref(), Some("1"));
/// assert!(entry.parent.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Vocabulary the entry belongs to.
    pub kind: ReferenceKind,
    /// Natural key within the parent scope (name, or code for categories).
    pub name: String,
    /// Identifier used by the remote source, when known.
    pub remote_id: Option<String>,
    /// Parent scope for districts and councils.
    pub parent: Option<ReferenceId>,
}

impl ReferenceEntry {
    /// Describe a top-level entry of `kind` named `name`.
    pub fn new(kind: ReferenceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            remote_id: None,
            parent: None,
        }
    }

    /// Attach the remote identifier.
    #[must_use]
    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    /// Scope the entry under `parent`.
    #[must_use]
    pub const fn with_parent(mut self, parent: ReferenceId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Lookup key addressing this entry.
    #[must_use]
    pub fn lookup_key(&self) -> Option<LookupKey<'_>> {
        let name = self.name.as_str();
        match (self.kind, self.parent) {
            (ReferenceKind::Country, None) => Some(LookupKey::Country { name }),
            (ReferenceKind::District, Some(country)) => Some(LookupKey::District { country, name }),
            (ReferenceKind::Council, Some(district)) => Some(LookupKey::Council { district, name }),
            (ReferenceKind::ContractType, None) => Some(LookupKey::ContractType { name }),
            (ReferenceKind::ProcedureType, None) => Some(LookupKey::ProcedureType { name }),
            (ReferenceKind::Category, None) => Some(LookupKey::Category { code: name }),
            _ => None,
        }
    }
}

/// Errors raised by a reference or persistence collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A vocabulary entry was missing its parent scope, or had one it should not.
    #[error("{kind} entry {name:?} has an invalid parent scope")]
    InvalidScope {
        /// Vocabulary of the rejected entry.
        kind: ReferenceKind,
        /// Natural key of the rejected entry.
        name: String,
    },
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A SQLite statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to {operation}")]
    Sqlite {
        /// Description of the failing statement.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Opening or migrating the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    Schema(#[from] crate::store::SchemaError),
    /// A backend-specific failure from another store implementation.
    #[error("store backend failed: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
}

/// Read-only reference lookups used by the normalizer.
///
/// A miss is `Ok(None)`; `Err` is reserved for failures of the store itself.
pub trait ReferenceLookup {
    /// Resolve `key` to a stored reference.
    fn lookup(&self, key: &LookupKey<'_>) -> Result<Option<ReferenceId>, StoreError>;
}

/// Persistence collaborator for canonical records.
///
/// Implementations must serialise writes per external id so association sets
/// are only ever unioned, never overwritten.
pub trait ProcurementStore: ReferenceLookup {
    /// Return the entry matching the natural key of `entry`, creating it first if absent.
    fn ensure_exists(&mut self, entry: &ReferenceEntry) -> Result<ReferenceId, StoreError>;

    /// Create the entity, or overwrite its mutable fields when the external id exists.
    fn upsert_entity(&mut self, entity: &CanonicalEntity) -> Result<ReferenceId, StoreError>;

    /// Store the contract unless one with the same external id already exists.
    fn create_contract_if_absent(
        &mut self,
        contract: &CanonicalContract,
    ) -> Result<ContractOutcome, StoreError>;

    /// Union `entities` into the contract's association set for `role`.
    fn add_associations(
        &mut self,
        contract: ReferenceId,
        role: AssociationRole,
        entities: &BTreeSet<ReferenceId>,
    ) -> Result<(), StoreError>;
}
