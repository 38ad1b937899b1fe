//! Canonical values produced by the normalizer.

use std::{collections::BTreeSet, fmt};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable identifier assigned by the remote source.
///
/// # Examples
/// ```
/// use procura_core::ExternalId;
///
/// let id = ExternalId::new(1_024);
/// assert_eq!(id.get(), 1_024);
/// assert_eq!(id.to_string(), "1024");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(i64);

impl ExternalId {
    /// Wrap a remote identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for ExternalId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a row owned by the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(i64);

impl ReferenceId {
    /// Wrap a store-assigned identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A contracting or contracted public entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEntity {
    /// Remote identifier; entities are upserted by this key.
    pub external_id: ExternalId,
    /// Registered entity name.
    pub name: String,
    /// Country of registration, when it resolved locally.
    pub country: Option<ReferenceId>,
    /// Tax identification number (NIF).
    pub tax_id: String,
}

/// Execution place resolved down the country → district → council hierarchy.
///
/// A level is only populated when every level above it resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Place {
    /// Resolved country.
    pub country: Option<ReferenceId>,
    /// Resolved district within `country`.
    pub district: Option<ReferenceId>,
    /// Resolved council within `district`.
    pub council: Option<ReferenceId>,
}

/// A public contract in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalContract {
    /// Remote identifier, fixed at creation.
    pub external_id: ExternalId,
    /// Contracting procedure type, when known locally.
    pub procedure_type: Option<ReferenceId>,
    /// Contract type, when known locally.
    pub contract_type: Option<ReferenceId>,
    /// Short description of the contract object.
    pub brief_description: String,
    /// Full description of the contract.
    pub full_description: String,
    /// Date the contract was signed; absent for unsigned contracts.
    pub signing_date: Option<NaiveDate>,
    /// Date the contract was published.
    pub publication_date: Option<NaiveDate>,
    /// Primary CPV code, e.g. `79822500-7`.
    pub cpv_code: String,
    /// Initial contractual price with separators stripped.
    pub price: i64,
    /// Execution place.
    pub place: Place,
    /// Category matching `cpv_code`, when known locally.
    pub category: Option<ReferenceId>,
    /// Entities awarding the contract.
    pub contractors: BTreeSet<ReferenceId>,
    /// Entities awarded the contract.
    pub contracted: BTreeSet<ReferenceId>,
}

/// Side of a contract an entity appears on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationRole {
    /// The awarding (contracting) side.
    Contractor,
    /// The awarded (contracted) side.
    Contracted,
}

impl AssociationRole {
    /// Both roles, in persistence order.
    pub const ALL: [Self; 2] = [Self::Contractor, Self::Contracted];
}

/// Result of creating a contract that may already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractOutcome {
    /// The contract was new and has been stored.
    Created(ReferenceId),
    /// A contract with the same external id was already stored; it was left untouched.
    Existing(ReferenceId),
}

impl ContractOutcome {
    /// Store handle of the contract regardless of outcome.
    #[must_use]
    pub const fn id(self) -> ReferenceId {
        match self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }

    /// Whether the call created the contract.
    #[must_use]
    pub const fn is_created(self) -> bool {
        matches!(self, Self::Created(_))
    }
}
