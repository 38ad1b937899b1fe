//! Mapping of raw remote records into canonical values.
//!
//! Required fields (identifiers, price, CPV code) fail the record when they are
//! missing or malformed. Optional references (types, place components,
//! categories, associated entities) resolve to `None` or are dropped when the
//! lookup misses; only failures of the store itself are propagated.
#![forbid(unsafe_code)]

mod date;
mod place;
mod price;

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::record::integer_value;
use crate::{
    CanonicalContract, CanonicalEntity, ExternalId, LookupKey, RawRecord, ReferenceId,
    ReferenceLookup, ResourceKind, StoreError,
};

pub use date::{DATE_FORMAT, parse_date};
pub use place::{resolve_place, split_place};
pub use price::parse_price;

const FIELD_ID: &str = "id";
const FIELD_ENTITY_NAME: &str = "description";
const FIELD_ENTITY_COUNTRY: &str = "country";
const FIELD_TAX_ID: &str = "nif";
const FIELD_PROCEDURE_TYPE: &str = "contractingProcedureType";
const FIELD_CONTRACT_TYPE: &str = "contractTypes";
const FIELD_BRIEF_DESCRIPTION: &str = "objectBriefDescription";
const FIELD_FULL_DESCRIPTION: &str = "description";
const FIELD_SIGNING_DATE: &str = "signingDate";
const FIELD_PUBLICATION_DATE: &str = "publicationDate";
const FIELD_CPVS: &str = "cpvs";
const FIELD_PRICE: &str = "initialContractualPrice";
const FIELD_PLACE: &str = "executionPlace";
const FIELD_CONTRACTORS: &str = "contracting";
const FIELD_CONTRACTED: &str = "contracted";

/// Errors raised when a raw record cannot be normalised.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NormalizeError {
    /// A required field was absent or null.
    #[error("required field `{field}` is missing")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// The identifier was not an integer.
    #[error("field `{field}` is not an integer identifier: {value}")]
    InvalidId {
        /// Name of the identifier field.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// The price text could not be parsed.
    #[error("price {value:?} is not a localised whole number")]
    InvalidPrice {
        /// Offending text.
        value: String,
    },
    /// A non-empty date did not match `day-month-year`.
    #[error("date {value:?} does not match {DATE_FORMAT}")]
    InvalidDate {
        /// Offending text.
        value: String,
        /// Parser failure.
        #[source]
        source: chrono::ParseError,
    },
    /// A field had an unexpected JSON type.
    #[error("field `{field}` has unexpected type: {value}")]
    UnexpectedType {
        /// Name of the field.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// The reference store failed while resolving a lookup.
    #[error(transparent)]
    Lookup(#[from] StoreError),
}

/// Canonical value derived from a record of either resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// Normalised entity.
    Entity(CanonicalEntity),
    /// Normalised contract.
    Contract(CanonicalContract),
}

/// Normalise `record` according to the shape of `kind`.
///
/// Contract records must be the full detail payload, not a list stub.
pub fn normalize<L>(
    kind: ResourceKind,
    record: &RawRecord,
    lookups: &L,
) -> Result<Canonical, NormalizeError>
where
    L: ReferenceLookup + ?Sized,
{
    match kind {
        ResourceKind::Entities => normalize_entity(record, lookups).map(Canonical::Entity),
        ResourceKind::Contracts => normalize_contract(record, lookups).map(Canonical::Contract),
    }
}

/// Normalise an entity record.
///
/// # Examples
/// ```
/// use procura_core::{
///     LookupKey, RawRecord, ReferenceId, ReferenceLookup, StoreError, normalize_entity,
/// };
/// use serde_json::json;
///
/// struct Empty;
///
/// impl ReferenceLookup for Empty {
///     fn lookup(&self, _key: &LookupKey<'_>) -> Result<Option<ReferenceId>, StoreError> {
///         Ok(None)
///     }
/// }
///
/// let store = Empty;
/// let record = RawRecord::from_json(json!({
///     "id": 7,
///     "description": "Câmara Municipal de Faro",
///     "nif": "506579425",
///     "country": "Portugal"
/// }))
/// .expect("object");
/// let entity = normalize_entity(&record, &store)?;
/// assert_eq!(entity.external_id.get(), 7);
/// assert_eq!(entity.country, None);
/// # Ok::<(), procura_core::NormalizeError>(())
/// ```
pub fn normalize_entity<L>(record: &RawRecord, lookups: &L) -> Result<CanonicalEntity, NormalizeError>
where
    L: ReferenceLookup + ?Sized,
{
    let external_id = external_id(record)?;
    let name = required_text(record, FIELD_ENTITY_NAME)?.to_owned();
    let country = match non_empty_text(record, FIELD_ENTITY_COUNTRY) {
        Some(name) => lookups.lookup(&LookupKey::Country { name })?,
        None => None,
    };
    let tax_id = record.text(FIELD_TAX_ID).unwrap_or_default().to_owned();
    Ok(CanonicalEntity {
        external_id,
        name,
        country,
        tax_id,
    })
}

/// Normalise a contract detail record.
pub fn normalize_contract<L>(
    record: &RawRecord,
    lookups: &L,
) -> Result<CanonicalContract, NormalizeError>
where
    L: ReferenceLookup + ?Sized,
{
    let external_id = external_id(record)?;
    let procedure_type = match non_empty_text(record, FIELD_PROCEDURE_TYPE) {
        Some(name) => lookups.lookup(&LookupKey::ProcedureType { name })?,
        None => None,
    };
    let contract_type = match non_empty_text(record, FIELD_CONTRACT_TYPE) {
        Some(name) => lookups.lookup(&LookupKey::ContractType { name })?,
        None => None,
    };
    let cpv_code = parse_cpv_code(required_text(record, FIELD_CPVS)?).to_owned();
    let category = if cpv_code.is_empty() {
        None
    } else {
        lookups.lookup(&LookupKey::Category { code: &cpv_code })?
    };

    Ok(CanonicalContract {
        external_id,
        procedure_type,
        contract_type,
        brief_description: record
            .text(FIELD_BRIEF_DESCRIPTION)
            .unwrap_or_default()
            .to_owned(),
        full_description: record
            .text(FIELD_FULL_DESCRIPTION)
            .unwrap_or_default()
            .to_owned(),
        signing_date: parse_date(record.text(FIELD_SIGNING_DATE))?,
        publication_date: parse_date(record.text(FIELD_PUBLICATION_DATE))?,
        price: price_field(record)?,
        place: resolve_place(record.text(FIELD_PLACE), lookups)?,
        cpv_code,
        category,
        contractors: resolve_entities(record, FIELD_CONTRACTORS, lookups)?,
        contracted: resolve_entities(record, FIELD_CONTRACTED, lookups)?,
    })
}

/// Extract the primary CPV code from a `"code, description"` field.
///
/// # Examples
/// ```
/// use procura_core::parse_cpv_code;
///
/// assert_eq!(
///     parse_cpv_code("79822500-7, Serviços de concepção gráfica"),
///     "79822500-7"
/// );
/// assert_eq!(parse_cpv_code("45000000-7"), "45000000-7");
/// ```
#[must_use]
pub fn parse_cpv_code(raw: &str) -> &str {
    raw.split(',').next().unwrap_or_default().trim()
}

fn external_id(record: &RawRecord) -> Result<ExternalId, NormalizeError> {
    match record.get(FIELD_ID) {
        None | Some(Value::Null) => Err(NormalizeError::MissingField { field: FIELD_ID }),
        Some(value) => integer_value(value)
            .map(ExternalId::new)
            .ok_or_else(|| NormalizeError::InvalidId {
                field: FIELD_ID,
                value: value.to_string(),
            }),
    }
}

fn required_text<'r>(record: &'r RawRecord, field: &'static str) -> Result<&'r str, NormalizeError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(NormalizeError::MissingField { field }),
        Some(Value::String(text)) => Ok(text.as_str()),
        Some(other) => Err(NormalizeError::UnexpectedType {
            field,
            value: other.to_string(),
        }),
    }
}

fn non_empty_text<'r>(record: &'r RawRecord, field: &str) -> Option<&'r str> {
    record
        .text(field)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn price_field(record: &RawRecord) -> Result<i64, NormalizeError> {
    match record.get(FIELD_PRICE) {
        None | Some(Value::Null) => Err(NormalizeError::MissingField { field: FIELD_PRICE }),
        Some(Value::String(text)) => parse_price(text),
        Some(Value::Number(number)) => {
            number
                .as_i64()
                .ok_or_else(|| NormalizeError::InvalidPrice {
                    value: number.to_string(),
                })
        }
        Some(other) => Err(NormalizeError::UnexpectedType {
            field: FIELD_PRICE,
            value: other.to_string(),
        }),
    }
}

/// Resolve the `[{id}, ...]` list in `field`, dropping ids with no local entity.
fn resolve_entities<L>(
    record: &RawRecord,
    field: &'static str,
    lookups: &L,
) -> Result<BTreeSet<ReferenceId>, NormalizeError>
where
    L: ReferenceLookup + ?Sized,
{
    let Some(Value::Array(items)) = record.get(field) else {
        return Ok(BTreeSet::new());
    };
    let mut resolved = BTreeSet::new();
    for external_id in items
        .iter()
        .filter_map(|item| item.get(FIELD_ID).and_then(integer_value))
        .map(ExternalId::new)
    {
        match lookups.lookup(&LookupKey::Entity { external_id })? {
            Some(id) => {
                resolved.insert(id);
            }
            None => log::debug!("dropping unknown entity {external_id} from `{field}`"),
        }
    }
    Ok(resolved)
}
