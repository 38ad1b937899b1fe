//! Mirror the remote reference vocabularies into the local store.

use std::fmt;

use procura_core::{
    LookupKey, ProcurementStore, ReferenceEntry, ReferenceId, ReferenceKind, StoreError,
};
use thiserror::Error;

use crate::{RemoteSource, TransportError, Vocabulary, VocabularyItem};

/// Name of the country whose districts and councils are mirrored.
pub const HOME_COUNTRY: &str = "Portugal";
/// Remote id of [`HOME_COUNTRY`].
pub const HOME_COUNTRY_REMOTE_ID: &str = "187";

/// Errors raised while synchronising reference vocabularies.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VocabularyError {
    /// A vocabulary could not be fetched.
    #[error("failed to fetch {vocabulary}")]
    Remote {
        /// Path of the failing vocabulary.
        vocabulary: &'static str,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The store rejected an entry.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The country list did not include the home country.
    #[error("country list does not include {HOME_COUNTRY}")]
    MissingHomeCountry,
}

/// Number of entries stored per vocabulary during one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VocabularySummary {
    /// Contract types.
    pub contract_types: usize,
    /// Procedure types.
    pub procedure_types: usize,
    /// Countries.
    pub countries: usize,
    /// Districts of the home country.
    pub districts: usize,
    /// Councils across all districts.
    pub councils: usize,
}

impl fmt::Display for VocabularySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} contract types, {} procedure types, {} countries, {} districts, {} councils",
            self.contract_types, self.procedure_types, self.countries, self.districts, self.councils
        )
    }
}

/// Fetch every reference vocabulary and ensure each entry exists locally.
///
/// Districts are scoped to [`HOME_COUNTRY`] and councils to their district.
/// Sentinel entries (id `"0"`) are skipped. Running the sync twice stores
/// nothing new.
///
/// # Examples
/// ```
/// use procura_core::{ReferenceKind, test_support::MemoryStore};
/// use procura_data::{
///     Vocabulary, VocabularyItem, sync_reference_vocabularies,
///     test_support::StubRemoteSource,
/// };
///
/// let remote = StubRemoteSource::default().with_vocabulary(
///     Vocabulary::Countries,
///     vec![VocabularyItem::new("0", "Todos"), VocabularyItem::new("187", "Portugal")],
/// );
/// let mut store = MemoryStore::default();
/// let summary = sync_reference_vocabularies(&remote, &mut store)?;
/// assert_eq!(summary.countries, 1);
/// assert_eq!(store.reference_count(ReferenceKind::Country), 1);
/// # Ok::<(), procura_data::VocabularyError>(())
/// ```
pub fn sync_reference_vocabularies<R, S>(
    source: &R,
    store: &mut S,
) -> Result<VocabularySummary, VocabularyError>
where
    R: RemoteSource + ?Sized,
    S: ProcurementStore + ?Sized,
{
    let mut summary = VocabularySummary::default();
    summary.contract_types = store_flat(
        source,
        store,
        &Vocabulary::ContractTypes,
        ReferenceKind::ContractType,
    )?;
    summary.procedure_types = store_flat(
        source,
        store,
        &Vocabulary::ProcedureTypes,
        ReferenceKind::ProcedureType,
    )?;
    summary.countries = store_flat(source, store, &Vocabulary::Countries, ReferenceKind::Country)?;

    let home = store
        .lookup(&LookupKey::Country { name: HOME_COUNTRY })?
        .ok_or(VocabularyError::MissingHomeCountry)?;
    let districts = fetch(
        source,
        &Vocabulary::Districts {
            country: HOME_COUNTRY_REMOTE_ID.to_owned(),
        },
    )?;
    for district in &districts {
        let district_id = store.ensure_exists(&scoped(ReferenceKind::District, district, home))?;
        summary.districts += 1;

        let councils = fetch(
            source,
            &Vocabulary::Councils {
                district: district.id.clone(),
            },
        )?;
        for council in &councils {
            store.ensure_exists(&scoped(ReferenceKind::Council, council, district_id))?;
            summary.councils += 1;
        }
    }

    log::info!("reference vocabularies synchronised: {summary}");
    Ok(summary)
}

fn fetch<R>(remote: &R, vocabulary: &Vocabulary) -> Result<Vec<VocabularyItem>, VocabularyError>
where
    R: RemoteSource + ?Sized,
{
    let items = remote
        .fetch_vocabulary(vocabulary)
        .map_err(|source| VocabularyError::Remote {
            vocabulary: vocabulary.path(),
            source,
        })?;
    Ok(items.into_iter().filter(|item| !item.is_sentinel()).collect())
}

fn store_flat<R, S>(
    remote: &R,
    store: &mut S,
    vocabulary: &Vocabulary,
    kind: ReferenceKind,
) -> Result<usize, VocabularyError>
where
    R: RemoteSource + ?Sized,
    S: ProcurementStore + ?Sized,
{
    let items = fetch(remote, vocabulary)?;
    for item in &items {
        store.ensure_exists(&ReferenceEntry::new(kind, &item.description).with_remote_id(&item.id))?;
    }
    Ok(items.len())
}

fn scoped(kind: ReferenceKind, item: &VocabularyItem, parent: ReferenceId) -> ReferenceEntry {
    ReferenceEntry::new(kind, &item.description)
        .with_remote_id(&item.id)
        .with_parent(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubRemoteSource;
    use procura_core::{ReferenceLookup, test_support::MemoryStore};
    use rstest::{fixture, rstest};

    fn items(entries: &[(&str, &str)]) -> Vec<VocabularyItem> {
        entries
            .iter()
            .map(|(id, description)| VocabularyItem::new(*id, *description))
            .collect()
    }

    #[fixture]
    fn remote() -> StubRemoteSource {
        StubRemoteSource::default()
            .with_vocabulary(
                Vocabulary::ContractTypes,
                items(&[("0", "Todos"), ("5", "Aquisição de serviços")]),
            )
            .with_vocabulary(
                Vocabulary::ProcedureTypes,
                items(&[("1", "Ajuste Direto"), ("2", "Concurso público")]),
            )
            .with_vocabulary(
                Vocabulary::Countries,
                items(&[("187", "Portugal"), ("60", "Espanha")]),
            )
            .with_vocabulary(
                Vocabulary::Districts {
                    country: HOME_COUNTRY_REMOTE_ID.to_owned(),
                },
                items(&[("0", "Todos"), ("8", "Faro"), ("11", "Lisboa")]),
            )
            .with_vocabulary(
                Vocabulary::Councils {
                    district: "8".to_owned(),
                },
                items(&[("0", "Todos"), ("801", "Castro Marim"), ("802", "Tavira")]),
            )
            .with_vocabulary(
                Vocabulary::Councils {
                    district: "11".to_owned(),
                },
                items(&[("1101", "Sintra")]),
            )
    }

    #[rstest]
    fn sync_mirrors_every_vocabulary(remote: StubRemoteSource) {
        let mut store = MemoryStore::default();
        let summary = sync_reference_vocabularies(&remote, &mut store).expect("sync");

        assert_eq!(
            summary,
            VocabularySummary {
                contract_types: 1,
                procedure_types: 2,
                countries: 2,
                districts: 2,
                councils: 3,
            }
        );
        let portugal = store
            .lookup(&LookupKey::Country { name: "Portugal" })
            .expect("lookup")
            .expect("country stored");
        let faro = store
            .lookup(&LookupKey::District {
                country: portugal,
                name: "Faro",
            })
            .expect("lookup")
            .expect("district stored");
        assert!(
            store
                .lookup(&LookupKey::Council {
                    district: faro,
                    name: "Castro Marim",
                })
                .expect("lookup")
                .is_some()
        );
    }

    #[rstest]
    fn sync_is_idempotent(remote: StubRemoteSource) {
        let mut store = MemoryStore::default();
        sync_reference_vocabularies(&remote, &mut store).expect("first sync");
        let after_first = store.clone();
        sync_reference_vocabularies(&remote, &mut store).expect("second sync");
        assert_eq!(store, after_first);
    }

    #[rstest]
    fn missing_home_country_is_an_error() {
        let remote = StubRemoteSource::default()
            .with_vocabulary(Vocabulary::Countries, items(&[("60", "Espanha")]));
        let err = sync_reference_vocabularies(&remote, &mut MemoryStore::default())
            .expect_err("no Portugal");
        assert!(matches!(err, VocabularyError::MissingHomeCountry));
    }

    #[rstest]
    fn transport_failures_name_the_vocabulary() {
        let remote = StubRemoteSource::default().failing();
        let err = sync_reference_vocabularies(&remote, &mut MemoryStore::default())
            .expect_err("remote offline");
        assert!(matches!(
            err,
            VocabularyError::Remote {
                vocabulary: "lista/tipocontratos",
                ..
            }
        ));
    }
}
