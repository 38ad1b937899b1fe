//! In-memory reference and persistence collaborator used by unit and
//! behaviour tests.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io,
};

use crate::{
    AssociationRole, CanonicalContract, CanonicalEntity, ContractOutcome, ExternalId, LookupKey,
    ProcurementStore, ReferenceEntry, ReferenceId, ReferenceKind, ReferenceLookup, StoreError,
};

type VocabularyKey = (ReferenceKind, Option<ReferenceId>, String);

/// In-memory [`ProcurementStore`] implementation used in tests.
///
/// Identifiers are handed out sequentially, so two stores fed the same
/// operations in the same order compare equal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    next_id: i64,
    references: HashMap<VocabularyKey, ReferenceId>,
    entities: BTreeMap<ExternalId, (ReferenceId, CanonicalEntity)>,
    contracts: BTreeMap<ExternalId, (ReferenceId, CanonicalContract)>,
    failing_contracts: BTreeSet<ExternalId>,
}

impl MemoryStore {
    /// Insert a vocabulary entry and return its handle.
    pub fn seed(&mut self, entry: &ReferenceEntry) -> ReferenceId {
        let key = (entry.kind, entry.parent, entry.name.clone());
        if let Some(id) = self.references.get(&key) {
            return *id;
        }
        let id = self.allocate();
        self.references.insert(key, id);
        id
    }

    /// Insert an entity with the given remote id and return its handle.
    pub fn seed_entity(&mut self, external_id: i64, name: &str) -> ReferenceId {
        let entity = CanonicalEntity {
            external_id: ExternalId::new(external_id),
            name: name.to_owned(),
            country: None,
            tax_id: String::new(),
        };
        self.store_entity(&entity)
    }

    /// Make `create_contract_if_absent` fail for `external_id`.
    #[must_use]
    pub fn with_failing_contract(mut self, external_id: i64) -> Self {
        self.failing_contracts.insert(ExternalId::new(external_id));
        self
    }

    /// Stored entity for `external_id`.
    #[must_use]
    pub fn entity(&self, external_id: i64) -> Option<&CanonicalEntity> {
        self.entities
            .get(&ExternalId::new(external_id))
            .map(|(_, entity)| entity)
    }

    /// Stored contract for `external_id`, including its association sets.
    #[must_use]
    pub fn contract(&self, external_id: i64) -> Option<&CanonicalContract> {
        self.contracts
            .get(&ExternalId::new(external_id))
            .map(|(_, contract)| contract)
    }

    /// Number of stored entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of stored contracts.
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    /// Number of stored vocabulary entries of `kind`.
    #[must_use]
    pub fn reference_count(&self, kind: ReferenceKind) -> usize {
        self.references
            .keys()
            .filter(|(entry_kind, _, _)| *entry_kind == kind)
            .count()
    }

    const fn allocate(&mut self) -> ReferenceId {
        self.next_id += 1;
        ReferenceId::new(self.next_id)
    }

    fn store_entity(&mut self, entity: &CanonicalEntity) -> ReferenceId {
        if let Some((id, stored)) = self.entities.get_mut(&entity.external_id) {
            *stored = entity.clone();
            return *id;
        }
        let id = self.allocate();
        self.entities.insert(entity.external_id, (id, entity.clone()));
        id
    }
}

impl ReferenceLookup for MemoryStore {
    fn lookup(&self, key: &LookupKey<'_>) -> Result<Option<ReferenceId>, StoreError> {
        let found = match key.as_vocabulary() {
            Some((kind, parent, name)) => self
                .references
                .get(&(kind, parent, name.to_owned()))
                .copied(),
            None => match key {
                LookupKey::Entity { external_id } => {
                    self.entities.get(external_id).map(|(id, _)| *id)
                }
                _ => None,
            },
        };
        Ok(found)
    }
}

impl ProcurementStore for MemoryStore {
    fn ensure_exists(&mut self, entry: &ReferenceEntry) -> Result<ReferenceId, StoreError> {
        if entry.lookup_key().is_none() {
            return Err(StoreError::InvalidScope {
                kind: entry.kind,
                name: entry.name.clone(),
            });
        }
        Ok(self.seed(entry))
    }

    fn upsert_entity(&mut self, entity: &CanonicalEntity) -> Result<ReferenceId, StoreError> {
        Ok(self.store_entity(entity))
    }

    fn create_contract_if_absent(
        &mut self,
        contract: &CanonicalContract,
    ) -> Result<ContractOutcome, StoreError> {
        if self.failing_contracts.contains(&contract.external_id) {
            return Err(StoreError::Backend(Box::new(io::Error::other(format!(
                "refusing contract {}",
                contract.external_id
            )))));
        }
        if let Some((id, _)) = self.contracts.get(&contract.external_id) {
            return Ok(ContractOutcome::Existing(*id));
        }
        let id = self.allocate();
        let mut stored = contract.clone();
        stored.contractors.clear();
        stored.contracted.clear();
        self.contracts.insert(contract.external_id, (id, stored));
        Ok(ContractOutcome::Created(id))
    }

    fn add_associations(
        &mut self,
        contract: ReferenceId,
        role: AssociationRole,
        entities: &BTreeSet<ReferenceId>,
    ) -> Result<(), StoreError> {
        let Some((_, stored)) = self
            .contracts
            .values_mut()
            .find(|(id, _)| *id == contract)
        else {
            return Err(StoreError::Backend(Box::new(io::Error::other(format!(
                "unknown contract {contract}"
            )))));
        };
        let target = match role {
            AssociationRole::Contractor => &mut stored.contractors,
            AssociationRole::Contracted => &mut stored.contracted,
        };
        target.extend(entities.iter().copied());
        Ok(())
    }
}
