//! Entity Store: the single authoritative in-memory state.
//!
//! Each entity lives in its own cell (`Arc<Mutex<Versioned<T>>>`) inside a per-kind table.
//! The table map itself is only locked to look up or insert cells, so mutations on different
//! entities never wait on each other; mutations on the same entity are serialised by its cell
//! lock. Every committed mutation bumps the entity's version, and callers that pass an
//! expected version get [`DispatchError::Conflict`] if someone else committed first.
//!
//! Cell locks are synchronous and are never held across an `.await`.

use crate::error::{DispatchError, DispatchResult, EntityKind};
use crate::models::{Ambulance, BedAllocation, EmergencyCase, Hospital};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A snapshot of an entity together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Anything the store can hold.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn key(&self) -> &str;
}

impl Entity for Hospital {
    const KIND: EntityKind = EntityKind::Hospital;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Entity for Ambulance {
    const KIND: EntityKind = EntityKind::Ambulance;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Entity for EmergencyCase {
    const KIND: EntityKind = EntityKind::EmergencyCase;

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for BedAllocation {
    const KIND: EntityKind = EntityKind::BedAllocation;

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

type Cell<T> = Arc<Mutex<Versioned<T>>>;

/// All entities of one kind.
pub struct Table<T> {
    cells: RwLock<HashMap<String, Cell<T>>>,
}

impl<T: Entity> Default for Table<T> {
    fn default() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Entity> Table<T> {
    /// Inserts a new entity at version 1.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Duplicate`] if the key is already present.
    pub fn insert(&self, value: T) -> DispatchResult<Versioned<T>> {
        let key = value.key().to_owned();
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        if cells.contains_key(&key) {
            return Err(DispatchError::Duplicate { kind: T::KIND, id: key });
        }
        let row = Versioned { version: 1, value };
        cells.insert(key, Arc::new(Mutex::new(row.clone())));
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown id.
    pub fn get(&self, id: &str) -> DispatchResult<Versioned<T>> {
        let cell = self.cell(id)?;
        let row = cell.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(row.clone())
    }

    /// Snapshots of every entity matching `filter`, ordered by key.
    ///
    /// Each snapshot is individually consistent; the list as a whole is not a point-in-time
    /// view across entities.
    pub fn list(&self, filter: impl Fn(&T) -> bool) -> Vec<Versioned<T>> {
        let cells: Vec<Cell<T>> = {
            let map = self.cells.read().unwrap_or_else(PoisonError::into_inner);
            map.values().cloned().collect()
        };

        let mut rows: Vec<Versioned<T>> = cells
            .iter()
            .map(|cell| cell.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .filter(|row| filter(&row.value))
            .collect();
        rows.sort_by(|a, b| a.value.key().cmp(b.value.key()));
        rows
    }

    pub fn len(&self) -> usize {
        self.cells.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The only write path for an existing entity.
    ///
    /// `transform` runs against a draft copy while the entity's lock is held. If it returns
    /// `Ok`, the draft replaces the stored value and the version is incremented; if it returns
    /// `Err`, nothing is written. When `expected_version` is given and does not match the
    /// stored version, `transform` is not called at all.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for an unknown id
    /// - [`DispatchError::Conflict`] if `expected_version` is stale
    /// - whatever `transform` returns
    pub fn mutate<R>(
        &self,
        id: &str,
        expected_version: Option<u64>,
        transform: impl FnOnce(&mut T) -> DispatchResult<R>,
    ) -> DispatchResult<(Versioned<T>, R)> {
        let cell = self.cell(id)?;
        let mut row = cell.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(expected) = expected_version {
            if row.version != expected {
                return Err(DispatchError::Conflict {
                    kind: T::KIND,
                    id: id.to_owned(),
                    expected,
                    actual: row.version,
                });
            }
        }

        let mut draft = row.value.clone();
        let out = transform(&mut draft)?;
        debug_assert_eq!(draft.key(), id, "mutation must not change the entity key");

        row.value = draft;
        row.version += 1;
        Ok((row.clone(), out))
    }

    fn cell(&self, id: &str) -> DispatchResult<Cell<T>> {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(T::KIND, id))
    }
}

/// Owns every hospital, ambulance, case and bed allocation.
#[derive(Default)]
pub struct EntityStore {
    hospitals: Table<Hospital>,
    ambulances: Table<Ambulance>,
    cases: Table<EmergencyCase>,
    allocations: Table<BedAllocation>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hospitals(&self) -> &Table<Hospital> {
        &self.hospitals
    }

    pub fn ambulances(&self) -> &Table<Ambulance> {
        &self.ambulances
    }

    pub fn cases(&self) -> &Table<EmergencyCase> {
        &self.cases
    }

    pub fn allocations(&self) -> &Table<BedAllocation> {
        &self.allocations
    }

    /// Active allocations for one hospital and bed type.
    pub fn active_allocations(&self, hospital_id: &str, bed_type: crate::models::BedType) -> usize {
        self.allocations
            .list(|a| a.is_active() && a.hospital_id == hospital_id && a.bed_type == bed_type)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BedCapacity, BedType, Diversion, TraumaLevel};
    use chrono::Utc;
    use healthguard_types::GeoPoint;
    use std::thread;

    fn hospital(id: &str) -> Hospital {
        Hospital {
            id: id.into(),
            name: format!("Hospital {id}"),
            level: TraumaLevel::Level2,
            capabilities: Default::default(),
            capacity: [(BedType::Icu, BedCapacity::new(5, 5).unwrap())]
                .into_iter()
                .collect(),
            diversion: Diversion::default(),
            location: GeoPoint::new(40.0, -74.0).unwrap(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn insert_then_get_returns_version_one() {
        let store = EntityStore::new();
        store.hospitals().insert(hospital("A")).unwrap();
        let row = store.hospitals().get("A").unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.value.id, "A");
    }

    #[test]
    fn insert_rejects_duplicate_key() {
        let store = EntityStore::new();
        store.hospitals().insert(hospital("A")).unwrap();
        let err = store.hospitals().insert(hospital("A")).unwrap_err();
        assert!(matches!(err, DispatchError::Duplicate { .. }));
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = EntityStore::new();
        match store.ambulances().get("AMB-404") {
            Err(DispatchError::NotFound { kind, id }) => {
                assert_eq!(kind, EntityKind::Ambulance);
                assert_eq!(id, "AMB-404");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn mutate_bumps_version() {
        let store = EntityStore::new();
        store.hospitals().insert(hospital("A")).unwrap();
        let (row, ()) = store
            .hospitals()
            .mutate("A", Some(1), |h| {
                h.name = "Renamed".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(row.version, 2);
        assert_eq!(store.hospitals().get("A").unwrap().value.name, "Renamed");
    }

    #[test]
    fn mutate_with_stale_version_conflicts_without_writing() {
        let store = EntityStore::new();
        store.hospitals().insert(hospital("A")).unwrap();
        store.hospitals().mutate("A", None, |_| Ok(())).unwrap();

        let err = store
            .hospitals()
            .mutate("A", Some(1), |h| {
                h.name = "Stale".into();
                Ok(())
            })
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Conflict {
                kind: EntityKind::Hospital,
                id: "A".into(),
                expected: 1,
                actual: 2,
            }
        );
        assert_eq!(store.hospitals().get("A").unwrap().value.name, "Hospital A");
    }

    #[test]
    fn failed_transform_discards_partial_changes() {
        let store = EntityStore::new();
        store.hospitals().insert(hospital("A")).unwrap();

        let result: DispatchResult<_> = store.hospitals().mutate("A", None, |h| {
            h.name = "Half-written".into();
            Err::<(), _>(DispatchError::NoCapacity)
        });

        assert_eq!(result.unwrap_err(), DispatchError::NoCapacity);
        let row = store.hospitals().get("A").unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.value.name, "Hospital A");
    }

    #[test]
    fn list_is_sorted_and_filtered() {
        let store = EntityStore::new();
        for id in ["C", "A", "B"] {
            store.hospitals().insert(hospital(id)).unwrap();
        }
        let ids: Vec<String> = store
            .hospitals()
            .list(|h| h.id != "B")
            .into_iter()
            .map(|r| r.value.id)
            .collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn concurrent_mutations_on_one_entity_are_serialised() {
        let store = Arc::new(EntityStore::new());
        store.hospitals().insert(hospital("A")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .hospitals()
                            .mutate("A", None, |h| {
                                let icu = h.capacity.get_mut(&BedType::Icu).unwrap();
                                icu.total += 1;
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let row = store.hospitals().get("A").unwrap();
        assert_eq!(row.version, 1 + 800);
        assert_eq!(row.value.capacity[&BedType::Icu].total, 5 + 800);
    }
}
