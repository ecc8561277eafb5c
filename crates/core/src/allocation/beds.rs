//! Bed release, capacity updates and diversion changes.

use super::AllocationEngine;
use crate::error::{DispatchError, DispatchResult, EntityKind};
use crate::models::{BedAllocation, BedCapacity, BedType, Diversion, Hospital};
use chrono::{DateTime, Utc};
use healthguard_types::CanonicalId;
use std::collections::BTreeMap;

impl AllocationEngine {
    /// Releases every still-active allocation in `allocation_ids` and returns the beds to their
    /// hospitals. Already released allocations are skipped; the ones actually released are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown allocation.
    pub fn release_beds(
        &self,
        allocation_ids: &[CanonicalId],
        now: DateTime<Utc>,
    ) -> DispatchResult<Vec<BedAllocation>> {
        let mut released = Vec::new();
        for id in allocation_ids {
            if let Some(allocation) = self.release_one(id, now)? {
                released.push(allocation);
            }
        }
        Ok(released)
    }

    /// Discharge: releases one allocation held at `hospital_id`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] if the allocation does not exist at that hospital
    /// - [`DispatchError::InvalidTransition`] if it was already released
    pub fn release_bed(
        &self,
        hospital_id: &str,
        allocation_id: &CanonicalId,
        now: DateTime<Utc>,
    ) -> DispatchResult<BedAllocation> {
        let row = self.store.allocations().get(allocation_id.as_str())?;
        if row.value.hospital_id != hospital_id {
            return Err(DispatchError::not_found(
                EntityKind::BedAllocation,
                allocation_id.as_str(),
            ));
        }
        self.release_one(allocation_id, now)?.ok_or_else(|| {
            DispatchError::invalid_transition(
                EntityKind::BedAllocation,
                allocation_id.as_str(),
                "released",
                "released",
            )
        })
    }

    fn release_one(
        &self,
        allocation_id: &CanonicalId,
        now: DateTime<Utc>,
    ) -> DispatchResult<Option<BedAllocation>> {
        let (row, was_active) =
            self.store
                .allocations()
                .mutate(allocation_id.as_str(), None, |allocation| {
                    if !allocation.is_active() {
                        return Ok(false);
                    }
                    allocation.released_at = Some(now);
                    Ok(true)
                })?;
        if !was_active {
            return Ok(None);
        }

        let allocation = row.value;
        self.store
            .hospitals()
            .mutate(&allocation.hospital_id, None, |hospital| {
                if let Some(capacity) = hospital.capacity.get_mut(&allocation.bed_type) {
                    capacity.available = capacity.available.saturating_add(1).min(capacity.total);
                }
                hospital.last_updated = now;
                Ok(())
            })?;

        tracing::info!(
            allocation_id = %allocation.id,
            hospital_id = %allocation.hospital_id,
            bed_type = %allocation.bed_type,
            "bed released"
        );
        Ok(Some(allocation))
    }

    /// Overwrites the counts for the given bed types; other types keep their counts.
    ///
    /// The new counts must leave room for every bed this service currently holds at the
    /// hospital: `available + active allocations <= total` per type.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] if the update would undercount held beds.
    pub fn update_capacity(
        &self,
        hospital_id: &str,
        counts: &BTreeMap<BedType, BedCapacity>,
        now: DateTime<Utc>,
    ) -> DispatchResult<Hospital> {
        // Existence first, so an unknown hospital is a 404 rather than a count error.
        self.store.hospitals().get(hospital_id)?;

        let (row, ()) = self.store.hospitals().mutate(hospital_id, None, |hospital| {
            for (bed_type, capacity) in counts {
                let held = self.store.active_allocations(hospital_id, *bed_type) as u64;
                if u64::from(capacity.available) + held > u64::from(capacity.total) {
                    return Err(DispatchError::Validation(format!(
                        "{bed_type}: {} available plus {held} allocated exceeds total {}",
                        capacity.available, capacity.total
                    )));
                }
                hospital.capacity.insert(*bed_type, *capacity);
            }
            hospital.last_updated = now;
            Ok(())
        })?;

        tracing::info!(hospital_id, available = row.value.available_beds(), "capacity updated");
        Ok(row.value)
    }

    /// Replaces the diversion state. Returns the hospital and whether a diversion was in effect
    /// before the change.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown hospital.
    pub fn set_diversion(
        &self,
        hospital_id: &str,
        diversion: Diversion,
        now: DateTime<Utc>,
    ) -> DispatchResult<(Hospital, bool)> {
        let (row, was_in_effect) = self.store.hospitals().mutate(hospital_id, None, |hospital| {
            let was = hospital.diversion.in_effect(now);
            hospital.diversion = diversion;
            hospital.last_updated = now;
            Ok(was)
        })?;
        tracing::info!(
            hospital_id,
            active = row.value.diversion.in_effect(now),
            kind = %row.value.diversion.kind,
            "diversion updated"
        );
        Ok((row.value, was_in_effect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::BedRequest;
    use crate::models::Severity;
    use crate::test_support::{fast_config, full_diversion, hospital, point, store_with};

    fn engine() -> AllocationEngine {
        AllocationEngine::new(
            store_with(vec![hospital("A", 40.0, -74.0, &[(BedType::Icu, 2, 2)])], vec![]),
            fast_config(),
        )
    }

    async fn reserve(engine: &AllocationEngine) -> Vec<CanonicalId> {
        engine
            .reserve_bed(&BedRequest {
                case_id: CanonicalId::generate(),
                severity: Severity::Critical,
                required_capabilities: Default::default(),
                origin: point(40.0, -74.0),
                bed_count: 1,
                preferred_hospital: None,
                preferred_bed_type: None,
            })
            .await
            .unwrap()
            .allocation_ids
    }

    #[tokio::test]
    async fn release_returns_bed_once() {
        let engine = engine();
        let ids = reserve(&engine).await;
        assert_eq!(engine.store().hospitals().get("A").unwrap().value.available(BedType::Icu), 1);

        assert_eq!(engine.release_beds(&ids, Utc::now()).unwrap().len(), 1);
        assert!(engine.release_beds(&ids, Utc::now()).unwrap().is_empty());
        assert_eq!(engine.store().hospitals().get("A").unwrap().value.available(BedType::Icu), 2);
        assert_eq!(engine.store().active_allocations("A", BedType::Icu), 0);
    }

    #[tokio::test]
    async fn discharge_twice_is_invalid() {
        let engine = engine();
        let ids = reserve(&engine).await;
        let released = engine.release_bed("A", &ids[0], Utc::now()).unwrap();
        assert!(released.released_at.is_some());

        let err = engine.release_bed("A", &ids[0], Utc::now()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn discharge_at_wrong_hospital_is_not_found() {
        let engine = engine();
        let ids = reserve(&engine).await;
        let err = engine.release_bed("B", &ids[0], Utc::now()).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn capacity_update_cannot_hide_held_beds() {
        let engine = engine();
        reserve(&engine).await;

        let too_small: BTreeMap<_, _> = [(BedType::Icu, BedCapacity::new(1, 1).unwrap())].into();
        let err = engine.update_capacity("A", &too_small, Utc::now()).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));

        let ok: BTreeMap<_, _> = [(BedType::Icu, BedCapacity::new(6, 4).unwrap())].into();
        let hospital = engine.update_capacity("A", &ok, Utc::now()).unwrap();
        assert_eq!(hospital.available(BedType::Icu), 4);
    }

    #[tokio::test]
    async fn capacity_at_the_u32_limit_still_counts_held_beds() {
        let engine = engine();
        let ids = reserve(&engine).await;

        let overflowing: BTreeMap<_, _> =
            [(BedType::Icu, BedCapacity::new(u32::MAX, u32::MAX).unwrap())].into();
        let err = engine.update_capacity("A", &overflowing, Utc::now()).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert_eq!(engine.store().hospitals().get("A").unwrap().value.available(BedType::Icu), 1);

        let at_limit: BTreeMap<_, _> =
            [(BedType::Icu, BedCapacity::new(u32::MAX, u32::MAX - 1).unwrap())].into();
        engine.update_capacity("A", &at_limit, Utc::now()).unwrap();
        engine.release_beds(&ids, Utc::now()).unwrap();
        assert_eq!(
            engine.store().hospitals().get("A").unwrap().value.available(BedType::Icu),
            u32::MAX
        );
    }

    #[test]
    fn capacity_update_for_unknown_hospital_is_not_found() {
        let engine = engine();
        let counts: BTreeMap<_, _> = [(BedType::Er, BedCapacity::new(1, 1).unwrap())].into();
        let err = engine.update_capacity("Z", &counts, Utc::now()).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { .. }));
    }

    #[test]
    fn diversion_reports_previous_state() {
        let engine = engine();
        let (hospital, was) = engine.set_diversion("A", full_diversion(), Utc::now()).unwrap();
        assert!(!was);
        assert!(hospital.diversion.blocks_all(Utc::now()));
        let (_, was) = engine
            .set_diversion("A", Diversion::default(), Utc::now())
            .unwrap();
        assert!(was);
    }
}
