//! Fixture builders shared by the unit tests of several modules.

use crate::config::DispatchConfig;
use crate::models::{
    Ambulance, AmbulanceStatus, BedCapacity, BedType, CapabilityLevel, Diversion, DiversionType,
    Hospital, TraumaLevel,
};
use crate::store::EntityStore;
use chrono::Utc;
use healthguard_types::GeoPoint;
use std::sync::Arc;
use std::time::Duration;

pub fn point(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).unwrap()
}

pub fn hospital(id: &str, lat: f64, lon: f64, beds: &[(BedType, u32, u32)]) -> Hospital {
    Hospital {
        id: id.into(),
        name: format!("Hospital {id}"),
        level: TraumaLevel::Level2,
        capabilities: Default::default(),
        capacity: beds
            .iter()
            .map(|(bt, total, available)| (*bt, BedCapacity::new(*total, *available).unwrap()))
            .collect(),
        diversion: Diversion::default(),
        location: point(lat, lon),
        last_updated: Utc::now(),
    }
}

pub fn full_diversion() -> Diversion {
    Diversion {
        active: true,
        kind: DiversionType::Full,
        reason: Some("ED saturated".into()),
        expires_at: None,
    }
}

pub fn ambulance(id: &str, lat: f64, lon: f64, level: CapabilityLevel) -> Ambulance {
    Ambulance {
        id: id.into(),
        unit_number: format!("Unit {id}"),
        status: AmbulanceStatus::Available,
        capability_level: level,
        location: point(lat, lon),
        heading: None,
        speed_kmh: None,
        crew: vec!["Paramedic A".into(), "EMT B".into()],
        assigned_case_id: None,
        last_updated: Utc::now(),
    }
}

/// Defaults with near-zero backoff so contention tests run quickly.
pub fn fast_config() -> DispatchConfig {
    let mut cfg = DispatchConfig::defaults();
    cfg.retry.base_delay = Duration::from_millis(1);
    cfg.retry.max_delay = Duration::from_millis(5);
    cfg.retry.jitter = Duration::from_millis(2);
    cfg
}

pub fn store_with(hospitals: Vec<Hospital>, ambulances: Vec<Ambulance>) -> Arc<EntityStore> {
    let store = EntityStore::new();
    for h in hospitals {
        store.hospitals().insert(h).unwrap();
    }
    for a in ambulances {
        store.ambulances().insert(a).unwrap();
    }
    Arc::new(store)
}
