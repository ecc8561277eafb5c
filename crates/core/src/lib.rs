//! # HealthGuard Core
//!
//! Core dispatch logic for ambulance-to-hospital routing and bed allocation.
//!
//! This crate contains the domain model and every component that touches it:
//! - [`store::EntityStore`]: the single authoritative in-memory state, with per-entity
//!   serialised, versioned mutation
//! - [`allocation::AllocationEngine`]: bed and ambulance selection plus conflict-safe
//!   reservation
//! - [`policy::PolicyGuard`]: business-rule validation run before every reservation
//! - [`triage`]: deterministic severity scoring
//! - [`coordinator::DispatchCoordinator`]: the emergency-case state machine
//! - [`events`]: the notification sink contract and in-process implementations
//!
//! **No API concerns**: HTTP routing and wire formats belong in `api-rest` and `api-shared`.

pub mod allocation;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod models;
pub mod policy;
pub mod resilience;
pub mod seed;
pub mod store;
pub mod triage;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use allocation::AllocationEngine;
pub use config::DispatchConfig;
pub use coordinator::DispatchCoordinator;
pub use error::{DispatchError, DispatchResult, EntityKind};
pub use events::{EventSink, TransitionEvent};
pub use models::{
    Ambulance, AmbulanceStatus, BedAllocation, BedCapacity, BedType, CapabilityLevel, CaseStatus,
    Diversion, DiversionType, EmergencyCase, Hospital, Severity, TimelineEntry, TraumaLevel,
};
pub use policy::{PolicyGuard, PolicyViolation};
pub use store::{EntityStore, Versioned};

pub use healthguard_types::{CanonicalId, GeoPoint, NonEmptyText};
