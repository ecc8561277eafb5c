use chrono::{DateTime, Utc};
use healthguard_types::GeoPoint;
use serde::{Deserialize, Serialize};

wire_enum! {
    /// Unit status. The service cycle is
    /// `available → dispatched → enroute → on_scene → transporting → available`.
    pub enum AmbulanceStatus {
        Available => "available",
        Dispatched => "dispatched",
        Enroute => "enroute",
        OnScene => "on_scene",
        Transporting => "transporting",
        OutOfService => "out_of_service",
    }
}

impl AmbulanceStatus {
    /// Whether `self → next` is a legal edge.
    ///
    /// Besides the service cycle, any state may go `out_of_service` (which only returns to
    /// `available`), and a unit that has not reached the scene may stand down
    /// (`dispatched|enroute → available`). Whether the unit's case allows leaving is checked
    /// by the engine, not here.
    pub fn can_transition_to(self, next: AmbulanceStatus) -> bool {
        use AmbulanceStatus::*;

        if self == next {
            return false;
        }
        if next == OutOfService {
            return true;
        }
        matches!(
            (self, next),
            (Available, Dispatched)
                | (Dispatched, Enroute)
                | (Enroute, OnScene)
                | (OnScene, Transporting)
                | (Transporting, Available)
                | (Dispatched, Available)
                | (Enroute, Available)
                | (OutOfService, Available)
        )
    }

    /// Units in these states can be stood down when their case is cancelled.
    pub fn can_stand_down(self) -> bool {
        matches!(self, AmbulanceStatus::Dispatched | AmbulanceStatus::Enroute)
    }
}

wire_enum! {
    /// Crew capability tier, ascending.
    pub enum CapabilityLevel {
        Bls => "bls",
        Als => "als",
        CriticalCare => "critical_care",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: String,
    pub unit_number: String,
    pub status: AmbulanceStatus,
    pub capability_level: CapabilityLevel,
    pub location: GeoPoint,
    /// Degrees clockwise from north, from the last GPS update.
    pub heading: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub crew: Vec<String>,
    pub assigned_case_id: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl Ambulance {
    pub fn is_dispatchable(&self, required: CapabilityLevel) -> bool {
        self.status == AmbulanceStatus::Available && self.capability_level >= required
    }
}
