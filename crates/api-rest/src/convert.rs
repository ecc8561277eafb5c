//! Domain types to wire DTOs.

use api_shared::{
    AmbulanceDto, BedAllocationDto, BedAvailabilityDto, BedCountsDto, Coordinates, DiversionDto,
    EmergencyCaseDto, HospitalDto, TimelineEntryDto,
};
use chrono::{DateTime, Utc};
use healthguard_core::{
    Ambulance, BedAllocation, BedType, EmergencyCase, GeoPoint, Hospital, TimelineEntry,
};
use std::collections::BTreeMap;

pub fn coordinates(point: GeoPoint) -> Coordinates {
    Coordinates {
        lat: point.lat(),
        lon: point.lon(),
    }
}

pub fn case_dto(case: &EmergencyCase) -> EmergencyCaseDto {
    EmergencyCaseDto {
        id: case.id.to_string(),
        patient_ref: case.patient_ref.clone(),
        case_type: case.case_type.clone(),
        status: case.status.to_string(),
        severity: case.severity.map(|s| s.to_string()),
        confidence_score: case.confidence_score,
        location: coordinates(case.location),
        required_capabilities: case.required_capabilities.iter().cloned().collect(),
        required_ambulance_level: case.required_ambulance_level.to_string(),
        assigned_hospital_id: case.assigned_hospital_id.clone(),
        assigned_ambulance_id: case.assigned_ambulance_id.clone(),
        bed_allocation_ids: case.bed_allocation_ids.iter().map(|id| id.to_string()).collect(),
        reporter: case.reporter.clone(),
        created_at: case.created_at,
    }
}

pub fn timeline_dto(entries: &[TimelineEntry]) -> Vec<TimelineEntryDto> {
    entries
        .iter()
        .map(|e| TimelineEntryDto {
            index: e.index,
            timestamp: e.timestamp,
            event_type: e.event_type.clone(),
            detail: e.detail.clone(),
        })
        .collect()
}

fn bed_counts(hospital: &Hospital, only: Option<BedType>) -> BTreeMap<String, BedCountsDto> {
    hospital
        .capacity
        .iter()
        .filter(|(bed_type, _)| only.map_or(true, |t| t == **bed_type))
        .map(|(bed_type, c)| {
            (
                bed_type.to_string(),
                BedCountsDto {
                    total: c.total,
                    available: c.available,
                },
            )
        })
        .collect()
}

pub fn hospital_dto(hospital: &Hospital, now: DateTime<Utc>) -> HospitalDto {
    HospitalDto {
        id: hospital.id.clone(),
        name: hospital.name.clone(),
        level: hospital.level.to_string(),
        capabilities: hospital.capabilities.iter().cloned().collect(),
        location: coordinates(hospital.location),
        beds: bed_counts(hospital, None),
        diversion: DiversionDto {
            active: hospital.diversion.active,
            kind: hospital.diversion.kind.to_string(),
            reason: hospital.diversion.reason.clone(),
            expires_at: hospital.diversion.expires_at,
            in_effect: hospital.diversion.in_effect(now),
        },
        last_updated: hospital.last_updated,
    }
}

/// Availability summary, optionally narrowed to a single bed type.
pub fn bed_availability(
    hospital: &Hospital,
    only: Option<BedType>,
    now: DateTime<Utc>,
) -> BedAvailabilityDto {
    let breakdown = bed_counts(hospital, only);
    let total_beds: u64 = breakdown.values().map(|c| u64::from(c.total)).sum();
    let available_beds: u64 = breakdown.values().map(|c| u64::from(c.available)).sum();
    let utilization_percentage = if total_beds == 0 {
        0.0
    } else {
        let pct = (total_beds - available_beds) as f64 * 100.0 / total_beds as f64;
        (pct * 10.0).round() / 10.0
    };
    BedAvailabilityDto {
        hospital_id: hospital.id.clone(),
        hospital_name: hospital.name.clone(),
        total_beds,
        available_beds,
        bed_type_breakdown: breakdown,
        utilization_percentage,
        on_diversion: hospital.diversion.in_effect(now),
        last_updated: hospital.last_updated,
    }
}

pub fn allocation_dto(allocation: &BedAllocation) -> BedAllocationDto {
    BedAllocationDto {
        id: allocation.id.to_string(),
        hospital_id: allocation.hospital_id.clone(),
        bed_type: allocation.bed_type.to_string(),
        case_id: allocation.case_id.to_string(),
        allocated_at: allocation.allocated_at,
        released_at: allocation.released_at,
    }
}

pub fn ambulance_dto(ambulance: &Ambulance) -> AmbulanceDto {
    AmbulanceDto {
        id: ambulance.id.clone(),
        unit_number: ambulance.unit_number.clone(),
        status: ambulance.status.to_string(),
        capability_level: ambulance.capability_level.to_string(),
        location: coordinates(ambulance.location),
        heading: ambulance.heading,
        speed_kmh: ambulance.speed_kmh,
        crew: ambulance.crew.clone(),
        assigned_case_id: ambulance.assigned_case_id.clone(),
        last_updated: ambulance.last_updated,
    }
}
