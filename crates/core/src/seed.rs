//! Seed fixtures: hospitals and ambulances provisioned at startup.
//!
//! Seed documents are YAML, parsed strictly (`deny_unknown_fields`) with the failing field's
//! path included in errors. A built-in demo fleet is available through [`SeedData::demo`].

use crate::error::{DispatchError, DispatchResult};
use crate::models::{
    Ambulance, AmbulanceStatus, CapabilityLevel, Diversion, DiversionType, Hospital, TraumaLevel,
};
use crate::store::EntityStore;
use crate::validation::{parse_capacity_counts, validate_entity_key};
use chrono::{DateTime, Duration, Utc};
use healthguard_types::GeoPoint;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

const DEMO_SEED: &str = include_str!("../seed/demo.yaml");

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedWire {
    #[serde(default)]
    hospitals: Vec<HospitalWire>,
    #[serde(default)]
    ambulances: Vec<AmbulanceWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HospitalWire {
    id: String,
    name: String,
    level: TraumaLevel,
    #[serde(default)]
    capabilities: BTreeSet<String>,
    location: GeoPoint,
    beds: BTreeMap<String, BedsWire>,
    diversion: Option<DiversionWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BedsWire {
    total: u32,
    available: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiversionWire {
    #[serde(rename = "type")]
    kind: DiversionType,
    reason: Option<String>,
    duration_hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AmbulanceWire {
    id: String,
    unit_number: String,
    capability_level: CapabilityLevel,
    #[serde(default = "default_status")]
    status: AmbulanceStatus,
    location: GeoPoint,
    #[serde(default)]
    crew: Vec<String>,
}

fn default_status() -> AmbulanceStatus {
    AmbulanceStatus::Available
}

// ============================================================================
// Domain
// ============================================================================

/// Validated seed content, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedData {
    pub hospitals: Vec<Hospital>,
    pub ambulances: Vec<Ambulance>,
}

impl SeedData {
    /// Parse a seed document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Seed`] if:
    /// - the YAML does not match the seed schema (the message names the failing path),
    /// - an id is invalid or repeated,
    /// - a bed type is unknown or has `available > total`.
    pub fn parse(yaml_text: &str) -> DispatchResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire = match serde_path_to_error::deserialize::<_, SeedWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(DispatchError::Seed(format!(
                    "schema mismatch at {path}: {source}"
                )));
            }
        };
        wire_to_domain(wire, Utc::now())
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::Seed`] if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> DispatchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::Seed(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
            .map_err(|e| DispatchError::Seed(format!("{}: {e}", path.display())))
    }

    /// The built-in demo fleet.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled document is broken, which the tests guard against.
    pub fn demo() -> DispatchResult<Self> {
        Self::parse(DEMO_SEED)
    }

    /// Inserts every entity into `store`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Duplicate`] if an id is already present.
    pub fn apply(&self, store: &EntityStore) -> DispatchResult<()> {
        for hospital in &self.hospitals {
            store.hospitals().insert(hospital.clone())?;
        }
        for ambulance in &self.ambulances {
            store.ambulances().insert(ambulance.clone())?;
        }
        tracing::info!(
            hospitals = self.hospitals.len(),
            ambulances = self.ambulances.len(),
            "seed applied"
        );
        Ok(())
    }
}

fn wire_to_domain(wire: SeedWire, now: DateTime<Utc>) -> DispatchResult<SeedData> {
    let seed_err = |context: &str, err: DispatchError| match err {
        DispatchError::Validation(msg) => DispatchError::Seed(format!("{context}: {msg}")),
        other => other,
    };

    let mut seen = HashSet::new();
    let mut hospitals = Vec::with_capacity(wire.hospitals.len());
    for h in wire.hospitals {
        let context = format!("hospital {}", h.id);
        validate_entity_key(&h.id).map_err(|e| seed_err(context.as_str(), e))?;
        if !seen.insert(h.id.clone()) {
            return Err(DispatchError::Seed(format!("duplicate {context}")));
        }
        let capacity = parse_capacity_counts(
            h.beds
                .iter()
                .map(|(bed_type, beds)| (bed_type.as_str(), beds.total, beds.available)),
        )
        .map_err(|e| seed_err(context.as_str(), e))?;
        let diversion = h.diversion.map_or_else(Diversion::default, |d| Diversion {
            active: true,
            kind: d.kind,
            reason: d.reason,
            expires_at: d
                .duration_hours
                .map(|hours| now + Duration::hours(i64::from(hours))),
        });

        hospitals.push(Hospital {
            id: h.id,
            name: h.name,
            level: h.level,
            capabilities: h.capabilities,
            capacity,
            diversion,
            location: h.location,
            last_updated: now,
        });
    }

    let mut seen = HashSet::new();
    let mut ambulances = Vec::with_capacity(wire.ambulances.len());
    for a in wire.ambulances {
        let context = format!("ambulance {}", a.id);
        validate_entity_key(&a.id).map_err(|e| seed_err(context.as_str(), e))?;
        if !seen.insert(a.id.clone()) {
            return Err(DispatchError::Seed(format!("duplicate {context}")));
        }
        ambulances.push(Ambulance {
            id: a.id,
            unit_number: a.unit_number,
            status: a.status,
            capability_level: a.capability_level,
            location: a.location,
            heading: None,
            speed_kmh: None,
            crew: a.crew,
            assigned_case_id: None,
            last_updated: now,
        });
    }

    Ok(SeedData {
        hospitals,
        ambulances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BedType;
    use std::io::Write;

    #[test]
    fn demo_seed_parses_and_applies() {
        let seed = SeedData::demo().expect("bundled demo seed must parse");
        assert_eq!(seed.hospitals.len(), 3);
        assert_eq!(seed.ambulances.len(), 4);

        let store = EntityStore::new();
        seed.apply(&store).unwrap();
        let metro = store.hospitals().get("HOSP-001").unwrap().value;
        assert_eq!(metro.level, TraumaLevel::Level1);
        assert_eq!(metro.available(BedType::Icu), 5);
        let riverside = store.hospitals().get("HOSP-003").unwrap().value;
        assert!(riverside.diversion.is_partial(Utc::now()));
    }

    #[test]
    fn unknown_field_reports_its_path() {
        let input = r#"hospitals:
  - id: HOSP-001
    name: Metro
    level: level1
    location: { lat: 40.0, lon: -74.0 }
    beds:
      icu: { total: 1, available: 1, reserved: 0 }
"#;
        let err = SeedData::parse(input).unwrap_err();
        match err {
            DispatchError::Seed(msg) => assert!(msg.contains("hospitals[0].beds"), "{msg}"),
            other => panic!("expected seed error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_level_is_rejected() {
        let input = r#"hospitals:
  - id: HOSP-001
    name: Metro
    level: level9
    location: { lat: 40.0, lon: -74.0 }
    beds: { icu: { total: 1, available: 1 } }
"#;
        assert!(matches!(SeedData::parse(input), Err(DispatchError::Seed(_))));
    }

    #[test]
    fn available_above_total_is_rejected() {
        let input = r#"hospitals:
  - id: HOSP-001
    name: Metro
    level: level1
    location: { lat: 40.0, lon: -74.0 }
    beds: { icu: { total: 1, available: 2 } }
"#;
        let err = SeedData::parse(input).unwrap_err();
        assert!(matches!(err, DispatchError::Seed(msg) if msg.contains("HOSP-001")));
    }

    #[test]
    fn duplicate_ambulance_is_rejected() {
        let input = r#"ambulances:
  - { id: AMB-1, unit_number: "1", capability_level: bls, location: { lat: 1.0, lon: 1.0 } }
  - { id: AMB-1, unit_number: "2", capability_level: bls, location: { lat: 1.0, lon: 1.0 } }
"#;
        let err = SeedData::parse(input).unwrap_err();
        assert!(matches!(err, DispatchError::Seed(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn out_of_range_location_is_rejected() {
        let input = r#"ambulances:
  - { id: AMB-1, unit_number: "1", capability_level: bls, location: { lat: 91.0, lon: 1.0 } }
"#;
        assert!(SeedData::parse(input).is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "ambulances:\n  - {{ id: AMB-9, unit_number: \"9\", capability_level: als, location: {{ lat: 40.0, lon: -74.0 }} }}\n"
        )
        .unwrap();
        let seed = SeedData::load(file.path()).unwrap();
        assert_eq!(seed.ambulances[0].id, "AMB-9");
        assert!(seed.hospitals.is_empty());
    }

    #[test]
    fn missing_file_is_a_seed_error() {
        let err = SeedData::load(Path::new("/nonexistent/seed.yaml")).unwrap_err();
        assert!(matches!(err, DispatchError::Seed(_)));
    }
}
