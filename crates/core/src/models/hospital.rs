use crate::error::{DispatchError, DispatchResult};
use chrono::{DateTime, Utc};
use healthguard_types::GeoPoint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

wire_enum! {
    /// Trauma designation. `Level1` is the most capable.
    pub enum TraumaLevel {
        Community => "community",
        Level3 => "level3",
        Level2 => "level2",
        Level1 => "level1",
    }
}

impl TraumaLevel {
    /// Bonus used by bed scoring; higher is more capable.
    pub fn rank(&self) -> u8 {
        match self {
            TraumaLevel::Community => 0,
            TraumaLevel::Level3 => 1,
            TraumaLevel::Level2 => 2,
            TraumaLevel::Level1 => 3,
        }
    }
}

wire_enum! {
    pub enum BedType {
        Icu => "icu",
        Er => "er",
        MedicalSurgical => "medical_surgical",
        Telemetry => "telemetry",
        StepDown => "step_down",
    }
}

wire_enum! {
    pub enum DiversionType {
        Partial => "partial",
        Full => "full",
    }
}

/// Bed counts for one bed type. Invariant: `available <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedCapacity {
    pub total: u32,
    pub available: u32,
}

impl BedCapacity {
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] if `available > total`.
    pub fn new(total: u32, available: u32) -> DispatchResult<Self> {
        if available > total {
            return Err(DispatchError::Validation(format!(
                "available beds ({available}) cannot exceed total beds ({total})"
            )));
        }
        Ok(Self { total, available })
    }

    pub fn occupied(&self) -> u32 {
        self.total - self.available
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diversion {
    pub active: bool,
    #[serde(rename = "type")]
    pub kind: DiversionType,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for Diversion {
    fn default() -> Self {
        Self {
            active: false,
            kind: DiversionType::Full,
            reason: None,
            expires_at: None,
        }
    }
}

impl Diversion {
    /// Active and not yet expired.
    pub fn in_effect(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |at| at > now)
    }

    /// True while the hospital must not be offered at all.
    pub fn blocks_all(&self, now: DateTime<Utc>) -> bool {
        self.in_effect(now) && self.kind == DiversionType::Full
    }

    pub fn is_partial(&self, now: DateTime<Utc>) -> bool {
        self.in_effect(now) && self.kind == DiversionType::Partial
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: String,
    pub name: String,
    pub level: TraumaLevel,
    pub capabilities: BTreeSet<String>,
    pub capacity: BTreeMap<BedType, BedCapacity>,
    pub diversion: Diversion,
    pub location: GeoPoint,
    pub last_updated: DateTime<Utc>,
}

impl Hospital {
    pub fn available(&self, bed_type: BedType) -> u32 {
        self.capacity.get(&bed_type).map_or(0, |c| c.available)
    }

    pub fn has_capabilities(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }

    /// First required capability the hospital lacks, in sorted order.
    pub fn missing_capability<'a>(&self, required: &'a BTreeSet<String>) -> Option<&'a str> {
        required
            .iter()
            .find(|c| !self.capabilities.contains(*c))
            .map(String::as_str)
    }

    /// Summed as u64: per-type counts are u32 and several of them can exceed `u32::MAX`.
    pub fn total_beds(&self) -> u64 {
        self.capacity.values().map(|c| u64::from(c.total)).sum()
    }

    pub fn available_beds(&self) -> u64 {
        self.capacity.values().map(|c| u64::from(c.available)).sum()
    }

    /// Occupied share of all beds, 0-100, rounded to one decimal place.
    pub fn utilisation_pct(&self) -> f64 {
        let total = self.total_beds();
        if total == 0 {
            return 0.0;
        }
        let pct = (total - self.available_beds()) as f64 / total as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn hospital() -> Hospital {
        Hospital {
            id: "HOSP-001".into(),
            name: "Metro General".into(),
            level: TraumaLevel::Level1,
            capabilities: ["trauma_surgery".to_string(), "stroke_center".to_string()]
                .into_iter()
                .collect(),
            capacity: [
                (BedType::Icu, BedCapacity::new(10, 2).unwrap()),
                (BedType::Er, BedCapacity::new(10, 8).unwrap()),
            ]
            .into_iter()
            .collect(),
            diversion: Diversion::default(),
            location: GeoPoint::new(40.7128, -74.0060).unwrap(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn trauma_levels_are_ordered_level1_highest() {
        assert!(TraumaLevel::Level1 > TraumaLevel::Level2);
        assert!(TraumaLevel::Level2 > TraumaLevel::Level3);
        assert!(TraumaLevel::Level3 > TraumaLevel::Community);
    }

    #[test]
    fn bed_type_parses_wire_names() {
        assert_eq!(BedType::from_str("medical_surgical").unwrap(), BedType::MedicalSurgical);
        assert_eq!(BedType::from_str(" ICU ").unwrap(), BedType::Icu);
        assert!(BedType::from_str("ward").is_err());
    }

    #[test]
    fn capacity_rejects_available_above_total() {
        assert!(BedCapacity::new(1, 2).is_err());
        assert_eq!(BedCapacity::new(3, 1).unwrap().occupied(), 2);
    }

    #[test]
    fn expired_diversion_is_not_in_effect() {
        let now = Utc::now();
        let diversion = Diversion {
            active: true,
            kind: DiversionType::Full,
            reason: Some("ICU at capacity".into()),
            expires_at: Some(now - Duration::minutes(1)),
        };
        assert!(!diversion.blocks_all(now));

        let open_ended = Diversion {
            expires_at: None,
            ..diversion
        };
        assert!(open_ended.blocks_all(now));
    }

    #[test]
    fn partial_diversion_does_not_block() {
        let now = Utc::now();
        let diversion = Diversion {
            active: true,
            kind: DiversionType::Partial,
            reason: None,
            expires_at: None,
        };
        assert!(!diversion.blocks_all(now));
        assert!(diversion.is_partial(now));
    }

    #[test]
    fn utilisation_counts_all_bed_types() {
        let h = hospital();
        assert_eq!(h.total_beds(), 20);
        assert_eq!(h.available_beds(), 10);
        assert_eq!(h.utilisation_pct(), 50.0);
    }

    #[test]
    fn totals_do_not_overflow_past_u32() {
        let mut h = hospital();
        h.capacity = [
            (BedType::Icu, BedCapacity::new(3_000_000_000, 3_000_000_000).unwrap()),
            (BedType::Er, BedCapacity::new(3_000_000_000, 0).unwrap()),
        ]
        .into_iter()
        .collect();
        assert_eq!(h.total_beds(), 6_000_000_000);
        assert_eq!(h.available_beds(), 3_000_000_000);
        assert_eq!(h.utilisation_pct(), 50.0);
    }

    #[test]
    fn missing_capability_reports_first_gap() {
        let h = hospital();
        let required: BTreeSet<String> = ["burn_unit".to_string(), "trauma_surgery".to_string()]
            .into_iter()
            .collect();
        assert!(!h.has_capabilities(&required));
        assert_eq!(h.missing_capability(&required), Some("burn_unit"));
    }
}
