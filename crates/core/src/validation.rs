//! Input validation at the domain boundary.
//!
//! Everything that arrives from outside (HTTP bodies, CLI arguments, seed files) passes through
//! one of these constructors before it reaches the store. Failures are reported as
//! [`DispatchError::Validation`] and never touch state.

use crate::constants::MAX_ENTITY_KEY_LEN;
use crate::error::{DispatchError, DispatchResult};
use crate::models::{BedCapacity, BedType, Diversion, DiversionType, Severity};
use chrono::{DateTime, Duration, Utc};
use healthguard_types::{GeoPoint, NonEmptyText};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Validated intake fields for a new emergency case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseIntake {
    pub patient_ref: NonEmptyText,
    pub case_type: NonEmptyText,
    pub location: GeoPoint,
    pub reported_severity: Option<Severity>,
    pub reporter: Option<String>,
}

impl CaseIntake {
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] if any field is blank, the coordinates are out of
    /// range, or the reported severity is not a known level.
    pub fn new(
        patient_ref: &str,
        case_type: &str,
        lat: f64,
        lon: f64,
        reported_severity: Option<&str>,
        reporter: Option<String>,
    ) -> DispatchResult<Self> {
        let patient_ref = NonEmptyText::new(patient_ref)
            .map_err(|_| DispatchError::Validation("patient_ref cannot be empty".into()))?;
        let case_type = NonEmptyText::new(case_type)
            .map_err(|_| DispatchError::Validation("type cannot be empty".into()))?;
        let location = GeoPoint::new(lat, lon)?;
        let reported_severity = reported_severity.map(Severity::from_str).transpose()?;

        Ok(Self {
            patient_ref,
            case_type: NonEmptyText::new(case_type.as_str().to_ascii_lowercase())?,
            location,
            reported_severity,
            reporter: reporter.filter(|r| !r.trim().is_empty()),
        })
    }
}

/// Validates that a hospital or ambulance identifier is safe to use as a store key and in URLs.
///
/// - Rejects empty or whitespace-only strings
/// - Bounds the length
/// - Restricts characters to ASCII alphanumerics, `-` and `_`
///
/// # Errors
///
/// Returns [`DispatchError::Validation`] if the identifier is invalid.
pub fn validate_entity_key(id: &str) -> DispatchResult<()> {
    if id.trim().is_empty() {
        return Err(DispatchError::Validation("identifier cannot be empty".into()));
    }

    if id.len() > MAX_ENTITY_KEY_LEN {
        return Err(DispatchError::Validation(format!(
            "identifier exceeds maximum length of {} characters",
            MAX_ENTITY_KEY_LEN
        )));
    }

    let ok = id
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_'));

    if !ok {
        return Err(DispatchError::Validation(format!(
            "identifier '{id}' contains invalid characters (only alphanumeric, '-', '_' allowed)"
        )));
    }

    Ok(())
}

/// Parses a bed-type keyed map of `(total, available)` counts into validated capacities.
///
/// # Errors
///
/// Returns [`DispatchError::Validation`] for unknown bed types or `available > total`.
pub fn parse_capacity_counts<'a, I>(counts: I) -> DispatchResult<BTreeMap<BedType, BedCapacity>>
where
    I: IntoIterator<Item = (&'a str, u32, u32)>,
{
    let mut out = BTreeMap::new();
    for (bed_type, total, available) in counts {
        let bed_type = BedType::from_str(bed_type)?;
        let capacity = BedCapacity::new(total, available).map_err(|_| {
            DispatchError::Validation(format!(
                "{bed_type}: available ({available}) cannot exceed total ({total})"
            ))
        })?;
        if out.insert(bed_type, capacity).is_some() {
            return Err(DispatchError::Validation(format!(
                "duplicate bed type '{bed_type}'"
            )));
        }
    }
    if out.is_empty() {
        return Err(DispatchError::Validation(
            "at least one bed type is required".into(),
        ));
    }
    Ok(out)
}

/// Builds a diversion from request fields. Clearing (`active == false`) ignores the other
/// fields; `kind` defaults to `full`.
///
/// # Errors
///
/// Returns [`DispatchError::Validation`] for an unknown diversion type or a duration that is
/// not a positive number of hours.
pub fn diversion_request(
    active: bool,
    kind: Option<&str>,
    reason: Option<String>,
    duration_hours: Option<f64>,
    now: DateTime<Utc>,
) -> DispatchResult<Diversion> {
    if !active {
        return Ok(Diversion::default());
    }
    let kind = kind
        .map(DiversionType::from_str)
        .transpose()?
        .unwrap_or(DiversionType::Full);
    let expires_at = match duration_hours {
        None => None,
        Some(hours) if hours.is_finite() && hours > 0.0 => {
            // `as` saturates, so an absurd duration fails try_seconds instead of wrapping.
            let expiry = Duration::try_seconds((hours * 3600.0).round() as i64)
                .and_then(|d| now.checked_add_signed(d))
                .ok_or_else(|| {
                    DispatchError::Validation(format!(
                        "duration_hours {hours} is beyond the supported range"
                    ))
                })?;
            Some(expiry)
        }
        Some(hours) => {
            return Err(DispatchError::Validation(format!(
                "duration_hours must be positive, got {hours}"
            )))
        }
    };
    Ok(Diversion {
        active: true,
        kind,
        reason: reason.filter(|r| !r.trim().is_empty()),
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_normalises_type_and_parses_severity() {
        let intake =
            CaseIntake::new("P1", " Cardiac_Arrest ", 40.7, -74.0, Some("critical"), None).unwrap();
        assert_eq!(intake.case_type.as_str(), "cardiac_arrest");
        assert_eq!(intake.reported_severity, Some(Severity::Critical));
    }

    #[test]
    fn intake_rejects_unknown_severity() {
        let err = CaseIntake::new("P1", "trauma", 40.7, -74.0, Some("invalid_level"), None)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(msg) if msg.contains("Severity")));
    }

    #[test]
    fn intake_rejects_blank_patient_and_bad_coordinates() {
        assert!(CaseIntake::new("  ", "trauma", 40.7, -74.0, None, None).is_err());
        assert!(CaseIntake::new("P1", "trauma", 140.7, -74.0, None, None).is_err());
    }

    #[test]
    fn entity_key_accepts_typical_ids() {
        assert!(validate_entity_key("HOSP-001").is_ok());
        assert!(validate_entity_key("metro_general").is_ok());
    }

    #[test]
    fn entity_key_rejects_injection_attempts() {
        assert!(validate_entity_key("'; DROP TABLE hospitals; --").is_err());
        assert!(validate_entity_key("../etc/passwd").is_err());
        assert!(validate_entity_key("<script>").is_err());
        assert!(validate_entity_key("").is_err());
        assert!(validate_entity_key(&"a".repeat(MAX_ENTITY_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn capacity_counts_reject_available_above_total() {
        let err = parse_capacity_counts([("icu", 2, 3)]).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(msg) if msg.contains("icu")));
    }

    #[test]
    fn capacity_counts_reject_duplicates_and_unknown_types() {
        assert!(parse_capacity_counts([("icu", 2, 1), ("ICU", 2, 1)]).is_err());
        assert!(parse_capacity_counts([("ward", 2, 1)]).is_err());
        assert!(parse_capacity_counts(std::iter::empty()).is_err());
    }

    #[test]
    fn diversion_request_defaults_to_full_and_sets_expiry() {
        let now = Utc::now();
        let d = diversion_request(true, None, Some("ct down".into()), Some(1.5), now).unwrap();
        assert_eq!(d.kind, DiversionType::Full);
        assert_eq!(d.expires_at, Some(now + Duration::minutes(90)));
        assert!(d.in_effect(now));
    }

    #[test]
    fn clearing_diversion_ignores_other_fields() {
        let d = diversion_request(false, Some("bogus"), None, Some(-1.0), Utc::now()).unwrap();
        assert_eq!(d, Diversion::default());
    }

    #[test]
    fn diversion_request_rejects_bad_duration_and_type() {
        let now = Utc::now();
        assert!(diversion_request(true, None, None, Some(0.0), now).is_err());
        assert!(diversion_request(true, None, None, Some(f64::NAN), now).is_err());
        assert!(diversion_request(true, Some("total"), None, None, now).is_err());
    }

    #[test]
    fn oversized_diversion_duration_is_a_validation_error() {
        let now = Utc::now();
        for hours in [1e20, f64::MAX] {
            let err = diversion_request(true, None, None, Some(hours), now).unwrap_err();
            assert!(matches!(err, DispatchError::Validation(_)));
        }
        let year = diversion_request(true, None, None, Some(24.0 * 365.0), now).unwrap();
        assert_eq!(year.expires_at, Some(now + Duration::days(365)));
    }
}
