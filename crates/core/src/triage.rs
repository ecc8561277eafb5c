//! Deterministic triage scoring.
//!
//! [`assess`] is a weighted rule evaluation over vital signs, symptoms, age and history. Each
//! abnormal finding contributes points and an indicator severity; the final severity is the
//! worse of the point-derived severity and the worst single indicator. Identical input always
//! yields an identical assessment.

use crate::error::{DispatchError, DispatchResult};
use crate::models::{CapabilityLevel, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Input
// ============================================================================

/// Observed vital signs. Every field is optional; missing fields reduce confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VitalSigns {
    pub heart_rate: Option<u32>,
    pub systolic_bp: Option<u32>,
    pub diastolic_bp: Option<u32>,
    pub respiratory_rate: Option<u32>,
    pub spo2: Option<f64>,
    pub temperature_c: Option<f64>,
    /// Glasgow Coma Scale, 3-15.
    pub gcs: Option<u8>,
}

const VITAL_FIELDS: usize = 7;

impl VitalSigns {
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] for physiologically impossible readings.
    pub fn validate(&self) -> DispatchResult<()> {
        fn out_of_range(name: &str, value: impl std::fmt::Display) -> DispatchError {
            DispatchError::Validation(format!("{name} out of range: {value}"))
        }

        if let Some(hr) = self.heart_rate {
            if hr == 0 || hr > 300 {
                return Err(out_of_range("heart_rate", hr));
            }
        }
        if let Some(rr) = self.respiratory_rate {
            if rr > 80 {
                return Err(out_of_range("respiratory_rate", rr));
            }
        }
        if let (Some(sys), Some(dia)) = (self.systolic_bp, self.diastolic_bp) {
            if dia >= sys {
                return Err(DispatchError::Validation(format!(
                    "diastolic pressure ({dia}) must be below systolic ({sys})"
                )));
            }
        }
        if let Some(sys) = self.systolic_bp {
            if sys > 350 {
                return Err(out_of_range("systolic_bp", sys));
            }
        }
        if let Some(spo2) = self.spo2 {
            if !(0.0..=100.0).contains(&spo2) {
                return Err(out_of_range("spo2", spo2));
            }
        }
        if let Some(t) = self.temperature_c {
            if !(20.0..=46.0).contains(&t) {
                return Err(out_of_range("temperature_c", t));
            }
        }
        if let Some(gcs) = self.gcs {
            if !(3..=15).contains(&gcs) {
                return Err(out_of_range("gcs", gcs));
            }
        }
        Ok(())
    }

    /// Fills systolic/diastolic from a combined reading such as `"180/110"`. Fields already
    /// present are kept.
    ///
    /// # Errors
    ///
    /// See [`parse_blood_pressure`].
    pub fn merge_blood_pressure(&mut self, raw: &str) -> DispatchResult<()> {
        let (sys, dia) = parse_blood_pressure(raw)?;
        self.systolic_bp.get_or_insert(sys);
        self.diastolic_bp.get_or_insert(dia);
        Ok(())
    }

    fn present(&self) -> usize {
        [
            self.heart_rate.is_some(),
            self.systolic_bp.is_some(),
            self.diastolic_bp.is_some(),
            self.respiratory_rate.is_some(),
            self.spo2.is_some(),
            self.temperature_c.is_some(),
            self.gcs.is_some(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count()
    }
}

/// Parses a blood pressure reading such as `"180/110"` into `(systolic, diastolic)`.
///
/// # Errors
///
/// Returns [`DispatchError::Validation`] if the reading is not two integers separated by `/`.
pub fn parse_blood_pressure(raw: &str) -> DispatchResult<(u32, u32)> {
    let invalid = || DispatchError::Validation(format!("invalid blood pressure '{raw}'"));
    let (sys, dia) = raw.trim().split_once('/').ok_or_else(invalid)?;
    let sys = sys.trim().parse::<u32>().map_err(|_| invalid())?;
    let dia = dia.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok((sys, dia))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriageInput {
    pub vitals: VitalSigns,
    pub symptoms: Vec<String>,
    pub age: Option<u32>,
    pub history: Vec<String>,
    /// Case classification, used to derive required hospital capabilities.
    pub case_type: String,
}

// ============================================================================
// Output
// ============================================================================

/// One abnormal finding and the severity it implies on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicator {
    pub name: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageAssessment {
    pub severity: Severity,
    /// In `[0, 1]`, rounded to two decimal places.
    pub confidence_score: f64,
    pub score: u32,
    pub indicators: Vec<Indicator>,
    pub required_capabilities: BTreeSet<String>,
    pub required_ambulance_level: CapabilityLevel,
}

// ============================================================================
// Rules
// ============================================================================

const CRITICAL_SYMPTOMS: &[&str] = &["cardiac_arrest", "unresponsive", "not_breathing"];
const HIGH_SYMPTOMS: &[&str] = &[
    "chest_pain",
    "stroke_symptoms",
    "facial_droop",
    "slurred_speech",
    "severe_bleeding",
    "shortness_of_breath",
];
const HISTORY_RISKS: &[&str] = &[
    "cardiac_disease",
    "diabetes",
    "copd",
    "stroke",
    "anticoagulants",
    "immunocompromised",
];
const MAX_HISTORY_POINTS: u32 = 3;

/// Capability tags implied by keywords in the case type or symptoms.
const CAPABILITY_KEYWORDS: &[(&str, &str)] = &[
    ("trauma", "trauma_surgery"),
    ("cardiac", "cardiac_cath_lab"),
    ("chest_pain", "cardiac_cath_lab"),
    ("stroke", "stroke_center"),
    ("burn", "burn_unit"),
];

fn points(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 8,
        Severity::High => 4,
        Severity::Medium => 2,
        Severity::Low => 0,
    }
}

fn severity_for_score(score: u32) -> Severity {
    match score {
        s if s >= 12 => Severity::Critical,
        s if s >= 6 => Severity::High,
        s if s >= 2 => Severity::Medium,
        _ => Severity::Low,
    }
}

fn vital_indicators(v: &VitalSigns) -> Vec<Indicator> {
    let mut out = Vec::new();
    let mut push = |name: &str, severity: Option<Severity>| {
        if let Some(severity) = severity {
            out.push(Indicator {
                name: name.to_owned(),
                severity,
            });
        }
    };

    push(
        "spo2",
        v.spo2.and_then(|s| match s {
            s if s < 85.0 => Some(Severity::Critical),
            s if s < 90.0 => Some(Severity::High),
            s if s < 94.0 => Some(Severity::Medium),
            _ => None,
        }),
    );
    push(
        "gcs",
        v.gcs.and_then(|g| match g {
            g if g <= 8 => Some(Severity::Critical),
            g if g < 13 => Some(Severity::High),
            g if g < 15 => Some(Severity::Medium),
            _ => None,
        }),
    );
    push(
        "heart_rate",
        v.heart_rate.and_then(|hr| match hr {
            hr if hr > 150 || hr < 40 => Some(Severity::Critical),
            hr if hr > 120 || hr < 50 => Some(Severity::High),
            hr if hr > 100 => Some(Severity::Medium),
            _ => None,
        }),
    );
    push(
        "systolic_bp",
        v.systolic_bp.and_then(|bp| match bp {
            bp if bp < 80 => Some(Severity::Critical),
            bp if bp < 90 || bp > 200 => Some(Severity::High),
            bp if bp > 180 => Some(Severity::Medium),
            _ => None,
        }),
    );
    push(
        "respiratory_rate",
        v.respiratory_rate.and_then(|rr| match rr {
            rr if rr > 30 || rr < 8 => Some(Severity::Critical),
            rr if rr > 24 || rr < 10 => Some(Severity::High),
            rr if rr > 20 => Some(Severity::Medium),
            _ => None,
        }),
    );
    push(
        "temperature_c",
        v.temperature_c.and_then(|t| match t {
            t if t >= 40.0 || t < 35.0 => Some(Severity::High),
            t if t >= 38.5 => Some(Severity::Medium),
            _ => None,
        }),
    );
    out
}

fn normalise(tag: &str) -> String {
    tag.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Minimum crew tier for a severity: ALS for high and critical, BLS otherwise.
pub fn ambulance_level_for(severity: Severity) -> CapabilityLevel {
    if severity >= Severity::High {
        CapabilityLevel::Als
    } else {
        CapabilityLevel::Bls
    }
}

/// Scores a patient.
///
/// # Errors
///
/// Returns [`DispatchError::Validation`] if the vital signs are out of range.
pub fn assess(input: &TriageInput) -> DispatchResult<TriageAssessment> {
    input.vitals.validate()?;

    let symptoms: Vec<String> = input.symptoms.iter().map(|s| normalise(s)).collect();
    let history: Vec<String> = input.history.iter().map(|h| normalise(h)).collect();

    let mut indicators = vital_indicators(&input.vitals);
    for symptom in &symptoms {
        let severity = if CRITICAL_SYMPTOMS.contains(&symptom.as_str()) {
            Severity::Critical
        } else if HIGH_SYMPTOMS.contains(&symptom.as_str()) {
            Severity::High
        } else {
            continue;
        };
        indicators.push(Indicator {
            name: symptom.clone(),
            severity,
        });
    }

    let mut score: u32 = indicators.iter().map(|i| points(i.severity)).sum();
    score += match input.age {
        Some(age) if age >= 80 => 2,
        Some(age) if age >= 65 => 1,
        Some(age) if age < 2 => 2,
        _ => 0,
    };
    let history_points = history
        .iter()
        .filter(|h| HISTORY_RISKS.contains(&h.as_str()))
        .count() as u32;
    score += history_points.min(MAX_HISTORY_POINTS);

    let worst = indicators.iter().map(|i| i.severity).max();
    let severity = match worst {
        Some(w) => w.max(severity_for_score(score)),
        None => severity_for_score(score),
    };

    let completeness = input.vitals.present() as f64 / VITAL_FIELDS as f64;
    let symptom_bonus = if symptoms.is_empty() { 0.0 } else { 0.1 };
    let confidence = (0.4 + 0.5 * completeness + symptom_bonus).clamp(0.0, 1.0);
    let confidence_score = (confidence * 100.0).round() / 100.0;

    let case_type = normalise(&input.case_type);
    let required_capabilities = CAPABILITY_KEYWORDS
        .iter()
        .filter(|(keyword, _)| {
            case_type.contains(keyword) || symptoms.iter().any(|s| s.contains(keyword))
        })
        .map(|(_, capability)| (*capability).to_owned())
        .collect();

    let required_ambulance_level = ambulance_level_for(severity);

    Ok(TriageAssessment {
        severity,
        confidence_score,
        score,
        indicators,
        required_capabilities,
        required_ambulance_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_vitals() -> VitalSigns {
        VitalSigns {
            heart_rate: Some(80),
            systolic_bp: Some(120),
            diastolic_bp: Some(80),
            respiratory_rate: Some(14),
            spo2: Some(98.0),
            temperature_c: Some(36.8),
            gcs: Some(15),
        }
    }

    #[test]
    fn normal_vitals_are_low_severity_with_full_confidence() {
        let out = assess(&TriageInput {
            vitals: full_vitals(),
            case_type: "fall".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(out.severity, Severity::Low);
        assert_eq!(out.confidence_score, 0.9);
        assert!(out.indicators.is_empty());
        assert_eq!(out.required_ambulance_level, CapabilityLevel::Bls);
    }

    #[test]
    fn low_spo2_forces_at_least_high() {
        let out = assess(&TriageInput {
            vitals: VitalSigns {
                spo2: Some(88.0),
                ..full_vitals()
            },
            ..Default::default()
        })
        .unwrap();
        assert!(out.severity >= Severity::High);
        assert_eq!(out.required_ambulance_level, CapabilityLevel::Als);
    }

    #[test]
    fn low_gcs_forces_at_least_high() {
        let out = assess(&TriageInput {
            vitals: VitalSigns {
                gcs: Some(12),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        assert_eq!(out.severity, Severity::High);
    }

    #[test]
    fn worst_indicator_wins_over_low_score() {
        let out = assess(&TriageInput {
            symptoms: vec!["Cardiac Arrest".into()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(out.score, 8);
        assert_eq!(out.severity, Severity::Critical);
    }

    #[test]
    fn accumulated_points_escalate_severity() {
        // Three medium findings (6 points) reach high without any high indicator.
        let out = assess(&TriageInput {
            vitals: VitalSigns {
                heart_rate: Some(110),
                respiratory_rate: Some(22),
                spo2: Some(92.0),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        assert_eq!(out.score, 6);
        assert_eq!(out.severity, Severity::High);
    }

    #[test]
    fn age_and_history_modifiers_are_capped() {
        let out = assess(&TriageInput {
            age: Some(85),
            history: vec![
                "diabetes".into(),
                "copd".into(),
                "cardiac disease".into(),
                "anticoagulants".into(),
            ],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(out.score, 2 + MAX_HISTORY_POINTS);
        assert_eq!(out.severity, Severity::Medium);
    }

    #[test]
    fn capabilities_follow_case_type_and_symptoms() {
        let out = assess(&TriageInput {
            symptoms: vec!["chest_pain".into()],
            case_type: "trauma".into(),
            ..Default::default()
        })
        .unwrap();
        let caps: Vec<&str> = out.required_capabilities.iter().map(String::as_str).collect();
        assert_eq!(caps, vec!["cardiac_cath_lab", "trauma_surgery"]);
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let input = TriageInput {
            vitals: VitalSigns {
                heart_rate: Some(130),
                spo2: Some(91.5),
                ..Default::default()
            },
            symptoms: vec!["shortness_of_breath".into()],
            age: Some(70),
            history: vec!["copd".into()],
            case_type: "respiratory".into(),
        };
        let first = assess(&input).unwrap();
        for _ in 0..10 {
            assert_eq!(assess(&input).unwrap(), first);
        }
    }

    #[test]
    fn impossible_vitals_are_rejected() {
        let err = assess(&TriageInput {
            vitals: VitalSigns {
                gcs: Some(2),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn blood_pressure_parses() {
        assert_eq!(parse_blood_pressure("180/110").unwrap(), (180, 110));
        assert_eq!(parse_blood_pressure(" 90 / 60 ").unwrap(), (90, 60));
        assert!(parse_blood_pressure("high").is_err());
        assert!(parse_blood_pressure("120/").is_err());
    }

    #[test]
    fn blood_pressure_merge_keeps_explicit_readings() {
        let mut vitals = VitalSigns {
            systolic_bp: Some(150),
            ..VitalSigns::default()
        };
        vitals.merge_blood_pressure("180/110").unwrap();
        assert_eq!(vitals.systolic_bp, Some(150));
        assert_eq!(vitals.diastolic_bp, Some(110));
    }
}
