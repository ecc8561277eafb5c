use crate::policy::PolicyViolation;
use healthguard_types::TypesError;
use std::fmt;

/// The kinds of entity held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Hospital,
    Ambulance,
    EmergencyCase,
    BedAllocation,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Hospital => "hospital",
            EntityKind::Ambulance => "ambulance",
            EntityKind::EmergencyCase => "emergency_case",
            EntityKind::BedAllocation => "bed_allocation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} already exists: {id}")]
    Duplicate { kind: EntityKind, id: String },

    #[error("version conflict on {kind} {id}: expected {expected}, found {actual}")]
    Conflict {
        kind: EntityKind,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid {kind} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        kind: EntityKind,
        id: String,
        from: String,
        to: String,
    },

    #[error("policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    #[error("no hospital has capacity for the request")]
    NoCapacity,

    #[error("no ambulance available with the required capability")]
    NoAmbulanceAvailable,

    #[error("allocation failed after {attempts} attempts")]
    AllocationFailed { attempts: u32 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid seed data: {0}")]
    Seed(String),
}

impl DispatchError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        DispatchError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_transition(
        kind: EntityKind,
        id: impl Into<String>,
        from: impl fmt::Display,
        to: impl fmt::Display,
    ) -> Self {
        DispatchError::InvalidTransition {
            kind,
            id: id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// True for errors that are recovered locally by retrying with fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DispatchError::Conflict { .. })
    }

    /// True for resource exhaustion, which leaves a case retryable rather than failed.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            DispatchError::NoCapacity | DispatchError::NoAmbulanceAvailable
        )
    }
}

impl From<TypesError> for DispatchError {
    fn from(err: TypesError) -> Self {
        DispatchError::Validation(err.to_string())
    }
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
