use super::BedType;
use chrono::{DateTime, Utc};
use healthguard_types::CanonicalId;
use serde::{Deserialize, Serialize};

/// One reserved bed, joining a case to a hospital bed slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedAllocation {
    pub id: CanonicalId,
    pub hospital_id: String,
    pub bed_type: BedType,
    pub case_id: CanonicalId,
    pub allocated_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl BedAllocation {
    pub fn is_active(&self) -> bool {
        self.released_at.is_none()
    }
}
