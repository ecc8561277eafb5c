//! Domain entities held by the entity store.
//!
//! Enumerations that cross the wire are declared through [`wire_enum!`], which fixes a single
//! snake_case spelling for serde, `Display` and `FromStr` so that the three can never drift.
//! Declaration order is significant: it defines `Ord`, so the most severe / most capable
//! variant is always declared last.

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::DispatchError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalised = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == normalised)
                    .ok_or_else(|| {
                        $crate::DispatchError::Validation(format!(
                            "unknown {} '{}' (expected one of: {})",
                            stringify!($name),
                            s,
                            $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                        ))
                    })
            }
        }
    };
}

mod allocation;
mod ambulance;
mod case;
mod hospital;

pub use allocation::BedAllocation;
pub use ambulance::{Ambulance, AmbulanceStatus, CapabilityLevel};
pub use case::{CaseStatus, EmergencyCase, Severity, TimelineEntry};
pub use hospital::{BedCapacity, BedType, Diversion, DiversionType, Hospital, TraumaLevel};
