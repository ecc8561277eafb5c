//! Validated primitives shared across the HealthGuard dispatch crates.
//!
//! Every value in this crate is checked once at construction, so downstream code can rely on
//! the invariant without re-validating:
//! - [`NonEmptyText`]: trimmed, never blank
//! - [`GeoPoint`]: latitude in `[-90, 90]`, longitude in `[-180, 180]`, both finite
//! - [`CanonicalId`]: 32 lowercase hex characters (no hyphens), used for generated entities
//!   such as emergency cases and bed allocations

mod geo;
mod id;
mod text;

pub use geo::GeoPoint;
pub use id::CanonicalId;
pub use text::NonEmptyText;

/// Errors that can occur when constructing validated primitives.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    EmptyText,

    /// A coordinate was outside its valid range or not finite
    #[error("invalid {axis}: {value} (must be finite and within ±{limit})")]
    InvalidCoordinate {
        axis: &'static str,
        value: f64,
        limit: f64,
    },

    /// An identifier was not in canonical form
    #[error("identifier must be 32 lowercase hex characters without hyphens, got: '{0}'")]
    NonCanonicalId(String),
}

/// Result type for primitive construction.
pub type TypesResult<T> = Result<T, TypesError>;
