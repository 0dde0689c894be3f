use thiserror::Error;

/// Errors raised while building an attribution tree. Input validation is
/// the only failure mode in the engine itself; arithmetic stays in
/// `Decimal` and cannot fail once the periods are accepted.
#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}
