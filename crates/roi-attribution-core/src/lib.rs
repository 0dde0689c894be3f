pub mod aggregate;
pub mod analytics;
pub mod decompose;
pub mod error;
pub mod record;
pub mod selector;
pub mod tree;

pub use error::AttributionError;
pub use record::*;

/// Standard result type for all attribution operations
pub type AttributionResult<T> = Result<T, AttributionError>;
