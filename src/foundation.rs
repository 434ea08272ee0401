/// Geometry and request-level value types.
pub mod core;
/// Error type shared by every stage.
pub mod error;
pub(crate) mod math;
