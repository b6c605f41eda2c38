//! callsweep-core
//!
//! Core library for extracting call graphs from native executables.
//!
//! This crate defines the image model (address space and symbol index), the
//! linear-sweep decoder seam, function and call-graph reconstruction, and the
//! listing and report renderers.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends.

pub mod analysis;
pub mod backends;
pub mod demangle;
pub mod emit;
pub mod image;
pub mod model;
pub mod services;

pub use services::analysis::AnalysisError;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
