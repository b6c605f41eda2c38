//! Output renderers for a finished call graph.

pub mod listing;
pub mod report;

pub use listing::{render_listing, write_listing};
pub use report::{BlockRange, CallGraphReport, FunctionEntry};
