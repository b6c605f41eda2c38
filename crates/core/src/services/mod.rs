//! Service layer that ties image loading, decoding and graph expansion
//! together for frontends.

pub mod analysis;

pub use analysis::{AnalysisError, AnalysisOptions, AnalysisRequest, AnalysisResult};
