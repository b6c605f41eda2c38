use std::path::Path;

use anyhow::{Context, Result};
use callsweep_core::emit::{render_listing, CallGraphReport};
use callsweep_core::services::analysis::{analyze, AnalysisRequest, AnalysisResult};
use serde::{Deserialize, Serialize};

use crate::sha256_file;

/// Output flavour of an analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Listing,
    Json,
}

/// Run one analysis and render it. Nothing is printed here so a failure
/// never leaves partial output behind.
pub fn analyze_command(
    path: &Path,
    start: &str,
    end: Option<&str>,
    mode: Option<u32>,
    format: OutputFormat,
) -> Result<String> {
    let start = if start == "-" { None } else { Some(start) };
    let mut request = AnalysisRequest::new(path, start, end);
    request.options.word_size = mode;
    run_request(&request, format)
}

pub fn run_request(request: &AnalysisRequest, format: OutputFormat) -> Result<String> {
    let result = analyze(request)
        .with_context(|| format!("Failed to analyze {}", request.binary_path.display()))?;
    render(request, &result, format)
}

fn render(request: &AnalysisRequest, result: &AnalysisResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Listing => Ok(render_listing(&result.graph, &result.image.symbols)),
        OutputFormat::Json => {
            let hash = sha256_file(&request.binary_path)?;
            let report = CallGraphReport::new(
                request.binary_path.display().to_string(),
                result.image.word_size.bits(),
                &result.graph,
            )
            .with_hash(Some(hash))
            .with_decoder(result.backend.as_str());
            let mut json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize call graph report")?;
            json.push('\n');
            Ok(json)
        }
    }
}
