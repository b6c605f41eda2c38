use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use callsweep_core::services::analysis::{AnalysisOptions, AnalysisRequest};
use serde::{Deserialize, Serialize};

use crate::commands::analyze::{run_request, OutputFormat};
use crate::resolve_relative;

/// Saved analysis invocation, read from YAML or JSON.
///
/// ```yaml
/// binary: build/app
/// start: main
/// word_size: 64
/// format: json
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSpec {
    /// Executable path, relative to the spec file unless absolute.
    pub binary: PathBuf,
    /// Symbol name or address; the entry point when omitted.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    /// Name to give the root function.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub word_size: Option<u32>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl AnalysisSpec {
    pub fn validate(&self) -> Result<()> {
        if self.binary.as_os_str().is_empty() {
            return Err(anyhow!("Spec is missing a binary path"));
        }
        if let Some(bits) = self.word_size {
            if bits != 32 && bits != 64 {
                return Err(anyhow!("Spec word_size must be 32 or 64 (got {bits})"));
            }
        }
        Ok(())
    }

    /// Turn the spec into a request, resolving the binary against `spec_dir`.
    pub fn to_request(&self, spec_dir: &Path) -> AnalysisRequest {
        let mut request = AnalysisRequest::new(
            resolve_relative(spec_dir, &self.binary),
            self.start.as_deref(),
            self.end.as_deref(),
        );
        request.name = self.name.clone();
        request.options =
            AnalysisOptions { word_size: self.word_size, arch: self.arch.clone(), ..request.options };
        request
    }
}

/// Read a spec; `.json` files are JSON, everything else YAML.
pub fn load_spec(spec_path: &Path) -> Result<AnalysisSpec> {
    let spec_bytes = fs::read(spec_path)
        .with_context(|| format!("Failed to read spec {}", spec_path.display()))?;
    let spec: AnalysisSpec = if spec_path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_slice(&spec_bytes).context("Failed to parse spec JSON")?
    } else {
        serde_yaml::from_slice(&spec_bytes).context("Failed to parse spec YAML")?
    };
    spec.validate()?;
    Ok(spec)
}

pub fn run_spec_command(spec_path: &Path) -> Result<String> {
    let spec = load_spec(spec_path)?;
    let spec_dir = spec_path.parent().unwrap_or_else(|| Path::new("."));
    let request = spec.to_request(spec_dir);
    run_request(&request, spec.format)
}
