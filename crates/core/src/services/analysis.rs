use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::analysis::{build_call_graph, FunctionBuilder};
use crate::backends::{InstructionDecoder, MAX_INSTRUCTION_LEN};
use crate::image::{LoadedImage, WordSize};
use crate::model::CallGraph;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Binary not found at {0}")]
    MissingBinary(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse executable: {0}")]
    Container(String),
    #[error("executable has no loadable segment")]
    NoLoadableSegments,
    #[error("overlapping memory: {name:?} {start:#x}-{end:#x} overlaps {existing}")]
    OverlappingRegion { name: String, start: u64, end: u64, existing: String },
    #[error("unable to find symbol {0:?}")]
    UnknownSymbol(String),
    #[error("unsupported word size {0} (expected 32 or 64)")]
    UnsupportedWordSize(u32),
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
    #[error("Analysis backend error: {0}")]
    Backend(String),
}

fn default_window() -> usize {
    MAX_INSTRUCTION_LEN
}

fn default_placeholder_size() -> u64 {
    crate::analysis::function::PLACEHOLDER_CALLEE_SIZE
}

/// Knobs for an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Overrides the container's word size (32 or 64).
    #[serde(default)]
    pub word_size: Option<u32>,
    /// Overrides the container's architecture (e.g. x86_64).
    #[serde(default)]
    pub arch: Option<String>,
    /// Bytes fetched per decode attempt.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Extent assumed for call targets no symbol covers.
    #[serde(default = "default_placeholder_size")]
    pub placeholder_callee_size: u64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            word_size: None,
            arch: None,
            window: default_window(),
            placeholder_callee_size: default_placeholder_size(),
        }
    }
}

/// Request to extract the call graph rooted at `start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub binary_path: PathBuf,
    /// Symbol name or numeric address; the entry point when absent.
    pub start: Option<String>,
    pub end: Option<String>,
    /// Name to give the root instead of deriving one.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(binary_path: impl Into<PathBuf>, start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            binary_path: binary_path.into(),
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            name: None,
            options: AnalysisOptions::default(),
        }
    }
}

/// Loaded image plus the call graph extracted from it.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub image: LoadedImage,
    pub graph: CallGraph,
    pub backend: String,
}

/// Apply word-size and architecture overrides to a loaded image.
pub fn apply_overrides(
    image: &mut LoadedImage,
    options: &AnalysisOptions,
) -> Result<(), AnalysisError> {
    if let Some(bits) = options.word_size {
        image.word_size = WordSize::from_bits(bits)?;
        if options.arch.is_none() && image.arch.starts_with("x86") {
            image.arch = if bits == 32 { "x86" } else { "x86_64" }.to_string();
        }
    }
    if let Some(arch) = &options.arch {
        image.arch = arch.clone();
    }
    Ok(())
}

/// Build the call graph for `request` against an already loaded image.
pub fn analyze_image(
    image: &LoadedImage,
    decoder: &dyn InstructionDecoder,
    request: &AnalysisRequest,
) -> Result<CallGraph, AnalysisError> {
    let builder = FunctionBuilder::new(image, decoder)
        .with_window(request.options.window)
        .with_placeholder_size(request.options.placeholder_callee_size);

    let entry = format!("{:#x}", image.entry);
    let start = request.start.as_deref().filter(|s| !s.trim().is_empty() && *s != "-");
    let root = builder.build(
        request.name.as_deref(),
        start.unwrap_or(&entry),
        request.end.as_deref(),
    )?;

    let graph = build_call_graph(&builder, root);
    info!(
        root = %graph.root,
        functions = graph.len(),
        decoder = decoder.name(),
        "call graph built"
    );
    Ok(graph)
}

/// Load the executable at `path` and build its address space and symbols.
#[cfg(feature = "capstone-backend")]
pub fn load_image(
    path: &std::path::Path,
    options: &AnalysisOptions,
) -> Result<LoadedImage, AnalysisError> {
    let container = crate::image::elf::load_path(path)?;
    let mut image = LoadedImage::from_container(&container)?;
    apply_overrides(&mut image, options)?;
    Ok(image)
}

/// Load, decode and expand in one step using the capstone decoder.
#[cfg(feature = "capstone-backend")]
pub fn analyze(request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
    let image = load_image(&request.binary_path, &request.options)?;
    let decoder = crate::backends::CapstoneDecoder::new(&image.arch, image.word_size)?;
    let backend = format!("{} {}", decoder.name(), crate::backends::CapstoneDecoder::version());
    info!(%backend, "decoder ready");
    let graph = analyze_image(&image, &decoder, request)?;
    Ok(AnalysisResult { image, graph, backend })
}
