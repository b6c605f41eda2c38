use serde::{Deserialize, Serialize};

use crate::demangle::demangle;
use crate::model::{CallGraph, Function};

/// Machine-readable cross-reference of every function reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphReport {
    pub binary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_sha256: Option<String>,
    /// Decoder name and version, e.g. `capstone 5.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoder: Option<String>,
    pub word_size: u32,
    pub root: String,
    pub functions: Vec<FunctionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demangled: Option<String>,
    pub start: u64,
    pub end: u64,
    pub dynamic: bool,
    pub instructions: usize,
    pub blocks: Vec<BlockRange>,
    pub labels: Vec<u64>,
    pub callees: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

/// Address range `[start, end)` of one basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl FunctionEntry {
    pub fn from_function(func: &Function) -> Self {
        let blocks = func
            .blocks
            .iter()
            .filter_map(|b| {
                let first = func.instructions.get(b.first)?;
                let last = func.instructions.get(b.last)?;
                Some(BlockRange { start: first.start, end: last.end })
            })
            .collect();
        let mut callees: Vec<String> = func.callees.iter().map(|c| c.name.clone()).collect();
        callees.dedup();
        Self {
            name: func.name.clone(),
            demangled: demangle(&func.name),
            start: func.start,
            end: func.end,
            dynamic: func.dynamic,
            instructions: func.instructions.iter().filter(|i| i.error.is_none()).count(),
            blocks,
            labels: func.labels.clone(),
            callees,
            decode_error: func.decode_error().map(str::to_string),
        }
    }
}

impl CallGraphReport {
    /// Functions appear in listing order.
    pub fn new(binary: impl Into<String>, word_size: u32, graph: &CallGraph) -> Self {
        Self {
            binary: binary.into(),
            binary_sha256: None,
            decoder: None,
            word_size,
            root: graph.root.clone(),
            functions: graph.ordered().into_iter().map(FunctionEntry::from_function).collect(),
        }
    }

    pub fn with_hash(mut self, hash: Option<String>) -> Self {
        self.binary_sha256 = hash;
        self
    }

    pub fn with_decoder(mut self, decoder: impl Into<String>) -> Self {
        self.decoder = Some(decoder.into());
        self
    }
}
