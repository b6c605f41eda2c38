use serde::{Deserialize, Serialize};

use crate::model::Symbol;
use crate::services::analysis::AnalysisError;

/// Processor word size; selects the decoder mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordSize {
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

impl WordSize {
    pub fn from_bits(bits: u32) -> Result<Self, AnalysisError> {
        match bits {
            32 => Ok(WordSize::Bits32),
            64 => Ok(WordSize::Bits64),
            other => Err(AnalysisError::UnsupportedWordSize(other)),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            WordSize::Bits32 => 32,
            WordSize::Bits64 => 64,
        }
    }
}

/// A loadable segment: `memsz` bytes at `vaddr`, the first `data.len()` of
/// which come from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub vaddr: u64,
    pub memsz: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationKind {
    /// PLT-style slot filled in by the dynamic loader.
    JumpSlot,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationEntry {
    /// Index into the dynamic symbol table (0 is the null symbol).
    pub symbol_index: usize,
    pub kind: RelocationKind,
}

/// Relocations of one section, together with the section they apply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationSection {
    pub name: String,
    /// Address and entry size of the patched section (e.g. `.plt` for
    /// `.rela.plt`); `None` when that section does not exist.
    pub target_addr: Option<u64>,
    pub entry_size: u64,
    pub entries: Vec<RelocationEntry>,
}

/// Structured view of an executable as produced by a container reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerImage {
    pub word_size: WordSize,
    /// Architecture name understood by the decoder backends.
    pub arch: String,
    pub entry: u64,
    pub segments: Vec<Segment>,
    pub symbols: Vec<Symbol>,
    pub dynamic_symbols: Vec<Symbol>,
    pub relocations: Vec<RelocationSection>,
}

impl ContainerImage {
    pub fn new(word_size: WordSize) -> Self {
        let arch = match word_size {
            WordSize::Bits32 => "x86",
            WordSize::Bits64 => "x86_64",
        };
        Self {
            word_size,
            arch: arch.to_string(),
            entry: 0,
            segments: Vec::new(),
            symbols: Vec::new(),
            dynamic_symbols: Vec::new(),
            relocations: Vec::new(),
        }
    }

    pub fn with_segment(mut self, vaddr: u64, memsz: u64, data: impl Into<Vec<u8>>) -> Self {
        let name = format!("LOAD[{}]", self.segments.len());
        self.segments.push(Segment { name, vaddr, memsz, data: data.into() });
        self
    }

    pub fn with_symbol(mut self, name: &str, value: u64, size: u64) -> Self {
        self.symbols.push(Symbol::new(name, value, size));
        self
    }

    pub fn with_dynamic_symbol(mut self, name: &str, value: u64, size: u64) -> Self {
        let mut sym = Symbol::new(name, value, size);
        sym.dynamic = true;
        self.dynamic_symbols.push(sym);
        self
    }

    pub fn with_relocations(mut self, section: RelocationSection) -> Self {
        self.relocations.push(section);
        self
    }
}
