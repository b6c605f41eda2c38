//! Loaded-image model: container records, the address space built from its
//! loadable segments, and the merged symbol index.

pub mod address_space;
pub mod container;
#[cfg(feature = "capstone-backend")]
pub mod elf;
pub mod symbols;

pub use address_space::{AddressSpace, MemoryRegion};
pub use container::{
    ContainerImage, RelocationEntry, RelocationKind, RelocationSection, Segment, WordSize,
};
pub use symbols::SymbolIndex;

use crate::services::analysis::AnalysisError;

/// Address space and symbol index of one executable, built once and then
/// read-only.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub word_size: WordSize,
    pub arch: String,
    pub entry: u64,
    pub memory: AddressSpace,
    pub symbols: SymbolIndex,
}

impl LoadedImage {
    pub fn from_container(image: &ContainerImage) -> Result<Self, AnalysisError> {
        let mut memory = AddressSpace::new();
        for segment in &image.segments {
            memory.map(&segment.name, segment.vaddr, segment.memsz, &segment.data)?;
        }
        if memory.is_empty() {
            return Err(AnalysisError::NoLoadableSegments);
        }

        Ok(Self {
            word_size: image.word_size,
            arch: image.arch.clone(),
            entry: image.entry,
            memory,
            symbols: SymbolIndex::build(image),
        })
    }
}
