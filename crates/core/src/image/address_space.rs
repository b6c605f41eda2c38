use serde::Serialize;

use crate::services::analysis::AnalysisError;

/// Largest region `map` will allocate.
pub const MAX_REGION_SIZE: u64 = 1 << 32;

/// Bytes of one loaded segment, mapped at `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub name: String,
    pub start: u64,
    pub end: u64,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl MemoryRegion {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start < end && start < self.end
    }
}

/// Virtual address model of the executable: disjoint regions, sorted by start.
#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    regions: Vec<MemoryRegion>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self { regions: Vec::new() }
    }

    /// Map a zero-filled region of `size` bytes at `start` and copy `bytes`
    /// into it. Bytes beyond `size` are ignored.
    pub fn map(
        &mut self,
        name: &str,
        start: u64,
        size: u64,
        bytes: &[u8],
    ) -> Result<&MemoryRegion, AnalysisError> {
        let end = start.checked_add(size).ok_or_else(|| AnalysisError::OverlappingRegion {
            name: name.to_string(),
            start,
            end: u64::MAX,
            existing: "<address space end>".into(),
        })?;
        if let Some(existing) = self.regions.iter().find(|r| r.overlaps(start, end)) {
            return Err(AnalysisError::OverlappingRegion {
                name: name.to_string(),
                start,
                end,
                existing: format!("{} {:#x}-{:#x}", existing.name, existing.start, existing.end),
            });
        }

        let too_large = || {
            AnalysisError::Container(format!(
                "region {name} at {start:#x} is too large to map ({size:#x} bytes)"
            ))
        };
        let len = usize::try_from(size)
            .ok()
            .filter(|_| size <= MAX_REGION_SIZE)
            .ok_or_else(too_large)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| too_large())?;
        data.resize(len, 0);
        let copied = bytes.len().min(data.len());
        data[..copied].copy_from_slice(&bytes[..copied]);

        let idx = self.regions.partition_point(|r| r.start < start);
        self.regions.insert(idx, MemoryRegion { name: name.to_string(), start, end, data });
        Ok(&self.regions[idx])
    }

    /// Read up to `size` bytes at `addr`.
    ///
    /// Returns `None` when `addr` is not mapped. Otherwise the result holds the
    /// contiguous mapped run starting at `addr`, which is shorter than `size`
    /// only if the request runs into unmapped memory.
    pub fn read(&self, addr: u64, size: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(size);
        let mut cursor = addr;
        for region in &self.regions {
            if out.len() == size {
                break;
            }
            if region.end <= cursor {
                continue;
            }
            if !region.contains(cursor) {
                break;
            }
            let offset = (cursor - region.start) as usize;
            let take = (size - out.len()).min(region.data.len() - offset);
            out.extend_from_slice(&region.data[offset..offset + take]);
            cursor += take as u64;
        }

        if out.is_empty() && size > 0 {
            None
        } else {
            Some(out)
        }
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.regions.iter().any(|r| r.contains(addr))
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// End of the highest mapped region.
    pub fn last_end(&self) -> Option<u64> {
        self.regions.last().map(|r| r.end)
    }
}
