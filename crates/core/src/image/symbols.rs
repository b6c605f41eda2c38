use tracing::{debug, warn};

use crate::image::container::{ContainerImage, RelocationKind};
use crate::model::Symbol;
use crate::services::analysis::AnalysisError;

/// Static and dynamic symbol tables, with PLT addresses recovered from
/// jump-slot relocations.
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    statics: Vec<Symbol>,
    dynamics: Vec<Symbol>,
}

impl SymbolIndex {
    pub fn build(image: &ContainerImage) -> Self {
        let mut statics: Vec<Symbol> = image
            .symbols
            .iter()
            .cloned()
            .map(|mut s| {
                s.dynamic = false;
                s
            })
            .collect();
        statics.sort_by_key(|s| s.value);

        let mut dynamics: Vec<Symbol> = image
            .dynamic_symbols
            .iter()
            .cloned()
            .map(|mut s| {
                s.dynamic = true;
                s
            })
            .collect();

        for section in &image.relocations {
            let Some(base) = section.target_addr else {
                debug!(section = %section.name, "relocation section has no target section");
                continue;
            };
            // Slot 0 of a PLT is the resolver stub; imports start at slot 1.
            for (ordinal, entry) in section.entries.iter().enumerate() {
                if entry.kind != RelocationKind::JumpSlot {
                    continue;
                }
                let Some(sym) = dynamics.get_mut(entry.symbol_index) else {
                    warn!(
                        section = %section.name,
                        index = entry.symbol_index,
                        "jump slot references missing dynamic symbol"
                    );
                    continue;
                };
                sym.value = section
                    .entry_size
                    .saturating_mul(ordinal as u64 + 1)
                    .saturating_add(base);
                sym.size = section.entry_size;
                debug!(name = %sym.name, value = sym.value, "patched dynamic symbol");
            }
        }

        Self { statics, dynamics }
    }

    pub fn statics(&self) -> &[Symbol] {
        &self.statics
    }

    pub fn dynamics(&self) -> &[Symbol] {
        &self.dynamics
    }

    /// Resolve a locator to an address.
    ///
    /// Numeric literals stand for themselves and carry no static index.
    pub fn lookup_by_name(&self, locator: &str) -> Result<(u64, Option<usize>), AnalysisError> {
        if let Some(value) = parse_numeric(locator) {
            return Ok((value, None));
        }
        self.statics
            .iter()
            .position(|s| s.name == locator)
            .map(|idx| (self.statics[idx].value, Some(idx)))
            .ok_or_else(|| AnalysisError::UnknownSymbol(locator.to_string()))
    }

    /// First symbol covering `addr`; static symbols win over dynamic ones.
    pub fn lookup_by_address(&self, addr: u64) -> Option<&Symbol> {
        self.statics.iter().chain(self.dynamics.iter()).find(|s| s.covers(addr))
    }

    /// Lowest static symbol strictly above `addr`.
    pub fn nearest_above(&self, addr: u64) -> Option<&Symbol> {
        let idx = self.statics.partition_point(|s| s.value <= addr);
        self.statics.get(idx)
    }

    /// Highest static symbol at or below `addr`.
    pub fn nearest_below(&self, addr: u64) -> Option<&Symbol> {
        let idx = self.statics.partition_point(|s| s.value <= addr);
        idx.checked_sub(1).map(|i| &self.statics[i])
    }

    pub fn static_at(&self, idx: usize) -> Option<&Symbol> {
        self.statics.get(idx)
    }
}

/// Parse an unsigned literal the way a C-like toolchain would: `0x` hex,
/// `0o` or leading-zero octal, `0b` binary, otherwise decimal.
pub fn parse_numeric(text: &str) -> Option<u64> {
    let text = text.trim();
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    let digits = digits.replace('_', "");
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    u64::from_str_radix(&digits, radix).ok()
}

/// True when a locator names a symbol rather than an address.
pub fn is_symbolic(locator: &str) -> bool {
    !locator.trim().is_empty() && parse_numeric(locator).is_none()
}
