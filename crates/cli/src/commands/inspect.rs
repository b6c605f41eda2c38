use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use callsweep_core::demangle::display_name;
use callsweep_core::image::LoadedImage;
use callsweep_core::services::analysis::{load_image, AnalysisOptions};
use serde_json::json;

fn load(path: &Path) -> Result<LoadedImage> {
    load_image(path, &AnalysisOptions::default())
        .with_context(|| format!("Failed to load {}", path.display()))
}

/// Dump static symbols (address order) and dynamic symbols (with PLT
/// addresses filled in).
pub fn symbols_command(path: &Path, json: bool) -> Result<String> {
    let image = load(path)?;
    let statics = image.symbols.statics();
    // Index 0 of the dynamic table is the null symbol.
    let dynamics: Vec<_> = image.symbols.dynamics().iter().filter(|s| !s.name.is_empty()).collect();

    if json {
        let payload = json!({ "static": statics, "dynamic": dynamics });
        let mut out = serde_json::to_string_pretty(&payload)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(out, "Static symbols ({}):", statics.len())?;
    for sym in statics {
        writeln!(out, "  {:#018x} {:>8} {}", sym.value, sym.size, display_name(&sym.name))?;
    }
    writeln!(out, "Dynamic symbols ({}):", dynamics.len())?;
    for sym in dynamics {
        writeln!(out, "  {:#018x} {:>8} {}", sym.value, sym.size, display_name(&sym.name))?;
    }
    Ok(out)
}

/// Dump the mapped regions of the address space.
pub fn regions_command(path: &Path, json: bool) -> Result<String> {
    let image = load(path)?;
    let regions = image.memory.regions();

    if json {
        let mut out = serde_json::to_string_pretty(regions)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(out, "Regions ({}) [{}-bit {}]:", regions.len(), image.word_size.bits(), image.arch)?;
    for region in regions {
        writeln!(
            out,
            "  - {} {:#x}-{:#x} ({} bytes)",
            region.name,
            region.start,
            region.end,
            region.size()
        )?;
    }
    writeln!(out, "Entry: {:#x}", image.entry)?;
    Ok(out)
}
