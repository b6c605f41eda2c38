use std::fs;
use std::io;
use std::path::Path;

use goblin::elf::{self, program_header::PT_LOAD, reloc, section_header, sym, Elf};
use goblin::Object;
use tracing::debug;

use crate::image::container::{
    ContainerImage, RelocationEntry, RelocationKind, RelocationSection, Segment, WordSize,
};
use crate::model::Symbol;
use crate::services::analysis::AnalysisError;

/// Read an ELF executable from disk into a [`ContainerImage`].
pub fn load_path(path: &Path) -> Result<ContainerImage, AnalysisError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => AnalysisError::MissingBinary(path.to_path_buf()),
        _ => AnalysisError::Io { path: path.to_path_buf(), source },
    })?;
    parse(&bytes)
}

pub fn parse(bytes: &[u8]) -> Result<ContainerImage, AnalysisError> {
    let elf = match Object::parse(bytes) {
        Ok(Object::Elf(elf)) => elf,
        Ok(_) => return Err(AnalysisError::Container("not an ELF executable".into())),
        Err(e) => return Err(AnalysisError::Container(e.to_string())),
    };

    let word_size = if elf.is_64 { WordSize::Bits64 } else { WordSize::Bits32 };
    let arch = match elf.header.e_machine {
        elf::header::EM_X86_64 => "x86_64",
        elf::header::EM_386 => "x86",
        elf::header::EM_AARCH64 => "arm64",
        elf::header::EM_ARM => "arm",
        _ => "unknown",
    };

    let mut image = ContainerImage::new(word_size);
    image.arch = arch.to_string();
    image.entry = elf.entry;
    image.segments = load_segments(&elf, bytes)?;
    image.symbols = static_symbols(&elf);
    image.dynamic_symbols = dynamic_symbols(&elf);
    image.relocations = relocation_sections(&elf);
    debug!(
        arch,
        segments = image.segments.len(),
        symbols = image.symbols.len(),
        dynamic_symbols = image.dynamic_symbols.len(),
        "parsed ELF container"
    );
    Ok(image)
}

fn load_segments(elf: &Elf, bytes: &[u8]) -> Result<Vec<Segment>, AnalysisError> {
    let mut segments = Vec::new();
    for (idx, ph) in elf.program_headers.iter().enumerate() {
        if ph.p_type != PT_LOAD {
            continue;
        }
        let start = ph.p_offset as usize;
        let end = start.checked_add(ph.p_filesz as usize).filter(|end| *end <= bytes.len());
        let Some(end) = end else {
            return Err(AnalysisError::Container(format!(
                "failed to load segment {idx}: file range {:#x}+{:#x} exceeds file size",
                ph.p_offset, ph.p_filesz
            )));
        };
        segments.push(Segment {
            name: format!("LOAD[{idx}]"),
            vaddr: ph.p_vaddr,
            memsz: ph.p_memsz,
            data: bytes[start..end].to_vec(),
        });
    }
    Ok(segments)
}

fn keep_symbol(sym: &sym::Sym) -> bool {
    !matches!(sym.st_type(), sym::STT_FILE | sym::STT_SECTION)
}

fn static_symbols(elf: &Elf) -> Vec<Symbol> {
    elf.syms
        .iter()
        .filter(keep_symbol)
        .filter_map(|s| {
            let name = elf.strtab.get_at(s.st_name).unwrap_or("");
            if name.is_empty() {
                None
            } else {
                Some(Symbol::new(name, s.st_value, s.st_size))
            }
        })
        .collect()
}

/// Dynamic symbols keep their table positions (including the null entry) so
/// relocation symbol indices can address them directly.
fn dynamic_symbols(elf: &Elf) -> Vec<Symbol> {
    elf.dynsyms
        .iter()
        .map(|s| {
            let name = elf.dynstrtab.get_at(s.st_name).unwrap_or("");
            let mut symbol = Symbol::new(name, s.st_value, s.st_size);
            symbol.dynamic = true;
            symbol
        })
        .collect()
}

fn is_jump_slot(machine: u16, r_type: u32) -> bool {
    match machine {
        elf::header::EM_X86_64 => r_type == reloc::R_X86_64_JUMP_SLOT,
        elf::header::EM_386 => r_type == reloc::R_386_JMP_SLOT,
        _ => false,
    }
}

fn section_name<'a>(elf: &'a Elf, idx: usize) -> &'a str {
    elf.section_headers
        .get(idx)
        .and_then(|sh| elf.shdr_strtab.get_at(sh.sh_name))
        .unwrap_or("")
}

fn relocation_sections(elf: &Elf) -> Vec<RelocationSection> {
    let machine = elf.header.e_machine;
    elf.shdr_relocs
        .iter()
        .filter(|(idx, _)| {
            elf.section_headers.get(*idx).is_some_and(|sh| {
                sh.sh_type == section_header::SHT_RELA || sh.sh_type == section_header::SHT_REL
            })
        })
        .map(|(idx, relocs)| {
            let name = section_name(elf, *idx).to_string();
            // `.rela.plt` patches `.plt`, `.rel.plt` likewise.
            let target_name =
                name.strip_prefix(".rela").or_else(|| name.strip_prefix(".rel")).unwrap_or("");
            let target = elf
                .section_headers
                .iter()
                .enumerate()
                .find(|(i, _)| !target_name.is_empty() && section_name(elf, *i) == target_name)
                .map(|(_, sh)| sh);
            let entries = relocs
                .iter()
                .map(|r| RelocationEntry {
                    symbol_index: r.r_sym,
                    kind: if is_jump_slot(machine, r.r_type) {
                        RelocationKind::JumpSlot
                    } else {
                        RelocationKind::Other
                    },
                })
                .collect();
            RelocationSection {
                target_addr: target.map(|sh| sh.sh_addr),
                entry_size: target.map(|sh| sh.sh_entsize).unwrap_or(0),
                name,
                entries,
            }
        })
        .collect()
}
