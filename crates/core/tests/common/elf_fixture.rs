#![allow(dead_code)]

//! Minimal x86_64 ELF executable writer for tests.
//!
//! Layout: ELF header, program headers, `.text` at file offset 0x100 mapped by
//! a PT_LOAD from offset 0 at `LOAD_ADDR`, then `.symtab` and `.strtab`.
//! With imports, `.dynsym`, `.dynstr`, `.rela.plt` and `.dynamic` follow in a
//! second PT_LOAD at `DYN_BASE + offset`, plus a PT_DYNAMIC and an unmapped
//! `.plt` at `PLT_ADDR`. `.shstrtab` and the section header table come last.

use std::path::{Path, PathBuf};

pub const LOAD_ADDR: u64 = 0x400000;
const TEXT_OFFSET: u64 = 0x100;
pub const TEXT_ADDR: u64 = LOAD_ADDR + TEXT_OFFSET;
pub const PLT_ADDR: u64 = 0x401000;
pub const PLT_ENTRY_SIZE: u64 = 16;
const DYN_BASE: u64 = 0x600000;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const R_X86_64_JUMP_SLOT: u64 = 7;

#[derive(Debug, Default, Clone)]
pub struct ElfFixture {
    text: Vec<u8>,
    symbols: Vec<(String, u64, u64)>,
    imports: Vec<String>,
    entry: Option<u64>,
}

impl ElfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the next appended code will land at.
    pub fn next_addr(&self) -> u64 {
        TEXT_ADDR + self.text.len() as u64
    }

    /// Append `code` with a global function symbol covering it.
    pub fn function(mut self, name: &str, code: &[u8]) -> Self {
        let addr = self.next_addr();
        self.symbols.push((name.to_string(), addr, code.len() as u64));
        self.text.extend_from_slice(code);
        self
    }

    /// Append a symbol of explicit size (possibly 0) followed by `code`.
    pub fn sized_function(mut self, name: &str, size: u64, code: &[u8]) -> Self {
        let addr = self.next_addr();
        self.symbols.push((name.to_string(), addr, size));
        self.text.extend_from_slice(code);
        self
    }

    /// Append code no symbol covers.
    pub fn raw(mut self, code: &[u8]) -> Self {
        self.text.extend_from_slice(code);
        self
    }

    /// Import `name` through a PLT slot and a jump-slot relocation.
    pub fn import(mut self, name: &str) -> Self {
        self.imports.push(name.to_string());
        self
    }

    /// PLT stub address of an import; slot 0 is the resolver.
    pub fn plt_slot(&self, name: &str) -> u64 {
        let idx = self.imports.iter().position(|i| i == name).expect("unknown import");
        PLT_ADDR + PLT_ENTRY_SIZE * (idx as u64 + 1)
    }

    pub fn entry(mut self, addr: u64) -> Self {
        self.entry = Some(addr);
        self
    }

    pub fn text_end(&self) -> u64 {
        self.next_addr()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let text_end = TEXT_OFFSET + self.text.len() as u64;
        let dynamic = !self.imports.is_empty();

        let mut strtab = vec![0u8];
        let mut symtab = vec![0u8; 24];
        for (name, value, size) in &self.symbols {
            let name_off = add_string(&mut strtab, name);
            push_sym(&mut symtab, name_off, 1, *value, *size);
        }

        let (mut dynstr, mut dynsym) =
            if dynamic { (vec![0u8], vec![0u8; 24]) } else { (Vec::new(), Vec::new()) };
        let mut rela = Vec::new();
        for (idx, name) in self.imports.iter().enumerate() {
            let name_off = add_string(&mut dynstr, name);
            push_sym(&mut dynsym, name_off, 0, 0, 0);
            let got_slot = DYN_BASE + 0x1000 + 8 * (idx as u64 + 3);
            rela.extend_from_slice(&got_slot.to_le_bytes());
            rela.extend_from_slice(&(((idx as u64 + 1) << 32) | R_X86_64_JUMP_SLOT).to_le_bytes());
            rela.extend_from_slice(&0i64.to_le_bytes());
        }

        let symtab_off = align(text_end, 8);
        let strtab_off = symtab_off + symtab.len() as u64;
        let dynsym_off = align(strtab_off + strtab.len() as u64, 8);
        let dynstr_off = dynsym_off + dynsym.len() as u64;
        let rela_off = align(dynstr_off + dynstr.len() as u64, 8);
        let dynamic_off = rela_off + rela.len() as u64;

        let vaddr = |offset: u64| DYN_BASE + offset;
        let mut dyn_entries = Vec::new();
        for (tag, value) in [
            (5u64, vaddr(dynstr_off)),        // DT_STRTAB
            (6, vaddr(dynsym_off)),           // DT_SYMTAB
            (10, dynstr.len() as u64),        // DT_STRSZ
            (11, 24),                         // DT_SYMENT
            (23, vaddr(rela_off)),            // DT_JMPREL
            (2, rela.len() as u64),           // DT_PLTRELSZ
            (20, 7),                          // DT_PLTREL = DT_RELA
            (0, 0),                           // DT_NULL
        ] {
            dyn_entries.extend_from_slice(&tag.to_le_bytes());
            dyn_entries.extend_from_slice(&value.to_le_bytes());
        }
        if !dynamic {
            dyn_entries.clear();
        }

        let plt_off = align(dynamic_off + dyn_entries.len() as u64, 16);
        let plt_len = if dynamic { PLT_ENTRY_SIZE * (self.imports.len() as u64 + 1) } else { 0 };

        let mut shstrtab = vec![0u8];
        let names = [
            ".text", ".symtab", ".strtab", ".shstrtab", ".dynsym", ".dynstr", ".rela.plt", ".plt",
            ".dynamic",
        ]
        .map(|name| add_string(&mut shstrtab, name));
        let shstrtab_off = plt_off + plt_len;
        let shoff = align(shstrtab_off + shstrtab.len() as u64, 8);

        let mut phdrs = vec![ProgramHeader {
            kind: PT_LOAD,
            flags: 5, // R | X
            offset: 0,
            vaddr: LOAD_ADDR,
            size: text_end,
            align: 0x1000,
        }];
        if dynamic {
            phdrs.push(ProgramHeader {
                kind: PT_LOAD,
                flags: 6, // R | W
                offset: dynsym_off,
                vaddr: vaddr(dynsym_off),
                size: dynamic_off + dyn_entries.len() as u64 - dynsym_off,
                align: 8,
            });
            phdrs.push(ProgramHeader {
                kind: PT_DYNAMIC,
                flags: 6,
                offset: dynamic_off,
                vaddr: vaddr(dynamic_off),
                size: dyn_entries.len() as u64,
                align: 8,
            });
        }

        let mut sections = vec![
            SectionHeader::default(),
            SectionHeader {
                name: names[0],
                kind: 1, // SHT_PROGBITS
                flags: 6, // ALLOC | EXECINSTR
                addr: TEXT_ADDR,
                offset: TEXT_OFFSET,
                size: self.text.len() as u64,
                align: 16,
                ..SectionHeader::default()
            },
            SectionHeader {
                name: names[1],
                kind: 2, // SHT_SYMTAB
                offset: symtab_off,
                size: symtab.len() as u64,
                link: 3,
                info: 1,
                align: 8,
                entsize: 24,
                ..SectionHeader::default()
            },
            SectionHeader {
                name: names[2],
                kind: 3, // SHT_STRTAB
                offset: strtab_off,
                size: strtab.len() as u64,
                align: 1,
                ..SectionHeader::default()
            },
            SectionHeader {
                name: names[3],
                kind: 3,
                offset: shstrtab_off,
                size: shstrtab.len() as u64,
                align: 1,
                ..SectionHeader::default()
            },
        ];
        if dynamic {
            sections.extend([
                SectionHeader {
                    name: names[4],
                    kind: 11, // SHT_DYNSYM
                    flags: 2,
                    addr: vaddr(dynsym_off),
                    offset: dynsym_off,
                    size: dynsym.len() as u64,
                    link: 6,
                    info: 1,
                    align: 8,
                    entsize: 24,
                },
                SectionHeader {
                    name: names[5],
                    kind: 3,
                    flags: 2,
                    addr: vaddr(dynstr_off),
                    offset: dynstr_off,
                    size: dynstr.len() as u64,
                    align: 1,
                    ..SectionHeader::default()
                },
                SectionHeader {
                    name: names[6],
                    kind: 4, // SHT_RELA
                    flags: 0x42, // ALLOC | INFO_LINK
                    addr: vaddr(rela_off),
                    offset: rela_off,
                    size: rela.len() as u64,
                    link: 5,
                    info: 8,
                    align: 8,
                    entsize: 24,
                },
                SectionHeader {
                    name: names[7],
                    kind: 1,
                    flags: 6,
                    addr: PLT_ADDR,
                    offset: plt_off,
                    size: plt_len,
                    align: 16,
                    entsize: PLT_ENTRY_SIZE,
                    ..SectionHeader::default()
                },
                SectionHeader {
                    name: names[8],
                    kind: 6, // SHT_DYNAMIC
                    flags: 3,
                    addr: vaddr(dynamic_off),
                    offset: dynamic_off,
                    size: dyn_entries.len() as u64,
                    link: 6,
                    align: 8,
                    entsize: 16,
                    ..SectionHeader::default()
                },
            ]);
        }

        let mut out = Vec::new();
        // ELF header
        out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&62u16.to_le_bytes()); // EM_X86_64
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&self.entry.unwrap_or(TEXT_ADDR).to_le_bytes());
        out.extend_from_slice(&64u64.to_le_bytes()); // e_phoff
        out.extend_from_slice(&shoff.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&64u16.to_le_bytes());
        out.extend_from_slice(&56u16.to_le_bytes());
        out.extend_from_slice(&(phdrs.len() as u16).to_le_bytes());
        out.extend_from_slice(&64u16.to_le_bytes());
        out.extend_from_slice(&(sections.len() as u16).to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes()); // e_shstrndx

        for phdr in &phdrs {
            phdr.write(&mut out);
        }

        out.resize(TEXT_OFFSET as usize, 0);
        out.extend_from_slice(&self.text);
        out.resize(symtab_off as usize, 0);
        out.extend_from_slice(&symtab);
        out.extend_from_slice(&strtab);
        out.resize(dynsym_off as usize, 0);
        out.extend_from_slice(&dynsym);
        out.extend_from_slice(&dynstr);
        out.resize(rela_off as usize, 0);
        out.extend_from_slice(&rela);
        out.extend_from_slice(&dyn_entries);
        out.resize(plt_off as usize, 0);
        out.resize((plt_off + plt_len) as usize, 0xCC);
        out.extend_from_slice(&shstrtab);
        out.resize(shoff as usize, 0);

        for section in &sections {
            section.write(&mut out);
        }
        out
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.bytes()).expect("write ELF fixture");
        path
    }
}

#[derive(Debug, Clone, Copy)]
struct ProgramHeader {
    kind: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    size: u64,
    align: u64,
}

impl ProgramHeader {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.vaddr.to_le_bytes());
        out.extend_from_slice(&self.vaddr.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.align.to_le_bytes());
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SectionHeader {
    name: u32,
    kind: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    align: u64,
    entsize: u64,
}

impl SectionHeader {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name.to_le_bytes());
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.addr.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.link.to_le_bytes());
        out.extend_from_slice(&self.info.to_le_bytes());
        out.extend_from_slice(&self.align.to_le_bytes());
        out.extend_from_slice(&self.entsize.to_le_bytes());
    }
}

fn add_string(table: &mut Vec<u8>, name: &str) -> u32 {
    let offset = table.len() as u32;
    table.extend_from_slice(name.as_bytes());
    table.push(0);
    offset
}

fn push_sym(table: &mut Vec<u8>, name: u32, shndx: u16, value: u64, size: u64) {
    table.extend_from_slice(&name.to_le_bytes());
    table.push(0x12); // STB_GLOBAL | STT_FUNC
    table.push(0);
    table.extend_from_slice(&shndx.to_le_bytes());
    table.extend_from_slice(&value.to_le_bytes());
    table.extend_from_slice(&size.to_le_bytes());
}

fn align(value: u64, to: u64) -> u64 {
    value.div_ceil(to) * to
}

/// `call rel32` from `from` to `to`.
pub fn call(from: u64, to: u64) -> [u8; 5] {
    let rel = (to as i64 - (from as i64 + 5)) as i32;
    let mut out = [0xE8, 0, 0, 0, 0];
    out[1..].copy_from_slice(&rel.to_le_bytes());
    out
}

/// foo: `call bar; ret`, bar: `ret`.
pub fn foo_bar() -> ElfFixture {
    let foo = TEXT_ADDR;
    let bar = foo + 6;
    let mut code = call(foo, bar).to_vec();
    code.push(0xC3);
    ElfFixture::new().function("foo", &code).function("bar", &[0xC3])
}
