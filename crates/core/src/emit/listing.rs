use std::io::{self, Write};

use crate::analysis::function::placeholder_name;
use crate::demangle::display_name;
use crate::image::SymbolIndex;
use crate::model::{CallGraph, Function, Instruction, InstructionKind};

const TEXT_WIDTH: usize = 64;

/// Render the call graph as an assembly-style listing.
pub fn render_listing(graph: &CallGraph, symbols: &SymbolIndex) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_listing(&mut out, graph, symbols);
    String::from_utf8_lossy(&out).into_owned()
}

pub fn write_listing<W: Write>(
    out: &mut W,
    graph: &CallGraph,
    symbols: &SymbolIndex,
) -> io::Result<()> {
    let functions = graph.ordered();
    for func in functions.iter().filter(|f| !f.dynamic) {
        writeln!(out, ".globl {}", func.name)?;
    }
    writeln!(out)?;

    for func in &functions {
        write_function(out, func, symbols)?;
    }
    Ok(())
}

fn write_function<W: Write>(out: &mut W, func: &Function, symbols: &SymbolIndex) -> io::Result<()> {
    writeln!(out, "# {} {:#x}:{:#x}", display_name(&func.name), func.start, func.end)?;
    if func.dynamic {
        writeln!(out, "# dynamic function")?;
    }
    writeln!(out, "{}:", func.name)?;
    if func.dynamic {
        writeln!(out, "\t{:<w$} # {:#x}", "ret", func.start, w = TEXT_WIDTH)?;
        writeln!(out)?;
        return Ok(());
    }

    let mut pending = func.labels.iter().peekable();
    for inst in &func.instructions {
        while let Some(label) = pending.next_if(|label| **label <= inst.start) {
            writeln!(out, "label_{label:x}:")?;
        }
        writeln!(out, "\t{}", instruction_line(inst, &func.labels, symbols))?;
    }
    writeln!(out)
}

/// One listing line: rendered text, address and encoding.
pub fn instruction_line(inst: &Instruction, labels: &[u64], symbols: &SymbolIndex) -> String {
    let text = instruction_text(inst, labels, symbols);
    let mut line = format!("{text:<w$} # {:#x}", inst.start, w = TEXT_WIDTH);
    if !inst.bytes.is_empty() {
        let hex: Vec<String> = inst.bytes.iter().map(|b| format!("{b:02x}")).collect();
        line.push(' ');
        line.push_str(&hex.join(" "));
    }
    line
}

/// Symbolic rendering of an instruction.
///
/// Direct calls name their callee; direct branches name a local label or a
/// symbol. Everything else keeps the decoder's text.
pub fn instruction_text(inst: &Instruction, labels: &[u64], symbols: &SymbolIndex) -> String {
    if let Some(err) = &inst.error {
        return format!("# {err}");
    }
    let Some(target) = inst.relative_target() else {
        return inst.text();
    };
    match inst.kind {
        InstructionKind::Call => match symbols.lookup_by_address(target) {
            Some(sym) => format!("{} {}", inst.mnemonic, sym.name),
            None => format!("{} {}", inst.mnemonic, placeholder_name(target)),
        },
        InstructionKind::Branch { .. } => {
            if labels.binary_search(&target).is_ok() {
                format!("{} label_{target:x}", inst.mnemonic)
            } else if let Some(sym) = symbols.lookup_by_address(target) {
                format!("{} {}", inst.mnemonic, sym.name)
            } else {
                inst.text()
            }
        }
        _ => inst.text(),
    }
}
