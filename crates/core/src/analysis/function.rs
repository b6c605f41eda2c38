use tracing::{debug, warn};

use crate::analysis::sweep::sweep;
use crate::backends::{InstructionDecoder, MAX_INSTRUCTION_LEN};
use crate::image::symbols::is_symbolic;
use crate::image::LoadedImage;
use crate::model::{BasicBlock, CalleeRef, Function, Instruction};
use crate::services::analysis::AnalysisError;

/// Extent given to callees whose target no symbol covers.
pub const PLACEHOLDER_CALLEE_SIZE: u64 = 32;

/// Materialises [`Function`]s from locators or callee descriptors.
pub struct FunctionBuilder<'a> {
    image: &'a LoadedImage,
    decoder: &'a dyn InstructionDecoder,
    window: usize,
    placeholder_size: u64,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(image: &'a LoadedImage, decoder: &'a dyn InstructionDecoder) -> Self {
        Self {
            image,
            decoder,
            window: MAX_INSTRUCTION_LEN,
            placeholder_size: PLACEHOLDER_CALLEE_SIZE,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn with_placeholder_size(mut self, size: u64) -> Self {
        self.placeholder_size = size.max(1);
        self
    }

    /// Build a function from a start locator (symbol name or numeric address)
    /// and an optional end locator.
    ///
    /// Without an explicit end, the extent comes from the start symbol's size,
    /// then the next static symbol above `start`, then the end of the highest
    /// mapped region.
    pub fn build(
        &self,
        name: Option<&str>,
        start_locator: &str,
        end_locator: Option<&str>,
    ) -> Result<Function, AnalysisError> {
        let symbols = &self.image.symbols;
        let (start, start_index) = symbols.lookup_by_name(start_locator)?;

        let end = match end_locator.filter(|e| !e.trim().is_empty()) {
            Some(locator) => symbols.lookup_by_name(locator)?.0,
            None => {
                let sized = start_index
                    .and_then(|idx| symbols.static_at(idx))
                    .filter(|sym| sym.size != 0)
                    .map(|sym| sym.value.saturating_add(sym.size));
                match sized {
                    Some(end) => end,
                    None => match symbols.nearest_above(start) {
                        Some(next) => next.value,
                        None => self.image.memory.last_end().unwrap_or(start),
                    },
                }
            }
        };

        let name = match name {
            Some(name) => name.to_string(),
            None if is_symbolic(start_locator) => start_locator.trim().to_string(),
            None => self.enclosing_name(start).unwrap_or_else(|| format!("func_{start:x}")),
        };

        let dynamic = symbols.lookup_by_address(start).is_some_and(|s| s.dynamic);
        Ok(self.materialize(name, start, end, dynamic))
    }

    /// Build the function a call site refers to.
    pub fn build_callee(&self, callee: &CalleeRef) -> Function {
        let dynamic = callee.dynamic
            || self.image.symbols.lookup_by_address(callee.start).is_some_and(|s| s.dynamic);
        self.materialize(callee.name.clone(), callee.start, callee.end, dynamic)
    }

    fn enclosing_name(&self, addr: u64) -> Option<String> {
        let symbols = &self.image.symbols;
        symbols
            .lookup_by_address(addr)
            .or_else(|| symbols.nearest_below(addr).filter(|s| s.value == addr))
            .map(|s| s.name.clone())
    }

    fn materialize(&self, name: String, start: u64, end: u64, dynamic: bool) -> Function {
        if dynamic {
            debug!(%name, start, "dynamic function, not decoded");
            return Function::dynamic_leaf(name, start, end);
        }
        if start < end && !self.image.memory.contains(start) {
            warn!(%name, start, "function starts outside mapped memory");
        }

        let instructions = sweep(&self.image.memory, self.decoder, start, end, self.window);
        let decoded: &[Instruction] = match instructions.last() {
            Some(last) if last.error.is_some() => &instructions[..instructions.len() - 1],
            _ => &instructions[..],
        };
        let blocks = basic_blocks(decoded);
        let labels = labels(decoded, start, end);
        let callees = self.callees(decoded);
        debug!(
            %name,
            start,
            end,
            instructions = instructions.len(),
            blocks = blocks.len(),
            callees = callees.len(),
            "built function"
        );

        Function { name, start, end, dynamic, instructions, blocks, callees, labels }
    }

    fn callees(&self, insts: &[Instruction]) -> Vec<CalleeRef> {
        insts
            .iter()
            .filter(|inst| inst.is_call())
            .filter_map(Instruction::relative_target)
            .map(|target| match self.image.symbols.lookup_by_address(target) {
                Some(sym) => CalleeRef {
                    name: sym.name.clone(),
                    start: sym.value,
                    end: sym.value.saturating_add(sym.size),
                    dynamic: sym.dynamic,
                },
                None => CalleeRef {
                    name: placeholder_name(target),
                    start: target,
                    end: target.saturating_add(self.placeholder_size),
                    dynamic: false,
                },
            })
            .collect()
    }
}

/// Name given to a call target no symbol covers.
pub fn placeholder_name(target: u64) -> String {
    format!("func{target:x}")
}

/// Split the stream at branches. Instructions after the last branch do not
/// form a block of their own.
pub fn basic_blocks(insts: &[Instruction]) -> Vec<BasicBlock> {
    let mut blocks = Vec::new();
    let mut first = 0;
    for (idx, inst) in insts.iter().enumerate() {
        if inst.is_branch() {
            blocks.push(BasicBlock { first, last: idx });
            first = idx + 1;
        }
    }
    blocks
}

/// Direct branch and call targets inside `[start, end)`, ascending and unique.
pub fn labels(insts: &[Instruction], start: u64, end: u64) -> Vec<u64> {
    let mut labels: Vec<u64> = insts
        .iter()
        .filter_map(Instruction::relative_target)
        .filter(|target| start <= *target && *target < end)
        .collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}
