//! Core data model (IR) for decoded functions and the call graph.
//!
//! Everything here is plain data: the analysis layer produces these values,
//! the emitters consume them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named address/extent pair from either symbol table.
///
/// `size == 0` means the extent is unknown; such a symbol never matches an
/// address lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub value: u64,
    pub size: u64,
    pub dynamic: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, value: u64, size: u64) -> Self {
        Self { name: name.into(), value, size, dynamic: false }
    }

    /// True when `addr` falls inside `[value, value + size)`.
    pub fn covers(&self, addr: u64) -> bool {
        self.value <= addr && addr < self.value.saturating_add(self.size)
    }
}

/// Decoded operand of a branch or call, modelled as a closed set of cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Register(String),
    /// Direct, pc-relative target already resolved to an absolute address.
    Relative(u64),
    Memory(String),
    Immediate(i64),
}

/// Control-flow class of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Call,
    Branch { conditional: bool },
    Return,
    Other,
}

/// One instruction of a linear sweep, or the fault that ended it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub mnemonic: String,
    pub op_str: String,
    pub kind: InstructionKind,
    /// First operand, when the decoder could classify it.
    pub operand: Option<Operand>,
    pub bytes: Vec<u8>,
    pub start: u64,
    pub end: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Instruction {
    /// Terminal instruction recording a decode fault at `address`.
    pub fn fault(address: u64, error: impl Into<String>) -> Self {
        Self {
            mnemonic: String::new(),
            op_str: String::new(),
            kind: InstructionKind::Other,
            operand: None,
            bytes: Vec::new(),
            start: address,
            end: address,
            error: Some(error.into()),
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, InstructionKind::Branch { .. })
    }

    pub fn is_call(&self) -> bool {
        self.kind == InstructionKind::Call
    }

    /// Absolute target of a direct branch or call.
    pub fn relative_target(&self) -> Option<u64> {
        if !(self.is_branch() || self.is_call()) {
            return None;
        }
        match self.operand {
            Some(Operand::Relative(target)) => Some(target),
            _ => None,
        }
    }

    /// Decoder's default textual form.
    pub fn text(&self) -> String {
        if self.op_str.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.op_str)
        }
    }
}

/// Inclusive range of instruction indices that ends at a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub first: usize,
    pub last: usize,
}

/// Minimal description of a callee, enough to materialise it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalleeRef {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub dynamic: bool,
}

/// A decoded function and everything derived from its instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub dynamic: bool,
    pub instructions: Vec<Instruction>,
    pub blocks: Vec<BasicBlock>,
    pub callees: Vec<CalleeRef>,
    /// Local branch targets, ascending and unique.
    pub labels: Vec<u64>,
}

impl Function {
    /// A leaf whose body lives elsewhere (PLT import); never decoded.
    pub fn dynamic_leaf(name: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            dynamic: true,
            instructions: Vec::new(),
            blocks: Vec::new(),
            callees: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Error text of the terminal decode fault, if the sweep hit one.
    pub fn decode_error(&self) -> Option<&str> {
        self.instructions.last().and_then(|inst| inst.error.as_deref())
    }
}

/// Functions reachable from a root, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraph {
    pub root: String,
    pub functions: BTreeMap<String, Function>,
}

impl CallGraph {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into(), functions: BTreeMap::new() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Emission order: local functions by name, then dynamic ones by name.
    pub fn ordered(&self) -> Vec<&Function> {
        let (mut local, mut dynamic): (Vec<&Function>, Vec<&Function>) =
            self.functions.values().partition(|f| !f.dynamic);
        local.sort_by(|a, b| a.name.cmp(&b.name));
        dynamic.sort_by(|a, b| a.name.cmp(&b.name));
        local.extend(dynamic);
        local
    }
}
