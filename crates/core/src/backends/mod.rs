//! Instruction decoder backends.
//!
//! The sweep only needs one operation from a decoder: turn a byte window into
//! a single instruction (with its length) or an error. Capstone provides the
//! default implementation.

#[cfg(feature = "capstone-backend")]
pub mod capstone;

#[cfg(feature = "capstone-backend")]
pub use self::capstone::CapstoneDecoder;

use thiserror::Error;

use crate::model::{InstructionKind, Operand};

/// Maximum encoded length of an instruction; the sweep's lookahead window.
pub const MAX_INSTRUCTION_LEN: usize = 16;

/// Decoder output for one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub mnemonic: String,
    pub op_str: String,
    pub kind: InstructionKind,
    pub operand: Option<Operand>,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid instruction at {0:#x}")]
    Invalid(u64),
    #[error("truncated instruction at {address:#x} ({available} bytes available)")]
    Truncated { address: u64, available: usize },
    #[error("decoder failure at {address:#x}: {message}")]
    Backend { address: u64, message: String },
}

/// Decodes one instruction from the start of `code`, which is mapped at
/// `address`.
pub trait InstructionDecoder {
    fn decode(&self, code: &[u8], address: u64) -> Result<DecodedInstruction, DecodeError>;
    fn name(&self) -> &'static str;
}
