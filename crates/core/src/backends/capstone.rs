use capstone::{arch, prelude::*, Capstone, InsnGroupId};

use crate::backends::{DecodeError, DecodedInstruction, InstructionDecoder};
use crate::image::WordSize;
use crate::model::{InstructionKind, Operand};
use crate::services::analysis::AnalysisError;

/// Capstone-backed decoder for 32- and 64-bit x86.
pub struct CapstoneDecoder {
    cs: Capstone,
}

fn capstone_version() -> String {
    let (major, minor) = Capstone::lib_version();
    format!("{major}.{minor}")
}

fn make_cs(arch: &str, word_size: WordSize) -> Result<Capstone, AnalysisError> {
    let mode = match word_size {
        WordSize::Bits64 => arch::x86::ArchMode::Mode64,
        WordSize::Bits32 => arch::x86::ArchMode::Mode32,
    };
    match arch {
        "x86_64" | "amd64" | "x86" | "i386" => Capstone::new()
            .x86()
            .mode(mode)
            .detail(true)
            .build()
            .map_err(|e| AnalysisError::Backend(format!("capstone init failed: {e}"))),
        other => Err(AnalysisError::UnsupportedArchitecture(other.to_string())),
    }
}

fn has_group(detail: &capstone::InsnDetail, group: u8) -> bool {
    detail.groups().iter().any(|g| *g == InsnGroupId(group))
}

impl CapstoneDecoder {
    pub fn new(arch: &str, word_size: WordSize) -> Result<Self, AnalysisError> {
        Ok(Self { cs: make_cs(arch, word_size)? })
    }

    pub fn version() -> String {
        capstone_version()
    }

    fn classify(&self, detail: &capstone::InsnDetail, mnemonic: &str) -> InstructionKind {
        if has_group(detail, capstone::InsnGroupType::CS_GRP_CALL as u8) {
            InstructionKind::Call
        } else if has_group(detail, capstone::InsnGroupType::CS_GRP_JUMP as u8) {
            let conditional = mnemonic != "jmp" && mnemonic != "ljmp";
            InstructionKind::Branch { conditional }
        } else if has_group(detail, capstone::InsnGroupType::CS_GRP_RET as u8)
            || has_group(detail, capstone::InsnGroupType::CS_GRP_IRET as u8)
        {
            InstructionKind::Return
        } else {
            InstructionKind::Other
        }
    }

    fn first_operand(
        &self,
        detail: &capstone::InsnDetail,
        kind: InstructionKind,
        op_str: &str,
    ) -> Option<Operand> {
        let operands = detail.arch_detail().operands();
        let control_flow = matches!(kind, InstructionKind::Call | InstructionKind::Branch { .. });
        match operands.first()? {
            capstone::arch::ArchOperand::X86Operand(op) => match &op.op_type {
                // Capstone reports direct targets already made absolute.
                capstone::arch::x86::X86OperandType::Imm(imm)
                    if control_flow && operands.len() == 1 =>
                {
                    Some(Operand::Relative(*imm as u64))
                }
                capstone::arch::x86::X86OperandType::Imm(imm) => Some(Operand::Immediate(*imm)),
                capstone::arch::x86::X86OperandType::Reg(reg) => {
                    Some(Operand::Register(self.cs.reg_name(*reg).unwrap_or_default()))
                }
                capstone::arch::x86::X86OperandType::Mem(_) => {
                    let text = op_str.split(',').next().unwrap_or(op_str).trim();
                    Some(Operand::Memory(text.to_string()))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl InstructionDecoder for CapstoneDecoder {
    fn decode(&self, code: &[u8], address: u64) -> Result<DecodedInstruction, DecodeError> {
        let insns = self
            .cs
            .disasm_count(code, address, 1)
            .map_err(|e| DecodeError::Backend { address, message: e.to_string() })?;
        let Some(insn) = insns.iter().next() else {
            return Err(DecodeError::Invalid(address));
        };

        let mnemonic = insn.mnemonic().unwrap_or("").to_string();
        let op_str = insn.op_str().unwrap_or("").to_string();
        let (kind, operand) = match self.cs.insn_detail(insn) {
            Ok(detail) => {
                let kind = self.classify(&detail, &mnemonic);
                (kind, self.first_operand(&detail, kind, &op_str))
            }
            Err(_) => (InstructionKind::Other, None),
        };

        Ok(DecodedInstruction { mnemonic, op_str, kind, operand, len: insn.bytes().len() })
    }

    fn name(&self) -> &'static str {
        "capstone"
    }
}
