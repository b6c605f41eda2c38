use tracing::{debug, trace};

use crate::backends::InstructionDecoder;
use crate::image::AddressSpace;
use crate::model::Instruction;

/// Linear-sweep `[start, end)`.
///
/// Stops cleanly when memory runs out. A decode failure is recorded as one
/// terminal fault instruction and ends the sweep.
pub fn sweep(
    memory: &AddressSpace,
    decoder: &dyn InstructionDecoder,
    start: u64,
    end: u64,
    window: usize,
) -> Vec<Instruction> {
    let mut insts = Vec::with_capacity(256);
    let mut ip = start;
    while ip < end {
        let code = match memory.read(ip, window) {
            Some(code) if !code.is_empty() => code,
            _ => {
                debug!(ip, start, "sweep reached end of mapped memory");
                break;
            }
        };

        match decoder.decode(&code, ip) {
            Ok(decoded) if decoded.len > 0 && decoded.len <= code.len() => {
                let next = ip + decoded.len as u64;
                trace!(ip, mnemonic = %decoded.mnemonic, "decoded");
                insts.push(Instruction {
                    mnemonic: decoded.mnemonic,
                    op_str: decoded.op_str,
                    kind: decoded.kind,
                    operand: decoded.operand,
                    bytes: code[..decoded.len].to_vec(),
                    start: ip,
                    end: next,
                    error: None,
                });
                ip = next;
            }
            Ok(decoded) => {
                insts.push(Instruction::fault(
                    ip,
                    format!("decoder returned bad length {} at {ip:#x}", decoded.len),
                ));
                break;
            }
            Err(err) => {
                debug!(ip, %err, "sweep stopped on decode error");
                insts.push(Instruction::fault(ip, err.to_string()));
                break;
            }
        }
    }
    insts
}
