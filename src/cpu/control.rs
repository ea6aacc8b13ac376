//! Per-tick interpretation of a microinstruction.
//!
//! Phase order matters: the ALU runs before the PC update so that
//! branch and jump sequences can still see the branch-origin PC
//! (`pc - 4`, fetch having already advanced it).

use super::{Cpu, CpuError};
use crate::alu;
use crate::constants;
use crate::microcode::{AluOp, DecodeError, JumpCond, MicroInstr, PcLatch, RegLatch};
use crate::{isa, Flags};

pub(super) fn execute(cpu: &mut Cpu, mi: &MicroInstr) -> Result<(), CpuError> {
    if mi.halt {
        cpu.running = false;
        return Ok(());
    }

    if mi.latch_ir {
        cpu.ir = cpu
            .instr_mem
            .read_word(cpu.pc)
            .map_err(|_| CpuError::Memory { address: cpu.pc })?;
    }

    if let Some(op) = mi.latch_alu {
        let (a, b) = extract_operands(cpu, op)?;
        cpu.alu_out = alu::eval(op, a, b);

        if mi.set_flags {
            cpu.flags.z = cpu.alu_out == 0;
            cpu.flags.n = cpu.alu_out < 0;
        }
    }

    match mi.latch_pc {
        Some(PcLatch::Inc) => cpu.pc = cpu.pc.wrapping_add(constants::WORD_BYTES),
        Some(PcLatch::Alu) => cpu.pc = cpu.alu_out as u32,
        Some(PcLatch::Branch) => {
            if should_jump(cpu.flags, mi.jump_if) {
                cpu.pc = cpu.alu_out as u32;
            }
        }
        None => {}
    }

    if mi.mem_read {
        let rd = isa::rd_of(cpu.ir) as usize;
        let address = cpu.alu_out as u32;
        let value = match isa::funct3_of(cpu.ir) {
            0b000 => cpu.bus.load_word(address),
            _ => cpu.bus.load_byte(address),
        }
        .map_err(|_| CpuError::Memory { address })?;
        // Unlike the writeback path below, rd = 0 is not guarded here.
        cpu.registers[rd] = value;
    }

    if mi.mem_write {
        let address = cpu.alu_out as u32;
        let value = cpu.registers[isa::rs2_of(cpu.ir) as usize];
        if mi.store_byte {
            cpu.bus.store_byte(address, value as u8)
        } else {
            cpu.bus.store_word(address, value)
        }
        .map_err(|_| CpuError::Memory { address })?;
    }

    match mi.latch_reg {
        Some(RegLatch::Rd) => {
            let rd = isa::rd_of(cpu.ir) as usize;
            if rd != 0 {
                cpu.registers[rd] = cpu.alu_out as u32;
            }
        }
        Some(RegLatch::RdPc) => {
            // Link register: the post-increment PC, i.e. the address of
            // the following instruction.
            let rd = isa::rd_of(cpu.ir) as usize;
            if rd != 0 {
                cpu.registers[rd] = cpu.pc;
            }
        }
        None => {}
    }

    if let Some(next) = mi.next_mpc {
        cpu.mpc = next;
    }

    Ok(())
}

fn should_jump(flags: Flags, cond: Option<JumpCond>) -> bool {
    match cond {
        Some(JumpCond::Z) => flags.z,
        Some(JumpCond::Nz) => !flags.z,
        Some(JumpCond::Gt) => !flags.n && !flags.z,
        Some(JumpCond::Le) => flags.n || flags.z,
        None => false,
    }
}

/// Sign-interpreted register read.
fn reg(cpu: &Cpu, index: u8) -> i64 {
    i64::from(cpu.registers[index as usize] as i32)
}

/// Selects the ALU inputs for the current instruction format.
///
/// Pure: the branch-origin PC is recovered as `pc - 4` rather than by
/// mutating the architectural PC.
fn extract_operands(cpu: &Cpu, op: AluOp) -> Result<(i64, i64), CpuError> {
    let ir = cpu.ir;
    let origin = i64::from(cpu.pc.wrapping_sub(constants::WORD_BYTES));

    match isa::opcode_of(ir) {
        constants::OPCODE_R => Ok((reg(cpu, isa::rs1_of(ir)), reg(cpu, isa::rs2_of(ir)))),

        constants::OPCODE_I_ARITH | constants::OPCODE_LOAD | constants::OPCODE_JALR => {
            Ok((reg(cpu, isa::rs1_of(ir)), i64::from(isa::imm_i(ir))))
        }

        constants::OPCODE_STORE => Ok((reg(cpu, isa::rs1_of(ir)), i64::from(isa::imm_s(ir)))),

        constants::OPCODE_BRANCH => {
            if op == AluOp::BranchOffset {
                Ok((origin, i64::from(isa::imm_b(ir))))
            } else {
                Ok((reg(cpu, isa::rs1_of(ir)), reg(cpu, isa::rs2_of(ir))))
            }
        }

        constants::OPCODE_JAL => match op {
            AluOp::JalLink => Ok((origin, i64::from(constants::WORD_BYTES))),
            _ => Ok((origin, i64::from(isa::imm_j(ir)))),
        },

        constants::OPCODE_LUI => Ok((0, i64::from(isa::imm_u(ir)))),

        opcode => Err(CpuError::Decode(DecodeError {
            opcode,
            funct3: isa::funct3_of(ir),
            funct7: isa::funct7_of(ir),
        })),
    }
}
