//! Microcode ROM of the control unit.
//!
//! The ROM is synthesised once from the ISA table. Each machine
//! instruction owns a short sequence of microinstructions; a decode
//! table maps `(opcode, funct3, funct7)` to the first address of the
//! sequence.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use crate::constants::{DISPATCH_MPC, FETCH_MPC, HALT_MPC, SEQUENCE_MPC};
use crate::isa::{Format, Mnemonic};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Lsl,
    Lsr,
    Lui,
    JalLink,
    JalOffset,
    BranchOffset,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PcLatch {
    Inc,
    Alu,
    Branch,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegLatch {
    Rd,
    RdPc,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpCond {
    Z,
    Nz,
    Gt,
    Le,
}

/// One tick's worth of datapath control signals.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct MicroInstr {
    pub comment: &'static str,
    pub latch_pc: Option<PcLatch>,
    pub latch_ir: bool,
    pub latch_reg: Option<RegLatch>,
    pub latch_alu: Option<AluOp>,
    pub mem_read: bool,
    pub mem_write: bool,
    pub store_byte: bool,
    pub set_flags: bool,
    pub jump_if: Option<JumpCond>,
    pub next_mpc: Option<u32>,
    pub halt: bool,
}

const HALT_ROW: MicroInstr = MicroInstr {
    comment: "halt",
    latch_pc: None,
    latch_ir: false,
    latch_reg: None,
    latch_alu: None,
    mem_read: false,
    mem_write: false,
    store_byte: false,
    set_flags: false,
    jump_if: None,
    next_mpc: None,
    halt: true,
};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DecodeError {
    pub opcode: u8,
    pub funct3: u8,
    pub funct7: u8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unsupported instruction: opcode=0b{:07b} (0x{:02X}), funct3=0b{:03b}, funct7=0b{:07b}",
            self.opcode, self.opcode, self.funct3, self.funct7
        )
    }
}

impl Error for DecodeError {}

type DecodeKey = (u8, Option<u8>, Option<u8>);

pub struct Rom {
    code: HashMap<u32, MicroInstr>,
    decode_table: HashMap<DecodeKey, u32>,
    mpc_counter: u32,
}

impl Default for Rom {
    fn default() -> Rom {
        Rom::new()
    }
}

impl Rom {
    pub fn new() -> Rom {
        let mut rom = Rom {
            code: HashMap::new(),
            decode_table: HashMap::new(),
            mpc_counter: SEQUENCE_MPC,
        };
        rom.fill_fixed();
        rom.fill_from_isa();
        rom
    }

    /// Returns the row at `mpc`. Empty slots behave as a halt, so a
    /// stray micro-jump stops the machine instead of running wild.
    pub fn get(&self, mpc: u32) -> MicroInstr {
        self.code.get(&mpc).copied().unwrap_or(HALT_ROW)
    }

    pub fn contains(&self, mpc: u32) -> bool {
        self.code.contains_key(&mpc)
    }

    /// Three-tier lookup: exact match, then ignoring funct7, then
    /// ignoring both functs.
    pub fn decode(&self, opcode: u8, funct3: u8, funct7: u8) -> Result<u32, DecodeError> {
        self.decode_table
            .get(&(opcode, Some(funct3), Some(funct7)))
            .or_else(|| self.decode_table.get(&(opcode, Some(funct3), None)))
            .or_else(|| self.decode_table.get(&(opcode, None, None)))
            .copied()
            .ok_or(DecodeError {
                opcode,
                funct3,
                funct7,
            })
    }

    fn register_decode(&mut self, opcode: u8, funct3: Option<u8>, funct7: Option<u8>, mpc: u32) {
        self.decode_table.insert((opcode, funct3, funct7), mpc);
    }

    fn alloc(&mut self, count: u32) -> u32 {
        let addr = self.mpc_counter;
        self.mpc_counter += count;
        addr
    }

    fn fill_fixed(&mut self) {
        self.code.insert(
            FETCH_MPC,
            MicroInstr {
                comment: "fetch",
                latch_ir: true,
                latch_pc: Some(PcLatch::Inc),
                next_mpc: Some(DISPATCH_MPC),
                ..MicroInstr::default()
            },
        );
        // The dispatch slot never executes as a row; the control unit
        // detects the address and consults the decode table instead.
        self.code.insert(
            DISPATCH_MPC,
            MicroInstr {
                comment: "dispatch",
                ..MicroInstr::default()
            },
        );
        self.code.insert(HALT_MPC, HALT_ROW);
    }

    fn fill_from_isa(&mut self) {
        for &m in Mnemonic::ALL.iter() {
            let spec = m.spec();
            match spec.format {
                Format::R => {
                    let addr = self.alloc(2);
                    self.register_decode(spec.opcode, spec.funct3, spec.funct7, addr);
                    self.code.insert(
                        addr,
                        MicroInstr {
                            comment: m.as_str(),
                            latch_alu: Some(alu_op(m)),
                            set_flags: true,
                            next_mpc: Some(addr + 1),
                            ..MicroInstr::default()
                        },
                    );
                    self.code.insert(addr + 1, writeback(FETCH_MPC));
                }

                Format::I => match m {
                    Mnemonic::Lw | Mnemonic::Lb => {
                        let addr = self.alloc(2);
                        self.register_decode(spec.opcode, spec.funct3, None, addr);
                        self.code.insert(
                            addr,
                            MicroInstr {
                                comment: m.as_str(),
                                latch_alu: Some(AluOp::Add),
                                next_mpc: Some(addr + 1),
                                ..MicroInstr::default()
                            },
                        );
                        self.code.insert(
                            addr + 1,
                            MicroInstr {
                                comment: "load",
                                mem_read: true,
                                next_mpc: Some(FETCH_MPC),
                                ..MicroInstr::default()
                            },
                        );
                    }
                    Mnemonic::Jalr => {
                        let addr = self.alloc(3);
                        self.register_decode(spec.opcode, spec.funct3, None, addr);
                        self.code.insert(
                            addr,
                            MicroInstr {
                                comment: "jalr link",
                                latch_reg: Some(RegLatch::RdPc),
                                next_mpc: Some(addr + 1),
                                ..MicroInstr::default()
                            },
                        );
                        self.code.insert(
                            addr + 1,
                            MicroInstr {
                                comment: "jalr target",
                                latch_alu: Some(AluOp::Add),
                                next_mpc: Some(addr + 2),
                                ..MicroInstr::default()
                            },
                        );
                        self.code.insert(
                            addr + 2,
                            MicroInstr {
                                comment: "jalr jump",
                                latch_pc: Some(PcLatch::Alu),
                                next_mpc: Some(FETCH_MPC),
                                ..MicroInstr::default()
                            },
                        );
                    }
                    _ => {
                        let addr = self.alloc(2);
                        self.register_decode(spec.opcode, spec.funct3, None, addr);
                        self.code.insert(
                            addr,
                            MicroInstr {
                                comment: m.as_str(),
                                latch_alu: Some(alu_op(m)),
                                set_flags: true,
                                next_mpc: Some(addr + 1),
                                ..MicroInstr::default()
                            },
                        );
                        self.code.insert(addr + 1, writeback(FETCH_MPC));
                    }
                },

                Format::S => {
                    let addr = self.alloc(2);
                    self.register_decode(spec.opcode, spec.funct3, None, addr);
                    self.code.insert(
                        addr,
                        MicroInstr {
                            comment: m.as_str(),
                            latch_alu: Some(AluOp::Add),
                            next_mpc: Some(addr + 1),
                            ..MicroInstr::default()
                        },
                    );
                    self.code.insert(
                        addr + 1,
                        MicroInstr {
                            comment: "store",
                            mem_write: true,
                            store_byte: m == Mnemonic::Sb,
                            next_mpc: Some(FETCH_MPC),
                            ..MicroInstr::default()
                        },
                    );
                }

                Format::B => {
                    let addr = self.alloc(3);
                    self.register_decode(spec.opcode, spec.funct3, None, addr);
                    let cond = match m {
                        Mnemonic::Beq => JumpCond::Z,
                        Mnemonic::Bne => JumpCond::Nz,
                        Mnemonic::Bgt => JumpCond::Gt,
                        _ => JumpCond::Le,
                    };
                    self.code.insert(
                        addr,
                        MicroInstr {
                            comment: m.as_str(),
                            latch_alu: Some(AluOp::Sub),
                            set_flags: true,
                            next_mpc: Some(addr + 1),
                            ..MicroInstr::default()
                        },
                    );
                    self.code.insert(
                        addr + 1,
                        MicroInstr {
                            comment: "branch offset",
                            latch_alu: Some(AluOp::BranchOffset),
                            next_mpc: Some(addr + 2),
                            ..MicroInstr::default()
                        },
                    );
                    self.code.insert(
                        addr + 2,
                        MicroInstr {
                            comment: "branch",
                            latch_pc: Some(PcLatch::Branch),
                            jump_if: Some(cond),
                            next_mpc: Some(FETCH_MPC),
                            ..MicroInstr::default()
                        },
                    );
                }

                Format::U => {
                    let addr = self.alloc(2);
                    self.register_decode(spec.opcode, None, None, addr);
                    self.code.insert(
                        addr,
                        MicroInstr {
                            comment: m.as_str(),
                            latch_alu: Some(AluOp::Lui),
                            next_mpc: Some(addr + 1),
                            ..MicroInstr::default()
                        },
                    );
                    self.code.insert(addr + 1, writeback(FETCH_MPC));
                }

                Format::J => {
                    let addr = self.alloc(2);
                    self.register_decode(spec.opcode, None, None, addr);
                    self.code.insert(
                        addr,
                        MicroInstr {
                            comment: "jal link",
                            latch_alu: Some(AluOp::JalLink),
                            latch_reg: Some(RegLatch::Rd),
                            next_mpc: Some(addr + 1),
                            ..MicroInstr::default()
                        },
                    );
                    self.code.insert(
                        addr + 1,
                        MicroInstr {
                            comment: "jal jump",
                            latch_alu: Some(AluOp::JalOffset),
                            latch_pc: Some(PcLatch::Alu),
                            next_mpc: Some(FETCH_MPC),
                            ..MicroInstr::default()
                        },
                    );
                }

                Format::Sys => {
                    self.register_decode(spec.opcode, None, None, HALT_MPC);
                }
            }
        }
    }
}

fn writeback(next: u32) -> MicroInstr {
    MicroInstr {
        comment: "writeback",
        latch_reg: Some(RegLatch::Rd),
        next_mpc: Some(next),
        ..MicroInstr::default()
    }
}

fn alu_op(m: Mnemonic) -> AluOp {
    match m {
        Mnemonic::Add | Mnemonic::Addi => AluOp::Add,
        Mnemonic::Sub => AluOp::Sub,
        Mnemonic::Mul => AluOp::Mul,
        Mnemonic::Div => AluOp::Div,
        Mnemonic::And | Mnemonic::Andi => AluOp::And,
        Mnemonic::Or | Mnemonic::Ori => AluOp::Or,
        Mnemonic::Xor => AluOp::Xor,
        Mnemonic::Lsl => AluOp::Lsl,
        Mnemonic::Lsr => AluOp::Lsr,
        Mnemonic::Lui => AluOp::Lui,
        _ => AluOp::Add,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::isa;

    #[test]
    fn fetch_returns_to_dispatch() {
        let rom = Rom::new();
        let fetch = rom.get(FETCH_MPC);
        assert!(fetch.latch_ir);
        assert_eq!(fetch.latch_pc, Some(PcLatch::Inc));
        assert_eq!(fetch.next_mpc, Some(DISPATCH_MPC));
    }

    #[test]
    fn every_next_mpc_is_reachable() {
        let rom = Rom::new();
        for (mpc, row) in rom.code.iter() {
            if let Some(next) = row.next_mpc {
                assert!(
                    rom.contains(next),
                    "row {} points at missing row {}",
                    mpc,
                    next
                );
            } else {
                assert!(
                    row.halt || *mpc == DISPATCH_MPC,
                    "row {} has no successor and does not halt",
                    mpc
                );
            }
        }
    }

    #[test]
    fn decode_targets_exist() {
        let rom = Rom::new();
        for mpc in rom.decode_table.values() {
            assert!(rom.contains(*mpc));
        }
    }

    #[test]
    fn every_mnemonic_decodes() {
        let rom = Rom::new();
        for &m in isa::Mnemonic::ALL.iter() {
            let spec = m.spec();
            let mpc = rom
                .decode(
                    spec.opcode,
                    spec.funct3.unwrap_or(0),
                    spec.funct7.unwrap_or(0),
                )
                .unwrap();
            assert!(mpc == HALT_MPC || mpc >= SEQUENCE_MPC);
        }
    }

    #[test]
    fn funct7_separates_lsr_from_add() {
        let rom = Rom::new();
        let add = rom.decode(constants::OPCODE_R, 0b000, 0b0000000).unwrap();
        let lsr = rom.decode(constants::OPCODE_R, 0b000, 0b0000001).unwrap();
        assert_ne!(add, lsr);
        assert_eq!(rom.get(add).latch_alu, Some(AluOp::Add));
        assert_eq!(rom.get(lsr).latch_alu, Some(AluOp::Lsr));
    }

    #[test]
    fn funct7_wildcard_for_i_format() {
        let rom = Rom::new();
        let a = rom.decode(constants::OPCODE_LOAD, 0b000, 0b0000000).unwrap();
        let b = rom.decode(constants::OPCODE_LOAD, 0b000, 0b1111111).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn full_wildcard_for_sys() {
        let rom = Rom::new();
        assert_eq!(rom.decode(constants::OPCODE_SYS, 0b101, 0b0110011), Ok(HALT_MPC));
    }

    #[test]
    fn unknown_pattern_is_an_error() {
        let rom = Rom::new();
        let err = rom.decode(0x5B, 0b010, 0b0000000).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("0b1011011"));
        assert!(message.contains("0x5B"));
    }

    #[test]
    fn empty_slot_reads_as_halt() {
        let rom = Rom::new();
        assert!(rom.get(4242).halt);
    }

    #[test]
    fn branch_sequence_shape() {
        let rom = Rom::new();
        let spec = Mnemonic::Beq.spec();
        let addr = rom
            .decode(spec.opcode, spec.funct3.unwrap(), 0)
            .unwrap();
        let cmp = rom.get(addr);
        assert_eq!(cmp.latch_alu, Some(AluOp::Sub));
        assert!(cmp.set_flags);
        let offset = rom.get(addr + 1);
        assert_eq!(offset.latch_alu, Some(AluOp::BranchOffset));
        let jump = rom.get(addr + 2);
        assert_eq!(jump.latch_pc, Some(PcLatch::Branch));
        assert_eq!(jump.jump_if, Some(JumpCond::Z));
        assert_eq!(jump.next_mpc, Some(FETCH_MPC));
    }
}
