//! Microcoded virtual processor for the RISCroll instruction set.
//!
//! The machine executes 32-bit instruction words in six RISC-V-layout
//! formats. Every architectural instruction is implemented as a short
//! sequence of microinstructions held in a [ROM](microcode::Rom) that
//! is synthesised from the [ISA table](isa) at construction time. The
//! [`Cpu`] steps a micro-program counter through that ROM, one
//! microinstruction per tick, driving the ALU, register file, memories
//! and flag register.
//!
//! Binary images are produced by the `rasm` assembler and packaged by
//! the `rbin` crate; the `rrun` binary loads and executes them.

pub mod alu;
pub mod bus;
pub mod constants;
pub mod cpu;
pub mod isa;
pub mod memory;
pub mod microcode;

pub use crate::bus::{Bus, OutputItem};
pub use crate::cpu::{Cpu, CpuError, Flags, StopReason};
pub use crate::memory::Memory;
pub use crate::microcode::{AluOp, DecodeError, JumpCond, MicroInstr, PcLatch, RegLatch, Rom};
pub use util::Endian;

pub type Word = u32;
