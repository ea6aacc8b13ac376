use super::Word;
use std::mem;

pub const WORD_BYTES       : u32 = mem::size_of::<Word>() as u32;
pub const WORD_WIDTH       : u32 = WORD_BYTES * 8;

pub const REGISTER_COUNT   : usize = 32;

pub const INSTR_MEM_BYTES  : u32 = 64 * 1024;
pub const DATA_MEM_BYTES   : u32 = 64 * 1024;

// Instruction word fields

pub const OPCODE_MASK      : Word = 0b00000000000000000000000001111111;
pub const RD_MASK          : Word = 0b00000000000000000000111110000000;
pub const FUNCT3_MASK      : Word = 0b00000000000000000111000000000000;
pub const RS1_MASK         : Word = 0b00000000000011111000000000000000;
pub const RS2_MASK         : Word = 0b00000001111100000000000000000000;
pub const FUNCT7_MASK      : Word = 0b11111110000000000000000000000000;

pub const OPCODE_OFFSET    : u32 = 0;
pub const RD_OFFSET        : u32 = 7;
pub const FUNCT3_OFFSET    : u32 = 12;
pub const RS1_OFFSET       : u32 = 15;
pub const RS2_OFFSET       : u32 = 20;
pub const FUNCT7_OFFSET    : u32 = 25;

// Major opcodes

pub const OPCODE_R         : u8 = 0x33;
pub const OPCODE_I_ARITH   : u8 = 0x13;
pub const OPCODE_LOAD      : u8 = 0x03;
pub const OPCODE_JALR      : u8 = 0x67;
pub const OPCODE_STORE     : u8 = 0x23;
pub const OPCODE_BRANCH    : u8 = 0x63;
pub const OPCODE_LUI       : u8 = 0x37;
pub const OPCODE_JAL       : u8 = 0x6F;
pub const OPCODE_SYS       : u8 = 0x7F;

// Microcode ROM landmarks

pub const FETCH_MPC        : u32 = 0;
pub const DISPATCH_MPC     : u32 = 1000;
pub const HALT_MPC         : u32 = 9999;
pub const SEQUENCE_MPC     : u32 = 100;

// Memory-mapped I/O defaults

pub const INPUT_ADDRESS    : u32 = 0x1;
pub const OUTPUT_ADDRESS   : u32 = 0x2;
