//! Assembler for the RISCroll virtual processor.
//!
//! The main entry point is [`assemble`], which takes assembly source
//! text and produces a two-segment [`Program`](rbin::Program) plus the
//! debug listings the toolchain writes next to the binaries.
//!
//! Parsing is implemented with [pest]; parse failures surface as
//! `pest` errors with the usual pretty span rendering.
//!
//! # RISCroll assembly
//!
//! The language is line-oriented. A line holds an optional `label:`,
//! followed by a directive or an instruction; `#` starts a comment.
//!
//! ## Sections and placement
//!
//! `.text` and `.data` switch the active section. Each section keeps
//! its own location counter; `.org <addr>` moves the counter of the
//! current section, and switching back to a section restores its last
//! origin. Instructions may only appear in `.text`, data directives
//! only in `.data`.
//!
//! ## Data directives
//!
//!  Keyword | Description | Example
//! ---------|-------------|--------
//! `.word`  | four bytes, little-endian; the operand may be an integer or a label | `.word 0xABCD1234`
//! `.byte`  | one byte per character of a quoted string, after decoding `\n`, `\t`, `\r`, `\0`, `\xNN`, `\\` and `\"` | `.byte "hi\n\0"`
//!
//! Integer literals are signed decimal, hexadecimal (`0x`), octal
//! (`0o`) or binary (`0b`).
//!
//! ## Instructions
//!
//!  Format | Syntax | Mnemonics
//! --------|--------|-----------
//! R       | `op rd, rs1, rs2` | `add sub and or xor mul div lsl lsr`
//! I       | `op rd, rs1, imm` or `op rd, imm(rs1)` | `addi andi ori jalr` (loads: `lw rd, imm(rs1)`, `lb rd, imm(rs1)`)
//! S       | `op rs2, imm(rs1)` | `sw sb`
//! B       | `op rs1, rs2, label` | `beq bne bgt ble`
//! U       | `op rd, imm` | `lui` (commonly `lui rd, high(label)`)
//! J       | `op rd, label` | `jal`
//! SYS     | `op` | `halt`
//!
//! Registers are written with their ABI aliases (`zero`, `ra`, `sp`,
//! `gp`, `tp`, `t0`-`t6`, `s0`-`s7`, `a0`-`a7`, `x28`-`x31`) or as
//! `r0`-`r31`. Branch and jump targets are PC-relative and must land
//! on even addresses. `low(label)` and `high(label)` extract the low
//! 12 bits and the 4 KiB-aligned high bits of a label's address, so
//! the pair `lui rd, high(L)` / `addi rd, rd, low(L)` materialises a
//! full 32-bit address.
//!
//! ## Macros
//!
//! `.macro name arg...` opens a textual macro closed by `.endmacro`.
//! Inside the body, `\arg` tokens are replaced positionally with the
//! call-site arguments. A macro body may call macros defined before
//! it. Calling with the wrong number of arguments is an error.
//!
//! [pest]: https://docs.rs/pest/

mod encode;
mod expand;
mod layout;
mod operand;
mod parser;


use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use pest::Parser;

use parser::{AsmParser, Rule};
use rbin::{ListingEntry, Program};

pub use operand::Operand;

pub type LabelMap = HashMap<String, u32>;

#[derive(Debug)]
pub enum Error {
    /// Grammar-level failure, with pest's span rendering.
    Parse(Box<pest::error::Error<Rule>>),
    /// Anything the passes reject: unknown mnemonics, bad operands,
    /// macro misuse, unaligned or out-of-range jump targets.
    Asm(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::Asm(message) => f.write_str(message),
        }
    }
}

impl StdError for Error {}

impl From<pest::error::Error<Rule>> for Error {
    fn from(err: pest::error::Error<Rule>) -> Error {
        Error::Parse(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Everything one compilation produces.
#[derive(Debug)]
pub struct Assembly {
    pub program: Program,
    pub labels: LabelMap,
    pub text_listing: Vec<ListingEntry>,
    pub data_listing: Vec<ListingEntry>,
    pub warnings: Vec<String>,
}

pub fn assemble(source: &str) -> Result<Assembly> {
    let expanded = expand::expand(source)?;
    let program = AsmParser::parse(Rule::program, &expanded)?.next().unwrap();
    let layout = layout::first_pass(program)?;

    let mut warnings = Vec::new();
    let (text, text_listing) = encode::second_pass_text(&layout, &mut warnings)?;
    let (data, data_listing) = encode::second_pass_data(&layout, &mut warnings)?;

    Ok(Assembly {
        program: Program::from(layout.text_origin, text, data),
        labels: layout.labels,
        text_listing,
        data_listing,
        warnings,
    })
}
