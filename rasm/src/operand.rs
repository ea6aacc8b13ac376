//! Operand model and resolution.

use std::num::ParseIntError;

use matches::debug_assert_matches;
use num::Num;
use pest::iterators::Pair;

use crate::parser::Rule;
use crate::{Error, LabelMap, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Integer literal, already parsed.
    Int(i64),
    /// Bare identifier: a register name or a label, depending on the
    /// operand slot it occupies.
    Sym(String),
    /// `low(label)`: low 12 bits of the label address.
    Low(String),
    /// `high(label)`: label address aligned down to 4 KiB.
    High(String),
    /// `imm(base)` memory operand.
    Offset { offset: Box<Operand>, base: String },
}

fn radix_split(text: &str) -> (u32, &str) {
    if let Some(rest) = text.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = text.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = text.strip_prefix("0o") {
        (8, rest)
    } else {
        (10, text)
    }
}

fn from_str_radix<T>(digits: &str, radix: u32) -> std::result::Result<T, ParseIntError>
where
    T: Num<FromStrRadixErr = ParseIntError>,
{
    T::from_str_radix(digits, radix)
}

/// Parses a literal with C-style base prefixes. The magnitude is read
/// as unsigned so that literals like `0xFFFFFFFF` survive, with the
/// sign applied afterwards.
pub fn parse_int(text: &str) -> std::result::Result<i64, String> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits) = radix_split(body);
    let magnitude: u64 = from_str_radix(digits, radix)
        .map_err(|err| format!("bad integer literal \"{}\": {}", text, err))?;
    let value = magnitude as i64;
    Ok(if negative { -value } else { value })
}

fn term_from_pair(pair: Pair<Rule>) -> Result<Operand> {
    match pair.as_rule() {
        Rule::int => Ok(Operand::Int(
            parse_int(pair.as_str()).map_err(Error::Asm)?,
        )),
        Rule::identifier => Ok(Operand::Sym(pair.as_str().to_string())),
        Rule::low_high => {
            let mut pairs = pair.into_inner();
            let kind = pairs.next().unwrap().as_str();
            let label = pairs.next().unwrap().as_str().to_string();
            Ok(if kind == "low" {
                Operand::Low(label)
            } else {
                Operand::High(label)
            })
        }
        _ => unreachable!(),
    }
}

pub fn from_pair(pair: Pair<Rule>) -> Result<Operand> {
    debug_assert_matches!(pair.as_rule(), Rule::operand);
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::offset => {
            let mut pairs = inner.into_inner();
            let offset = term_from_pair(pairs.next().unwrap())?;
            let base = pairs.next().unwrap().as_str().to_string();
            Ok(Operand::Offset {
                offset: Box::new(offset),
                base,
            })
        }
        _ => term_from_pair(inner),
    }
}

fn lookup_lenient(label: &str, labels: &LabelMap, warnings: &mut Vec<String>) -> i64 {
    match labels.get(label) {
        Some(address) => i64::from(*address),
        None => {
            warnings.push(format!("undefined label \"{}\" resolved to 0", label));
            0
        }
    }
}

/// Converts an operand into a numeric value.
///
/// `low(L)` and `high(L)` return the masked label address (0 with a
/// warning when the label is unknown). A bare label yields its
/// absolute address, or `label - pc` when `relative` is set. Anything
/// else must be an integer literal.
pub fn resolve(
    operand: &Operand,
    labels: &LabelMap,
    pc: u32,
    relative: bool,
    warnings: &mut Vec<String>,
) -> Result<i64> {
    match operand {
        Operand::Int(value) => Ok(*value),
        Operand::Low(label) => Ok(lookup_lenient(label, labels, warnings) & 0xFFF),
        Operand::High(label) => Ok(lookup_lenient(label, labels, warnings) & 0xFFFF_F000),
        Operand::Sym(name) => {
            let address = labels
                .get(name)
                .ok_or_else(|| Error::Asm(format!("undefined label: {}", name)))?;
            Ok(if relative {
                i64::from(*address) - i64::from(pc)
            } else {
                i64::from(*address)
            })
        }
        Operand::Offset { .. } => Err(Error::Asm(
            "memory operand is not allowed here".to_string(),
        )),
    }
}
