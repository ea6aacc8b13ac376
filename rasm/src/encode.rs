//! Second pass: encodes every collected item into its final bytes,
//! resolving labels against the completed label table.

use byteorder::ByteOrder;

use rbin::ListingEntry;
use rcpu::isa::{self, Format};
use rcpu::Word;
use util::Endian;

use crate::layout::{DataValue, Layout, TextItem};
use crate::operand::{resolve, Operand};
use crate::{Error, LabelMap, Result};

fn err_in(item: &TextItem, message: &str) -> Error {
    Error::Asm(format!("{} (in \"{}\")", message, item.source))
}

fn register(item: &TextItem, operand: &Operand) -> Result<u8> {
    match operand {
        Operand::Sym(name) => {
            isa::parse_register(name).map_err(|err| err_in(item, &err.to_string()))
        }
        _ => Err(err_in(item, "expected a register")),
    }
}

/// PC-relative offset for B and J formats: resolved against the
/// instruction's own address, checked for halfword alignment and for
/// the two's-complement range of the immediate field.
fn jump_offset(
    item: &TextItem,
    target: &Operand,
    labels: &LabelMap,
    bits: u32,
    warnings: &mut Vec<String>,
) -> Result<i32> {
    let offset = resolve(target, labels, item.address, true, warnings)?;
    if offset % 2 != 0 {
        return Err(err_in(item, &format!("odd jump offset {}", offset)));
    }
    let bound = 1i64 << (bits - 1);
    if offset < -bound || offset >= bound {
        return Err(err_in(
            item,
            &format!("jump offset {} does not fit in {} bits", offset, bits),
        ));
    }
    Ok(offset as i32)
}

fn encode_instruction(
    item: &TextItem,
    labels: &LabelMap,
    warnings: &mut Vec<String>,
) -> Result<Word> {
    let m = item.mnemonic;
    let operands = &item.operands[..];

    match m.spec().format {
        Format::R => match operands {
            [rd, rs1, rs2] => Ok(isa::encode_r(
                m,
                register(item, rd)?,
                register(item, rs1)?,
                register(item, rs2)?,
            )),
            _ => Err(err_in(item, "expected rd, rs1, rs2")),
        },

        Format::I => match operands {
            [rd, Operand::Offset { offset, base }] => {
                let rs1 = isa::parse_register(base)
                    .map_err(|err| err_in(item, &err.to_string()))?;
                let imm = resolve(offset, labels, 0, false, warnings)?;
                Ok(isa::encode_i(m, register(item, rd)?, rs1, imm as i32))
            }
            [rd, rs1, imm] => {
                let imm = resolve(imm, labels, 0, false, warnings)?;
                Ok(isa::encode_i(
                    m,
                    register(item, rd)?,
                    register(item, rs1)?,
                    imm as i32,
                ))
            }
            _ => Err(err_in(item, "expected rd, rs1, imm or rd, imm(rs1)")),
        },

        Format::S => match operands {
            [rs2, Operand::Offset { offset, base }] => {
                let rs1 = isa::parse_register(base)
                    .map_err(|err| err_in(item, &err.to_string()))?;
                let imm = resolve(offset, labels, 0, false, warnings)?;
                Ok(isa::encode_s(m, register(item, rs2)?, rs1, imm as i32))
            }
            _ => Err(err_in(item, "expected rs2, imm(rs1)")),
        },

        Format::B => match operands {
            [rs1, rs2, target] => {
                let offset = jump_offset(item, target, labels, 13, warnings)?;
                Ok(isa::encode_b(
                    m,
                    register(item, rs1)?,
                    register(item, rs2)?,
                    offset,
                ))
            }
            _ => Err(err_in(item, "expected rs1, rs2, label")),
        },

        Format::U => match operands {
            [rd, imm] => {
                let imm = resolve(imm, labels, 0, false, warnings)?;
                Ok(isa::encode_u(m, register(item, rd)?, imm as u32))
            }
            _ => Err(err_in(item, "expected rd, imm")),
        },

        Format::J => match operands {
            [rd, target] => {
                let offset = jump_offset(item, target, labels, 21, warnings)?;
                Ok(isa::encode_j(m, register(item, rd)?, offset))
            }
            _ => Err(err_in(item, "expected rd, label")),
        },

        Format::Sys => {
            if operands.is_empty() {
                Ok(isa::encode_sys(m))
            } else {
                Err(err_in(item, "expected no operands"))
            }
        }
    }
}

pub fn second_pass_text(
    layout: &Layout,
    warnings: &mut Vec<String>,
) -> Result<(Vec<u8>, Vec<ListingEntry>)> {
    let mut bytes = Vec::with_capacity(layout.text.len() * 4);
    let mut listing = Vec::with_capacity(layout.text.len());

    for item in &layout.text {
        let word = encode_instruction(item, &layout.labels, warnings)?;
        let mut buffer = [0u8; 4];
        Endian::write_u32(&mut buffer, word);
        bytes.extend_from_slice(&buffer);
        listing.push(ListingEntry {
            address: item.address,
            word,
            source: item.source.clone(),
        });
    }

    Ok((bytes, listing))
}

pub fn second_pass_data(
    layout: &Layout,
    warnings: &mut Vec<String>,
) -> Result<(Vec<u8>, Vec<ListingEntry>)> {
    let mut bytes = Vec::new();
    let mut listing = Vec::with_capacity(layout.data.len());

    for item in &layout.data {
        let word = match &item.value {
            DataValue::Word(operand) => {
                let value = resolve(operand, &layout.labels, 0, false, warnings)? as u32;
                let mut buffer = [0u8; 4];
                Endian::write_u32(&mut buffer, value);
                bytes.extend_from_slice(&buffer);
                value
            }
            DataValue::Byte(byte) => {
                bytes.push(*byte);
                u32::from(*byte)
            }
        };
        listing.push(ListingEntry {
            address: item.address,
            word,
            source: item.source.clone(),
        });
    }

    Ok((bytes, listing))
}
