//! First pass: walks the parsed lines, tracking sections and the
//! location counter, collecting labels and the ordered item lists for
//! the second pass.

use matches::debug_assert_matches;
use pest::iterators::Pair;

use rcpu::isa::Mnemonic;

use crate::operand::{self, Operand};
use crate::parser::Rule;
use crate::{Error, LabelMap, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Section {
    Text,
    Data,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub address: u32,
    pub source: String,
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    Word(Operand),
    Byte(u8),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataItem {
    pub address: u32,
    pub source: String,
    pub value: DataValue,
}

pub struct Layout {
    pub labels: LabelMap,
    pub text: Vec<TextItem>,
    pub data: Vec<DataItem>,
    /// Address of the first instruction; becomes the entry-point
    /// header of the text image.
    pub text_origin: u32,
}

fn require_section(section: Option<Section>, wanted: Section, what: &str) -> Result<()> {
    match section {
        Some(s) if s == wanted => Ok(()),
        Some(_) => Err(Error::Asm(format!(
            "{} is not allowed in the current section",
            what
        ))),
        None => Err(Error::Asm(format!("{} before any section", what))),
    }
}

fn decode_escapes(raw: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('0') => bytes.push(0),
            Some('\\') => bytes.push(b'\\'),
            Some('"') => bytes.push(b'"'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let value = u8::from_str_radix(&hex, 16).map_err(|_| {
                    Error::Asm(format!("bad \\x escape \"\\x{}\"", hex))
                })?;
                bytes.push(value);
            }
            Some(other) => {
                return Err(Error::Asm(format!("unknown escape sequence \\{}", other)));
            }
            None => return Err(Error::Asm("dangling escape at end of string".to_string())),
        }
    }

    Ok(bytes)
}

pub fn first_pass(program: Pair<Rule>) -> Result<Layout> {
    debug_assert_matches!(program.as_rule(), Rule::program);

    let mut labels = LabelMap::new();
    let mut text = Vec::new();
    let mut data = Vec::new();

    let mut section: Option<Section> = None;
    let mut counter: u32 = 0;
    // Each section remembers its last `.org`; re-entering the section
    // restores it.
    let mut text_org: u32 = 0;
    let mut data_org: u32 = 0;

    for line in program.into_inner() {
        if line.as_rule() == Rule::EOI {
            continue;
        }
        debug_assert_matches!(line.as_rule(), Rule::line);

        for item in line.into_inner() {
            match item.as_rule() {
                Rule::label => {
                    let name = item.into_inner().next().unwrap().as_str();
                    labels.insert(name.to_string(), counter);
                }

                Rule::section => {
                    section = Some(if item.as_str() == ".text" {
                        Section::Text
                    } else {
                        Section::Data
                    });
                    counter = match section.unwrap() {
                        Section::Text => text_org,
                        Section::Data => data_org,
                    };
                }

                Rule::dir_org => {
                    let literal = item.into_inner().next().unwrap();
                    let value = operand::parse_int(literal.as_str()).map_err(Error::Asm)?;
                    counter = value as u32;
                    match section {
                        Some(Section::Text) => text_org = counter,
                        Some(Section::Data) => data_org = counter,
                        None => {
                            return Err(Error::Asm(".org before any section".to_string()));
                        }
                    }
                }

                Rule::dir_word => {
                    require_section(section, Section::Data, ".word")?;
                    let source = item.as_str().trim().to_string();
                    let value = operand::from_pair(item.into_inner().next().unwrap())?;
                    data.push(DataItem {
                        address: counter,
                        source,
                        value: DataValue::Word(value),
                    });
                    counter += 4;
                }

                Rule::dir_byte => {
                    require_section(section, Section::Data, ".byte")?;
                    let string = item.into_inner().next().unwrap();
                    let raw = string.into_inner().next().unwrap().as_str();
                    for byte in decode_escapes(raw)? {
                        data.push(DataItem {
                            address: counter,
                            source: format!(".byte {}", byte),
                            value: DataValue::Byte(byte),
                        });
                        counter += 1;
                    }
                }

                Rule::instruction => {
                    require_section(section, Section::Text, "an instruction")?;
                    let source = item.as_str().trim().to_string();
                    let mut pairs = item.into_inner();
                    let head = pairs.next().unwrap();
                    let mnemonic: Mnemonic = head.as_str().parse().map_err(|err| {
                        Error::Asm(format!("{} (in \"{}\")", err, source))
                    })?;
                    let operands = pairs
                        .map(operand::from_pair)
                        .collect::<Result<Vec<_>>>()?;
                    text.push(TextItem {
                        address: counter,
                        source,
                        mnemonic,
                        operands,
                    });
                    counter += 4;
                }

                _ => unreachable!(),
            }
        }
    }

    let text_origin = text.first().map(|item| item.address).unwrap_or(text_org);

    Ok(Layout {
        labels,
        text,
        data,
        text_origin,
    })
}
