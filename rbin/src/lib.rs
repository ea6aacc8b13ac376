//! Two-segment binary image format of the RISCroll toolchain.
//!
//! A compiled program is stored as two files. `<prefix>.text.bin`
//! starts with a 4-byte little-endian entry-point address (the first
//! address of the `.text` section) followed by the 4-byte instruction
//! words in source order. `<prefix>.data.bin` holds the raw data bytes
//! with no header; the loader places them at the bottom of data
//! memory.
//!
//! Next to the binaries the assembler writes two human-readable
//! listings (`.text.log`, `.data.log`), one line per emitted item.

use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use byteorder::{ReadBytesExt, WriteBytesExt};
use util::Endian;

/// An assembled program: entry point plus both segments.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    entry: u32,
    text: Vec<u8>,
    data: Vec<u8>,
}

impl Program {
    pub fn from(entry: u32, text: Vec<u8>, data: Vec<u8>) -> Program {
        Program { entry, text, data }
    }

    pub fn copy_from(entry: u32, text: &[u8], data: &[u8]) -> Program {
        Program {
            entry,
            text: Vec::from(text),
            data: Vec::from(data),
        }
    }

    pub fn entry(&self) -> u32 {
        self.entry
    }

    pub fn text(&self) -> &[u8] {
        &self.text[..]
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Reads a program back from its two image files.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        text_path: P,
        data_path: Q,
    ) -> std::io::Result<Program> {
        let (entry, text) = read_text_file(text_path)?;
        let data = read_data_file(data_path)?;
        Ok(Program { entry, text, data })
    }
}

pub fn read_text<R: Read>(reader: &mut R) -> std::io::Result<(u32, Vec<u8>)> {
    let entry = reader.read_u32::<Endian>()?;
    let mut text = Vec::new();
    reader.read_to_end(&mut text)?;
    Ok((entry, text))
}

pub fn write_text<W: Write>(writer: &mut W, entry: u32, text: &[u8]) -> std::io::Result<()> {
    writer.write_u32::<Endian>(entry)?;
    writer.write_all(text)?;
    Ok(())
}

pub fn read_text_file<P: AsRef<Path>>(path: P) -> std::io::Result<(u32, Vec<u8>)> {
    read_text(&mut BufReader::new(File::open(path)?))
}

pub fn write_text_file<P: AsRef<Path>>(path: P, entry: u32, text: &[u8]) -> std::io::Result<()> {
    write_text(&mut BufWriter::new(File::create(path)?), entry, text)
}

pub fn read_data_file<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut data)?;
    Ok(data)
}

pub fn write_data_file<P: AsRef<Path>>(path: P, data: &[u8]) -> std::io::Result<()> {
    BufWriter::new(File::create(path)?).write_all(data)
}

/// One line of a debug listing: the emitted word, where it went, and
/// the source text it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ListingEntry {
    pub address: u32,
    pub word: u32,
    pub source: String,
}

pub fn format_listing_line(entry: &ListingEntry) -> String {
    format!(
        "{:08X}({}) - {:08X} - {:032b} - {}",
        entry.address, entry.address, entry.word, entry.word, entry.source
    )
}

pub fn write_listing<W: Write>(writer: &mut W, entries: &[ListingEntry]) -> std::io::Result<()> {
    for entry in entries {
        writeln!(writer, "{}", format_listing_line(entry))?;
    }
    Ok(())
}

pub fn write_listing_file<P: AsRef<Path>>(
    path: P,
    entries: &[ListingEntry],
) -> std::io::Result<()> {
    write_listing(&mut BufWriter::new(File::create(path)?), entries)
}

/// Writes the full artifact set for one compilation:
/// `<prefix>.text.bin`, `<prefix>.data.bin` and both listings.
pub fn write_artifacts(
    prefix: &str,
    program: &Program,
    text_listing: &[ListingEntry],
    data_listing: &[ListingEntry],
) -> std::io::Result<()> {
    write_text_file(
        format!("{}.text.bin", prefix),
        program.entry(),
        program.text(),
    )?;
    write_data_file(format!("{}.data.bin", prefix), program.data())?;
    write_listing_file(format!("{}.text.log", prefix), text_listing)?;
    write_listing_file(format!("{}.data.log", prefix), data_listing)?;
    Ok(())
}

#[cfg(test)]
mod test;
