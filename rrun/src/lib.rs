//! Loads RISCroll binary images into a [`Cpu`] and drives it to
//! completion, collecting the trace log and the final snapshot.

mod trace;

pub use trace::Tracer;

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use rbin::Program;
use rcpu::{Cpu, CpuError, OutputItem};

/// The runner gives up after this many ticks.
pub const STEP_CAP: usize = 100_000;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Cpu(CpuError),
    Input(String),
    /// The step cap tripped; the machine itself never halted.
    StepCap(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Cpu(err) => err.fmt(f),
            Error::Input(message) => f.write_str(message),
            Error::StepCap(cap) => {
                write!(f, "execution stopped: more than {} steps", cap)
            }
        }
    }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<CpuError> for Error {
    fn from(err: CpuError) -> Error {
        Error::Cpu(err)
    }
}

/// How an input file is turned into the CPU's input FIFO.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputMode {
    /// Raw bytes, NUL-terminated if the file does not end in one.
    Bytes,
    /// One decimal integer per line.
    Words,
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<InputMode, String> {
        match s {
            "bytes" => Ok(InputMode::Bytes),
            "words" => Ok(InputMode::Words),
            other => Err(format!("unknown input mode \"{}\"", other)),
        }
    }
}

pub fn load_input<P: AsRef<Path>>(path: P, mode: InputMode) -> Result<Vec<u32>, Error> {
    match mode {
        InputMode::Bytes => {
            let mut bytes = fs::read(path)?;
            if bytes.last() != Some(&0) {
                bytes.push(0);
            }
            Ok(bytes.into_iter().map(u32::from).collect())
        }
        InputMode::Words => {
            let content = fs::read_to_string(path)?;
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| {
                    line.parse::<i64>()
                        .map(|value| value as u32)
                        .map_err(|_| Error::Input(format!("bad input word \"{}\"", line)))
                })
                .collect()
        }
    }
}

/// Builds a CPU from a loaded program image.
pub fn boot(program: &Program) -> Result<Cpu, Error> {
    Ok(Cpu::new(program.text(), program.entry(), program.data())?)
}

/// Steps the CPU until it halts, observing each tick through the
/// tracer. Trips with [`Error::StepCap`] instead of running forever.
pub fn run(cpu: &mut Cpu, tracer: &mut Tracer, step_cap: usize) -> Result<usize, Error> {
    let mut steps = 0;
    while cpu.running() {
        if steps >= step_cap {
            return Err(Error::StepCap(step_cap));
        }
        cpu.step()?;
        tracer.observe(cpu);
        steps += 1;
    }
    Ok(steps)
}

/// Renders the output buffer: characters verbatim, integers as one
/// decimal per line.
pub fn render_output(items: &[OutputItem]) -> String {
    let mut rendered = String::new();
    for item in items {
        match item {
            OutputItem::Char(byte) => rendered.push(*byte as char),
            OutputItem::Word(value) => {
                rendered.push_str(&value.to_string());
                rendered.push('\n');
            }
        }
    }
    rendered
}

/// Final machine snapshot: the register file, a window of data memory
/// and the rendered output buffer.
pub fn write_snapshot<W: Write>(writer: &mut W, cpu: &Cpu) -> std::io::Result<()> {
    writeln!(writer, "[Registers]")?;
    for (row, values) in cpu.registers().chunks(4).enumerate() {
        let fields: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(col, value)| format!("r{:02}={:08X}", row * 4 + col, value))
            .collect();
        writeln!(writer, "{}", fields.join(" "))?;
    }

    writeln!(writer)?;
    writeln!(writer, "[Memory @ 0x100]")?;
    for address in (0x100..0x140).step_by(4) {
        let word = cpu.data_memory().read_word(address).unwrap_or(0);
        writeln!(writer, "{:08X}: {:08X}", address, word)?;
    }

    writeln!(writer)?;
    writeln!(writer, "[Output buffer]")?;
    writeln!(writer, "{}", render_output(cpu.output()))?;
    Ok(())
}

pub fn snapshot_string(cpu: &Cpu) -> String {
    let mut buffer = Vec::new();
    // Writing into a Vec is infallible.
    let _ = write_snapshot(&mut buffer, cpu);
    String::from_utf8_lossy(&buffer).into_owned()
}
