#[macro_use]
extern crate clap;

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Arg;

#[derive(Debug)]
enum Error {
    Asm(rasm::Error),
    Io(std::io::Error, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, path) => {
                writeln!(f, "Accessing \"{}\" failed: {}", path.display(), err)
            }
            Error::Asm(err) => {
                writeln!(f, "Assembly failed:")?;
                write!(f, "{}", err)
            }
        }
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("SOURCE")
                .help("Sets the assembly source file to translate")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Path prefix for the emitted .text.bin/.data.bin images and listings")
                .required(true)
                .index(2),
        )
        .get_matches();

    let source = matches.value_of("SOURCE").unwrap();
    let output = matches.value_of("OUTPUT").unwrap();

    if let Err(err) = translate(source, output) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn translate(source: &str, prefix: &str) -> Result<(), Error> {
    let source_path = PathBuf::from(source);
    let input = fs::read_to_string(&source_path)
        .map_err(|err| Error::Io(err, source_path.clone()))?;

    let assembly = rasm::assemble(&input).map_err(Error::Asm)?;

    for warning in &assembly.warnings {
        eprintln!("warning: {}", warning);
    }

    rbin::write_artifacts(
        prefix,
        &assembly.program,
        &assembly.text_listing,
        &assembly.data_listing,
    )
    .map_err(|err| Error::Io(err, PathBuf::from(prefix)))?;

    println!(".text and .data images written to {}.*", prefix);
    Ok(())
}
