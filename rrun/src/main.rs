#[macro_use]
extern crate clap;

use std::fs::File;
use std::io::BufWriter;
use std::process;

use clap::Arg;

use rbin::Program;
use rrun::{Error, InputMode, Tracer};

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("TEXT")
                .help("Sets the .text.bin image to execute")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("DATA")
                .help("Sets the .data.bin image to load")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("Optional file backing the memory-mapped input stream")
                .index(3),
        )
        .arg(
            Arg::with_name("input_mode")
                .long("input-mode")
                .takes_value(true)
                .value_name("MODE")
                .possible_values(&["bytes", "words"])
                .default_value("bytes")
                .help("How the input file is read"),
        )
        .arg(
            Arg::with_name("trace")
                .long("trace")
                .takes_value(true)
                .value_name("FILE")
                .help("Writes the execution trace log to FILE"),
        )
        .arg(
            Arg::with_name("snapshot")
                .long("snapshot")
                .takes_value(true)
                .value_name("FILE")
                .help("Writes the final machine snapshot to FILE"),
        )
        .get_matches();

    let text = matches.value_of("TEXT").unwrap();
    let data = matches.value_of("DATA").unwrap();
    let input = matches.value_of("INPUT");
    let mode: InputMode = matches
        .value_of("input_mode")
        .unwrap()
        .parse()
        .expect("clap restricts the values");

    let result = execute(
        text,
        data,
        input,
        mode,
        matches.value_of("trace"),
        matches.value_of("snapshot"),
    );

    if let Err(err) = result {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn execute(
    text: &str,
    data: &str,
    input: Option<&str>,
    mode: InputMode,
    trace_path: Option<&str>,
    snapshot_path: Option<&str>,
) -> Result<(), Error> {
    let program = Program::load(text, data)?;
    let mut cpu = rrun::boot(&program)?;

    if let Some(path) = input {
        cpu.feed_input(rrun::load_input(path, mode)?);
    }

    let mut tracer = Tracer::new(&cpu);
    let outcome = rrun::run(&mut cpu, &mut tracer, rrun::STEP_CAP);

    if let Some(path) = trace_path {
        tracer.write_to(&mut BufWriter::new(File::create(path)?))?;
    }
    if let Some(path) = snapshot_path {
        rrun::write_snapshot(&mut BufWriter::new(File::create(path)?), &cpu)?;
    }

    outcome?;
    print!("{}", rrun::render_output(cpu.output()));
    Ok(())
}
