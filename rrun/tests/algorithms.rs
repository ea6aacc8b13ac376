//! End-to-end runs of the programs in `algorithms/`: assemble the
//! source, boot the image, drive the CPU and compare the rendered
//! output stream.

use rcpu::Cpu;
use rrun::{render_output, snapshot_string, Tracer, STEP_CAP};

fn run_source(source: &str, input: Vec<u32>) -> (Cpu, Tracer, usize) {
    let assembly = rasm::assemble(source).unwrap();
    assert!(assembly.warnings.is_empty(), "{:?}", assembly.warnings);

    let mut cpu = rrun::boot(&assembly.program).unwrap();
    cpu.feed_input(input);

    let mut tracer = Tracer::new(&cpu);
    let steps = rrun::run(&mut cpu, &mut tracer, STEP_CAP).unwrap();
    (cpu, tracer, steps)
}

/// Same shape as `load_input` in bytes mode: raw bytes, NUL-terminated.
fn bytes_input(text: &str) -> Vec<u32> {
    let mut values: Vec<u32> = text.bytes().map(u32::from).collect();
    if values.last() != Some(&0) {
        values.push(0);
    }
    values
}

fn words_input(text: &str) -> Vec<u32> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.parse::<i64>().unwrap() as u32)
        .collect()
}

#[test]
fn hello_world() {
    let (cpu, _, _) = run_source(include_str!("../../algorithms/hello_world.asm"), vec![]);
    assert_eq!(render_output(cpu.output()), "Hello, World!");
}

#[test]
fn cat() {
    let input = bytes_input(include_str!("../../algorithms/cat_input.txt"));
    let (cpu, _, _) = run_source(include_str!("../../algorithms/cat.asm"), input);
    assert_eq!(render_output(cpu.output()), "foo\n");
}

#[test]
fn hello_user_name() {
    let input = bytes_input(include_str!("../../algorithms/hello_user_name_input.txt"));
    let (cpu, _, _) = run_source(
        include_str!("../../algorithms/hello_user_name.asm"),
        input,
    );
    assert_eq!(render_output(cpu.output()), "Hello, Alice!");
}

#[test]
fn sort() {
    let input = words_input(include_str!("../../algorithms/sort_input.txt"));
    let (cpu, _, _) = run_source(include_str!("../../algorithms/sort.asm"), input);
    assert_eq!(render_output(cpu.output()), "1\n2\n5\n7\n9\n");
}

#[test]
fn macro_showcase() {
    let (cpu, _, _) = run_source(include_str!("../../algorithms/macro_showcase.asm"), vec![]);
    assert_eq!(render_output(cpu.output()), "OK!\n");
}

#[test]
fn bare_halt_stops_after_two_ticks() {
    let (cpu, _, steps) = run_source(".text\nhalt\n", vec![]);
    assert_eq!(steps, 2);
    assert!(!cpu.running());
    assert!(cpu.output().is_empty());
}

#[test]
fn runs_are_deterministic() {
    let source = include_str!("../../algorithms/sort.asm");
    let input = words_input(include_str!("../../algorithms/sort_input.txt"));

    let (cpu_a, tracer_a, steps_a) = run_source(source, input.clone());
    let (cpu_b, tracer_b, steps_b) = run_source(source, input);

    assert_eq!(steps_a, steps_b);
    assert_eq!(tracer_a.lines(), tracer_b.lines());
    assert_eq!(snapshot_string(&cpu_a), snapshot_string(&cpu_b));
}

#[test]
fn trace_lines_have_the_documented_shape() {
    let (_, tracer, _) = run_source(include_str!("../../algorithms/hello_world.asm"), vec![]);

    assert!(!tracer.lines().is_empty());
    for line in tracer.lines() {
        assert!(line.starts_with("PC=0x"), "bad trace line: {}", line);
        assert!(line.contains(" MPC="), "bad trace line: {}", line);
        assert!(line.contains(" NZ="), "bad trace line: {}", line);
        assert!(line.contains(" IR=0x"), "bad trace line: {}", line);
    }
}

#[test]
fn snapshot_lists_registers_memory_and_output() {
    let (cpu, _, _) = run_source(include_str!("../../algorithms/hello_world.asm"), vec![]);
    let snapshot = snapshot_string(&cpu);

    assert!(snapshot.contains("[Registers]"));
    assert!(snapshot.contains("r00="));
    assert!(snapshot.contains("r31="));
    assert!(snapshot.contains("[Memory @ 0x100]"));
    assert!(snapshot.contains("[Output buffer]"));
    assert!(snapshot.contains("Hello, World!"));
}

#[test]
fn step_cap_trips_on_runaway_programs() {
    let assembly = rasm::assemble(".text\nspin: jal zero, spin\n").unwrap();
    let mut cpu = rrun::boot(&assembly.program).unwrap();
    let mut tracer = Tracer::new(&cpu);

    match rrun::run(&mut cpu, &mut tracer, 500) {
        Err(rrun::Error::StepCap(cap)) => assert_eq!(cap, 500),
        other => panic!("expected a step-cap trip, got {:?}", other.map(|_| ())),
    }
    assert!(cpu.running());
}
