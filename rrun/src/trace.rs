use rcpu::Cpu;

/// Passive observer of the CPU. After every tick in which the PC
/// changed it records one line of machine state together with the
/// registers that changed since the previous recorded line.
pub struct Tracer {
    last_pc: u32,
    last_registers: [u32; 32],
    lines: Vec<String>,
}

impl Tracer {
    pub fn new(cpu: &Cpu) -> Tracer {
        Tracer {
            last_pc: cpu.pc(),
            last_registers: *cpu.registers(),
            lines: Vec::new(),
        }
    }

    pub fn observe(&mut self, cpu: &Cpu) {
        if cpu.pc() == self.last_pc {
            return;
        }
        self.last_pc = cpu.pc();

        let flags = cpu.flags();
        let mut parts = vec![format!(
            "PC=0x{:08X}({}) MPC={} NZ={}{} IR=0x{:08X}({})",
            cpu.pc(),
            cpu.pc(),
            cpu.mpc(),
            flags.n as u8,
            flags.z as u8,
            cpu.ir(),
            cpu.ir(),
        )];

        for (index, (old, new)) in self
            .last_registers
            .iter()
            .zip(cpu.registers().iter())
            .enumerate()
        {
            if old != new {
                parts.push(format!("r{:02}={:08X}({})", index, new, new));
            }
        }
        self.last_registers = *cpu.registers();

        self.lines.push(parts.join(" "));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines[..]
    }

    pub fn write_to<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for line in &self.lines {
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }
}
