mod control;

use std::error::Error as StdError;
use std::fmt;

use crate::bus::{Bus, OutputItem};
use crate::constants;
use crate::memory::Memory;
use crate::microcode::{DecodeError, Rom};
use crate::{isa, Word};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Flags {
    pub z: bool,
    pub n: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum CpuError {
    Decode(DecodeError),
    Memory { address: u32 },
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CpuError::Decode(err) => err.fmt(f),
            CpuError::Memory { address } => {
                write!(f, "memory access outside the 64 KiB window: 0x{:08X}", address)
            }
        }
    }
}

impl StdError for CpuError {}

impl From<DecodeError> for CpuError {
    fn from(err: DecodeError) -> CpuError {
        CpuError::Decode(err)
    }
}

/// Why a bounded run loop returned.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StopReason {
    Halted,
    StepCap,
}

/// The RISCroll datapath: architectural state plus the microcode ROM.
///
/// The CPU itself is passive; [`step`](Cpu::step) executes exactly one
/// microinstruction (the decode dispatch resolves and runs the first
/// row of the decoded sequence within the same tick).
pub struct Cpu {
    pc: u32,
    ir: Word,
    mpc: u32,
    registers: [u32; constants::REGISTER_COUNT],
    flags: Flags,
    alu_out: i64,
    instr_mem: Memory,
    bus: Bus,
    rom: Rom,
    running: bool,
}

impl Cpu {
    /// Builds a CPU with the text segment placed at `entry` in
    /// instruction memory and the data segment at the bottom of data
    /// memory. Execution starts at `entry`.
    pub fn new(text: &[u8], entry: u32, data: &[u8]) -> Result<Cpu, CpuError> {
        let mut instr_mem = Memory::new(constants::INSTR_MEM_BYTES);
        instr_mem
            .load(entry, text)
            .map_err(|_| CpuError::Memory { address: entry })?;

        let mut ram = Memory::new(constants::DATA_MEM_BYTES);
        ram.load(0, data)
            .map_err(|_| CpuError::Memory { address: 0 })?;

        Ok(Cpu {
            pc: entry,
            ir: 0,
            mpc: constants::FETCH_MPC,
            registers: [0; constants::REGISTER_COUNT],
            flags: Flags::default(),
            alu_out: 0,
            instr_mem,
            bus: Bus::new(ram),
            rom: Rom::new(),
            running: true,
        })
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn ir(&self) -> Word {
        self.ir
    }

    pub fn mpc(&self) -> u32 {
        self.mpc
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn registers(&self) -> &[u32; constants::REGISTER_COUNT] {
        &self.registers
    }

    pub fn register(&self, index: usize) -> u32 {
        self.registers[index]
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn data_memory(&self) -> &Memory {
        self.bus.ram()
    }

    pub fn output(&self) -> &[OutputItem] {
        self.bus.output()
    }

    pub fn feed_input<I: IntoIterator<Item = u32>>(&mut self, values: I) {
        self.bus.feed_input(values);
    }

    /// Executes one tick of the control unit.
    pub fn step(&mut self) -> Result<(), CpuError> {
        if self.mpc == constants::DISPATCH_MPC {
            let opcode = isa::opcode_of(self.ir);
            let funct3 = isa::funct3_of(self.ir);
            let funct7 = isa::funct7_of(self.ir);
            self.mpc = self.rom.decode(opcode, funct3, funct7)?;
        }

        let mi = self.rom.get(self.mpc);
        control::execute(self, &mi)
    }

    /// Drives [`step`](Cpu::step) until the machine halts or `step_cap`
    /// ticks have elapsed.
    pub fn run(&mut self, step_cap: usize) -> Result<StopReason, CpuError> {
        let mut steps = 0;
        while self.running {
            if steps >= step_cap {
                return Ok(StopReason::StepCap);
            }
            self.step()?;
            steps += 1;
        }
        Ok(StopReason::Halted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{
        encode_b, encode_i, encode_j, encode_r, encode_s, encode_sys, encode_u, Mnemonic::*,
    };
    use byteorder::ByteOrder;
    use util::Endian;

    const T0: u8 = 5;
    const T1: u8 = 6;
    const T2: u8 = 7;

    fn cpu_with(words: &[Word]) -> Cpu {
        cpu_at(0, words, &[])
    }

    fn cpu_at(entry: u32, words: &[Word], data: &[u8]) -> Cpu {
        let mut text = vec![0u8; words.len() * 4];
        Endian::write_u32_into(words, &mut text);
        Cpu::new(&text, entry, data).unwrap()
    }

    fn run_to_halt(cpu: &mut Cpu) {
        assert_eq!(cpu.run(10_000), Ok(StopReason::Halted));
    }

    #[test]
    fn halt_stops_after_two_ticks() {
        let mut cpu = cpu_with(&[encode_sys(Halt)]);
        cpu.step().unwrap();
        assert!(cpu.running());
        cpu.step().unwrap();
        assert!(!cpu.running());
        assert!(cpu.output().is_empty());
    }

    #[test]
    fn add_produces_sum_and_flags() {
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, 42),
            encode_i(Addi, T1, 0, 64),
            encode_r(Add, T2, T0, T1),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T2 as usize), 106);
        assert_eq!(cpu.flags(), Flags { z: false, n: false });
    }

    #[test]
    fn sub_below_zero_sets_negative_flag() {
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, 1),
            encode_i(Addi, T1, 0, 2),
            encode_r(Sub, T2, T0, T1),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T2 as usize), 0xFFFF_FFFF);
        assert_eq!(cpu.flags(), Flags { z: false, n: true });
    }

    #[test]
    fn writeback_to_register_zero_is_suppressed() {
        let mut cpu = cpu_with(&[encode_i(Addi, 0, 0, 99), encode_sys(Halt)]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(0), 0);
    }

    #[test]
    fn load_path_does_not_suppress_register_zero() {
        // Only the writeback path guards rd=0; a load naming rd=0
        // really does clobber the register.
        let mut cpu = cpu_at(0, &[encode_i(Lw, 0, 0, 0x20), encode_sys(Halt)], &[]);
        let mut cpu2 = {
            let mut data = vec![0u8; 0x40];
            Endian::write_u32(&mut data[0x20..0x24], 77);
            cpu_at(0, &[encode_i(Lw, 0, 0, 0x20), encode_sys(Halt)], &data)
        };
        run_to_halt(&mut cpu);
        run_to_halt(&mut cpu2);
        assert_eq!(cpu.register(0), 0);
        assert_eq!(cpu2.register(0), 77);
    }

    #[test]
    fn branch_taken_lands_on_label() {
        // 0: beq zero, zero, +12   -> 12
        // 4: addi t0, zero, 1      (skipped)
        // 8: halt
        // 12: addi t0, zero, 2
        // 16: jal zero, -8         -> 8
        let mut cpu = cpu_with(&[
            encode_b(Beq, 0, 0, 12),
            encode_i(Addi, T0, 0, 1),
            encode_sys(Halt),
            encode_i(Addi, T0, 0, 2),
            encode_j(Jal, 0, -8),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T0 as usize), 2);
    }

    #[test]
    fn branch_not_taken_falls_through() {
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, 1),
            encode_b(Beq, T0, 0, 8),
            encode_i(Addi, T1, 0, 5),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T1 as usize), 5);
    }

    #[test]
    fn signed_compare_branches() {
        // t0 = -1, t1 = 1; ble t0, t1 must branch.
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, -1),
            encode_i(Addi, T1, 0, 1),
            encode_b(Ble, T0, T1, 8),
            encode_sys(Halt),
            encode_i(Addi, T2, 0, 9),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T2 as usize), 9);
    }

    #[test]
    fn jal_links_and_jumps() {
        // 8: jal ra, +8 -> 16, ra = 12
        let mut cpu = cpu_at(
            8,
            &[encode_j(Jal, 1, 8), encode_sys(Halt), encode_sys(Halt)],
            &[],
        );
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(1), 12);
        assert_eq!(cpu.pc(), 20);
    }

    #[test]
    fn jal_to_register_zero_discards_link() {
        let mut cpu = cpu_with(&[encode_j(Jal, 0, 4), encode_sys(Halt)]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(0), 0);
    }

    #[test]
    fn jalr_links_current_pc_and_jumps() {
        // 0: addi t0, zero, 16
        // 4: jalr ra, t0, 0   -> 16, ra = 8
        // 8: halt (skipped)
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, 16),
            encode_i(Jalr, 1, T0, 0),
            encode_sys(Halt),
            encode_sys(Halt),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(1), 8);
        assert_eq!(cpu.pc(), 20);
    }

    #[test]
    fn store_and_load_roundtrip_memory() {
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, 0x7B),
            encode_s(Sw, T0, 0, 0x40),
            encode_i(Lw, T1, 0, 0x40),
            encode_s(Sb, T0, 0, 0x50),
            encode_i(Lb, T2, 0, 0x50),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T1 as usize), 0x7B);
        assert_eq!(cpu.register(T2 as usize), 0x7B);
        assert_eq!(cpu.data_memory().read_word(0x40), Ok(0x7B));
    }

    #[test]
    fn byte_load_sign_extends() {
        let mut cpu = cpu_at(
            0,
            &[encode_i(Lb, T0, 0, 0x10), encode_sys(Halt)],
            &{
                let mut data = vec![0u8; 0x20];
                data[0x10] = 0x80;
                data
            },
        );
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T0 as usize), 0xFFFF_FF80);
    }

    #[test]
    fn mmio_input_pops_and_defaults_to_zero() {
        let mut cpu = cpu_with(&[
            encode_i(Lw, T0, 0, 0x1),
            encode_i(Lw, T1, 0, 0x1),
            encode_sys(Halt),
        ]);
        cpu.feed_input(vec![31337]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T0 as usize), 31337);
        assert_eq!(cpu.register(T1 as usize), 0);
    }

    #[test]
    fn mmio_output_records_width() {
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, 65),
            encode_s(Sb, T0, 0, 0x2),
            encode_s(Sw, T0, 0, 0x2),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(
            cpu.output(),
            &[OutputItem::Char(b'A'), OutputItem::Word(65)]
        );
    }

    #[test]
    fn lui_addi_materialises_address() {
        let target: u32 = 0x0000_3204;
        let mut cpu = cpu_with(&[
            encode_u(Lui, T0, target & 0xFFFF_F000),
            encode_i(Addi, T0, T0, (target & 0xFFF) as i32),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T0 as usize), target);
    }

    #[test]
    fn division_by_zero_writes_zero() {
        let mut cpu = cpu_with(&[
            encode_i(Addi, T0, 0, 10),
            encode_r(Div, T2, T0, T1),
            encode_sys(Halt),
        ]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T2 as usize), 0);
        assert!(cpu.flags().z);
    }

    #[test]
    fn unknown_opcode_is_a_decode_error() {
        let mut cpu = cpu_with(&[0x0000_005B]);
        cpu.step().unwrap();
        let err = cpu.step().unwrap_err();
        match err {
            CpuError::Decode(inner) => assert_eq!(inner.opcode, 0x5B),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn step_cap_reports_without_halting() {
        // jal zero, 0 spins forever.
        let mut cpu = cpu_with(&[encode_j(Jal, 0, 0)]);
        assert_eq!(cpu.run(100), Ok(StopReason::StepCap));
        assert!(cpu.running());
    }

    #[test]
    fn execution_starts_at_entry_point() {
        let mut cpu = cpu_at(0x80, &[encode_i(Addi, T0, 0, 3), encode_sys(Halt)], &[]);
        run_to_halt(&mut cpu);
        assert_eq!(cpu.register(T0 as usize), 3);
        assert_eq!(cpu.pc(), 0x88);
    }
}
