//! The execution core: fetch, decode, execute.

mod alu;
mod decode;
mod opcode;
mod register_file;

use std::fmt;

use enumset::EnumSet;
use serde::{Deserialize, Serialize};

use crate::bus::{BusFault, InterruptKind, MemoryBus};

pub use register_file::{Flag, Registers, R16, R8};

/// The master interrupt-enable latch.
///
/// `IME` gates all interrupt service; the IE byte at `0xFFFF` stays on the
/// bus and selects lines individually. `PendingEnable` implements the `EI`
/// delay: `EI` parks the latch here and the next [`Cpu::step`] promotes it,
/// so the enable lands one instruction after the opcode. `DI` and `RETI`
/// act immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImeState {
    Enabled,
    Disabled,
    PendingEnable,
}

/// A fatal condition surfaced by [`Cpu::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    /// The fetched byte does not name an instruction. `prefixed` tells
    /// whether the byte came after a `0xCB` prefix.
    UnknownOpcode { opcode: u8, prefixed: bool },
    /// The bus reported an unmapped access.
    Bus(BusFault),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::UnknownOpcode { opcode, prefixed } => {
                let table = if *prefixed { "prefixed" } else { "primary" };
                write!(f, "unknown {table} opcode {opcode:#04X}")
            }
            StepError::Bus(fault) => fault.fmt(f),
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StepError::Bus(fault) => Some(fault),
            StepError::UnknownOpcode { .. } => None,
        }
    }
}

impl From<BusFault> for StepError {
    fn from(fault: BusFault) -> Self {
        StepError::Bus(fault)
    }
}

/// The SM83 core. Owns the register file and the IME latch; everything
/// memory-mapped lives behind the bus.
#[derive(Serialize, Deserialize)]
pub struct Cpu<B: MemoryBus> {
    pub regs: Registers,
    pub bus: B,
    pub ime: ImeState,
    pub is_halted: bool,
    /// Latched by a `HALT` that found `IE & IF` pending while IME was off;
    /// makes the next fetch leave PC in place so one byte decodes twice.
    halt_bug: bool,
    cycle_count: u64,
}

impl<B: MemoryBus> Cpu<B> {
    /// Registers start zeroed with `SP = 0xFFFE` and `PC = 0`; the embedder
    /// points `regs.pc` at its entry point.
    pub fn new(bus: B) -> Self {
        Cpu {
            regs: Registers::create(),
            bus,
            ime: ImeState::Disabled,
            is_halted: false,
            halt_bug: false,
            cycle_count: 0,
        }
    }

    /// Monotonic tally of T-cycles over all completed steps.
    pub fn cycles(&self) -> u64 {
        self.cycle_count
    }

    /// Raise an interrupt line: sets the matching IF bit on the bus.
    pub fn request_interrupt(&mut self, kind: InterruptKind) {
        self.bus.request_interrupt(kind);
    }

    fn pending_interrupts(&self) -> EnumSet<InterruptKind> {
        self.bus.interrupt_enable() & self.bus.interrupt_flags()
    }

    /// Execute exactly one instruction (or one idle halt cycle) and return
    /// the elapsed T-cycles, including the 20 of a serviced interrupt.
    pub fn step(&mut self) -> Result<u8, StepError> {
        let mut t_cycles = 0u8;

        if self.ime == ImeState::Enabled {
            // EnumSet iterates in ascending bit order, which is exactly the
            // service priority: VBlank first, Joypad last.
            if let Some(kind) = self.pending_interrupts().iter().next() {
                self.service_interrupt(kind)?;
                t_cycles += 20;
            }
        } else if self.is_halted && !self.pending_interrupts().is_empty() {
            // A pending line releases the halt even with IME off; the
            // handler is not entered.
            self.is_halted = false;
        }

        if self.ime == ImeState::PendingEnable {
            self.ime = ImeState::Enabled;
        }

        if self.is_halted {
            self.bus.tick(4);
            self.cycle_count += 4;
            return Ok(4);
        }

        let opcode = self.bus.read_byte(self.regs.pc)?;
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        let executed = self.execute(opcode)?;
        assert!(
            executed % 4 == 0 && executed <= 24,
            "unexpected t-cycle count {executed} for opcode {opcode:#04X}"
        );
        self.trace_state();
        self.bus.tick(executed);
        t_cycles += executed;
        self.cycle_count += t_cycles as u64;
        Ok(t_cycles)
    }

    /// Enter the handler for `kind`: acknowledge the IF bit, drop IME, push
    /// PC, and jump to the vector. Costs 20 T-cycles.
    fn service_interrupt(&mut self, kind: InterruptKind) -> Result<(), StepError> {
        self.ime = ImeState::Disabled;
        self.is_halted = false;
        self.bus.clear_interrupt(kind);
        self.push_word(self.regs.pc)?;
        self.regs.pc = kind.vector();
        self.bus.tick(20);
        Ok(())
    }

    fn trace_state(&self) {
        if log::log_enabled!(log::Level::Trace) {
            let at = |offset: u16| {
                self.bus
                    .read_byte(self.regs.pc.wrapping_add(offset))
                    .unwrap_or(0xFF)
            };
            log::trace!(
                "IME:{:?} HALT:{} A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X} PCMEM:{:02X},{:02X},{:02X},{:02X}",
                self.ime,
                self.is_halted,
                self.regs.a,
                self.regs.f(),
                self.regs.b,
                self.regs.c,
                self.regs.d,
                self.regs.e,
                self.regs.h,
                self.regs.l,
                self.regs.sp,
                self.regs.pc,
                at(0),
                at(1),
                at(2),
                at(3)
            );
        }
    }

    /// Execute one instruction and return its T-cycle cost.
    ///
    /// Precondition: PC points just past the opcode byte; any operand bytes
    /// are consumed by the instruction method.
    ///
    /// ref: https://gbdev.io/gb-opcodes//optables/
    fn execute(&mut self, opcode: u8) -> Result<u8, StepError> {
        match opcode {
            // --- misc / control ---
            0x00 => Ok(self.nop()),
            0x10 => self.stop(),
            0x27 => Ok(self.daa()),
            0x2F => Ok(self.cpl()),
            0x37 => Ok(self.scf()),
            0x3F => Ok(self.ccf()),
            0x76 => Ok(self.halt()),
            0xF3 => Ok(self.di()),
            0xFB => Ok(self.ei()),
            0xCB => self.prefixed(),

            // --- relative jumps ---
            0x18 => self.jr_e8(),
            0x20 | 0x28 | 0x30 | 0x38 => self.jr_cc_e8(decode::condition(opcode)),

            // --- 16-bit loads and stack plumbing ---
            0x01 | 0x11 | 0x21 | 0x31 => self.ld_r16_n16(decode::pair(opcode)),
            0x08 => self.ld_abs_sp(),
            0xC1 | 0xD1 | 0xE1 | 0xF1 => self.pop_r16(decode::pair_stk(opcode)),
            0xC5 | 0xD5 | 0xE5 | 0xF5 => self.push_r16(decode::pair_stk(opcode)),
            0xF8 => self.ld_hl_sp_e8(),
            0xF9 => Ok(self.ld_sp_hl()),

            // --- indirect loads through register-pair pointers ---
            0x02 | 0x12 | 0x22 | 0x32 => self.ld_ptr_a(decode::pointer(opcode)),
            0x0A | 0x1A | 0x2A | 0x3A => self.ld_a_ptr(decode::pointer(opcode)),

            // --- 8-bit immediate loads ---
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                self.ld8_imm(decode::dst8(opcode))
            }

            // --- high-page and absolute loads ---
            0xE0 => self.ldh_imm_a(),
            0xF0 => self.ldh_a_imm(),
            0xE2 => self.ldh_c_a(),
            0xF2 => self.ldh_a_c(),
            0xEA => self.ld_abs_a(),
            0xFA => self.ld_a_abs(),

            // --- 16-bit arithmetic ---
            0x03 | 0x13 | 0x23 | 0x33 => Ok(self.inc16(decode::pair(opcode))),
            0x0B | 0x1B | 0x2B | 0x3B => Ok(self.dec16(decode::pair(opcode))),
            0x09 | 0x19 | 0x29 | 0x39 => Ok(self.add_hl_r16(decode::pair(opcode))),
            0xE8 => self.add_sp_e8(),

            // --- 8-bit inc/dec ---
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                self.inc8(decode::dst8(opcode))
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                self.dec8(decode::dst8(opcode))
            }

            // --- rotates on A ---
            0x07 => Ok(self.rlca()),
            0x0F => Ok(self.rrca()),
            0x17 => Ok(self.rla()),
            0x1F => Ok(self.rra()),

            // --- register-to-register loads (0x76 is HALT, handled above) ---
            0x40..=0x7F => self.ld8(decode::dst8(opcode), decode::src8(opcode)),

            // --- accumulator arithmetic, register or (HL) operand ---
            0x80..=0xBF => self.alu_a(decode::alu(opcode), decode::src8(opcode)),

            // --- immediate-operand arithmetic ---
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                self.alu_a_imm(decode::alu(opcode))
            }

            // --- returns, jumps, calls ---
            0xC0 | 0xC8 | 0xD0 | 0xD8 => self.ret_cc(decode::condition(opcode)),
            0xC9 => self.ret(),
            0xD9 => self.reti(),
            0xC2 | 0xCA | 0xD2 | 0xDA => self.jp_cc_n16(decode::condition(opcode)),
            0xC3 => self.jp_n16(),
            0xE9 => Ok(self.jp_hl()),
            0xC4 | 0xCC | 0xD4 | 0xDC => self.call_cc_n16(decode::condition(opcode)),
            0xCD => self.call_n16(),

            // --- restart vectors ---
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.rst(decode::rst_vector(opcode))
            }

            // Holes in the primary table.
            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                Err(StepError::UnknownOpcode {
                    opcode,
                    prefixed: false,
                })
            }
        }
    }
}
