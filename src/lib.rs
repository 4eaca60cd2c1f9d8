//! An instruction-accurate Sharp LR35902 (SM83) core — the CPU at the heart
//! of the original Game Boy.
//!
//! The crate owns fetch/decode/execute: the register file, the flag
//! semantics (including the half-carry and `DAA` subtleties), per-opcode
//! T-cycle timing with distinct taken/not-taken branch costs, and the
//! one-instruction `EI` delay. Everything memory-mapped — cartridge, video,
//! audio, timers, and the interrupt registers — lives behind the
//! [`MemoryBus`] trait supplied by the embedder.
//!
//! Drive it by calling [`Cpu::step`] in a loop. Each step executes exactly
//! one instruction, forwards the elapsed T-cycles to
//! [`MemoryBus::tick`], and returns them so the embedder can pace
//! peripherals and the frame clock. Peripherals raise interrupts by setting
//! IF bits (see [`Cpu::request_interrupt`]); the core services them at
//! instruction boundaries through the fixed vector table.

pub mod bus;
pub mod cpu;

pub use bus::{Access, BusFault, InterruptKind, MemoryBus};
pub use cpu::{Cpu, Flag, ImeState, Registers, StepError, R16, R8};
