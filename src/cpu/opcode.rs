//! Instruction implementations.
//!
//! One method per instruction form. Each consumes its own operand bytes,
//! performs the work, and returns the T-cycle cost of the form it actually
//! took (branching forms return the taken or not-taken cost accordingly).
//! Operand plumbing goes through `read8`/`write8` over [`Operand8`], so no
//! body special-cases `(HL)`.

use super::decode::{self, AluOp, Operand8, PrefixOp, Ptr, CC};
use super::register_file::{Flag, R16};
use super::{Cpu, ImeState, StepError};
use crate::bus::MemoryBus;

impl<B: MemoryBus> Cpu<B> {
    // --- fetch, stack, and operand plumbing ---

    pub(super) fn fetch_byte(&mut self) -> Result<u8, StepError> {
        let byte = self.bus.read_byte(self.regs.pc)?;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        Ok(byte)
    }

    pub(super) fn fetch_word(&mut self) -> Result<u16, StepError> {
        let lo = self.fetch_byte()?;
        let hi = self.fetch_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// High byte first; SP pre-decrements.
    pub(super) fn push_word(&mut self, word: u16) -> Result<(), StepError> {
        let [hi, lo] = word.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.bus.write_byte(self.regs.sp, hi)?;
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.bus.write_byte(self.regs.sp, lo)?;
        Ok(())
    }

    pub(super) fn pop_word(&mut self) -> Result<u16, StepError> {
        let lo = self.bus.read_byte(self.regs.sp)?;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.bus.read_byte(self.regs.sp)?;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read8(&mut self, operand: Operand8) -> Result<u8, StepError> {
        match operand {
            Operand8::Reg(r) => Ok(self.regs.r8(r)),
            Operand8::IndHL => Ok(self.bus.read_byte(self.regs.hl())?),
        }
    }

    fn write8(&mut self, operand: Operand8, value: u8) -> Result<(), StepError> {
        match operand {
            Operand8::Reg(r) => self.regs.set_r8(r, value),
            Operand8::IndHL => self.bus.write_byte(self.regs.hl(), value)?,
        }
        Ok(())
    }

    fn condition_met(&self, cc: CC) -> bool {
        match cc {
            CC::NZ => !self.regs.flag(Flag::Z),
            CC::Z => self.regs.flag(Flag::Z),
            CC::NC => !self.regs.flag(Flag::C),
            CC::C => self.regs.flag(Flag::C),
        }
    }

    fn ptr_target(&self, ptr: Ptr) -> u16 {
        match ptr {
            Ptr::BC => self.regs.r16(R16::BC),
            Ptr::DE => self.regs.r16(R16::DE),
            Ptr::HLInc | Ptr::HLDec => self.regs.hl(),
        }
    }

    /// The `HL` auto-update. Applied exactly once, after the memory access.
    fn ptr_update(&mut self, ptr: Ptr) {
        match ptr {
            Ptr::HLInc => self.regs.set_hl(self.regs.hl().wrapping_add(1)),
            Ptr::HLDec => self.regs.set_hl(self.regs.hl().wrapping_sub(1)),
            Ptr::BC | Ptr::DE => {}
        }
    }

    // --- 8-bit loads ---

    /// LD r,r' / LD r,(HL) / LD (HL),r
    pub(super) fn ld8(&mut self, dst: Operand8, src: Operand8) -> Result<u8, StepError> {
        let value = self.read8(src)?;
        self.write8(dst, value)?;
        Ok(if dst == Operand8::IndHL || src == Operand8::IndHL {
            8
        } else {
            4
        })
    }

    /// LD r,n / LD (HL),n
    pub(super) fn ld8_imm(&mut self, dst: Operand8) -> Result<u8, StepError> {
        let value = self.fetch_byte()?;
        self.write8(dst, value)?;
        Ok(if dst == Operand8::IndHL { 12 } else { 8 })
    }

    /// LD (rr),A — including the `(HL+)` and `(HL-)` forms.
    pub(super) fn ld_ptr_a(&mut self, ptr: Ptr) -> Result<u8, StepError> {
        let addr = self.ptr_target(ptr);
        self.bus.write_byte(addr, self.regs.a)?;
        self.ptr_update(ptr);
        Ok(8)
    }

    /// LD A,(rr) — including the `(HL+)` and `(HL-)` forms.
    pub(super) fn ld_a_ptr(&mut self, ptr: Ptr) -> Result<u8, StepError> {
        let addr = self.ptr_target(ptr);
        self.regs.a = self.bus.read_byte(addr)?;
        self.ptr_update(ptr);
        Ok(8)
    }

    /// LDH (n),A
    pub(super) fn ldh_imm_a(&mut self) -> Result<u8, StepError> {
        let offset = self.fetch_byte()?;
        self.bus.write_high(offset, self.regs.a)?;
        Ok(12)
    }

    /// LDH A,(n)
    pub(super) fn ldh_a_imm(&mut self) -> Result<u8, StepError> {
        let offset = self.fetch_byte()?;
        self.regs.a = self.bus.read_high(offset)?;
        Ok(12)
    }

    /// LD (C),A
    pub(super) fn ldh_c_a(&mut self) -> Result<u8, StepError> {
        self.bus.write_high(self.regs.c, self.regs.a)?;
        Ok(8)
    }

    /// LD A,(C)
    pub(super) fn ldh_a_c(&mut self) -> Result<u8, StepError> {
        self.regs.a = self.bus.read_high(self.regs.c)?;
        Ok(8)
    }

    /// LD (nn),A
    pub(super) fn ld_abs_a(&mut self) -> Result<u8, StepError> {
        let addr = self.fetch_word()?;
        self.bus.write_byte(addr, self.regs.a)?;
        Ok(16)
    }

    /// LD A,(nn)
    pub(super) fn ld_a_abs(&mut self) -> Result<u8, StepError> {
        let addr = self.fetch_word()?;
        self.regs.a = self.bus.read_byte(addr)?;
        Ok(16)
    }

    // --- 16-bit loads and stack plumbing ---

    /// LD rr,nn
    pub(super) fn ld_r16_n16(&mut self, rr: R16) -> Result<u8, StepError> {
        let word = self.fetch_word()?;
        self.regs.set_r16(rr, word);
        Ok(12)
    }

    /// LD (nn),SP
    pub(super) fn ld_abs_sp(&mut self) -> Result<u8, StepError> {
        let addr = self.fetch_word()?;
        self.bus.write_word(addr, self.regs.sp)?;
        Ok(20)
    }

    /// LD SP,HL
    pub(super) fn ld_sp_hl(&mut self) -> u8 {
        self.regs.sp = self.regs.hl();
        8
    }

    /// LD HL,SP+e8
    pub(super) fn ld_hl_sp_e8(&mut self) -> Result<u8, StepError> {
        let offset = self.fetch_byte()? as i8;
        let value = self.alu_sp_offset(offset);
        self.regs.set_hl(value);
        Ok(12)
    }

    pub(super) fn push_r16(&mut self, rr: R16) -> Result<u8, StepError> {
        let word = self.regs.r16(rr);
        self.push_word(word)?;
        Ok(16)
    }

    /// `POP AF` lands in `set_r16`, which masks the flag low nibble.
    pub(super) fn pop_r16(&mut self, rr: R16) -> Result<u8, StepError> {
        let word = self.pop_word()?;
        self.regs.set_r16(rr, word);
        Ok(12)
    }

    // --- 8-bit arithmetic ---

    /// The register/`(HL)`-operand arithmetic block.
    pub(super) fn alu_a(&mut self, op: AluOp, src: Operand8) -> Result<u8, StepError> {
        let y = self.read8(src)?;
        self.apply_alu(op, y);
        Ok(if src == Operand8::IndHL { 8 } else { 4 })
    }

    /// The immediate-operand twins of the arithmetic block.
    pub(super) fn alu_a_imm(&mut self, op: AluOp) -> Result<u8, StepError> {
        let y = self.fetch_byte()?;
        self.apply_alu(op, y);
        Ok(8)
    }

    fn apply_alu(&mut self, op: AluOp, y: u8) {
        let a = self.regs.a;
        let carry = self.regs.flag(Flag::C);
        match op {
            AluOp::Add => self.regs.a = self.alu_add(a, y, false),
            AluOp::Adc => self.regs.a = self.alu_add(a, y, carry),
            AluOp::Sub => self.regs.a = self.alu_sub(a, y, false),
            AluOp::Sbc => self.regs.a = self.alu_sub(a, y, carry),
            AluOp::And => self.regs.a = self.alu_and(a, y),
            AluOp::Xor => self.regs.a = self.alu_xor(a, y),
            AluOp::Or => self.regs.a = self.alu_or(a, y),
            // Compare is a subtract with the result dropped.
            AluOp::Cp => {
                self.alu_sub(a, y, false);
            }
        }
    }

    /// INC r / INC (HL). C survives.
    pub(super) fn inc8(&mut self, operand: Operand8) -> Result<u8, StepError> {
        let value = self.read8(operand)?;
        let result = self.alu_inc8(value);
        self.write8(operand, result)?;
        Ok(if operand == Operand8::IndHL { 12 } else { 4 })
    }

    /// DEC r / DEC (HL). C survives.
    pub(super) fn dec8(&mut self, operand: Operand8) -> Result<u8, StepError> {
        let value = self.read8(operand)?;
        let result = self.alu_dec8(value);
        self.write8(operand, result)?;
        Ok(if operand == Operand8::IndHL { 12 } else { 4 })
    }

    pub(super) fn daa(&mut self) -> u8 {
        self.alu_daa();
        4
    }

    pub(super) fn cpl(&mut self) -> u8 {
        self.regs.a = !self.regs.a;
        self.regs.set_flag(Flag::N, true);
        self.regs.set_flag(Flag::H, true);
        4
    }

    pub(super) fn scf(&mut self) -> u8 {
        self.regs.set_flag(Flag::N, false);
        self.regs.set_flag(Flag::H, false);
        self.regs.set_flag(Flag::C, true);
        4
    }

    pub(super) fn ccf(&mut self) -> u8 {
        let carry = self.regs.flag(Flag::C);
        self.regs.set_flag(Flag::N, false);
        self.regs.set_flag(Flag::H, false);
        self.regs.set_flag(Flag::C, !carry);
        4
    }

    // --- 16-bit arithmetic ---

    pub(super) fn inc16(&mut self, rr: R16) -> u8 {
        self.regs.set_r16(rr, self.regs.r16(rr).wrapping_add(1));
        8
    }

    pub(super) fn dec16(&mut self, rr: R16) -> u8 {
        self.regs.set_r16(rr, self.regs.r16(rr).wrapping_sub(1));
        8
    }

    pub(super) fn add_hl_r16(&mut self, rr: R16) -> u8 {
        let result = self.alu_add16(self.regs.hl(), self.regs.r16(rr));
        self.regs.set_hl(result);
        8
    }

    /// ADD SP,e8
    pub(super) fn add_sp_e8(&mut self) -> Result<u8, StepError> {
        let offset = self.fetch_byte()? as i8;
        self.regs.sp = self.alu_sp_offset(offset);
        Ok(16)
    }

    // --- rotates on A; unlike the prefixed forms, Z always reads clear ---

    pub(super) fn rlca(&mut self) -> u8 {
        self.regs.a = self.alu_rlc(self.regs.a);
        self.regs.set_flag(Flag::Z, false);
        4
    }

    pub(super) fn rrca(&mut self) -> u8 {
        self.regs.a = self.alu_rrc(self.regs.a);
        self.regs.set_flag(Flag::Z, false);
        4
    }

    pub(super) fn rla(&mut self) -> u8 {
        self.regs.a = self.alu_rl(self.regs.a);
        self.regs.set_flag(Flag::Z, false);
        4
    }

    pub(super) fn rra(&mut self) -> u8 {
        self.regs.a = self.alu_rr(self.regs.a);
        self.regs.set_flag(Flag::Z, false);
        4
    }

    // --- jumps and subroutines ---

    /// JR e8: signed displacement from the PC after the operand fetch.
    pub(super) fn jr_e8(&mut self) -> Result<u8, StepError> {
        let offset = self.fetch_byte()? as i8;
        self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
        Ok(12)
    }

    /// The displacement byte is consumed whether or not the branch is taken.
    pub(super) fn jr_cc_e8(&mut self, cc: CC) -> Result<u8, StepError> {
        let offset = self.fetch_byte()? as i8;
        if self.condition_met(cc) {
            self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
            Ok(12)
        } else {
            Ok(8)
        }
    }

    pub(super) fn jp_n16(&mut self) -> Result<u8, StepError> {
        self.regs.pc = self.fetch_word()?;
        Ok(16)
    }

    pub(super) fn jp_cc_n16(&mut self, cc: CC) -> Result<u8, StepError> {
        let addr = self.fetch_word()?;
        if self.condition_met(cc) {
            self.regs.pc = addr;
            Ok(16)
        } else {
            Ok(12)
        }
    }

    pub(super) fn jp_hl(&mut self) -> u8 {
        self.regs.pc = self.regs.hl();
        4
    }

    /// The pushed return address is the byte after the 3-byte call.
    pub(super) fn call_n16(&mut self) -> Result<u8, StepError> {
        let addr = self.fetch_word()?;
        self.push_word(self.regs.pc)?;
        self.regs.pc = addr;
        Ok(24)
    }

    pub(super) fn call_cc_n16(&mut self, cc: CC) -> Result<u8, StepError> {
        let addr = self.fetch_word()?;
        if self.condition_met(cc) {
            self.push_word(self.regs.pc)?;
            self.regs.pc = addr;
            Ok(24)
        } else {
            Ok(12)
        }
    }

    pub(super) fn ret(&mut self) -> Result<u8, StepError> {
        self.regs.pc = self.pop_word()?;
        Ok(16)
    }

    pub(super) fn ret_cc(&mut self, cc: CC) -> Result<u8, StepError> {
        if self.condition_met(cc) {
            self.regs.pc = self.pop_word()?;
            Ok(20)
        } else {
            Ok(8)
        }
    }

    /// RET plus an immediate (not delayed) interrupt enable.
    pub(super) fn reti(&mut self) -> Result<u8, StepError> {
        self.regs.pc = self.pop_word()?;
        self.ime = ImeState::Enabled;
        Ok(16)
    }

    pub(super) fn rst(&mut self, vector: u16) -> Result<u8, StepError> {
        self.push_word(self.regs.pc)?;
        self.regs.pc = vector;
        Ok(16)
    }

    // --- interrupt control and idle states ---

    pub(super) fn di(&mut self) -> u8 {
        self.ime = ImeState::Disabled;
        4
    }

    /// Takes effect one instruction late; the promotion happens in `step`.
    pub(super) fn ei(&mut self) -> u8 {
        if self.ime == ImeState::Disabled {
            self.ime = ImeState::PendingEnable;
        }
        4
    }

    pub(super) fn halt(&mut self) -> u8 {
        let pending = self.bus.interrupt_enable() & self.bus.interrupt_flags();
        if self.ime != ImeState::Enabled && !pending.is_empty() {
            // The halt is skipped and the next opcode byte decodes twice.
            self.halt_bug = true;
        } else {
            self.is_halted = true;
        }
        4
    }

    /// Modeled as a halt; the mandatory padding byte is consumed.
    pub(super) fn stop(&mut self) -> Result<u8, StepError> {
        let _ = self.fetch_byte()?;
        self.is_halted = true;
        Ok(4)
    }

    pub(super) fn nop(&self) -> u8 {
        4
    }

    // --- the CB-prefixed table ---

    /// Counts are totals including the prefix fetch: 8 with a register
    /// operand, 16 with `(HL)`, 12 for `BIT n,(HL)` which never writes back.
    pub(super) fn prefixed(&mut self) -> Result<u8, StepError> {
        let byte = self.fetch_byte()?;
        let (op, operand) = decode::prefixed(byte);
        let ind = operand == Operand8::IndHL;
        let value = self.read8(operand)?;
        let result = match op {
            PrefixOp::Rlc => self.alu_rlc(value),
            PrefixOp::Rrc => self.alu_rrc(value),
            PrefixOp::Rl => self.alu_rl(value),
            PrefixOp::Rr => self.alu_rr(value),
            PrefixOp::Sla => self.alu_sla(value),
            PrefixOp::Sra => self.alu_sra(value),
            PrefixOp::Swap => self.alu_swap(value),
            PrefixOp::Srl => self.alu_srl(value),
            PrefixOp::Bit(bit) => {
                self.alu_bit(bit, value);
                return Ok(if ind { 12 } else { 8 });
            }
            PrefixOp::Res(bit) => value & !(1 << bit),
            PrefixOp::Set(bit) => value | 1 << bit,
        };
        self.write8(operand, result)?;
        Ok(if ind { 16 } else { 8 })
    }
}
