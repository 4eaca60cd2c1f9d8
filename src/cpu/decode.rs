//! Pure mappings from opcode bit fields to operand selectors.
//!
//! The 8-bit opcode packs its operands into fixed fields: bits 2-0 and 5-3
//! select an 8-bit slot (where `0b110` means the byte at `HL`), bits 5-4 a
//! register pair, bits 4-3 a branch condition, and bits 5-3 of the
//! arithmetic rows a sub-operation. Nothing here touches CPU state; the
//! executor calls these and feeds the result to its unified `read8`/`write8`
//! primitives, so no instruction body special-cases `(HL)`.

use super::register_file::{R16, R8};

/// An 8-bit operand slot: a register, or the byte addressed by `HL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    Reg(R8),
    IndHL,
}

/// An indirection through a register pair, including the auto-updating
/// `HL` forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ptr {
    BC,
    DE,
    /// `(HL+)`: `HL` is incremented after the access.
    HLInc,
    /// `(HL-)`: `HL` is decremented after the access.
    HLDec,
}

/// A branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CC {
    NZ,
    Z,
    NC,
    C,
}

/// The accumulator-arithmetic sub-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// An operation from the `0xCB`-prefixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit(u8),
    Res(u8),
    Set(u8),
}

fn operand8(bits: u8) -> Operand8 {
    match bits & 0x07 {
        0 => Operand8::Reg(R8::B),
        1 => Operand8::Reg(R8::C),
        2 => Operand8::Reg(R8::D),
        3 => Operand8::Reg(R8::E),
        4 => Operand8::Reg(R8::H),
        5 => Operand8::Reg(R8::L),
        6 => Operand8::IndHL,
        _ => Operand8::Reg(R8::A),
    }
}

/// The source slot, bits 2-0.
pub fn src8(opcode: u8) -> Operand8 {
    operand8(opcode)
}

/// The destination slot, bits 5-3.
pub fn dst8(opcode: u8) -> Operand8 {
    operand8(opcode >> 3)
}

/// The register-pair slot, bits 5-4, as used everywhere but the push/pop
/// columns.
pub fn pair(opcode: u8) -> R16 {
    match (opcode >> 4) & 0x03 {
        0 => R16::BC,
        1 => R16::DE,
        2 => R16::HL,
        _ => R16::SP,
    }
}

/// The push/pop register-pair slot: `0b11` selects `AF` instead of `SP`.
pub fn pair_stk(opcode: u8) -> R16 {
    match (opcode >> 4) & 0x03 {
        0 => R16::BC,
        1 => R16::DE,
        2 => R16::HL,
        _ => R16::AF,
    }
}

/// The auto-pointer slot of the indirect accumulator loads, bits 5-4.
pub fn pointer(opcode: u8) -> Ptr {
    match (opcode >> 4) & 0x03 {
        0 => Ptr::BC,
        1 => Ptr::DE,
        2 => Ptr::HLInc,
        _ => Ptr::HLDec,
    }
}

/// The branch condition, bits 4-3.
pub fn condition(opcode: u8) -> CC {
    match (opcode >> 3) & 0x03 {
        0 => CC::NZ,
        1 => CC::Z,
        2 => CC::NC,
        _ => CC::C,
    }
}

/// The accumulator-arithmetic sub-operation, bits 5-3.
pub fn alu(opcode: u8) -> AluOp {
    match (opcode >> 3) & 0x07 {
        0 => AluOp::Add,
        1 => AluOp::Adc,
        2 => AluOp::Sub,
        3 => AluOp::Sbc,
        4 => AluOp::And,
        5 => AluOp::Xor,
        6 => AluOp::Or,
        _ => AluOp::Cp,
    }
}

/// The restart target encoded in bits 5-3 of an `RST` opcode.
pub fn rst_vector(opcode: u8) -> u16 {
    (opcode & 0x38) as u16
}

/// Decode the byte following a `0xCB` prefix. Bits 7-6 pick the group,
/// bits 5-3 the sub-operation or bit index, bits 2-0 the operand.
pub fn prefixed(byte: u8) -> (PrefixOp, Operand8) {
    let sel = (byte >> 3) & 0x07;
    let op = match byte >> 6 {
        0 => match sel {
            0 => PrefixOp::Rlc,
            1 => PrefixOp::Rrc,
            2 => PrefixOp::Rl,
            3 => PrefixOp::Rr,
            4 => PrefixOp::Sla,
            5 => PrefixOp::Sra,
            6 => PrefixOp::Swap,
            _ => PrefixOp::Srl,
        },
        1 => PrefixOp::Bit(sel),
        2 => PrefixOp::Res(sel),
        _ => PrefixOp::Set(sel),
    };
    (op, src8(byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_slots() {
        assert_eq!(src8(0x78), Operand8::Reg(R8::B));
        assert_eq!(src8(0x7E), Operand8::IndHL);
        assert_eq!(src8(0x7F), Operand8::Reg(R8::A));
        assert_eq!(dst8(0x36), Operand8::IndHL);
        assert_eq!(dst8(0x06), Operand8::Reg(R8::B));
        assert_eq!(dst8(0x3E), Operand8::Reg(R8::A));
    }

    #[test]
    fn pair_slots_differ_in_the_top_row() {
        assert_eq!(pair(0x31), R16::SP);
        assert_eq!(pair_stk(0xF1), R16::AF);
        assert_eq!(pair(0x01), R16::BC);
        assert_eq!(pair_stk(0xC1), R16::BC);
        assert_eq!(pair(0x21), R16::HL);
    }

    #[test]
    fn pointer_slots() {
        assert_eq!(pointer(0x02), Ptr::BC);
        assert_eq!(pointer(0x1A), Ptr::DE);
        assert_eq!(pointer(0x22), Ptr::HLInc);
        assert_eq!(pointer(0x3A), Ptr::HLDec);
    }

    #[test]
    fn conditions() {
        assert_eq!(condition(0x20), CC::NZ);
        assert_eq!(condition(0x28), CC::Z);
        assert_eq!(condition(0x30), CC::NC);
        assert_eq!(condition(0x38), CC::C);
        assert_eq!(condition(0xC0), CC::NZ);
        assert_eq!(condition(0xD8), CC::C);
    }

    #[test]
    fn alu_rows() {
        assert_eq!(alu(0x80), AluOp::Add);
        assert_eq!(alu(0x8F), AluOp::Adc);
        assert_eq!(alu(0x96), AluOp::Sub);
        assert_eq!(alu(0x9F), AluOp::Sbc);
        assert_eq!(alu(0xA0), AluOp::And);
        assert_eq!(alu(0xAF), AluOp::Xor);
        assert_eq!(alu(0xB0), AluOp::Or);
        assert_eq!(alu(0xFE), AluOp::Cp);
    }

    #[test]
    fn rst_vectors() {
        assert_eq!(rst_vector(0xC7), 0x00);
        assert_eq!(rst_vector(0xCF), 0x08);
        assert_eq!(rst_vector(0xE7), 0x20);
        assert_eq!(rst_vector(0xFF), 0x38);
    }

    #[test]
    fn prefixed_table() {
        assert_eq!(prefixed(0x00), (PrefixOp::Rlc, Operand8::Reg(R8::B)));
        assert_eq!(prefixed(0x0E), (PrefixOp::Rrc, Operand8::IndHL));
        assert_eq!(prefixed(0x11), (PrefixOp::Rl, Operand8::Reg(R8::C)));
        assert_eq!(prefixed(0x1F), (PrefixOp::Rr, Operand8::Reg(R8::A)));
        assert_eq!(prefixed(0x22), (PrefixOp::Sla, Operand8::Reg(R8::D)));
        assert_eq!(prefixed(0x2B), (PrefixOp::Sra, Operand8::Reg(R8::E)));
        assert_eq!(prefixed(0x37), (PrefixOp::Swap, Operand8::Reg(R8::A)));
        assert_eq!(prefixed(0x3C), (PrefixOp::Srl, Operand8::Reg(R8::H)));
        assert_eq!(prefixed(0x7E), (PrefixOp::Bit(7), Operand8::IndHL));
        assert_eq!(prefixed(0x87), (PrefixOp::Res(0), Operand8::Reg(R8::A)));
        assert_eq!(prefixed(0xFD), (PrefixOp::Set(7), Operand8::Reg(R8::L)));
    }
}
