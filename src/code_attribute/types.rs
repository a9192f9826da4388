use std::io::Cursor;

use binrw::{binrw, BinResult, BinWrite};

/// The JVM opcodes the compiler emits, with their operand encodings.
#[derive(Clone, Debug, Eq, PartialEq)]
#[binrw]
#[br(return_unexpected_error)]
#[brw(big)]
pub enum Instruction {
    #[brw(magic = 0x19u8)]
    Aload(u8),
    #[brw(magic = 0x2au8)]
    Aload0,
    #[brw(magic = 0x2bu8)]
    Aload1,
    #[brw(magic = 0x2cu8)]
    Aload2,
    #[brw(magic = 0x2du8)]
    Aload3,
    #[brw(magic = 0x3au8)]
    Astore(u8),
    #[brw(magic = 0x4bu8)]
    Astore0,
    #[brw(magic = 0x4cu8)]
    Astore1,
    #[brw(magic = 0x4du8)]
    Astore2,
    #[brw(magic = 0x4eu8)]
    Astore3,
    #[brw(magic = 0x10u8)]
    Bipush(i8),
    #[brw(magic = 0x59u8)]
    Dup,
    #[brw(magic = 0xb2u8)]
    Getstatic(u16),
    #[brw(magic = 0xa7u8)]
    Goto(i16),
    #[brw(magic = 0x60u8)]
    Iadd,
    #[brw(magic = 0x2u8)]
    Iconstm1,
    #[brw(magic = 0x3u8)]
    Iconst0,
    #[brw(magic = 0x4u8)]
    Iconst1,
    #[brw(magic = 0x5u8)]
    Iconst2,
    #[brw(magic = 0x6u8)]
    Iconst3,
    #[brw(magic = 0x7u8)]
    Iconst4,
    #[brw(magic = 0x8u8)]
    Iconst5,
    #[brw(magic = 0x6cu8)]
    Idiv,
    #[brw(magic = 0x9fu8)]
    IfIcmpeq(i16),
    #[brw(magic = 0xa0u8)]
    IfIcmpne(i16),
    #[brw(magic = 0xa1u8)]
    IfIcmplt(i16),
    #[brw(magic = 0xa2u8)]
    IfIcmpge(i16),
    #[brw(magic = 0xa3u8)]
    IfIcmpgt(i16),
    #[brw(magic = 0xa4u8)]
    IfIcmple(i16),
    #[brw(magic = 0x15u8)]
    Iload(u8),
    #[brw(magic = 0x1au8)]
    Iload0,
    #[brw(magic = 0x1bu8)]
    Iload1,
    #[brw(magic = 0x1cu8)]
    Iload2,
    #[brw(magic = 0x1du8)]
    Iload3,
    #[brw(magic = 0x68u8)]
    Imul,
    #[brw(magic = 0xb7u8)]
    Invokespecial(u16),
    #[brw(magic = 0xb8u8)]
    Invokestatic(u16),
    #[brw(magic = 0xb6u8)]
    Invokevirtual(u16),
    #[brw(magic = 0x36u8)]
    Istore(u8),
    #[brw(magic = 0x3bu8)]
    Istore0,
    #[brw(magic = 0x3cu8)]
    Istore1,
    #[brw(magic = 0x3du8)]
    Istore2,
    #[brw(magic = 0x3eu8)]
    Istore3,
    #[brw(magic = 0x64u8)]
    Isub,
    #[brw(magic = 0x12u8)]
    Ldc(u8),
    #[brw(magic = 0x13u8)]
    LdcW(u16),
    #[brw(magic = 0xbbu8)]
    New(u16),
    #[brw(magic = 0xb3u8)]
    Putstatic(u16),
    #[brw(magic = 0xb1u8)]
    Return,
    #[brw(magic = 0x11u8)]
    Sipush(i16),
    #[brw(magic = 0xc4u8)]
    Wide(WideInstruction),
}

/// Local-variable instructions behind the `wide` prefix (16-bit slot index).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[binrw]
#[brw(big)]
pub enum WideInstruction {
    #[brw(magic = 0x19u8)]
    Aload(u16),
    #[brw(magic = 0x3au8)]
    Astore(u16),
    #[brw(magic = 0x15u8)]
    Iload(u16),
    #[brw(magic = 0x36u8)]
    Istore(u16),
}

impl Instruction {
    /// Encoded size in the code array.
    pub fn byte_size(&self) -> u32 {
        match self {
            Instruction::Aload0
            | Instruction::Aload1
            | Instruction::Aload2
            | Instruction::Aload3
            | Instruction::Astore0
            | Instruction::Astore1
            | Instruction::Astore2
            | Instruction::Astore3
            | Instruction::Iload0
            | Instruction::Iload1
            | Instruction::Iload2
            | Instruction::Iload3
            | Instruction::Istore0
            | Instruction::Istore1
            | Instruction::Istore2
            | Instruction::Istore3
            | Instruction::Iconstm1
            | Instruction::Iconst0
            | Instruction::Iconst1
            | Instruction::Iconst2
            | Instruction::Iconst3
            | Instruction::Iconst4
            | Instruction::Iconst5
            | Instruction::Iadd
            | Instruction::Isub
            | Instruction::Imul
            | Instruction::Idiv
            | Instruction::Dup
            | Instruction::Return => 1,
            Instruction::Aload(_)
            | Instruction::Astore(_)
            | Instruction::Iload(_)
            | Instruction::Istore(_)
            | Instruction::Bipush(_)
            | Instruction::Ldc(_) => 2,
            Instruction::Sipush(_)
            | Instruction::LdcW(_)
            | Instruction::Getstatic(_)
            | Instruction::Putstatic(_)
            | Instruction::Invokespecial(_)
            | Instruction::Invokestatic(_)
            | Instruction::Invokevirtual(_)
            | Instruction::New(_)
            | Instruction::Goto(_)
            | Instruction::IfIcmpeq(_)
            | Instruction::IfIcmpne(_)
            | Instruction::IfIcmplt(_)
            | Instruction::IfIcmpge(_)
            | Instruction::IfIcmpgt(_)
            | Instruction::IfIcmple(_) => 3,
            Instruction::Wide(_) => 4,
        }
    }

    /// The same branch with a new relative offset; `None` for non-branches.
    pub fn with_branch_offset(&self, offset: i16) -> Option<Instruction> {
        Some(match self {
            Instruction::Goto(_) => Instruction::Goto(offset),
            Instruction::IfIcmpeq(_) => Instruction::IfIcmpeq(offset),
            Instruction::IfIcmpne(_) => Instruction::IfIcmpne(offset),
            Instruction::IfIcmplt(_) => Instruction::IfIcmplt(offset),
            Instruction::IfIcmpge(_) => Instruction::IfIcmpge(offset),
            Instruction::IfIcmpgt(_) => Instruction::IfIcmpgt(offset),
            Instruction::IfIcmple(_) => Instruction::IfIcmple(offset),
            _ => return None,
        })
    }
}

/// Byte address of every instruction in `instructions`.
pub fn byte_addresses(instructions: &[Instruction]) -> Vec<u32> {
    let mut addresses = Vec::with_capacity(instructions.len());
    let mut addr = 0u32;
    for instr in instructions {
        addresses.push(addr);
        addr += instr.byte_size();
    }
    addresses
}

/// Encode an instruction sequence into a code array.
pub fn assemble(instructions: &[Instruction]) -> BinResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    for instr in instructions {
        instr.write(&mut buf)?;
    }
    Ok(buf.into_inner())
}

/// Decode a code array back into instructions.
pub fn disassemble(code: &[u8]) -> BinResult<Vec<Instruction>> {
    use binrw::BinRead;
    let mut cursor = Cursor::new(code);
    let mut instructions = Vec::new();
    while (cursor.position() as usize) < code.len() {
        instructions.push(Instruction::read(&mut cursor)?);
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_encoding() {
        let instructions = vec![
            Instruction::Iconst0,
            Instruction::Bipush(-3),
            Instruction::Sipush(1000),
            Instruction::Ldc(4),
            Instruction::LdcW(300),
            Instruction::Istore(9),
            Instruction::Wide(WideInstruction::Istore(400)),
            Instruction::IfIcmpgt(6),
            Instruction::Getstatic(2),
            Instruction::Invokestatic(7),
            Instruction::Return,
        ];
        let code = assemble(&instructions).unwrap();
        let total: u32 = instructions.iter().map(|i| i.byte_size()).sum();
        assert_eq!(code.len() as u32, total);
    }

    #[test]
    fn wide_forms_use_prefix() {
        let code = assemble(&[
            Instruction::Wide(WideInstruction::Iload(0x0102)),
            Instruction::Wide(WideInstruction::Astore(0x0304)),
        ])
        .unwrap();
        assert_eq!(code, vec![0xc4, 0x15, 0x01, 0x02, 0xc4, 0x3a, 0x03, 0x04]);
    }

    #[test]
    fn branch_offsets_are_signed_big_endian() {
        let code = assemble(&[Instruction::Goto(-3)]).unwrap();
        assert_eq!(code, vec![0xa7, 0xff, 0xfd]);
    }

    #[test]
    fn disassemble_reverses_assemble() {
        let instructions = vec![
            Instruction::Iconst5,
            Instruction::Istore1,
            Instruction::Iload1,
            Instruction::Iconst3,
            Instruction::IfIcmplt(5),
            Instruction::Goto(3),
            Instruction::Return,
        ];
        let code = assemble(&instructions).unwrap();
        assert_eq!(disassemble(&code).unwrap(), instructions);
    }

    #[test]
    fn only_branches_take_offsets() {
        assert_eq!(
            Instruction::IfIcmpne(0).with_branch_offset(12),
            Some(Instruction::IfIcmpne(12))
        );
        assert_eq!(Instruction::Iadd.with_branch_offset(12), None);
        assert_eq!(Instruction::Return.with_branch_offset(0), None);
    }
}
