use std::io;

use crate::ir::{Instruction, Module, Opcode};

/// Byte written for opcodes missing from [`OPCODE_BYTES`].
pub const UNMAPPED: u8 = 0xFF;

pub const OPCODE_BYTES: &[(Opcode, u8)] = &[
    (Opcode::IConst, 0x01),
    (Opcode::SConst, 0x03),
    (Opcode::Load, 0x10),
    (Opcode::Store, 0x11),
    (Opcode::Add, 0x20),
    (Opcode::Sub, 0x21),
    (Opcode::Mul, 0x22),
    (Opcode::Div, 0x23),
    (Opcode::Mod, 0x24),
    (Opcode::CmpEq, 0x30),
    (Opcode::CmpNe, 0x31),
    (Opcode::CmpLt, 0x32),
    (Opcode::CmpLe, 0x33),
    (Opcode::CmpGt, 0x34),
    (Opcode::CmpGe, 0x35),
    (Opcode::And, 0x40),
    (Opcode::Or, 0x41),
    (Opcode::Not, 0x42),
    (Opcode::Jmp, 0x50),
    (Opcode::Jz, 0x51),
    (Opcode::Label, 0x52),
    (Opcode::Call, 0x60),
    (Opcode::Ret, 0x61),
    (Opcode::Print, 0x70),
];

pub fn opcode_byte(op: Opcode) -> u8 {
    OPCODE_BYTES
        .iter()
        .find(|(candidate, _)| *candidate == op)
        .map_or(UNMAPPED, |&(_, byte)| byte)
}

/// Writes one `xx a b c` line per instruction, grouped under `; FUNC` comments.
pub struct Emitter<W> {
    writer: W,
}

impl<W: io::Write> Emitter<W> {
    pub fn new(writer: W) -> Emitter<W> {
        Emitter { writer }
    }

    pub fn emit(mut self, module: &Module) -> io::Result<()> {
        writeln!(self.writer, "; HEX OPCODE STREAM")?;
        for function in &module.functions {
            writeln!(self.writer, "; FUNC {}", function.name)?;
            for inst in &function.code {
                self.instruction(inst)?;
            }
        }
        Ok(())
    }

    /// Empty operands are left out; the rest are written verbatim.
    fn instruction(&mut self, inst: &Instruction) -> io::Result<()> {
        write!(self.writer, "{:02x}", opcode_byte(inst.op))?;
        for operand in inst.operands().into_iter().filter(|o| !o.is_empty()) {
            write!(self.writer, " {operand}")?;
        }
        writeln!(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::{opcode_byte, UNMAPPED};
    use crate::{
        compile,
        emit::{emit, Format},
        ir::Opcode,
    };

    #[test]
    fn test_every_opcode_has_a_distinct_byte() {
        let mut seen = HashSet::new();
        for &op in Opcode::ALL {
            let byte = opcode_byte(op);
            assert_ne!(byte, UNMAPPED, "{op} has no byte");
            assert!(seen.insert(byte), "{op} reuses byte {byte:02x}");
        }
    }

    #[test]
    fn test_capsule_listing() {
        let module =
            compile(r#"capsule main: let x = 5; let y = 3; say "done"; end"#).expect("compiles");
        let expected = indoc! {"
            ; HEX OPCODE STREAM
            ; FUNC main
            01 %t0 5
            11 x %t0
            01 %t1 3
            11 y %t1
            70 done
            61
        "};
        assert_eq!(emit(Format::Hex, &module), expected);
    }

    #[test]
    fn test_operand_whitespace_kept() {
        let module = compile(r#"capsule main: say "hi  "; end"#).expect("compiles");
        let expected = "; HEX OPCODE STREAM\n; FUNC main\n70 hi  \n61\n";
        assert_eq!(emit(Format::Hex, &module), expected);
    }

    #[test]
    fn test_control_flow_listing() {
        let module = compile("capsule boot: if (a): end end").expect("compiles");
        let expected = indoc! {"
            ; HEX OPCODE STREAM
            ; FUNC boot
            10 %t0 a
            51 %t0 L0
            50 L1
            52 L0
            52 L1
            61
            ; FUNC __entry
            60 main
            61
        "};
        assert_eq!(emit(Format::Hex, &module), expected);
    }
}
