use std::io;

use crate::ir::{Instruction, Module, Opcode};

/// Mnemonic written for opcodes missing from [`MNEMONICS`].
pub const UNMAPPED: &str = "nop";

/// Not every opcode has a real CIL counterpart; `cne` and `label` are
/// pseudo-mnemonics. `mod` maps to CIL's `rem`.
pub const MNEMONICS: &[(Opcode, &str)] = &[
    (Opcode::IConst, "ldc.i4"),
    (Opcode::SConst, "ldstr"),
    (Opcode::Load, "ldloc"),
    (Opcode::Store, "stloc"),
    (Opcode::Add, "add"),
    (Opcode::Sub, "sub"),
    (Opcode::Mul, "mul"),
    (Opcode::Div, "div"),
    (Opcode::Mod, "rem"),
    (Opcode::CmpEq, "ceq"),
    (Opcode::CmpNe, "cne"),
    (Opcode::CmpLt, "clt"),
    (Opcode::CmpLe, "cle"),
    (Opcode::CmpGt, "cgt"),
    (Opcode::CmpGe, "cge"),
    (Opcode::And, "and"),
    (Opcode::Or, "or"),
    (Opcode::Not, "not"),
    (Opcode::Jmp, "br"),
    (Opcode::Jz, "brfalse"),
    (Opcode::Label, "label"),
    (Opcode::Call, "call"),
    (Opcode::Ret, "ret"),
    (Opcode::Print, "call print"),
];

pub fn mnemonic(op: Opcode) -> &'static str {
    MNEMONICS
        .iter()
        .find(|(candidate, _)| *candidate == op)
        .map_or(UNMAPPED, |&(_, mnemonic)| mnemonic)
}

/// Writes one `.method` block per function.
pub struct Emitter<W> {
    writer: W,
}

impl<W: io::Write> Emitter<W> {
    pub fn new(writer: W) -> Emitter<W> {
        Emitter { writer }
    }

    pub fn emit(mut self, module: &Module) -> io::Result<()> {
        writeln!(self.writer, "// CIL-like output (illustrative)")?;
        for function in &module.functions {
            writeln!(self.writer, ".method static void {}() {{", function.name)?;
            for inst in &function.code {
                self.instruction(inst)?;
            }
            writeln!(self.writer, "}}")?;
            writeln!(self.writer)?;
        }
        Ok(())
    }

    fn instruction(&mut self, inst: &Instruction) -> io::Result<()> {
        write!(self.writer, "  {}", mnemonic(inst.op))?;
        let mut operands = inst.operands().into_iter().filter(|o| !o.is_empty());
        if let Some(first) = operands.next() {
            write!(self.writer, " {first}")?;
        }
        for operand in operands {
            write!(self.writer, ", {operand}")?;
        }
        writeln!(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::{mnemonic, UNMAPPED};
    use crate::{
        compile,
        emit::{emit, Format},
        ir::Opcode,
    };

    #[test]
    fn test_every_opcode_has_a_mnemonic() {
        for &op in Opcode::ALL {
            assert_ne!(mnemonic(op), UNMAPPED, "{op} has no mnemonic");
        }
        assert_eq!(mnemonic(Opcode::CmpNe), "cne");
        assert_eq!(mnemonic(Opcode::Mod), "rem");
        assert_eq!(mnemonic(Opcode::Print), "call print");
    }

    #[test]
    fn test_function_listing() {
        let src = r#"
            func main(): if (1 != 2): say "ok"; end return 4; end
        "#;
        let module = compile(src).expect("compiles");
        let expected = indoc! {"
            // CIL-like output (illustrative)
            .method static void main() {
              ldc.i4 %t0, 1
              ldc.i4 %t1, 2
              cne %t2, %t0, %t1
              brfalse %t2, L0
              call print ok
              br L1
              label L0
              label L1
              ldc.i4 %t3, 4
              ldloc _ret, %t3
              ret _ret
              ret
            }

        "};
        assert_eq!(emit(Format::Cil, &module), expected);
    }
}
