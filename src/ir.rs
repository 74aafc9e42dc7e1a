//! The flat three-operand intermediate representation shared by the
//! interpreter and the text emitters.
//!
//! Operands are untyped strings; what each slot means depends on the opcode:
//!
//! | opcode           | a           | b            | c        |
//! |------------------|-------------|--------------|----------|
//! | `iconst`/`sconst`| destination | immediate    |          |
//! | `load`/`store`   | destination | source name  |          |
//! | arithmetic/cmp   | destination | lhs          | rhs      |
//! | `not`            | destination | operand      |          |
//! | `jmp`            | label       |              |          |
//! | `jz`             | condition   | label        |          |
//! | `label`          | label       |              |          |
//! | `call`           | function    | [destination]|          |
//! | `ret`            | [value]     |              |          |
//! | `print`          | name/text   |              |          |

use std::fmt;

/// Name of the synthetic entry function appended when no `main` exists.
pub const ENTRY: &str = "__entry";

/// Register that `return <expr>;` writes its value into.
pub const RETURN_SLOT: &str = "_ret";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    IConst,
    SConst,
    Load,
    Store,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    And,
    Or,
    Not,
    Jmp,
    Jz,
    Label,
    Call,
    Ret,
    Print,
}

impl Opcode {
    pub const ALL: &[Opcode] = &[
        Opcode::IConst,
        Opcode::SConst,
        Opcode::Load,
        Opcode::Store,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::CmpEq,
        Opcode::CmpNe,
        Opcode::CmpLt,
        Opcode::CmpLe,
        Opcode::CmpGt,
        Opcode::CmpGe,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
        Opcode::Jmp,
        Opcode::Jz,
        Opcode::Label,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Print,
    ];

    pub const fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            IConst => "iconst",
            SConst => "sconst",
            Load => "load",
            Store => "store",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            CmpEq => "eq",
            CmpNe => "ne",
            CmpLt => "lt",
            CmpLe => "le",
            CmpGt => "gt",
            CmpGe => "ge",
            And => "and",
            Or => "or",
            Not => "not",
            Jmp => "jmp",
            Jz => "jz",
            Label => "label",
            Call => "call",
            Ret => "ret",
            Print => "print",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub a: String,
    pub b: String,
    pub c: String,
}

impl Instruction {
    /// Builds an instruction from up to three operands; missing ones are
    /// left empty.
    pub fn new(op: Opcode, operands: &[&str]) -> Instruction {
        debug_assert!(operands.len() <= 3, "at most three operands");
        let operand = |idx: usize| operands.get(idx).map_or_else(String::new, |s| s.to_string());
        Instruction {
            op,
            a: operand(0),
            b: operand(1),
            c: operand(2),
        }
    }

    pub fn operands(&self) -> [&str; 3] {
        [&self.a, &self.b, &self.c]
    }

    /// The label this instruction jumps to, if it is a jump.
    pub fn jump_target(&self) -> Option<&str> {
        match self.op {
            Opcode::Jmp => Some(&self.a),
            Opcode::Jz => Some(&self.b),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op == Opcode::Label {
            return write!(f, "{}:", self.a);
        }
        write!(f, "  {}", self.op)?;
        let mut operands = self.operands().into_iter().filter(|o| !o.is_empty());
        if let Some(first) = operands.next() {
            write!(f, " {first}")?;
        }
        for operand in operands {
            write!(f, ", {operand}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Function {
    pub name: String,
    pub code: Vec<Instruction>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Function {
        Function {
            name: name.into(),
            code: Vec::new(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {}", self.name)?;
        for inst in &self.code {
            writeln!(f, "{inst}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    /// Looks a function up by name. With duplicates, the first one wins.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The function a run starts from: `main` if present, else the synthetic
    /// entry wrapper.
    pub fn entry_point(&self) -> &str {
        if self.function("main").is_some() {
            "main"
        } else {
            ENTRY
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, function) in self.functions.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Function, Instruction, Module, Opcode, ENTRY};

    #[test]
    fn test_instruction_display() {
        let cases = [
            (Instruction::new(Opcode::Add, &["%t2", "%t0", "%t1"]), "  add %t2, %t0, %t1"),
            (Instruction::new(Opcode::Ret, &[]), "  ret"),
            (Instruction::new(Opcode::Call, &["f", "", ""]), "  call f"),
            (Instruction::new(Opcode::Label, &["L3"]), "L3:"),
        ];
        for (inst, expected) in cases {
            assert_eq!(inst.to_string(), expected);
        }
    }

    #[test]
    fn test_jump_target() {
        assert_eq!(Instruction::new(Opcode::Jmp, &["L1"]).jump_target(), Some("L1"));
        assert_eq!(Instruction::new(Opcode::Jz, &["%t0", "L2"]).jump_target(), Some("L2"));
        assert_eq!(Instruction::new(Opcode::Label, &["L1"]).jump_target(), None);
    }

    #[test]
    fn test_lookup_prefers_first_duplicate() {
        let mut first = Function::new("main");
        first.code.push(Instruction::new(Opcode::Print, &["first"]));
        let module = Module {
            functions: vec![first, Function::new("main")],
        };
        assert_eq!(module.function("main").map(|f| f.code.len()), Some(1));
        assert_eq!(module.entry_point(), "main");
        assert_eq!(Module::default().entry_point(), ENTRY);
    }
}
