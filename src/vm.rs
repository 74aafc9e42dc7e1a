//! A tree-less register interpreter for IR modules.
//!
//! Every name is a keyed cell: reading one that was never written yields 0
//! (or the empty string), never an error. Each call gets a fresh frame, and
//! recursion rides on the host stack.

use std::{
    collections::HashMap,
    io::{self, Write},
};

use tracing::{debug, error, trace};

use crate::ir::{Function, Instruction, Module, Opcode};

type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// A fatal condition. Raising one abandons every active frame.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("division by zero in function `{function}`")]
    DivisionByZero { function: String },
    #[error("unknown label `{label}` in function `{function}`")]
    UnknownLabel { function: String, label: String },
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

pub struct Vm<'m, W> {
    module: &'m Module,
    out: W,
    fault: Option<RuntimeError>,
}

impl<'m, W: Write> Vm<'m, W> {
    /// Creates an interpreter over `module` that prints into `out`.
    pub fn new(module: &'m Module, out: W) -> Vm<'m, W> {
        Vm {
            module,
            out,
            fault: None,
        }
    }

    /// Runs the function `name` to completion and returns its value.
    ///
    /// A fault unwinds the whole call chain and yields 0. The fault is logged
    /// and kept around for [`Vm::fault`] until the next call.
    pub fn call(&mut self, name: &str) -> i64 {
        self.fault = None;
        match self.invoke(name) {
            Ok(value) => value,
            Err(fault) => {
                error!(%fault, entry = name, "execution aborted");
                self.fault = Some(fault);
                0
            }
        }
    }

    pub fn fault(&self) -> Option<&RuntimeError> {
        self.fault.as_ref()
    }

    pub fn take_fault(&mut self) -> Option<RuntimeError> {
        self.fault.take()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn invoke(&mut self, name: &str) -> Result<i64> {
        let module = self.module;
        let function = module
            .function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction { name: name.into() })?;
        debug!(function = name, "call");
        let mut frame = Frame::new(function);
        let value = self.run(function, &mut frame)?;
        debug!(function = name, value, "return");
        Ok(value)
    }

    fn run(&mut self, function: &'m Function, frame: &mut Frame<'m>) -> Result<i64> {
        use Opcode::*;

        let mut pc = 0;
        while let Some(inst) = function.code.get(pc) {
            trace!(function = %function.name, pc, op = %inst.op, "step");
            pc += 1;
            match inst.op {
                IConst => frame.set_int(&inst.a, parse_immediate(&inst.b)),
                SConst => frame.set_str(&inst.a, &inst.b),
                Load | Store => frame.copy(&inst.a, &inst.b),
                Add => frame.binary(inst, i64::wrapping_add),
                Sub => frame.binary(inst, i64::wrapping_sub),
                Mul => frame.binary(inst, i64::wrapping_mul),
                Div | Mod => {
                    let lhs = frame.int(&inst.b);
                    let rhs = frame.int(&inst.c);
                    if rhs == 0 {
                        return Err(RuntimeError::DivisionByZero {
                            function: function.name.clone(),
                        });
                    }
                    let value = if inst.op == Div {
                        lhs.wrapping_div(rhs)
                    } else {
                        lhs.wrapping_rem(rhs)
                    };
                    frame.set_int(&inst.a, value);
                }
                CmpEq => frame.binary(inst, |l, r| i64::from(l == r)),
                CmpNe => frame.binary(inst, |l, r| i64::from(l != r)),
                CmpLt => frame.binary(inst, |l, r| i64::from(l < r)),
                CmpLe => frame.binary(inst, |l, r| i64::from(l <= r)),
                CmpGt => frame.binary(inst, |l, r| i64::from(l > r)),
                CmpGe => frame.binary(inst, |l, r| i64::from(l >= r)),
                And => frame.binary(inst, |l, r| i64::from(l != 0 && r != 0)),
                Or => frame.binary(inst, |l, r| i64::from(l != 0 || r != 0)),
                Not => {
                    let value = i64::from(frame.int(&inst.b) == 0);
                    frame.set_int(&inst.a, value);
                }
                Jmp => pc = frame.label(function, &inst.a)?,
                Jz => {
                    if frame.int(&inst.a) == 0 {
                        pc = frame.label(function, &inst.b)?;
                    }
                }
                Label => {}
                Call => {
                    let value = self.invoke(&inst.a)?;
                    if !inst.b.is_empty() {
                        frame.set_int(&inst.b, value);
                    }
                }
                Ret => {
                    return Ok(frame.ints.get(inst.a.as_str()).copied().unwrap_or(0));
                }
                Print => {
                    let name = inst.a.as_str();
                    if let Some(value) = frame.ints.get(name) {
                        writeln!(self.out, "{value}")?;
                    } else if let Some(text) = frame.strings.get(name) {
                        writeln!(self.out, "{text}")?;
                    } else {
                        writeln!(self.out, "{name}")?;
                    }
                }
            }
        }
        Ok(0)
    }
}

/// The state of one function activation.
struct Frame<'m> {
    ints: HashMap<&'m str, i64>,
    strings: HashMap<&'m str, &'m str>,
    labels: HashMap<&'m str, usize>,
}

impl<'m> Frame<'m> {
    fn new(function: &'m Function) -> Frame<'m> {
        let labels = function
            .code
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.op == Opcode::Label)
            .map(|(pos, inst)| (inst.a.as_str(), pos))
            .collect();
        Frame {
            ints: HashMap::new(),
            strings: HashMap::new(),
            labels,
        }
    }

    fn int(&self, name: &str) -> i64 {
        self.ints.get(name).copied().unwrap_or(0)
    }

    fn set_int(&mut self, name: &'m str, value: i64) {
        self.strings.remove(name);
        self.ints.insert(name, value);
    }

    fn set_str(&mut self, name: &'m str, value: &'m str) {
        self.ints.remove(name);
        self.strings.insert(name, value);
    }

    /// Copies whatever `src` holds into `dst`. Only a source with nothing but
    /// a string binding carries the string along.
    fn copy(&mut self, dst: &'m str, src: &'m str) {
        if !self.ints.contains_key(src) {
            if let Some(&text) = self.strings.get(src) {
                self.set_str(dst, text);
                return;
            }
        }
        let value = self.int(src);
        self.set_int(dst, value);
    }

    fn binary(&mut self, inst: &'m Instruction, f: impl FnOnce(i64, i64) -> i64) {
        let value = f(self.int(&inst.b), self.int(&inst.c));
        self.set_int(&inst.a, value);
    }

    fn label(&self, function: &Function, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownLabel {
                function: function.name.clone(),
                label: label.into(),
            })
    }
}

/// Integer immediates are read as `i64`. Floats are truncated toward zero and
/// anything else reads as 0.
#[allow(clippy::cast_possible_truncation)]
fn parse_immediate(text: &str) -> i64 {
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(|f| f as i64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::{parse_immediate, RuntimeError, Vm};
    use crate::{
        compile,
        ir::{Function, Instruction, Module, Opcode},
    };

    /// Compiles and runs `src` from its entry point, returning the value, the
    /// printed output, and the fault, if any.
    fn run(src: &str) -> (i64, String, Option<RuntimeError>) {
        let module = compile(src).expect("failed to compile");
        run_module(&module, module.entry_point())
    }

    fn run_module(module: &Module, entry: &str) -> (i64, String, Option<RuntimeError>) {
        let mut vm = Vm::new(module, Vec::new());
        let value = vm.call(entry);
        let fault = vm.take_fault();
        let out = String::from_utf8(vm.into_output()).expect("output is utf-8");
        (value, out, fault)
    }

    fn function(name: &str, code: Vec<Instruction>) -> Function {
        let mut function = Function::new(name);
        function.code = code;
        function
    }

    fn inst(op: Opcode, operands: &[&str]) -> Instruction {
        Instruction::new(op, operands)
    }

    #[test]
    fn test_say_prints_once() {
        let (value, out, fault) = run(r#"capsule main: say "hi"; end"#);
        assert_eq!(out, "hi\n");
        assert_eq!(value, 0);
        assert!(fault.is_none());
    }

    #[test]
    fn test_if_else_takes_then_branch() {
        let (_, out, _) =
            run(r#"func main(): if (1 == 1): say "yes"; end else: say "no"; end end"#);
        assert_eq!(out, "yes\n");
    }

    #[test]
    fn test_if_else_takes_else_branch() {
        let (_, out, _) =
            run(r#"func main(): if (2 < 1): say "yes"; end else: say "no"; end end"#);
        assert_eq!(out, "no\n");
    }

    #[test]
    fn test_loop_runs_inclusive_range() {
        let (_, out, _) = run(r#"func main(): loop i from 1 to 3: say "x"; end end"#);
        assert_eq!(out, "x\nx\nx\n");
    }

    #[test]
    fn test_loop_with_empty_range_never_runs() {
        let (_, out, _) = run(r#"func main(): loop i from 5 to 1: say "x"; end end"#);
        assert_eq!(out, "");
    }

    #[test]
    fn test_loop_bound_reevaluated_each_pass() {
        let src = r#"
            func f(): say "tick"; end
            func main(): loop i from 1 to f() + 3: say "x"; end end
        "#;
        let (_, out, _) = run(src);
        assert_eq!(out, "tick\nx\ntick\nx\ntick\nx\ntick\n");
    }

    #[test]
    fn test_capsule_main_is_callable() {
        let src = r#"func helper(): say "helper"; end capsule main: helper(); end"#;
        let (_, out, fault) = run(src);
        assert_eq!(out, "helper\n");
        assert!(fault.is_none());
    }

    #[test]
    fn test_missing_main_is_unknown_function() {
        let (value, out, fault) = run(r#"capsule start: say "never"; end"#);
        assert_eq!(value, 0);
        assert_eq!(out, "");
        assert!(matches!(
            fault,
            Some(RuntimeError::UnknownFunction { name }) if name == "main"
        ));
    }

    #[test]
    fn test_return_value() {
        let (value, _, _) = run("func main(): return 6 * 7; end");
        assert_eq!(value, 42);
    }

    #[test]
    fn test_arithmetic_wraps() {
        let (value, _, fault) = run("func main(): return 9223372036854775807 + 1; end");
        assert_eq!(value, i64::MIN);
        assert!(fault.is_none());
    }

    #[test]
    fn test_division_by_zero_returns_zero() {
        let (value, _, fault) = run("func main(): return 1 / 0; end");
        assert_eq!(value, 0);
        assert!(matches!(
            fault,
            Some(RuntimeError::DivisionByZero { function }) if function == "main"
        ));
    }

    #[test]
    fn test_division_by_zero_unwinds_every_frame() {
        let src = r#"
            func c(): say "c-before"; let z = 1 / 0; say "c-after"; end
            func b(): say "b-before"; c(); say "b-after"; end
            func main(): b(); say "main-after"; return 5; end
        "#;
        let (value, out, fault) = run(src);
        assert_eq!(value, 0);
        assert_eq!(out, "b-before\nc-before\n");
        assert!(matches!(
            fault,
            Some(RuntimeError::DivisionByZero { function }) if function == "c"
        ));
    }

    #[test]
    fn test_unset_names_read_as_zero() {
        let (value, _, fault) = run("func main(): return missing + 4; end");
        assert_eq!(value, 4);
        assert!(fault.is_none());
    }

    #[test]
    fn test_print_resolution_order() {
        let src = r#"
            func main():
                let x = 5;
                let s = "hello";
                say "x";
                say "s";
                say "plain";
            end
        "#;
        let (_, out, _) = run(src);
        assert_eq!(out, "5\nhello\nplain\n");
    }

    #[test]
    fn test_frames_are_isolated() {
        let src = r#"
            func f(): say "x"; let x = 9; end
            func main(): let x = 1; f(); say "x"; end
        "#;
        let (_, out, _) = run(src);
        assert_eq!(out, "x\n1\n");
    }

    #[test]
    fn test_call_result_written_to_destination() {
        let module = Module {
            functions: vec![
                function(
                    "main",
                    vec![
                        inst(Opcode::Call, &["seven", "r"]),
                        inst(Opcode::Print, &["r"]),
                        inst(Opcode::Ret, &["r"]),
                    ],
                ),
                function(
                    "seven",
                    vec![
                        inst(Opcode::IConst, &["%t0", "7"]),
                        inst(Opcode::Ret, &["%t0"]),
                    ],
                ),
            ],
        };
        let (value, out, _) = run_module(&module, "main");
        assert_eq!(out, "7\n");
        assert_eq!(value, 7);
    }

    #[test]
    fn test_reserved_opcodes_execute() {
        let module = Module {
            functions: vec![function(
                "main",
                vec![
                    inst(Opcode::IConst, &["a", "7"]),
                    inst(Opcode::IConst, &["b", "3"]),
                    inst(Opcode::Mod, &["m", "a", "b"]),
                    inst(Opcode::And, &["x", "a", "zero"]),
                    inst(Opcode::Or, &["y", "a", "zero"]),
                    inst(Opcode::CmpNe, &["z", "a", "b"]),
                    inst(Opcode::Print, &["m"]),
                    inst(Opcode::Print, &["x"]),
                    inst(Opcode::Print, &["y"]),
                    inst(Opcode::Print, &["z"]),
                    inst(Opcode::Ret, &[]),
                ],
            )],
        };
        let (_, out, fault) = run_module(&module, "main");
        assert_eq!(out, "1\n0\n1\n1\n");
        assert!(fault.is_none());
    }

    #[test]
    fn test_mod_by_zero_faults() {
        let module = Module {
            functions: vec![function(
                "main",
                vec![
                    inst(Opcode::IConst, &["a", "7"]),
                    inst(Opcode::Mod, &["m", "a", "zero"]),
                    inst(Opcode::Ret, &["m"]),
                ],
            )],
        };
        let (_, _, fault) = run_module(&module, "main");
        assert!(matches!(fault, Some(RuntimeError::DivisionByZero { .. })));
    }

    #[test]
    fn test_jump_to_unknown_label_faults() {
        let module = Module {
            functions: vec![function(
                "main",
                vec![
                    inst(Opcode::Print, &["before"]),
                    inst(Opcode::Jmp, &["L9"]),
                    inst(Opcode::Print, &["after"]),
                ],
            )],
        };
        let (value, out, fault) = run_module(&module, "main");
        assert_eq!(value, 0);
        assert_eq!(out, "before\n");
        assert!(matches!(
            fault,
            Some(RuntimeError::UnknownLabel { function, label })
                if function == "main" && label == "L9"
        ));
    }

    #[test]
    fn test_conditional_jump_to_unknown_label_faults() {
        let module = Module {
            functions: vec![function(
                "main",
                vec![
                    inst(Opcode::IConst, &["c", "0"]),
                    inst(Opcode::Print, &["before"]),
                    inst(Opcode::Jz, &["c", "L9"]),
                    inst(Opcode::Print, &["after"]),
                ],
            )],
        };
        let (value, out, fault) = run_module(&module, "main");
        assert_eq!(value, 0);
        assert_eq!(out, "before\n");
        assert!(matches!(
            fault,
            Some(RuntimeError::UnknownLabel { label, .. }) if label == "L9"
        ));
    }

    #[test]
    fn test_untaken_conditional_jump_ignores_unknown_label() {
        let module = Module {
            functions: vec![function(
                "main",
                vec![
                    inst(Opcode::IConst, &["c", "1"]),
                    inst(Opcode::Jz, &["c", "L9"]),
                    inst(Opcode::Print, &["after"]),
                ],
            )],
        };
        let (_, out, fault) = run_module(&module, "main");
        assert_eq!(out, "after\n");
        assert!(fault.is_none());
    }

    #[test]
    fn test_fault_cleared_by_next_call() {
        let module = Module {
            functions: vec![
                function("bad", vec![inst(Opcode::Call, &["nowhere"])]),
                function("good", vec![inst(Opcode::Ret, &[])]),
            ],
        };
        let mut vm = Vm::new(&module, io::sink());
        vm.call("bad");
        assert!(vm.fault().is_some());
        vm.call("good");
        assert!(vm.fault().is_none());
    }

    struct BrokenSink;

    impl io::Write for BrokenSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_failure_is_fatal() {
        let module = compile(r#"capsule main: say "a"; say "b"; end"#).expect("compiles");
        let mut vm = Vm::new(&module, BrokenSink);
        assert_eq!(vm.call("main"), 0);
        assert!(matches!(vm.fault(), Some(RuntimeError::Output(_))));
    }

    #[test]
    fn test_tour_demo() {
        let (value, out, fault) = run(include_str!("../demos/tour.cmaj"));
        assert!(fault.is_none());
        assert_eq!(value, 25);
        assert_eq!(out, "== cmajor tour ==\n25\nready\nbig ratio\n1\n2\n3\n");
    }

    #[test]
    fn test_parse_immediate() {
        assert_eq!(parse_immediate("42"), 42);
        assert_eq!(parse_immediate("1.9"), 1);
        assert_eq!(parse_immediate("7up"), 0);
        assert_eq!(parse_immediate(""), 0);
    }
}
