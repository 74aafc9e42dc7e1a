use tracing::debug;

use crate::{
    ast::{
        BinaryOperator, Block, Expr, ExprKind, Item, LiteralKind, Program, Stmt, StmtKind,
        UnaryOperator,
    },
    ir::{Function, Instruction, Module, Opcode, ENTRY, RETURN_SLOT},
    token::Spanned,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lowers a whole program into a fresh module.
pub fn generate(program: Program) -> Result<Module> {
    Generator::new().generate(program)
}

/// One generation session.
///
/// The temp and label counters are never reset between functions, so every
/// generated name is unique across the whole module.
#[derive(Default)]
pub struct Generator {
    next_temp: u32,
    next_label: u32,
    code: Vec<Instruction>,
}

impl Generator {
    pub fn new() -> Generator {
        Generator::default()
    }

    pub fn generate(mut self, program: Program) -> Result<Module> {
        // Register every name first so that bodies may refer to units defined
        // further down.
        let mut module = Module {
            functions: program
                .items
                .iter()
                .map(|item| Function::new(&*item.name().name))
                .collect(),
        };

        for (item, function) in program.items.iter().zip(&mut module.functions) {
            self.lower_item(item)?;
            function.code = std::mem::take(&mut self.code);
            debug!(
                function = %function.name,
                instructions = function.code.len(),
                "lowered function"
            );
        }

        if module.function("main").is_none() {
            let mut entry = Function::new(ENTRY);
            entry.code.push(Instruction::new(Opcode::Call, &["main"]));
            entry.code.push(Instruction::new(Opcode::Ret, &[]));
            module.functions.push(entry);
            debug!("no main function, appended {ENTRY}");
        }

        Ok(module)
    }

    fn lower_item(&mut self, item: &Item) -> Result<()> {
        for stmt in item.body() {
            self.lower_stmt(stmt)?;
        }
        // Control never falls off the end of a function, even if the body
        // already returned.
        self.emit(Opcode::Ret, &[]);
        Ok(())
    }

    fn lower_block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Let { name: target, value } | StmtKind::Assign { target, value } => {
                let value = self.lower_expr(value)?;
                self.emit(Opcode::Store, &[&target.name, &value]);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    let value = self.lower_expr(value)?;
                    self.emit(Opcode::Load, &[RETURN_SLOT, &value]);
                    self.emit(Opcode::Ret, &[RETURN_SLOT]);
                } else {
                    self.emit(Opcode::Ret, &[]);
                }
            }
            StmtKind::If {
                predicate,
                then_block,
                else_block,
            } => {
                let cond = self.lower_expr(predicate)?;
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.emit(Opcode::Jz, &[&cond, &else_label]);
                self.lower_block(then_block)?;
                self.emit(Opcode::Jmp, &[&end_label]);
                self.emit(Opcode::Label, &[&else_label]);
                if let Some(else_block) = else_block {
                    self.lower_block(else_block)?;
                }
                self.emit(Opcode::Label, &[&end_label]);
            }
            StmtKind::Loop {
                var,
                from,
                to,
                body,
            } => {
                let begin_label = self.new_label();
                let end_label = self.new_label();
                let start = self.lower_expr(from)?;
                self.emit(Opcode::Store, &[&var.name, &start]);
                self.emit(Opcode::Label, &[&begin_label]);
                // The bound is evaluated again on every pass.
                let stop = self.lower_expr(to)?;
                let current = self.new_temp();
                self.emit(Opcode::Load, &[&current, &var.name]);
                let cond = self.new_temp();
                self.emit(Opcode::CmpLe, &[&cond, &current, &stop]);
                self.emit(Opcode::Jz, &[&cond, &end_label]);
                self.lower_block(body)?;
                let one = self.new_temp();
                self.emit(Opcode::IConst, &[&one, "1"]);
                let next = self.new_temp();
                self.emit(Opcode::Add, &[&next, &current, &one]);
                self.emit(Opcode::Store, &[&var.name, &next]);
                self.emit(Opcode::Jmp, &[&begin_label]);
                self.emit(Opcode::Label, &[&end_label]);
            }
            StmtKind::Say(text) => {
                self.emit(Opcode::Print, &[text]);
            }
            StmtKind::Expr(expr) => {
                self.lower_expr(expr)?;
            }
        }
        Ok(())
    }

    /// Lowers an expression, returning the name of the temp holding its value.
    fn lower_expr(&mut self, expr: &Expr) -> Result<String> {
        let dst = match &expr.kind {
            ExprKind::Literal(literal) => {
                let dst = self.new_temp();
                // Integer or string is decided by the first character alone.
                let op = if literal.text.starts_with(|c: char| c.is_ascii_digit()) {
                    Opcode::IConst
                } else {
                    debug_assert_eq!(literal.kind, LiteralKind::String);
                    Opcode::SConst
                };
                self.emit(op, &[&dst, &literal.text]);
                dst
            }
            ExprKind::Var(ident) => {
                let dst = self.new_temp();
                self.emit(Opcode::Load, &[&dst, &ident.name]);
                dst
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.lower_expr(operand)?;
                match op {
                    UnaryOperator::Neg => {
                        let zero = self.new_temp();
                        self.emit(Opcode::IConst, &[&zero, "0"]);
                        let dst = self.new_temp();
                        self.emit(Opcode::Sub, &[&dst, &zero, &value]);
                        dst
                    }
                    UnaryOperator::Not => {
                        let dst = self.new_temp();
                        self.emit(Opcode::Not, &[&dst, &value]);
                        dst
                    }
                    UnaryOperator::Inverse => {
                        return Err(expr.span.wrap(Error::UnsupportedUnary { op: *op }));
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                let opcode = match op {
                    BinaryOperator::Add => Opcode::Add,
                    BinaryOperator::Sub => Opcode::Sub,
                    BinaryOperator::Mul => Opcode::Mul,
                    BinaryOperator::Div => Opcode::Div,
                    BinaryOperator::Eq => Opcode::CmpEq,
                    BinaryOperator::Ne => Opcode::CmpNe,
                    BinaryOperator::Lt => Opcode::CmpLt,
                    BinaryOperator::Le => Opcode::CmpLe,
                    BinaryOperator::Gt => Opcode::CmpGt,
                    BinaryOperator::Ge => Opcode::CmpGe,
                    BinaryOperator::Mod | BinaryOperator::And | BinaryOperator::Or => {
                        return Err(expr.span.wrap(Error::UnsupportedBinary { op: *op }));
                    }
                };
                let dst = self.new_temp();
                self.emit(opcode, &[&dst, &lhs, &rhs]);
                dst
            }
            ExprKind::Call { callee, args } => {
                let ExprKind::Var(name) = &callee.kind else {
                    return Err(callee.span.wrap(Error::UnsupportedCallee));
                };
                // Arguments are evaluated for their effects only; they are not
                // passed to the callee.
                for arg in args {
                    self.lower_expr(arg)?;
                }
                self.emit(Opcode::Call, &[&name.name]);
                // Call expressions evaluate to zero.
                let dst = self.new_temp();
                self.emit(Opcode::IConst, &[&dst, "0"]);
                dst
            }
        };
        Ok(dst)
    }
}

// Utility functions.
impl Generator {
    fn new_temp(&mut self) -> String {
        let temp = format!("%t{}", self.next_temp);
        self.next_temp += 1;
        temp
    }

    fn new_label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    fn emit(&mut self, op: Opcode, operands: &[&str]) {
        self.code.push(Instruction::new(op, operands));
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unary operator `{}` is not supported", .op.symbol())]
    UnsupportedUnary { op: UnaryOperator },
    #[error("binary operator `{}` is not supported", .op.symbol())]
    UnsupportedBinary { op: BinaryOperator },
    #[error("only named functions can be called")]
    UnsupportedCallee,
}
