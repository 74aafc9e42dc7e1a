use crate::ast::*;
use std::io::Write;

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).expect("writing to a Vec never fails");
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).expect("writing to a Vec never fails");
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    for item in &program.items {
        print_item(w, 0, item)?;
    }
    Ok(())
}

fn print_item(w: &mut impl Write, i: usize, item: &Item) -> std::io::Result<()> {
    sp(w, i)?;
    match item {
        Item::Capsule(capsule) => writeln!(w, "capsule {}", capsule.name)?,
        Item::Func(func) => {
            write!(w, "func {}(", func.name)?;
            for (idx, param) in func.params.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                write!(w, "{}", param.name)?;
            }
            writeln!(w, ")")?;
        }
    }
    print_stmts(w, i + 1, item.body())
}

fn print_stmts(w: &mut impl Write, i: usize, stmts: &[Stmt]) -> std::io::Result<()> {
    for stmt in stmts {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

fn print_labeled_block(
    w: &mut impl Write,
    i: usize,
    label: &str,
    block: &Block,
) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "{label}")?;
    print_stmts(w, i + 1, &block.stmts)
}

pub fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    if let StmtKind::Expr(expr) = &stmt.kind {
        return print_expr(w, i, expr);
    }
    sp(w, i)?;
    match &stmt.kind {
        StmtKind::Let { name, value } => {
            writeln!(w, "let {name}")?;
            print_expr(w, i + 1, value)?;
        }
        StmtKind::Assign { target, value } => {
            writeln!(w, "assign {target}")?;
            print_expr(w, i + 1, value)?;
        }
        StmtKind::Return(value) => {
            writeln!(w, "return")?;
            if let Some(value) = value {
                print_expr(w, i + 1, value)?;
            }
        }
        StmtKind::If {
            predicate,
            then_block,
            else_block,
        } => {
            writeln!(w, "if")?;
            print_expr(w, i + 1, predicate)?;
            print_labeled_block(w, i + 1, "then", then_block)?;
            if let Some(else_block) = else_block {
                print_labeled_block(w, i + 1, "else", else_block)?;
            }
        }
        StmtKind::Loop { var, from, to, body } => {
            writeln!(w, "loop {var}")?;
            print_expr(w, i + 1, from)?;
            print_expr(w, i + 1, to)?;
            print_labeled_block(w, i + 1, "body", body)?;
        }
        StmtKind::Say(text) => {
            writeln!(w, "say {text:?}")?;
        }
        StmtKind::Expr(_) => unreachable!("handled above"),
    }
    Ok(())
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Unary { op, expr: inner } => {
            writeln!(w, "unary {op:?} ({span})")?;
            print_expr(w, i + 1, inner)?;
        }
        ExprKind::Call { callee, args } => {
            writeln!(w, "call ({span})")?;
            print_expr(w, i + 1, callee)?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ExprKind::Var(ident) => {
            writeln!(w, "ident {ident} ({span})")?;
        }
        ExprKind::Literal(Literal { kind, text }) => match kind {
            LiteralKind::Int => writeln!(w, "int {text} ({span})")?,
            LiteralKind::Float => writeln!(w, "float {text} ({span})")?,
            LiteralKind::String => writeln!(w, "string {text:?} ({span})")?,
        },
    }
    Ok(())
}
