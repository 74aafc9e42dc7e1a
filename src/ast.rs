// program   ::= (capsule | func)*
// capsule   ::= 'capsule' ID ':' stmt* 'end'
// func      ::= 'func' ID '(' [ID (',' ID)*] ')' block
// block     ::= ':' stmt* 'end'
// stmt      ::= 'let' ID '=' expr ';'
//             | 'return' [expr] ';'
//             | 'if' '(' expr ')' block ['else' block]
//             | 'loop' ID 'from' expr 'to' expr block
//             | 'say' STRING ';'
//             | ID '=' expr ';'
//             | expr ';'
// expr      ::= unary (binop unary)*
// unary     ::= ('-' | '!' | '~') unary | postfix
// postfix   ::= primary ('(' [expr (',' expr)*] ')')*
// primary   ::= NUMBER | FLOAT | STRING | ID | '(' expr ')'

// Precedence
//
// - ! ~ (prefix)
// * / %
// + -
// < <= > >= == !=
// &&
// ||

use crate::token::Span;

#[derive(Debug, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

/// A top-level unit. Both kinds become one IR function of the same name.
#[derive(Debug, PartialEq)]
pub enum Item {
    Capsule(Capsule),
    Func(Func),
}

impl Item {
    pub fn name(&self) -> &Ident {
        match self {
            Item::Capsule(capsule) => &capsule.name,
            Item::Func(func) => &func.name,
        }
    }

    pub fn body(&self) -> &[Stmt] {
        match self {
            Item::Capsule(capsule) => &capsule.body,
            Item::Func(func) => &func.body.stmts,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Capsule {
    pub name: Ident,
    pub body: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct Func {
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
}

#[derive(Debug, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Let {
        name: Ident,
        value: Expr,
    },
    Assign {
        target: Ident,
        value: Expr,
    },
    Return(Option<Expr>),
    If {
        predicate: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// Bounded counting loop; `to` is inclusive and re-evaluated on every pass.
    Loop {
        var: Ident,
        from: Expr,
        to: Expr,
        body: Block,
    },
    /// Raw text of the string literal.
    Say(Box<str>),
    Expr(Expr),
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Var(Ident),
    Literal(Literal),
}

#[derive(Debug, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    /// The literal exactly as written (without quotes, for strings).
    pub text: Box<str>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Float,
    String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `-`
    Neg,
    /// `!`
    Not,
    /// `~`
    Inverse,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOperator {
    pub const fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
        }
    }
}

impl UnaryOperator {
    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Neg => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::Inverse => "~",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
