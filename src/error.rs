use crate::{ir_gen, parser, token::Spanned};

/// Anything that stops a program from becoming an IR module. The first
/// error aborts the whole compile.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("parse error at {0}")]
    Parse(#[from] Spanned<parser::Error>),
    #[error("lowering error at {0}")]
    Lower(#[from] Spanned<ir_gen::Error>),
}

impl CompileError {
    /// Where in the source the error was found.
    pub fn position(&self) -> crate::token::Position {
        match self {
            CompileError::Parse(e) => e.span.start,
            CompileError::Lower(e) => e.span.start,
        }
    }
}
