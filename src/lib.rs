//! A small compiler and interpreter for the cmajor language.
//!
//! Source text goes through [`lexer`], [`parser`] and [`ir_gen`] to become an
//! [`ir::Module`], which can then be run by [`vm::Vm`] or rendered by one of
//! the [`emit`] formats.

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The IR generator lowers an AST into a flat IR module.
pub mod ir_gen;

/// The interpreter executes IR modules.
pub mod vm;

pub mod ast;
pub mod emit;
pub mod error;
pub mod ir;
pub mod token;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

pub use error::CompileError;

/// Compiles source text into an IR module.
pub fn compile(src: &str) -> Result<ir::Module, CompileError> {
    let program = parser::parse(src)?;
    let module = ir_gen::generate(program)?;
    tracing::debug!(functions = module.functions.len(), "compiled module");
    Ok(module)
}

#[cfg(test)]
mod tests {
    use crate::{compile, CompileError};

    #[test]
    fn test_compile_reports_parse_error() {
        let err = compile("capsule main: say 1; end").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
        assert_eq!(err.position().to_string(), "1:19");
        assert_eq!(
            err.to_string(),
            "parse error at 1:19: expected token String, but got Number"
        );
    }

    #[test]
    fn test_compile_reports_lowering_error() {
        let err = compile("func main(): return 1 || 0; end").unwrap_err();
        assert!(matches!(err, CompileError::Lower(_)));
        assert_eq!(
            err.to_string(),
            "lowering error at 1:21: binary operator `||` is not supported"
        );
    }

    #[test]
    fn test_demo_programs_compile() {
        for src in [
            include_str!("../demos/hello.cmaj"),
            include_str!("../demos/tour.cmaj"),
        ] {
            let module = compile(src).expect("demo compiles");
            assert!(module.function("main").is_some());
        }
    }
}
