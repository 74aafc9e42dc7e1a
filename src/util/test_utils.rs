use std::fmt::Display;

use crate::{ir_gen, lexer, parser, util::fmt};

pub fn format_errors<E: Display>(errors: &[E]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    IrProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    IrOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the input through the stages the test kind asks for, returning the
/// rendered output (AST tree or IR listing) and the rendered errors. On
/// error the output is empty.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    match test {
        Test::ParserProgram(input) => match parser::parse(input) {
            Ok(prog) => (fmt::print_program_string(&prog), vec![]),
            Err(error) => (String::new(), format_errors(&[error])),
        },
        Test::ParserExpr(input) => {
            let tokens = lexer::tokenize(input);
            match parser::parse_expr(&tokens) {
                Ok(expr) => (fmt::print_expr_string(&expr), vec![]),
                Err(error) => (String::new(), format_errors(&[error])),
            }
        }
        Test::IrProgram(input) => {
            let prog = match parser::parse(input) {
                Ok(prog) => prog,
                Err(error) => return (String::new(), format_errors(&[error])),
            };
            match ir_gen::generate(prog) {
                Ok(module) => (module.to_string(), vec![]),
                Err(error) => (String::new(), format_errors(&[error])),
            }
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_output: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected) | Assertion::IrOk(expected) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_output.trim(), expected.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_output, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_output, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, ir_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::IrOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(ir_gen, program), $source:expr) => {
        crate::util::test_utils::Test::IrProgram($source)
    };
}
pub(crate) use tree_tests;
