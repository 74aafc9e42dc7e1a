use std::{
    error::Error,
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use cmajor::{
    emit::{self, Format},
    ir::Module,
    lexer, parser,
    util::fmt,
    vm::Vm,
    CompileError,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cmajor", about = "Compiles and runs cmajor programs", version)]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Print the hex opcode listing
    #[arg(long)]
    hex: bool,

    /// Print the CIL-like listing
    #[arg(long)]
    cil: bool,

    /// Only compile (and emit); do not run the program
    #[arg(long)]
    no_run: bool,

    /// Function to start from [default: `main`, or the generated entry wrapper]
    #[arg(long)]
    entry: Option<String>,

    /// Print the token stream
    #[arg(long)]
    dump_tokens: bool,

    /// Print the syntax tree
    #[arg(long)]
    dump_ast: bool,

    /// Print the IR listing
    #[arg(long)]
    dump_ir: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn Error>> {
    let src = fs::read_to_string(&cli.input)
        .map_err(|e| format!("failed to read {}: {e}", cli.input.display()))?;
    let mut out = io::stdout().lock();

    if cli.dump_tokens {
        for token in lexer::tokenize(&src) {
            writeln!(out, "{token:?}")?;
        }
    }
    if cli.dump_ast {
        let program = parser::parse(&src).map_err(CompileError::from)?;
        fmt::print_program(&mut out, &program)?;
    }

    // Nothing runs or gets emitted unless the whole program compiles.
    let module = cmajor::compile(&src)?;

    if cli.dump_ir {
        writeln!(out, "{module}")?;
    }
    if cli.hex {
        emit::write(&mut out, Format::Hex, &module)?;
    }
    if cli.cil {
        emit::write(&mut out, Format::Cil, &module)?;
    }
    if cli.no_run {
        return Ok(ExitCode::SUCCESS);
    }

    let entry = cli.entry.as_deref().unwrap_or_else(|| module.entry_point());
    Ok(execute(&module, entry, out))
}

/// Runs `entry` to completion. A fault has already been logged by the
/// interpreter, so it is not reported again here.
fn execute<W: Write>(module: &Module, entry: &str, out: W) -> ExitCode {
    let mut vm = Vm::new(module, out);
    let value = vm.call(entry);
    if vm.take_fault().is_some() {
        return ExitCode::FAILURE;
    }
    tracing::info!(entry, value, "program finished");
    ExitCode::SUCCESS
}
