//! Textual disassembly of IR modules. Emitters never execute anything and
//! accept every opcode, including the ones the generator never produces.

use std::io;

use crate::ir::Module;

pub mod cil;
pub mod hex;

/// Writes `module` in the given format.
pub fn write<W>(writer: W, format: Format, module: &Module) -> io::Result<()>
where
    W: io::Write,
{
    match format {
        Format::Hex => hex::Emitter::new(writer).emit(module),
        Format::Cil => cil::Emitter::new(writer).emit(module),
    }
}

/// Renders `module` in the given format into a string.
pub fn emit(format: Format, module: &Module) -> String {
    let mut buf = Vec::with_capacity(1024);
    write(&mut buf, format, module).expect("writing to a Vec never fails");
    String::from_utf8_lossy(&buf).into_owned()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Hex,
    Cil,
}

impl Format {
    pub const ALL: &[Format] = &[Format::Hex, Format::Cil];

    pub const fn name(self) -> &'static str {
        match self {
            Format::Hex => "hex",
            Format::Cil => "cil",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
