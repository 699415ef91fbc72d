// Statement Language Assembler
// Turns disassembled statement text back into script bytecode

pub mod ast;
pub mod emit;
pub mod lexer;
pub mod lower;
pub mod parser;

use log::info;

use crate::error::ScummError;
use crate::opcode_tables::OpcodeTable;

use emit::{Emitter, Placed};
use lower::Lowerer;

/// Main assembler structure
pub struct Assembler<'t> {
    table: &'t OpcodeTable,
}

impl Default for Assembler<'static> {
    fn default() -> Self {
        Assembler::new(OpcodeTable::standard())
    }
}

impl<'t> Assembler<'t> {
    pub fn new(table: &'t OpcodeTable) -> Self {
        Assembler { table }
    }

    /// Assemble statement text to bytecode
    pub fn assemble(&self, source: &str) -> Result<Vec<u8>, ScummError> {
        // Phase 1: Lexical Analysis
        let mut lexer = lexer::Lexer::new(source);
        let tokens = lexer.tokenize()?;

        // Phase 2: Parsing
        let mut parser = parser::Parser::new(tokens);
        let program = parser.parse()?;

        // Phase 3: Lowering to instructions
        let lowerer = Lowerer::new(self.table);
        let placed = program
            .statements
            .iter()
            .map(|statement| {
                Ok(Placed {
                    item: lowerer.lower(statement)?,
                    position: statement.position,
                })
            })
            .collect::<Result<Vec<_>, ScummError>>()?;

        // Phase 4: Emission and back-patching
        let mut emitter = Emitter::new(self.table);
        for item in &placed {
            emitter.emit(item)?;
        }
        let bytes = emitter.finish()?;

        info!(
            "assembled {} statements into {} bytes",
            program.statements.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
