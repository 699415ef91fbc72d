use std::fmt::Write as _;

use log::{debug, info};

use crate::config::DisassemblyConfig;
use crate::error::ScummError;
use crate::instruction::Instruction;
use crate::labels;
use crate::opcode_tables::OpcodeTable;
use crate::render::{RenderOptions, Renderer};
use crate::script::{InstructionSink, PassOutcome, Script};

/// Line closing the listing of a non-recursive script.
pub const END_MARKER: &str = "// end of script";

/// One decoded instruction with its position in the script.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub offset: usize,
    pub opcode: u8,
    pub label: Option<String>,
    pub instruction: Instruction,
}

impl InstructionSink for Vec<Statement> {
    fn instruction(
        &mut self,
        offset: usize,
        opcode: u8,
        instruction: Instruction,
    ) -> Result<(), ScummError> {
        self.push(Statement {
            offset,
            opcode,
            label: None,
            instruction,
        });
        Ok(())
    }
}

/// Decoded script: the statement body plus the closing `stopObjectCode`,
/// when the script ends with one.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub body: Vec<Statement>,
    pub terminal: Option<Statement>,
    pub recursive: bool,
}

impl Listing {
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.body.iter().chain(self.terminal.iter())
    }

    pub fn statements_mut(&mut self) -> impl Iterator<Item = &mut Statement> {
        self.body.iter_mut().chain(self.terminal.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.body.len() + self.terminal.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Disassembler<'t> {
    table: &'t OpcodeTable,
    config: DisassemblyConfig,
}

impl<'t> Disassembler<'t> {
    pub fn new(table: &'t OpcodeTable, config: DisassemblyConfig) -> Self {
        Disassembler { table, config }
    }

    /// Step the whole byte range through a script and collect its statements.
    ///
    /// Delays are honoured on a virtual clock that jumps straight to the
    /// pending deadline; recursive scripts stop after one full traversal.
    pub fn decompile(&self, bytes: &[u8], recursive: bool) -> Result<Listing, ScummError> {
        let mut script = Script::new(bytes, &[], recursive);
        let mut body: Vec<Statement> = Vec::new();
        let mut clock = 0u64;
        let mut passes = 0usize;

        loop {
            passes += 1;
            match script.run_pass(clock, self.table, &mut body)? {
                PassOutcome::Yielded => {}
                PassOutcome::Suspended => match script.delay_until() {
                    Some(deadline) if deadline > clock => clock = deadline,
                    _ => break,
                },
                PassOutcome::Finished | PassOutcome::Rewound => break,
            }
        }

        let terminal = if !recursive && body.last().map_or(false, |s| s.instruction.is_terminal())
        {
            body.pop()
        } else {
            None
        };

        info!(
            "decompiled {} bytes into {} statements ({} passes)",
            bytes.len(),
            body.len() + terminal.iter().count(),
            passes
        );
        Ok(Listing {
            body,
            terminal,
            recursive,
        })
    }

    pub fn render(&self, listing: &Listing) -> String {
        let renderer = Renderer::new(
            self.table,
            RenderOptions {
                named_system_vars: self.config.named_system_vars,
            },
        );
        let mut out = String::new();

        for statement in listing.statements() {
            if let Some(label) = &statement.label {
                let _ = writeln!(out, "{}:", label);
            }
            let line = renderer.render(&statement.instruction);
            if self.config.annotate {
                let _ = writeln!(
                    out,
                    "    {:<48} // [{:04x}] {:02x}",
                    line, statement.offset, statement.opcode
                );
            } else {
                let _ = writeln!(out, "    {}", line);
            }
        }
        if !listing.recursive {
            let _ = writeln!(out, "{}", END_MARKER);
        }
        out
    }

    /// Bytes to text: decompile, assign labels, render.
    pub fn disassemble(&self, bytes: &[u8], recursive: bool) -> Result<String, ScummError> {
        let mut listing = self.decompile(bytes, recursive)?;
        let count = labels::normalize(&mut listing, &self.config.label_prefix)?;
        debug!("{} labels assigned", count);
        Ok(self.render(&listing))
    }
}

#[cfg(test)]
#[path = "disassembler_tests.rs"]
mod tests;
