//! Round-trip verification: disassemble, reassemble, compare.
//!
//! A mismatch is reported, not raised. Decoding and assembly failures are
//! still errors.

use log::{info, warn};

use crate::assembler::Assembler;
use crate::config::DisassemblyConfig;
use crate::disassembler::Disassembler;
use crate::error::ScummError;
use crate::opcode_tables::OpcodeTable;

#[derive(Debug, Clone, PartialEq)]
pub struct RoundTripReport {
    /// Listing produced by the disassembler.
    pub text: String,
    pub original: Vec<u8>,
    pub reassembled: Vec<u8>,
}

impl RoundTripReport {
    pub fn is_identical(&self) -> bool {
        self.original == self.reassembled
    }

    /// Offset of the first differing byte, or the shorter length when one
    /// output is a prefix of the other.
    pub fn first_difference(&self) -> Option<usize> {
        if self.is_identical() {
            return None;
        }
        let shared = self
            .original
            .iter()
            .zip(&self.reassembled)
            .position(|(a, b)| a != b);
        Some(shared.unwrap_or_else(|| self.original.len().min(self.reassembled.len())))
    }
}

pub fn round_trip(
    table: &OpcodeTable,
    config: &DisassemblyConfig,
    bytes: &[u8],
    recursive: bool,
) -> Result<RoundTripReport, ScummError> {
    let text = Disassembler::new(table, config.clone()).disassemble(bytes, recursive)?;
    let reassembled = Assembler::new(table).assemble(&text)?;

    let report = RoundTripReport {
        text,
        original: bytes.to_vec(),
        reassembled,
    };
    match report.first_difference() {
        None => info!("round trip identical ({} bytes)", bytes.len()),
        Some(at) => warn!(
            "round trip mismatch at offset 0x{:04x}: {} bytes in, {} bytes out ({:02x?} vs {:02x?})",
            at,
            report.original.len(),
            report.reassembled.len(),
            report.original.get(at),
            report.reassembled.get(at)
        ),
    }
    Ok(report)
}
