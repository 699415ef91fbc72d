//! Emission and jump back-patching.
//!
//! Instructions are encoded in source order. Each label records the offset
//! of the next instruction; jumps to labels leave a zero placeholder in
//! their 16-bit field, which is rewritten once every label is known.
//! Every jump must land on an emitted statement, so a label after the last
//! statement is rejected just as the decoder would reject its target.

use indexmap::IndexMap;

use crate::cursor::ByteWriter;
use crate::encode::{relative_offset, Encoder, PendingJump};
use crate::error::ScummError;
use crate::instruction::JumpTarget;
use crate::opcode_tables::OpcodeTable;

use super::lower::Lowered;

/// A lowered line with its source position, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub item: Lowered,
    pub position: usize,
}

pub struct Emitter<'t> {
    encoder: Encoder<'t>,
    labels: IndexMap<String, usize>,
    /// Offsets of emitted statements, ascending.
    starts: Vec<usize>,
    /// Numeric jump targets and the offset of the jump using each.
    raw_targets: Vec<(usize, usize)>,
}

impl<'t> Emitter<'t> {
    pub fn new(table: &'t OpcodeTable) -> Self {
        Emitter {
            encoder: Encoder::new(table),
            labels: IndexMap::new(),
            starts: Vec::new(),
            raw_targets: Vec::new(),
        }
    }

    pub fn emit(&mut self, placed: &Placed) -> Result<(), ScummError> {
        match &placed.item {
            Lowered::Label(name) => {
                let offset = self.encoder.position();
                if self.labels.insert(name.clone(), offset).is_some() {
                    return Err(ScummError::DuplicateLabel(name.clone()));
                }
                log::debug!("label {} = 0x{:04x}", name, offset);
                Ok(())
            }
            Lowered::Instruction(instruction) => {
                let start = self.encoder.position();
                self.starts.push(start);
                if let Some(JumpTarget::Offset(target)) = instruction.jump_target() {
                    self.raw_targets.push((*target, start));
                }
                self.encoder
                    .encode(instruction)
                    .map_err(|e| locate(e, placed.position))
            }
        }
    }

    /// Patch every pending jump and return the finished bytes.
    pub fn finish(self) -> Result<Vec<u8>, ScummError> {
        let (mut out, pending) = self.encoder.into_parts();
        log::debug!(
            "resolving {} jumps against {} labels",
            pending.len(),
            self.labels.len()
        );
        for (target, from) in &self.raw_targets {
            check_target(&self.starts, *target, *from)?;
        }
        for jump in &pending {
            patch_jump(&mut out, jump, &self.labels, &self.starts)?;
        }
        Ok(out.into_bytes())
    }
}

fn check_target(starts: &[usize], target: usize, from: usize) -> Result<(), ScummError> {
    match starts.binary_search(&target) {
        Ok(_) => Ok(()),
        Err(_) => Err(ScummError::InvalidJumpTarget(target as i64, from)),
    }
}

fn patch_jump(
    out: &mut ByteWriter,
    jump: &PendingJump,
    labels: &IndexMap<String, usize>,
    starts: &[usize],
) -> Result<(), ScummError> {
    let target = *labels
        .get(&jump.label)
        .ok_or_else(|| ScummError::UndefinedLabel(jump.label.clone()))?;
    check_target(starts, target, jump.from)?;
    let rel = relative_offset(target, jump.field).ok_or_else(|| {
        ScummError::JumpOutOfRange(
            jump.label.clone(),
            target as i64 - jump.field as i64 - 2,
        )
    })?;
    log::trace!(
        "jump at 0x{:04x} -> {} (0x{:04x}, rel {})",
        jump.from,
        jump.label,
        target,
        rel
    );
    out.patch_u16(jump.field, rel as u16)
}

/// Give encoder errors that carry no position the position of their line.
fn locate(error: ScummError, position: usize) -> ScummError {
    match error {
        ScummError::InvalidArgument(msg, 0) => ScummError::InvalidArgument(msg, position),
        ScummError::InvalidNestedInstruction(msg, _) => {
            ScummError::InvalidNestedInstruction(msg, position)
        }
        other => other,
    }
}
