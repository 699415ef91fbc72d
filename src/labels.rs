//! Label normalizer: raw jump offsets become symbolic labels.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::trace;

use crate::disassembler::Listing;
use crate::error::ScummError;
use crate::instruction::JumpTarget;

/// Replace every offset jump target with a label and attach the labels to
/// their target statements. Labels are numbered in order of first
/// reference. Returns the number of labels created.
pub fn normalize(listing: &mut Listing, prefix: &str) -> Result<usize, ScummError> {
    let starts: HashSet<usize> = listing.statements().map(|s| s.offset).collect();
    let mut labels: IndexMap<usize, String> = IndexMap::new();

    for statement in listing.statements() {
        if let Some(JumpTarget::Offset(target)) = statement.instruction.jump_target() {
            if !starts.contains(target) {
                return Err(ScummError::InvalidJumpTarget(
                    *target as i64,
                    statement.offset,
                ));
            }
            if !labels.contains_key(target) {
                let name = format!("{}{}", prefix, labels.len() + 1);
                trace!("label {} -> 0x{:04x}", name, target);
                labels.insert(*target, name);
            }
        }
    }

    for statement in listing.statements_mut() {
        if let Some(name) = labels.get(&statement.offset) {
            statement.label = Some(name.clone());
        }
        if let Some(target) = statement.instruction.jump_target_mut() {
            if let JumpTarget::Offset(offset) = *target {
                if let Some(name) = labels.get(&offset) {
                    *target = JumpTarget::Label(name.clone());
                }
            }
        }
    }

    Ok(labels.len())
}
