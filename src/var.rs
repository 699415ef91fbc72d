//! Variable references, operands and the operand resolver.
//!
//! A variable reference is a 16-bit little-endian word:
//!
//! ```text
//! 0x8000  bit variable      index < 0x800
//! 0x4000  local variable    index <= 0x10
//! else    global variable   index < 0x320
//! 0x2000  a second word follows (compound reference)
//! ```
//!
//! The second word of a compound reference is either a literal offset, or,
//! when its own 0x2000 bit is set, another (plain) variable reference.

use std::collections::HashMap;
use std::fmt;

use log::trace;

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::ScummError;

pub const BIT_FLAG: u16 = 0x8000;
pub const LOCAL_FLAG: u16 = 0x4000;
pub const INDIRECT_FLAG: u16 = 0x2000;
pub const INDEX_MASK: u16 = 0x0fff;

pub const MAX_BIT_INDEX: u16 = 0x7ff;
pub const MAX_LOCAL_INDEX: u16 = 0x10;
pub const MAX_GLOBAL_INDEX: u16 = 0x31f;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Bit,
    Local,
    Global,
}

impl VarKind {
    /// Keyword used for the kind in statement text.
    pub fn keyword(&self) -> &'static str {
        match self {
            VarKind::Bit => "Bit",
            VarKind::Local => "Local",
            VarKind::Global => "Var",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "Bit" => Some(VarKind::Bit),
            "Local" => Some(VarKind::Local),
            "Var" => Some(VarKind::Global),
            _ => None,
        }
    }

    fn max_index(&self) -> u16 {
        match self {
            VarKind::Bit => MAX_BIT_INDEX,
            VarKind::Local => MAX_LOCAL_INDEX,
            VarKind::Global => MAX_GLOBAL_INDEX,
        }
    }
}

/// A plain (non-compound) variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var {
    pub kind: VarKind,
    pub index: u16,
}

impl Var {
    pub fn new(kind: VarKind, index: u16) -> Result<Self, ScummError> {
        if index > kind.max_index() {
            return Err(ScummError::VariableOutOfRange(kind, index));
        }
        Ok(Var { kind, index })
    }

    pub fn global(index: u16) -> Result<Self, ScummError> {
        Var::new(VarKind::Global, index)
    }

    pub fn local(index: u16) -> Result<Self, ScummError> {
        Var::new(VarKind::Local, index)
    }

    pub fn bit(index: u16) -> Result<Self, ScummError> {
        Var::new(VarKind::Bit, index)
    }

    /// Classify a word whose 0x2000 bit has already been cleared.
    pub fn from_word(word: u16) -> Result<Self, ScummError> {
        let (kind, stray) = if word & BIT_FLAG != 0 {
            (VarKind::Bit, word & (LOCAL_FLAG | 0x1000))
        } else if word & LOCAL_FLAG != 0 {
            (VarKind::Local, word & 0x1000)
        } else {
            (VarKind::Global, word & 0x1000)
        };
        if stray != 0 || word & INDIRECT_FLAG != 0 {
            return Err(ScummError::MalformedVariable(word));
        }
        Var::new(kind, word & INDEX_MASK)
    }

    pub fn to_word(&self) -> u16 {
        match self.kind {
            VarKind::Bit => BIT_FLAG | self.index,
            VarKind::Local => LOCAL_FLAG | self.index,
            VarKind::Global => self.index,
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}]", self.kind.keyword(), self.index)
    }
}

/// Second word of a compound reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarOffset {
    Literal(u16),
    Var(Var),
}

/// A well-known global with a mnemonic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemVar {
    pub index: u16,
    pub name: &'static str,
}

const SYSTEM_VARS: &[(u16, &str)] = &[
    (1, "VAR_EGO"),
    (2, "VAR_CAMERA_POS_X"),
    (3, "VAR_HAVE_MSG"),
    (4, "VAR_ROOM"),
    (5, "VAR_OVERRIDE"),
    (6, "VAR_MACHINE_SPEED"),
    (7, "VAR_ME"),
    (8, "VAR_NUM_ACTOR"),
    (9, "VAR_CURRENT_LIGHTS"),
    (10, "VAR_CURRENTDRIVE"),
    (11, "VAR_TMR_1"),
    (12, "VAR_TMR_2"),
    (13, "VAR_TMR_3"),
    (14, "VAR_MUSIC_TIMER"),
    (15, "VAR_ACTOR_RANGE_MIN"),
    (16, "VAR_ACTOR_RANGE_MAX"),
    (17, "VAR_CAMERA_MIN_X"),
    (18, "VAR_CAMERA_MAX_X"),
    (19, "VAR_TIMER_NEXT"),
    (20, "VAR_VIRT_MOUSE_X"),
    (21, "VAR_VIRT_MOUSE_Y"),
    (22, "VAR_ROOM_RESOURCE"),
    (23, "VAR_LAST_SOUND"),
    (24, "VAR_CUTSCENEEXIT_KEY"),
    (25, "VAR_TALK_ACTOR"),
    (26, "VAR_CAMERA_FAST_X"),
    (28, "VAR_ENTRY_SCRIPT"),
    (30, "VAR_EXIT_SCRIPT"),
    (32, "VAR_VERB_SCRIPT"),
    (33, "VAR_SENTENCE_SCRIPT"),
    (34, "VAR_INVENTORY_SCRIPT"),
    (35, "VAR_CUTSCENE_START_SCRIPT"),
    (36, "VAR_CUTSCENE_END_SCRIPT"),
    (44, "VAR_MOUSE_X"),
    (45, "VAR_MOUSE_Y"),
    (46, "VAR_TIMER"),
    (47, "VAR_TIMER_TOTAL"),
];

lazy_static! {
    static ref SYSTEM_VARS_BY_INDEX: HashMap<u16, &'static str> =
        SYSTEM_VARS.iter().copied().collect();
    static ref SYSTEM_VARS_BY_NAME: HashMap<&'static str, u16> =
        SYSTEM_VARS.iter().map(|&(index, name)| (name, index)).collect();
}

impl SystemVar {
    pub fn by_index(index: u16) -> Option<Self> {
        SYSTEM_VARS_BY_INDEX
            .get(&index)
            .map(|&name| SystemVar { index, name })
    }

    pub fn by_name(name: &str) -> Option<Self> {
        SYSTEM_VARS_BY_NAME
            .get_key_value(name)
            .map(|(&name, &index)| SystemVar { index, name })
    }

    pub fn var(&self) -> Var {
        Var {
            kind: VarKind::Global,
            index: self.index,
        }
    }
}

/// One decoded instruction parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Byte(u8),
    Word(i16),
    Var(Var),
    System(SystemVar),
    Compound(Var, VarOffset),
}

impl Operand {
    pub fn is_variable(&self) -> bool {
        !matches!(self, Operand::Byte(_) | Operand::Word(_))
    }

    /// Literal value, if this operand is a constant.
    pub fn constant(&self) -> Option<i32> {
        match self {
            Operand::Byte(v) => Some(*v as i32),
            Operand::Word(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Named system variables collapse to their plain global; everything
    /// else is returned unchanged.
    pub fn canonical(self) -> Operand {
        match self {
            Operand::System(sys) => Operand::Var(sys.var()),
            other => other,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Byte(v) => write!(f, "{}", v),
            Operand::Word(v) => write!(f, "{}", v),
            Operand::Var(var) => write!(f, "{}", var),
            Operand::System(sys) => write!(f, "{}", sys.name),
            Operand::Compound(base, VarOffset::Literal(offset)) => {
                write!(f, "{}[{} + {}]", base.kind.keyword(), base.index, offset)
            }
            Operand::Compound(base, VarOffset::Var(var)) => {
                write!(f, "{}[{} + {}]", base.kind.keyword(), base.index, var)
            }
        }
    }
}

/// Decode a variable reference, following one level of indirection.
pub fn decode_var(reader: &mut ByteReader) -> Result<Operand, ScummError> {
    let word = reader.read_u16()?;
    let base = Var::from_word(word & !INDIRECT_FLAG)?;

    if word & INDIRECT_FLAG != 0 {
        let second = reader.read_u16()?;
        let offset = if second & INDIRECT_FLAG != 0 {
            VarOffset::Var(Var::from_word(second & !INDIRECT_FLAG)?)
        } else {
            VarOffset::Literal(second)
        };
        trace!("compound variable 0x{:04x} 0x{:04x}", word, second);
        return Ok(Operand::Compound(base, offset));
    }

    if base.kind == VarKind::Global {
        if let Some(sys) = SystemVar::by_index(base.index) {
            return Ok(Operand::System(sys));
        }
    }
    Ok(Operand::Var(base))
}

/// Encode a variable operand; constants are rejected.
pub fn encode_var(writer: &mut ByteWriter, operand: &Operand) -> Result<(), ScummError> {
    match operand {
        Operand::Var(var) => writer.emit_u16(var.to_word()),
        Operand::System(sys) => writer.emit_u16(sys.var().to_word()),
        Operand::Compound(base, offset) => {
            writer.emit_u16(base.to_word() | INDIRECT_FLAG);
            match offset {
                VarOffset::Literal(value) => {
                    if value & INDIRECT_FLAG != 0 {
                        return Err(ScummError::MalformedVariable(*value));
                    }
                    writer.emit_u16(*value)
                }
                VarOffset::Var(var) => writer.emit_u16(var.to_word() | INDIRECT_FLAG),
            }
        }
        Operand::Byte(_) | Operand::Word(_) => {
            return Err(ScummError::InvalidArgument(
                format!("expected a variable, found constant {}", operand),
                0,
            ))
        }
    }
    Ok(())
}

/// Width of a literal parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
}

/// Mode bit for parameter `position` (0, 1 or 2).
pub fn mode_bit(position: u8) -> u8 {
    0x80 >> position
}

/// Operand resolver: literal or variable, selected by the mode byte.
pub fn read_param(
    reader: &mut ByteReader,
    modes: u8,
    position: u8,
    width: Width,
) -> Result<Operand, ScummError> {
    if modes & mode_bit(position) != 0 {
        return decode_var(reader);
    }
    match width {
        Width::Byte => Ok(Operand::Byte(reader.read_u8()?)),
        Width::Word => Ok(Operand::Word(reader.read_i16()?)),
    }
}

/// Inverse of [`read_param`]; the caller sets the mode bit from
/// [`Operand::is_variable`].
pub fn write_param(
    writer: &mut ByteWriter,
    operand: &Operand,
    width: Width,
) -> Result<(), ScummError> {
    if operand.is_variable() {
        return encode_var(writer, operand);
    }
    let value = operand.constant().unwrap_or_default();
    match width {
        Width::Byte => {
            if !(0..=0xff).contains(&value) {
                return Err(ScummError::InvalidArgument(
                    format!("{} does not fit in a byte parameter", value),
                    0,
                ));
            }
            writer.emit_u8(value as u8);
        }
        Width::Word => {
            if !(i16::MIN as i32..=u16::MAX as i32).contains(&value) {
                return Err(ScummError::InvalidArgument(
                    format!("{} does not fit in a word parameter", value),
                    0,
                ));
            }
            writer.emit_u16(value as u16);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(operand: Operand) -> (Vec<u8>, Operand) {
        let mut writer = ByteWriter::new();
        encode_var(&mut writer, &operand).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        let decoded = decode_var(&mut reader).unwrap();
        assert!(reader.is_at_end());
        (bytes, decoded)
    }

    #[test]
    fn test_kind_classification() {
        let bytes = [0x05, 0x80, 0x03, 0x40, 0x64, 0x00];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            decode_var(&mut reader).unwrap(),
            Operand::Var(Var::bit(5).unwrap())
        );
        assert_eq!(
            decode_var(&mut reader).unwrap(),
            Operand::Var(Var::local(3).unwrap())
        );
        assert_eq!(
            decode_var(&mut reader).unwrap(),
            Operand::Var(Var::global(100).unwrap())
        );
    }

    #[test]
    fn test_system_variable_named() {
        let bytes = [0x01, 0x00];
        let mut reader = ByteReader::new(&bytes);
        let operand = decode_var(&mut reader).unwrap();
        assert_eq!(operand.to_string(), "VAR_EGO");
        assert_eq!(operand.canonical(), Operand::Var(Var::global(1).unwrap()));

        let (bytes, _) = round_trip(Operand::System(SystemVar::by_name("VAR_EGO").unwrap()));
        assert_eq!(bytes, vec![0x01, 0x00]);
    }

    #[test]
    fn test_symmetry_over_valid_ranges() {
        for (kind, max) in [
            (VarKind::Bit, MAX_BIT_INDEX),
            (VarKind::Local, MAX_LOCAL_INDEX),
            (VarKind::Global, MAX_GLOBAL_INDEX),
        ] {
            for index in 0..=max {
                let operand = Operand::Var(Var::new(kind, index).unwrap());
                let (_, decoded) = round_trip(operand);
                assert_eq!(decoded.canonical(), operand);
            }
        }
    }

    #[test]
    fn test_compound_literal_offset() {
        let operand = Operand::Compound(Var::global(10).unwrap(), VarOffset::Literal(5));
        let (bytes, decoded) = round_trip(operand);
        assert_eq!(bytes, vec![0x0a, 0x20, 0x05, 0x00]);
        assert_eq!(decoded, operand);
        assert_eq!(decoded.to_string(), "Var[10 + 5]");
    }

    #[test]
    fn test_compound_variable_offset_sets_indirect_on_both_words() {
        let operand = Operand::Compound(
            Var::bit(7).unwrap(),
            VarOffset::Var(Var::local(2).unwrap()),
        );
        let (bytes, decoded) = round_trip(operand);
        assert_eq!(bytes, vec![0x07, 0xa0, 0x02, 0x60]);
        assert_eq!(decoded, operand);
        assert_eq!(decoded.to_string(), "Bit[7 + Local[2]]");
    }

    #[test]
    fn test_compound_pairs_symmetric() {
        let bases = [Var::global(0).unwrap(), Var::local(16).unwrap(), Var::bit(0x7ff).unwrap()];
        let offsets = [
            VarOffset::Literal(0),
            VarOffset::Literal(0x1fff),
            VarOffset::Var(Var::global(1).unwrap()),
            VarOffset::Var(Var::bit(3).unwrap()),
        ];
        for base in bases {
            for offset in offsets {
                let operand = Operand::Compound(base, offset);
                assert_eq!(round_trip(operand).1, operand);
            }
        }
    }

    #[test]
    fn test_out_of_range_indices_rejected() {
        assert_eq!(
            Var::from_word(0x4011),
            Err(ScummError::VariableOutOfRange(VarKind::Local, 0x11))
        );
        assert_eq!(
            Var::from_word(0x0320),
            Err(ScummError::VariableOutOfRange(VarKind::Global, 0x320))
        );
        assert_eq!(
            Var::from_word(0x8800),
            Err(ScummError::VariableOutOfRange(VarKind::Bit, 0x800))
        );
    }

    #[test]
    fn test_malformed_words_rejected() {
        assert!(matches!(
            Var::from_word(0x1005),
            Err(ScummError::MalformedVariable(_))
        ));
        assert!(matches!(
            Var::from_word(0xc005),
            Err(ScummError::MalformedVariable(_))
        ));
    }

    #[test]
    fn test_operand_resolver_uses_position_bits() {
        // modes 0x40: position 0 literal byte, position 1 variable
        let bytes = [0x07, 0x02, 0x40];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            read_param(&mut reader, 0x40, 0, Width::Byte).unwrap(),
            Operand::Byte(7)
        );
        assert_eq!(
            read_param(&mut reader, 0x40, 1, Width::Word).unwrap(),
            Operand::Var(Var::local(2).unwrap())
        );
    }

    #[test]
    fn test_write_param_range_checks() {
        let mut writer = ByteWriter::new();
        assert!(write_param(&mut writer, &Operand::Word(300), Width::Byte).is_err());
        write_param(&mut writer, &Operand::Word(-2), Width::Word).unwrap();
        assert_eq!(writer.as_slice(), &[0xfe, 0xff]);
    }
}
