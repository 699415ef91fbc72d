// Transcoder Error Handling

use std::fmt;

use crate::var::VarKind;

#[derive(Debug, Clone, PartialEq)]
pub enum ScummError {
    // Bytecode decoding errors
    UnexpectedEnd(usize), // offset of the missing byte
    UnknownOpcode(u8, usize),
    UnknownSubOpcode(&'static str, u8, usize), // family, sub-op byte, offset
    StrayModeBits(&'static str, u8, usize),
    MalformedVariable(u16),
    VariableOutOfRange(VarKind, u16),
    UnknownControlCode(u8, u8, usize), // escape byte, code, offset
    InvalidString(String),
    ExpressionStack(String, usize),
    InvalidNestedInstruction(String, usize),

    // Opcode table construction
    DuplicateOpcode(u8, &'static str, &'static str),

    // Label resolution and back-patching
    InvalidJumpTarget(i64, usize), // target, offset of the jump
    UndefinedLabel(String),
    DuplicateLabel(String),
    JumpOutOfRange(String, i64),

    // Front end errors
    LexicalError(String, usize),
    UnexpectedCharacter(char, usize),
    UnterminatedString(usize),
    ParseError(String, usize),
    ExpectedToken(String, String, usize), // expected, found, position
    UnknownInstruction(String, usize),
    InvalidArgument(String, usize),

    // Tooling
    ConfigError(String),
    IOError(String),
}

impl fmt::Display for ScummError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScummError::UnexpectedEnd(offset) => {
                write!(f, "Unexpected end of script at offset 0x{:04x}", offset)
            }
            ScummError::UnknownOpcode(opcode, offset) => {
                write!(f, "Unknown opcode 0x{:02x} at offset 0x{:04x}", opcode, offset)
            }
            ScummError::UnknownSubOpcode(family, sub, offset) => write!(
                f,
                "Unknown {} sub-opcode 0x{:02x} at offset 0x{:04x}",
                family, sub, offset
            ),
            ScummError::StrayModeBits(name, byte, offset) => write!(
                f,
                "Addressing-mode bits in 0x{:02x} select parameters {} does not have (offset 0x{:04x})",
                byte, name, offset
            ),
            ScummError::MalformedVariable(word) => {
                write!(f, "Malformed variable reference 0x{:04x}", word)
            }
            ScummError::VariableOutOfRange(kind, index) => {
                write!(f, "{:?} variable index {} out of range", kind, index)
            }
            ScummError::UnknownControlCode(escape, code, offset) => write!(
                f,
                "Unknown string control code 0x{:02x} 0x{:02x} at offset 0x{:04x}",
                escape, code, offset
            ),
            ScummError::InvalidString(msg) => write!(f, "Invalid string: {}", msg),
            ScummError::ExpressionStack(msg, offset) => {
                write!(f, "Expression stack error at offset 0x{:04x}: {}", offset, msg)
            }
            ScummError::InvalidNestedInstruction(msg, offset) => write!(
                f,
                "Invalid nested instruction at offset 0x{:04x}: {}",
                offset, msg
            ),
            ScummError::DuplicateOpcode(opcode, first, second) => write!(
                f,
                "Opcode 0x{:02x} registered twice ({} and {})",
                opcode, first, second
            ),
            ScummError::InvalidJumpTarget(target, from) => write!(
                f,
                "Jump at offset 0x{:04x} targets {}, which is not the start of an instruction",
                from, target
            ),
            ScummError::UndefinedLabel(label) => write!(f, "Undefined label '{}'", label),
            ScummError::DuplicateLabel(label) => write!(f, "Label '{}' defined twice", label),
            ScummError::JumpOutOfRange(label, distance) => write!(
                f,
                "Jump to '{}' spans {} bytes, beyond a 16-bit relative offset",
                label, distance
            ),
            ScummError::LexicalError(msg, pos) => {
                write!(f, "Lexical error at position {}: {}", pos, msg)
            }
            ScummError::UnexpectedCharacter(ch, pos) => {
                write!(f, "Unexpected character '{}' at position {}", ch, pos)
            }
            ScummError::UnterminatedString(pos) => {
                write!(f, "Unterminated string starting at position {}", pos)
            }
            ScummError::ParseError(msg, pos) => {
                write!(f, "Parse error at position {}: {}", pos, msg)
            }
            ScummError::ExpectedToken(expected, found, pos) => write!(
                f,
                "Expected '{}' but found '{}' at position {}",
                expected, found, pos
            ),
            ScummError::UnknownInstruction(name, pos) => {
                write!(f, "Unknown instruction '{}' at position {}", name, pos)
            }
            ScummError::InvalidArgument(msg, pos) => {
                write!(f, "Invalid argument at position {}: {}", pos, msg)
            }
            ScummError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ScummError::IOError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ScummError {}

impl From<std::io::Error> for ScummError {
    fn from(err: std::io::Error) -> Self {
        ScummError::IOError(err.to_string())
    }
}
