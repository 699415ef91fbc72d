//! SCUMM v5 script bytecode disassembler and assembler.
//!
//! Bytes decode to a listing of statement lines; the assembler turns those
//! lines back into the identical bytes.

#[macro_use]
extern crate lazy_static;

pub mod assembler;
pub mod config;
pub mod cursor;
pub mod disassembler;
pub mod encode;
pub mod error;
pub mod instruction;
pub mod labels;
pub mod opcode_tables;
pub mod render;
pub mod script;
pub mod text;
pub mod var;
pub mod verify;

pub use assembler::Assembler;
pub use config::Config;
pub use disassembler::Disassembler;
pub use error::ScummError;
pub use opcode_tables::OpcodeTable;
