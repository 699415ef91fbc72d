//! Little-endian byte cursors shared by the decoder and the assembler.

use crate::error::ScummError;

/// Read cursor over one script's byte range.
///
/// Positions are relative to the start of the script, which is also the
/// coordinate space jump targets and labels live in.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.bytes.len());
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, ScummError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(ScummError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, ScummError> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Ok(lo | (hi << 8))
    }

    pub fn read_i16(&mut self) -> Result<i16, ScummError> {
        Ok(self.read_u16()? as i16)
    }

    /// Three-byte little-endian value (the `delay` tick count).
    pub fn read_u24(&mut self) -> Result<u32, ScummError> {
        let lo = self.read_u16()? as u32;
        let hi = self.read_u8()? as u32;
        Ok(lo | (hi << 16))
    }
}

/// Growable output buffer with in-place patching for back-patched jumps.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        ByteWriter { bytes: Vec::new() }
    }

    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn emit_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn emit_u16(&mut self, word: u16) {
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }

    pub fn emit_u24(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes()[..3]);
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Overwrite a previously emitted 16-bit field.
    pub fn patch_u16(&mut self, at: usize, word: u16) -> Result<(), ScummError> {
        if at + 2 > self.bytes.len() {
            return Err(ScummError::UnexpectedEnd(at));
        }
        self.bytes[at..at + 2].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
