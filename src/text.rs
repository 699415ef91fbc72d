//! In-game string codec.
//!
//! Strings are NUL-terminated byte runs in a Latin-1 codepage with one
//! substitution (0x0F is the trademark glyph), interleaved with control
//! sequences introduced by 0xFF (or 0xFE for the alternate newline).
//! Decoding then encoding reproduces the source bytes exactly.

use std::fmt::Write as _;

use log::trace;

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::ScummError;
use crate::var::{decode_var, encode_var, Operand};

const ESCAPE: u8 = 0xff;
const ALT_ESCAPE: u8 = 0xfe;
const TRADEMARK_BYTE: u8 = 0x0f;
const TRADEMARK: char = '\u{2122}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringPart {
    Text(String),
    NewLine,
    NewLine2,
    KeepText,
    Sleep,
    Int(Operand),
    Verb(Operand),
    Name(Operand),
    GetString(Operand),
    VerbNewLine,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScummString {
    pub parts: Vec<StringPart>,
}

impl ScummString {
    pub fn new() -> Self {
        ScummString { parts: Vec::new() }
    }

    pub fn from_text(text: &str) -> Self {
        let mut s = ScummString::new();
        s.push_text(text);
        s
    }

    /// Append literal text, merging with a preceding text run.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(StringPart::Text(run)) = self.parts.last_mut() {
            run.push_str(text);
        } else {
            self.parts.push(StringPart::Text(text.to_string()));
        }
    }

    pub fn push(&mut self, part: StringPart) {
        match part {
            StringPart::Text(text) => self.push_text(&text),
            other => self.parts.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Decode up to and including the NUL terminator.
    pub fn decode(reader: &mut ByteReader) -> Result<Self, ScummError> {
        let start = reader.position();
        let mut s = ScummString::new();
        let mut run = String::new();

        loop {
            let byte = reader.read_u8()?;
            let part = match byte {
                0x00 => break,
                ESCAPE | ALT_ESCAPE => {
                    let at = reader.position() - 1;
                    let code = reader.read_u8()?;
                    control_part(reader, byte, code, at)?
                }
                TRADEMARK_BYTE => {
                    run.push(TRADEMARK);
                    continue;
                }
                _ => {
                    run.push(byte as char);
                    continue;
                }
            };
            s.push_text(&run);
            run.clear();
            s.parts.push(part);
        }
        s.push_text(&run);

        trace!(
            "decoded string at 0x{:04x}: {} parts",
            start,
            s.parts.len()
        );
        Ok(s)
    }

    /// Encode followed by the NUL terminator.
    pub fn encode(&self, writer: &mut ByteWriter) -> Result<(), ScummError> {
        for part in &self.parts {
            match part {
                StringPart::Text(text) => {
                    for ch in text.chars() {
                        writer.emit_u8(encode_char(ch)?);
                    }
                }
                StringPart::NewLine => writer.emit_bytes(&[ESCAPE, 0x01]),
                StringPart::NewLine2 => writer.emit_bytes(&[ALT_ESCAPE, 0x01]),
                StringPart::KeepText => writer.emit_bytes(&[ESCAPE, 0x02]),
                StringPart::Sleep => writer.emit_bytes(&[ESCAPE, 0x03]),
                StringPart::Int(op) => {
                    writer.emit_bytes(&[ESCAPE, 0x04]);
                    encode_var(writer, op)?;
                }
                StringPart::Verb(op) => {
                    writer.emit_bytes(&[ESCAPE, 0x05]);
                    encode_var(writer, op)?;
                }
                StringPart::Name(op) => {
                    writer.emit_bytes(&[ESCAPE, 0x06]);
                    encode_var(writer, op)?;
                }
                StringPart::GetString(op) => {
                    writer.emit_bytes(&[ESCAPE, 0x07]);
                    encode_var(writer, op)?;
                }
                StringPart::VerbNewLine => writer.emit_bytes(&[ESCAPE, 0x08]),
            }
        }
        writer.emit_u8(0x00);
        Ok(())
    }

    /// Markup form used inside a quoted string literal (without the quotes).
    pub fn to_markup(&self, named_vars: bool) -> String {
        let mut out = String::new();
        let name = |op: &Operand| {
            if named_vars {
                op.to_string()
            } else {
                op.canonical().to_string()
            }
        };
        for part in &self.parts {
            match part {
                StringPart::Text(text) => escape_text(text, &mut out),
                StringPart::NewLine => out.push_str("{nl}"),
                StringPart::NewLine2 => out.push_str("{nl2}"),
                StringPart::VerbNewLine => out.push_str("{vnl}"),
                StringPart::KeepText => out.push_str("{keep}"),
                StringPart::Sleep => out.push_str("{wait}"),
                StringPart::Int(op) => {
                    let _ = write!(out, "{{int:{}}}", name(op));
                }
                StringPart::Verb(op) => {
                    let _ = write!(out, "{{verb:{}}}", name(op));
                }
                StringPart::Name(op) => {
                    let _ = write!(out, "{{name:{}}}", name(op));
                }
                StringPart::GetString(op) => {
                    let _ = write!(out, "{{string:{}}}", name(op));
                }
            }
        }
        out
    }

    /// Parse the markup produced by [`ScummString::to_markup`].
    ///
    /// `operand` turns the source of a `{int:...}`-style argument into an
    /// operand; `base` is the position of the literal in the source, used
    /// in error messages.
    pub fn parse_markup<F>(src: &str, base: usize, mut operand: F) -> Result<Self, ScummError>
    where
        F: FnMut(&str, usize) -> Result<Operand, ScummError>,
    {
        let mut s = ScummString::new();
        let mut run = String::new();
        let chars: Vec<(usize, char)> = src.char_indices().collect();
        let mut i = 0;

        while i < chars.len() {
            let (at, ch) = chars[i];
            match ch {
                '\\' => {
                    let (_, next) = *chars.get(i + 1).ok_or_else(|| {
                        ScummError::LexicalError("dangling escape".to_string(), base + at)
                    })?;
                    match next {
                        '"' | '\\' | '{' => {
                            run.push(next);
                            i += 2;
                        }
                        'x' => {
                            let hex: String = chars.iter().skip(i + 2).take(2).map(|c| c.1).collect();
                            let value = u8::from_str_radix(&hex, 16).map_err(|_| {
                                ScummError::LexicalError(
                                    format!("bad hex escape '\\x{}'", hex),
                                    base + at,
                                )
                            })?;
                            if hex.len() != 2 {
                                return Err(ScummError::LexicalError(
                                    "hex escape needs two digits".to_string(),
                                    base + at,
                                ));
                            }
                            run.push(value as char);
                            i += 4;
                        }
                        other => {
                            return Err(ScummError::LexicalError(
                                format!("unknown escape '\\{}'", other),
                                base + at,
                            ))
                        }
                    }
                }
                '{' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| c.1 == '}')
                        .map(|n| i + n)
                        .ok_or_else(|| {
                            ScummError::LexicalError("unterminated '{' markup".to_string(), base + at)
                        })?;
                    let body: String = chars[i + 1..close].iter().map(|c| c.1).collect();
                    let arg_at = base + at + 1;
                    let part = match body.split_once(':') {
                        None => match body.as_str() {
                            "nl" => StringPart::NewLine,
                            "nl2" => StringPart::NewLine2,
                            "vnl" => StringPart::VerbNewLine,
                            "keep" => StringPart::KeepText,
                            "wait" => StringPart::Sleep,
                            _ => {
                                return Err(ScummError::LexicalError(
                                    format!("unknown markup '{{{}}}'", body),
                                    base + at,
                                ))
                            }
                        },
                        Some((tag, arg)) => {
                            let op = operand(arg.trim(), arg_at + tag.len() + 1)?;
                            match tag {
                                "int" => StringPart::Int(op),
                                "verb" => StringPart::Verb(op),
                                "name" => StringPart::Name(op),
                                "string" => StringPart::GetString(op),
                                _ => {
                                    return Err(ScummError::LexicalError(
                                        format!("unknown markup '{{{}:...}}'", tag),
                                        base + at,
                                    ))
                                }
                            }
                        }
                    };
                    s.push_text(&run);
                    run.clear();
                    s.parts.push(part);
                    i = close + 1;
                }
                _ => {
                    run.push(ch);
                    i += 1;
                }
            }
        }
        s.push_text(&run);
        Ok(s)
    }
}

fn control_part(
    reader: &mut ByteReader,
    escape: u8,
    code: u8,
    at: usize,
) -> Result<StringPart, ScummError> {
    if escape == ALT_ESCAPE {
        return match code {
            0x01 => Ok(StringPart::NewLine2),
            _ => Err(ScummError::UnknownControlCode(escape, code, at)),
        };
    }
    let part = match code {
        0x01 => StringPart::NewLine,
        0x02 => StringPart::KeepText,
        0x03 => StringPart::Sleep,
        0x04 => StringPart::Int(decode_var(reader)?),
        0x05 => StringPart::Verb(decode_var(reader)?),
        0x06 => StringPart::Name(decode_var(reader)?),
        0x07 => StringPart::GetString(decode_var(reader)?),
        0x08 => StringPart::VerbNewLine,
        _ => return Err(ScummError::UnknownControlCode(escape, code, at)),
    };
    Ok(part)
}

fn encode_char(ch: char) -> Result<u8, ScummError> {
    if ch == TRADEMARK {
        return Ok(TRADEMARK_BYTE);
    }
    match ch as u32 {
        0x00 | 0xfe | 0xff => Err(ScummError::InvalidString(format!(
            "byte 0x{:02x} cannot appear in literal text",
            ch as u32
        ))),
        code @ 0x01..=0xfd => Ok(code as u8),
        _ => Err(ScummError::InvalidString(format!(
            "character '{}' is outside the game codepage",
            ch
        ))),
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            TRADEMARK => out.push(TRADEMARK),
            c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
}
