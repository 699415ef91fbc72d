// Instruction encoder, the inverse of instruction::decode

use log::{debug, trace};

use crate::cursor::ByteWriter;
use crate::error::ScummError;
use crate::instruction::{Arg, Expr, Instruction, JumpTarget, SubCall};
use crate::opcode_tables::{Form, Op, OpcodeSpec, OpcodeTable, Param, SubOpTable};
use crate::var::{encode_var, mode_bit, write_param, Operand, Width};

/// A relative jump field waiting for its label's final offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJump {
    pub label: String,
    /// Offset of the 16-bit field.
    pub field: usize,
    /// Offset of the jump instruction.
    pub from: usize,
}

/// Encoded parameter group: mode bits of the first group, which of those
/// bits are meaningful, and the bytes (later mode bytes included).
struct EncodedParams {
    modes: u8,
    significant: u8,
    bytes: Vec<u8>,
}

pub struct Encoder<'t> {
    table: &'t OpcodeTable,
    out: ByteWriter,
    pending: Vec<PendingJump>,
}

impl<'t> Encoder<'t> {
    pub fn new(table: &'t OpcodeTable) -> Self {
        Encoder {
            table,
            out: ByteWriter::new(),
            pending: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.out.position()
    }

    pub fn into_parts(self) -> (ByteWriter, Vec<PendingJump>) {
        (self.out, self.pending)
    }

    pub fn encode(&mut self, instruction: &Instruction) -> Result<(), ScummError> {
        let start = self.out.position();
        let op = instruction.op();
        let spec = self.spec(op)?;

        match instruction {
            Instruction::Call { args, .. } => {
                let params = match spec.form {
                    Form::Call(params) => params,
                    _ => return Err(form_mismatch(op)),
                };
                let encoded = encode_params(params, args, op.name())?;
                self.emit_opcode(op, encoded.modes, encoded.significant)?;
                self.out.emit_bytes(&encoded.bytes);
            }
            Instruction::Store { result, args, .. } => {
                let params = match spec.form {
                    Form::Store(params) => params,
                    _ => return Err(form_mismatch(op)),
                };
                let encoded = encode_params(params, args, op.name())?;
                self.emit_opcode(op, encoded.modes, encoded.significant)?;
                encode_var(&mut self.out, result)?;
                self.out.emit_bytes(&encoded.bytes);
            }
            Instruction::Update { target, value, .. } => {
                let with_value = match spec.form {
                    Form::Update { with_value, .. } => with_value,
                    _ => return Err(form_mismatch(op)),
                };
                match (with_value, value) {
                    (true, Some(value)) => {
                        self.emit_opcode(op, var_bit(value, 0), mode_bit(0))?;
                        encode_var(&mut self.out, target)?;
                        write_param(&mut self.out, value, Width::Word)?;
                    }
                    (false, None) => {
                        self.emit_opcode(op, 0, 0)?;
                        encode_var(&mut self.out, target)?;
                    }
                    _ => {
                        return Err(ScummError::InvalidArgument(
                            format!("{} takes {} value", op.name(), if with_value { "one" } else { "no" }),
                            0,
                        ))
                    }
                }
            }
            Instruction::Expression { result, expr } => {
                self.emit_opcode(op, 0, 0)?;
                encode_var(&mut self.out, result)?;
                self.encode_expr(expr)?;
                self.out.emit_u8(0xff);
            }
            Instruction::Compare {
                var, value, target, ..
            } => {
                self.emit_opcode(op, var_bit(value, 0), mode_bit(0))?;
                encode_var(&mut self.out, var)?;
                write_param(&mut self.out, value, Width::Word)?;
                self.emit_jump(target, start)?;
            }
            Instruction::Test { var, target, .. } => {
                self.emit_opcode(op, 0, 0)?;
                encode_var(&mut self.out, var)?;
                self.emit_jump(target, start)?;
            }
            Instruction::Predicate { args, target, .. } => {
                let params = match spec.form {
                    Form::Predicate(params) => params,
                    _ => return Err(form_mismatch(op)),
                };
                let encoded = encode_params(params, args, op.name())?;
                self.emit_opcode(op, encoded.modes, encoded.significant)?;
                self.out.emit_bytes(&encoded.bytes);
                self.emit_jump(target, start)?;
            }
            Instruction::Jump { target } => {
                self.emit_opcode(op, 0, 0)?;
                self.emit_jump(target, start)?;
            }
            Instruction::Block {
                args, props, spare, ..
            } => {
                let (leading, table) = match spec.form {
                    Form::Block { leading, table } => (leading, table),
                    _ => return Err(form_mismatch(op)),
                };
                let encoded = encode_params(leading, args, op.name())?;
                let spare = checked_spare(spec, *spare)?;
                self.emit_opcode(op, encoded.modes | spare, encoded.significant | spec.ignored)?;
                self.out.emit_bytes(&encoded.bytes);
                self.encode_setters(table, props)?;
            }
            Instruction::Select { call, spare, .. } => {
                let table = match spec.form {
                    Form::Select(table) => table,
                    _ => return Err(form_mismatch(op)),
                };
                let spare = checked_spare(spec, *spare)?;
                self.emit_opcode(op, spare, spec.mask | spec.ignored)?;
                self.encode_setter(table, call)?;
            }
            Instruction::StartScript {
                script,
                args,
                recursive,
                freeze_resistant,
            } => {
                let mut bits = var_bit(script, 0);
                if *recursive {
                    bits |= 0x20;
                }
                if *freeze_resistant {
                    bits |= 0x40;
                }
                self.emit_opcode(op, bits, 0xe0)?;
                write_param(&mut self.out, script, Width::Byte)?;
                write_list(&mut self.out, args)?;
            }
            Instruction::DoSentence {
                verb,
                object_a,
                object_b,
            } => {
                if *verb == Operand::Byte(0xfe) || *verb == Operand::Word(0xfe) {
                    return Err(ScummError::InvalidArgument(
                        "verb 254 is reserved for stopSentence".to_string(),
                        0,
                    ));
                }
                let bits = var_bit(verb, 0) | var_bit(object_a, 1) | var_bit(object_b, 2);
                self.emit_opcode(op, bits, 0xe0)?;
                write_param(&mut self.out, verb, Width::Byte)?;
                write_param(&mut self.out, object_a, Width::Word)?;
                write_param(&mut self.out, object_b, Width::Word)?;
            }
            Instruction::StopSentence { spare } => {
                let spare = checked_spare(spec, *spare)?;
                self.emit_opcode(op, spare, 0xe0)?;
                self.out.emit_u8(0xfe);
            }
            Instruction::SetVarRange {
                result,
                values,
                words,
            } => {
                if values.is_empty() || values.len() > 0xff {
                    return Err(ScummError::InvalidArgument(
                        format!("setVarRange needs 1 to 255 values, found {}", values.len()),
                        0,
                    ));
                }
                self.emit_opcode(op, if *words { 0x80 } else { 0 }, 0x80)?;
                encode_var(&mut self.out, result)?;
                self.out.emit_u8(values.len() as u8);
                for value in values {
                    if *words {
                        self.out.emit_u16(*value as u16);
                    } else if (0..=0xff).contains(value) {
                        self.out.emit_u8(*value as u8);
                    } else {
                        return Err(ScummError::InvalidArgument(
                            format!("setVarRange byte value {} out of range", value),
                            0,
                        ));
                    }
                }
            }
            Instruction::PseudoRoom { room, aliases } => {
                self.emit_opcode(op, 0, 0)?;
                self.out.emit_u8(*room);
                for alias in aliases {
                    if *alias >= 0x80 {
                        return Err(ScummError::InvalidArgument(
                            format!("pseudoRoom alias {} must be below 128", alias),
                            0,
                        ));
                    }
                    self.out.emit_u8(alias | 0x80);
                }
                self.out.emit_u8(0x00);
            }
            Instruction::BeginOverride => {
                self.emit_opcode(op, 0, 0)?;
                self.out.emit_u8(0x01);
            }
            Instruction::EndOverride => {
                self.emit_opcode(op, 0, 0)?;
                self.out.emit_u8(0x00);
            }
        }

        debug!(
            "encoded {} at 0x{:04x} ({} bytes)",
            op.name(),
            start,
            self.out.position() - start
        );
        Ok(())
    }

    fn spec(&self, op: Op) -> Result<&'static OpcodeSpec, ScummError> {
        self.table.spec(op).ok_or_else(|| {
            ScummError::InvalidArgument(format!("{} is not registered", op.name()), 0)
        })
    }

    fn emit_opcode(&mut self, op: Op, bits: u8, significant: u8) -> Result<(), ScummError> {
        let byte = self.table.opcode_for(op, bits, significant)?;
        self.out.emit_u8(byte);
        Ok(())
    }

    fn emit_jump(&mut self, target: &JumpTarget, from: usize) -> Result<(), ScummError> {
        let field = self.out.position();
        match target {
            JumpTarget::Label(label) => {
                trace!("pending jump to '{}' at field 0x{:04x}", label, field);
                self.pending.push(PendingJump {
                    label: label.clone(),
                    field,
                    from,
                });
                self.out.emit_u16(0);
            }
            JumpTarget::Offset(offset) => {
                let rel = relative_offset(*offset, field).ok_or_else(|| {
                    ScummError::JumpOutOfRange(
                        format!("0x{:04x}", offset),
                        *offset as i64 - field as i64 - 2,
                    )
                })?;
                self.out.emit_u16(rel as u16);
            }
        }
        Ok(())
    }

    fn encode_expr(&mut self, expr: &Expr) -> Result<(), ScummError> {
        match expr {
            Expr::Leaf(operand) => {
                self.out.emit_u8(0x01 | var_bit(operand, 0));
                write_param(&mut self.out, operand, Width::Word)?;
            }
            Expr::Binary(left, op, right) => {
                self.encode_expr(left)?;
                self.encode_expr(right)?;
                self.out.emit_u8(op.code());
            }
            Expr::Nested(instruction) => {
                if instruction.result().is_none() {
                    return Err(ScummError::InvalidNestedInstruction(
                        format!("{} does not produce a value", instruction.op().name()),
                        self.out.position(),
                    ));
                }
                self.out.emit_u8(0x06);
                self.encode(instruction)?;
            }
        }
        Ok(())
    }

    fn encode_setters(&mut self, table: &SubOpTable, props: &[SubCall]) -> Result<(), ScummError> {
        if !table.repeat {
            match props {
                [] => match table.empty {
                    Some(code) => self.out.emit_u8(code),
                    None => {
                        return Err(ScummError::InvalidArgument(
                            format!("{} needs one setter", table.family),
                            0,
                        ))
                    }
                },
                [call] => self.encode_setter(table, call)?,
                _ => {
                    return Err(ScummError::InvalidArgument(
                        format!("{} takes a single setter", table.family),
                        0,
                    ))
                }
            }
            return Ok(());
        }

        for (i, call) in props.iter().enumerate() {
            if table.closing == Some(call.code) && i + 1 != props.len() {
                return Err(ScummError::InvalidArgument(
                    format!("{}.{} must be the last setter", table.family, call.name),
                    0,
                ));
            }
            self.encode_setter(table, call)?;
        }
        let closed = props
            .last()
            .map_or(false, |call| table.closing == Some(call.code));
        if !closed {
            self.out.emit_u8(0xff);
        }
        Ok(())
    }

    fn encode_setter(&mut self, table: &SubOpTable, call: &SubCall) -> Result<(), ScummError> {
        let entry = table.by_code(call.code).ok_or_else(|| {
            ScummError::InvalidArgument(
                format!("{} has no setter {}", table.family, call.name),
                0,
            )
        })?;
        let encoded = encode_params(entry.params, &call.args, entry.name)?;
        self.out.emit_u8(entry.code | encoded.modes);
        match (&call.result, entry.stores) {
            (Some(result), true) => encode_var(&mut self.out, result)?,
            (None, false) => {}
            _ => {
                return Err(ScummError::InvalidArgument(
                    format!("{} result variable mismatch", entry.name),
                    0,
                ))
            }
        }
        self.out.emit_bytes(&encoded.bytes);
        Ok(())
    }
}

/// `label − field − 2`, if it fits a signed 16-bit field.
pub fn relative_offset(label: usize, field: usize) -> Option<i16> {
    let rel = label as i64 - field as i64 - 2;
    i16::try_from(rel).ok()
}

fn var_bit(operand: &Operand, position: u8) -> u8 {
    if operand.is_variable() {
        mode_bit(position)
    } else {
        0
    }
}

fn checked_spare(spec: &OpcodeSpec, spare: u8) -> Result<u8, ScummError> {
    if spare & !spec.ignored != 0 {
        return Err(ScummError::InvalidArgument(
            format!(
                "{} does not accept opcode bits 0x{:02x}",
                spec.op.name(),
                spare & !spec.ignored
            ),
            0,
        ));
    }
    Ok(spare)
}

fn form_mismatch(op: Op) -> ScummError {
    ScummError::InvalidArgument(format!("{} does not take this form", op.name()), 0)
}

fn write_list(out: &mut ByteWriter, items: &[Operand]) -> Result<(), ScummError> {
    for item in items {
        out.emit_u8(0x01 | var_bit(item, 0));
        write_param(out, item, Width::Word)?;
    }
    out.emit_u8(0xff);
    Ok(())
}

fn encode_params(params: &[Param], args: &[Arg], name: &str) -> Result<EncodedParams, ScummError> {
    let expected = params
        .iter()
        .filter(|p| !matches!(p, Param::Modes | Param::Skip))
        .count();
    if expected != args.len() {
        return Err(ScummError::InvalidArgument(
            format!("{} expects {} arguments, found {}", name, expected, args.len()),
            0,
        ));
    }

    // one writer per mode group
    let mut groups: Vec<(u8, u8, ByteWriter)> = vec![(0, 0, ByteWriter::new())];
    let mut position = 0;
    let mut args = args.iter();

    for param in params {
        if *param == Param::Modes {
            groups.push((0, 0, ByteWriter::new()));
            position = 0;
            continue;
        }
        if *param == Param::Skip {
            if let Some(group) = groups.last_mut() {
                group.1 |= mode_bit(position);
            }
            position += 1;
            continue;
        }
        let (modes, significant, out) = match groups.last_mut() {
            Some(group) => (&mut group.0, &mut group.1, &mut group.2),
            None => continue,
        };
        let arg = args.next().ok_or_else(|| {
            ScummError::InvalidArgument(format!("{} is missing arguments", name), 0)
        })?;
        match (param, arg) {
            (Param::Byte, Arg::Value(op)) | (Param::Word, Arg::Value(op)) => {
                let width = if *param == Param::Byte {
                    Width::Byte
                } else {
                    Width::Word
                };
                *modes |= var_bit(op, position);
                *significant |= mode_bit(position);
                write_param(out, op, width)?;
                position += 1;
            }
            (Param::Var, Arg::Value(op)) => encode_var(out, op)?,
            (Param::RawByte, Arg::Value(op)) | (Param::RawWord, Arg::Value(op)) => {
                if op.is_variable() {
                    return Err(ScummError::InvalidArgument(
                        format!("{} takes a constant here, found {}", name, op),
                        0,
                    ));
                }
                let width = if *param == Param::RawByte {
                    Width::Byte
                } else {
                    Width::Word
                };
                write_param(out, op, width)?;
            }
            (Param::Ticks, Arg::Ticks(ticks)) => {
                if *ticks > 0x00ff_ffff {
                    return Err(ScummError::InvalidArgument(
                        format!("{} ticks do not fit in 24 bits", ticks),
                        0,
                    ));
                }
                out.emit_u24(*ticks);
            }
            (Param::List, Arg::List(items)) => write_list(out, items)?,
            (Param::Text, Arg::Text(text)) => text.encode(out)?,
            (param, arg) => {
                return Err(ScummError::InvalidArgument(
                    format!("{}: {:?} parameter cannot take {:?}", name, param, arg),
                    0,
                ))
            }
        }
    }

    let mut groups = groups.into_iter();
    let (modes, significant, first) = match groups.next() {
        Some(group) => group,
        None => (0, 0, ByteWriter::new()),
    };
    let mut bytes = first.into_bytes();
    for (group_modes, _, out) in groups {
        bytes.push(group_modes);
        bytes.extend_from_slice(out.as_slice());
    }
    Ok(EncodedParams {
        modes,
        significant,
        bytes,
    })
}
