use log::{debug, trace};

use crate::cursor::ByteReader;
use crate::error::ScummError;
use crate::opcode_tables::{Form, Op, OpcodeTable, Param, SubOpTable};
use crate::text::ScummString;
use crate::var::{decode_var, mode_bit, read_param, Operand, Var, VarKind, Width};

/// One decoded parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Operand),
    List(Vec<Operand>),
    Text(ScummString),
    Ticks(u32),
}

impl Arg {
    pub fn as_operand(&self) -> Option<&Operand> {
        match self {
            Arg::Value(op) => Some(op),
            _ => None,
        }
    }
}

/// Destination of a jump: an absolute script offset after decoding, a
/// symbolic label once normalized or parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    Offset(usize),
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(BinOp::Add),
            3 => Some(BinOp::Sub),
            4 => Some(BinOp::Mul),
            5 => Some(BinOp::Div),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            BinOp::Add => 2,
            BinOp::Sub => 3,
            BinOp::Mul => 4,
            BinOp::Div => 5,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// Expression-mode tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Leaf(Operand),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    /// A value-producing instruction whose result lands in `Var[0]`.
    Nested(Box<Instruction>),
}

/// One setter of a sub-opcode family.
#[derive(Debug, Clone, PartialEq)]
pub struct SubCall {
    pub code: u8,
    pub name: &'static str,
    pub result: Option<Operand>,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Call {
        op: Op,
        args: Vec<Arg>,
    },
    Store {
        op: Op,
        result: Operand,
        args: Vec<Arg>,
    },
    Update {
        op: Op,
        target: Operand,
        value: Option<Operand>,
    },
    Expression {
        result: Operand,
        expr: Expr,
    },
    Compare {
        op: Op,
        var: Operand,
        value: Operand,
        target: JumpTarget,
    },
    Test {
        op: Op,
        var: Operand,
        target: JumpTarget,
    },
    Predicate {
        op: Op,
        args: Vec<Arg>,
        target: JumpTarget,
    },
    Jump {
        target: JumpTarget,
    },
    Block {
        op: Op,
        args: Vec<Arg>,
        props: Vec<SubCall>,
        /// Opcode bits outside the mode bits, see [`crate::opcode_tables::OpcodeSpec::ignored`].
        spare: u8,
    },
    Select {
        op: Op,
        call: SubCall,
        spare: u8,
    },
    StartScript {
        script: Operand,
        args: Vec<Operand>,
        recursive: bool,
        freeze_resistant: bool,
    },
    DoSentence {
        verb: Operand,
        object_a: Operand,
        object_b: Operand,
    },
    StopSentence {
        spare: u8,
    },
    SetVarRange {
        result: Operand,
        values: Vec<i16>,
        words: bool,
    },
    PseudoRoom {
        room: u8,
        aliases: Vec<u8>,
    },
    BeginOverride,
    EndOverride,
}

impl Instruction {
    pub fn op(&self) -> Op {
        match self {
            Instruction::Call { op, .. }
            | Instruction::Store { op, .. }
            | Instruction::Update { op, .. }
            | Instruction::Compare { op, .. }
            | Instruction::Test { op, .. }
            | Instruction::Predicate { op, .. }
            | Instruction::Block { op, .. }
            | Instruction::Select { op, .. } => *op,
            Instruction::Expression { .. } => Op::Expression,
            Instruction::Jump { .. } => Op::JumpRelative,
            Instruction::StartScript { .. } => Op::StartScript,
            Instruction::DoSentence { .. } | Instruction::StopSentence { .. } => Op::DoSentence,
            Instruction::SetVarRange { .. } => Op::SetVarRange,
            Instruction::PseudoRoom { .. } => Op::PseudoRoom,
            Instruction::BeginOverride | Instruction::EndOverride => Op::Override,
        }
    }

    pub fn jump_target(&self) -> Option<&JumpTarget> {
        match self {
            Instruction::Compare { target, .. }
            | Instruction::Test { target, .. }
            | Instruction::Predicate { target, .. }
            | Instruction::Jump { target } => Some(target),
            _ => None,
        }
    }

    pub fn jump_target_mut(&mut self) -> Option<&mut JumpTarget> {
        match self {
            Instruction::Compare { target, .. }
            | Instruction::Test { target, .. }
            | Instruction::Predicate { target, .. }
            | Instruction::Jump { target } => Some(target),
            _ => None,
        }
    }

    /// Ignored opcode bits carried for re-encoding.
    pub fn spare(&self) -> u8 {
        match self {
            Instruction::Block { spare, .. }
            | Instruction::Select { spare, .. }
            | Instruction::StopSentence { spare } => *spare,
            _ => 0,
        }
    }

    /// Result variable of a value-producing instruction.
    pub fn result(&self) -> Option<&Operand> {
        match self {
            Instruction::Store { result, .. } => Some(result),
            Instruction::Select { call, .. } => call.result.as_ref(),
            _ => None,
        }
    }

    pub fn set_result(&mut self, operand: Operand) {
        match self {
            Instruction::Store { result, .. } => *result = operand,
            Instruction::Select { call, .. } if call.result.is_some() => {
                call.result = Some(operand)
            }
            _ => {}
        }
    }

    /// True for `stopObjectCode`, the instruction that closes a script.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Instruction::Call {
                op: Op::StopObjectCode,
                ..
            }
        )
    }
}

/// `Var[0]`, the slot nested expression calls write to.
pub fn scratch_var() -> Operand {
    Operand::Var(Var {
        kind: VarKind::Global,
        index: 0,
    })
}

/// Mode bits the leading parameters of a layout put in the opcode byte.
pub fn leading_modes(params: &[Param], args: &[Arg]) -> u8 {
    let mut modes = 0;
    let mut position = 0;
    let mut args = args.iter();
    for param in params {
        match param {
            Param::Modes => break,
            Param::Skip => position += 1,
            Param::Byte | Param::Word => {
                if let Some(Arg::Value(op)) = args.next() {
                    if op.is_variable() {
                        modes |= mode_bit(position);
                    }
                }
                position += 1;
            }
            _ => {
                args.next();
            }
        }
    }
    modes
}

/// Decode one instruction at the reader's position.
///
/// Returns the opcode byte alongside the instruction. Expression mode calls
/// back into this function for nested instructions.
pub fn decode(
    reader: &mut ByteReader,
    table: &OpcodeTable,
) -> Result<(u8, Instruction), ScummError> {
    let at = reader.position();
    let opcode = reader.read_u8()?;
    let spec = table
        .lookup(opcode)
        .ok_or(ScummError::UnknownOpcode(opcode, at))?;
    let op = spec.op;

    let instruction = match spec.form {
        Form::Call(params) => Instruction::Call {
            op,
            args: decode_params(reader, params, opcode, op.name(), at)?.0,
        },
        Form::Store(params) => {
            let result = decode_var(reader)?;
            let args = decode_params(reader, params, opcode, op.name(), at)?.0;
            Instruction::Store { op, result, args }
        }
        Form::Update { with_value, .. } => {
            let target = decode_var(reader)?;
            let value = if with_value {
                Some(read_param(reader, opcode, 0, Width::Word)?)
            } else {
                None
            };
            Instruction::Update { op, target, value }
        }
        Form::Compare(_) => {
            let var = decode_var(reader)?;
            let value = read_param(reader, opcode, 0, Width::Word)?;
            let target = read_jump(reader, at)?;
            Instruction::Compare {
                op,
                var,
                value,
                target,
            }
        }
        Form::Test { .. } => {
            let var = decode_var(reader)?;
            let target = read_jump(reader, at)?;
            Instruction::Test { op, var, target }
        }
        Form::Predicate(params) => {
            let args = decode_params(reader, params, opcode, op.name(), at)?.0;
            let target = read_jump(reader, at)?;
            Instruction::Predicate { op, args, target }
        }
        Form::Jump => Instruction::Jump {
            target: read_jump(reader, at)?,
        },
        Form::Block { leading, table: sub } => {
            let args = decode_params(reader, leading, opcode, op.name(), at)?.0;
            let props = decode_setters(reader, sub)?;
            Instruction::Block {
                op,
                args,
                props,
                spare: opcode & spec.ignored,
            }
        }
        Form::Select(sub) => {
            let sub_at = reader.position();
            let byte = reader.read_u8()?;
            Instruction::Select {
                op,
                call: decode_setter(reader, sub, byte, sub_at)?,
                spare: opcode & spec.ignored,
            }
        }
        Form::Expression => decode_expression(reader, table, at)?,
        Form::StartScript => {
            let script = read_param(reader, opcode, 0, Width::Byte)?;
            let args = read_list(reader)?;
            Instruction::StartScript {
                script,
                args,
                recursive: opcode & 0x20 != 0,
                freeze_resistant: opcode & 0x40 != 0,
            }
        }
        Form::Sentence => {
            let verb = read_param(reader, opcode, 0, Width::Byte)?;
            if verb == Operand::Byte(0xfe) {
                Instruction::StopSentence {
                    spare: opcode & spec.ignored,
                }
            } else {
                Instruction::DoSentence {
                    verb,
                    object_a: read_param(reader, opcode, 1, Width::Word)?,
                    object_b: read_param(reader, opcode, 2, Width::Word)?,
                }
            }
        }
        Form::SetVarRange => {
            let result = decode_var(reader)?;
            let count = reader.read_u8()?;
            if count == 0 {
                return Err(ScummError::InvalidArgument(
                    "setVarRange with an empty value list".to_string(),
                    at,
                ));
            }
            let words = opcode & 0x80 != 0;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(if words {
                    reader.read_i16()?
                } else {
                    reader.read_u8()? as i16
                });
            }
            Instruction::SetVarRange {
                result,
                values,
                words,
            }
        }
        Form::PseudoRoom => {
            let room = reader.read_u8()?;
            let mut aliases = Vec::new();
            loop {
                let alias_at = reader.position();
                match reader.read_u8()? {
                    0 => break,
                    b if b & 0x80 != 0 => aliases.push(b & 0x7f),
                    b => {
                        return Err(ScummError::InvalidArgument(
                            format!("pseudoRoom alias 0x{:02x} lacks the high bit", b),
                            alias_at,
                        ))
                    }
                }
            }
            Instruction::PseudoRoom { room, aliases }
        }
        Form::Override => match reader.read_u8()? {
            1 => Instruction::BeginOverride,
            0 => Instruction::EndOverride,
            other => return Err(ScummError::UnknownSubOpcode("override", other, at + 1)),
        },
    };

    debug!("0x{:04x}: {:02x} {}", at, opcode, op.name());
    Ok((opcode, instruction))
}

fn read_jump(reader: &mut ByteReader, at: usize) -> Result<JumpTarget, ScummError> {
    let rel = reader.read_i16()? as i64;
    let target = reader.position() as i64 + rel;
    if target < 0 {
        return Err(ScummError::InvalidJumpTarget(target, at));
    }
    Ok(JumpTarget::Offset(target as usize))
}

/// 0xFF-terminated word list; each entry carries a 0x01 or 0x81 prefix.
fn read_list(reader: &mut ByteReader) -> Result<Vec<Operand>, ScummError> {
    let mut items = Vec::new();
    loop {
        let at = reader.position();
        let prefix = reader.read_u8()?;
        match prefix {
            0xff => break,
            0x01 | 0x81 => items.push(read_param(reader, prefix, 0, Width::Word)?),
            _ => return Err(ScummError::UnknownSubOpcode("argument list", prefix, at)),
        }
    }
    Ok(items)
}

fn check_stray(modes: u8, used: u8, name: &'static str, at: usize) -> Result<(), ScummError> {
    if modes & 0xe0 & !used != 0 {
        return Err(ScummError::StrayModeBits(name, modes, at));
    }
    Ok(())
}

/// Decode a parameter layout.
///
/// `modes` supplies the mode bits of the first group. Fresh mode bytes inside
/// the layout are validated here; the first group's used bits are returned
/// so the caller can validate the byte it owns.
fn decode_params(
    reader: &mut ByteReader,
    params: &[Param],
    modes: u8,
    name: &'static str,
    at: usize,
) -> Result<(Vec<Arg>, u8), ScummError> {
    let mut args = Vec::new();
    let mut modes = modes;
    let mut position = 0;
    let mut used = 0u8;
    let mut first_used = None;
    let mut modes_at = at;

    for param in params {
        match param {
            Param::Byte | Param::Word => {
                let width = if *param == Param::Byte {
                    Width::Byte
                } else {
                    Width::Word
                };
                args.push(Arg::Value(read_param(reader, modes, position, width)?));
                used |= mode_bit(position);
                position += 1;
            }
            Param::Skip => position += 1,
            Param::Var => args.push(Arg::Value(decode_var(reader)?)),
            Param::RawByte => args.push(Arg::Value(Operand::Byte(reader.read_u8()?))),
            Param::RawWord => args.push(Arg::Value(Operand::Word(reader.read_i16()?))),
            Param::Ticks => args.push(Arg::Ticks(reader.read_u24()?)),
            Param::List => args.push(Arg::List(read_list(reader)?)),
            Param::Text => args.push(Arg::Text(ScummString::decode(reader)?)),
            Param::Modes => {
                match first_used {
                    None => first_used = Some(used),
                    Some(_) => check_stray(modes, used, name, modes_at)?,
                }
                modes_at = reader.position();
                modes = reader.read_u8()?;
                if modes & 0x1f != 0 {
                    return Err(ScummError::StrayModeBits(name, modes, modes_at));
                }
                position = 0;
                used = 0;
            }
        }
    }

    match first_used {
        Some(first) => {
            check_stray(modes, used, name, modes_at)?;
            Ok((args, first))
        }
        None => Ok((args, used)),
    }
}

fn decode_setter(
    reader: &mut ByteReader,
    sub: &SubOpTable,
    byte: u8,
    at: usize,
) -> Result<SubCall, ScummError> {
    let code = byte & 0x1f;
    let entry = sub
        .by_code(code)
        .ok_or(ScummError::UnknownSubOpcode(sub.family, byte, at))?;
    let result = if entry.stores {
        Some(decode_var(reader)?)
    } else {
        None
    };
    let (args, used) = decode_params(reader, entry.params, byte, entry.name, at)?;
    check_stray(byte, used, entry.name, at)?;
    trace!("  {}.{} at 0x{:04x}", sub.family, entry.name, at);
    Ok(SubCall {
        code,
        name: entry.name,
        result,
        args,
    })
}

fn decode_setters(reader: &mut ByteReader, sub: &SubOpTable) -> Result<Vec<SubCall>, ScummError> {
    let mut props = Vec::new();

    if !sub.repeat {
        let at = reader.position();
        let byte = reader.read_u8()?;
        if sub.empty == Some(byte) {
            return Ok(props);
        }
        props.push(decode_setter(reader, sub, byte, at)?);
        return Ok(props);
    }

    loop {
        let at = reader.position();
        let byte = reader.read_u8()?;
        if byte == 0xff {
            break;
        }
        let call = decode_setter(reader, sub, byte, at)?;
        let closing = sub.closing == Some(call.code);
        props.push(call);
        if closing {
            break;
        }
    }
    Ok(props)
}

fn decode_expression(
    reader: &mut ByteReader,
    table: &OpcodeTable,
    at: usize,
) -> Result<Instruction, ScummError> {
    let result = decode_var(reader)?;
    let mut stack: Vec<Expr> = Vec::new();

    loop {
        let sub_at = reader.position();
        let byte = reader.read_u8()?;
        if byte == 0xff {
            break;
        }
        match byte & 0x1f {
            1 => {
                check_stray(byte, mode_bit(0), "expression push", sub_at)?;
                stack.push(Expr::Leaf(read_param(reader, byte, 0, Width::Word)?));
            }
            code @ 2..=5 => {
                check_stray(byte, 0, "expression operator", sub_at)?;
                let underflow =
                    || ScummError::ExpressionStack("operator with fewer than two values".to_string(), sub_at);
                let right = stack.pop().ok_or_else(underflow)?;
                let left = stack.pop().ok_or_else(underflow)?;
                let op = BinOp::from_code(code).ok_or(ScummError::UnknownSubOpcode(
                    "expression",
                    byte,
                    sub_at,
                ))?;
                stack.push(Expr::Binary(Box::new(left), op, Box::new(right)));
            }
            6 => {
                check_stray(byte, 0, "expression call", sub_at)?;
                let nested_at = reader.position();
                let (_, nested) = decode(reader, table)?;
                match nested.result() {
                    Some(r) if *r == scratch_var() => {}
                    Some(r) => {
                        return Err(ScummError::InvalidNestedInstruction(
                            format!("{} writes to {} instead of Var[0]", nested.op().name(), r),
                            nested_at,
                        ))
                    }
                    None => {
                        return Err(ScummError::InvalidNestedInstruction(
                            format!("{} does not produce a value", nested.op().name()),
                            nested_at,
                        ))
                    }
                }
                stack.push(Expr::Nested(Box::new(nested)));
            }
            _ => return Err(ScummError::UnknownSubOpcode("expression", byte, sub_at)),
        }
    }

    if stack.len() != 1 {
        return Err(ScummError::ExpressionStack(
            format!("{} values left at the end of the expression", stack.len()),
            at,
        ));
    }
    let expr = stack.pop().ok_or_else(|| {
        ScummError::ExpressionStack("empty expression".to_string(), at)
    })?;
    Ok(Instruction::Expression { result, expr })
}

#[cfg(test)]
#[path = "instruction_tests.rs"]
mod tests;
