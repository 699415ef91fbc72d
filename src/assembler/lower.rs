//! Lowering: parsed statements to instructions.
//!
//! Names resolve through the same opcode table the decoder uses, and each
//! argument is checked against the parameter layout of its slot, so literal
//! widths come from the table rather than from the text.

use log::trace;

use crate::assembler::ast::{self, CallChain, Condition, StatementKind, Target, VarIndex, VarRef};
use crate::assembler::lexer::Lexer;
use crate::assembler::parser::Parser;
use crate::error::ScummError;
use crate::instruction::{leading_modes, scratch_var, Arg, Expr, Instruction, JumpTarget, SubCall};
use crate::opcode_tables::{Form, NamedEntry, Op, OpcodeSpec, OpcodeTable, Param, SubOpTable};
use crate::text::ScummString;
use crate::var::{Operand, SystemVar, Var, VarOffset, Width, INDIRECT_FLAG};

/// One lowered source line.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowered {
    Label(String),
    Instruction(Instruction),
}

pub struct Lowerer<'t> {
    table: &'t OpcodeTable,
}

impl<'t> Lowerer<'t> {
    pub fn new(table: &'t OpcodeTable) -> Self {
        Lowerer { table }
    }

    pub fn lower(&self, statement: &ast::Statement) -> Result<Lowered, ScummError> {
        let at = statement.position;
        let instruction = match &statement.kind {
            StatementKind::Label(name) => return Ok(Lowered::Label(name.clone())),
            StatementKind::Goto(target) => Instruction::Jump {
                target: jump_target(target),
            },
            StatementKind::Unless { condition, target } => {
                self.condition(condition, jump_target(target), at)?
            }
            StatementKind::Assign {
                target,
                symbol,
                value,
            } => self.assign(target, symbol, value, at)?,
            StatementKind::Step { target, symbol } => Instruction::Update {
                op: self.update_op(symbol, false, at)?,
                target: self.variable(target)?,
                value: None,
            },
            StatementKind::Call(chain) => self.call_statement(chain)?,
        };
        trace!("line {}: {}", statement.line, instruction.op().name());
        Ok(Lowered::Instruction(instruction))
    }

    fn assign(
        &self,
        target: &ast::Expr,
        symbol: &str,
        value: &ast::Expr,
        at: usize,
    ) -> Result<Instruction, ScummError> {
        let result = self.variable(target)?;

        if symbol != "=" {
            return Ok(Instruction::Update {
                op: self.update_op(symbol, true, at)?,
                target: result,
                value: Some(self.operand(value, Width::Word)?),
            });
        }

        match value {
            ast::Expr::Paren(inner, _) => Ok(Instruction::Expression {
                result,
                expr: self.expr(inner)?,
            }),
            ast::Expr::Binary(..) => Ok(Instruction::Expression {
                result,
                expr: self.expr(value)?,
            }),
            ast::Expr::Call(chain) => self.value_call(chain, result),
            _ => Ok(Instruction::Update {
                op: Op::Move,
                target: result,
                value: Some(self.operand(value, Width::Word)?),
            }),
        }
    }

    /// A value-producing call writing to `result`.
    fn value_call(&self, chain: &CallChain, result: Operand) -> Result<Instruction, ScummError> {
        let head = &chain.head;
        let (setters, opcode) = split_opcode(chain)?;
        if !setters.is_empty() {
            return Err(ScummError::InvalidArgument(
                format!("{} does not take setters", head.name),
                head.position,
            ));
        }

        match self.table.by_name(&head.name) {
            Some(NamedEntry::Opcode(_)) if opcode.is_some() => Err(ScummError::InvalidArgument(
                format!("{} has no opcode variants to choose from", head.name),
                head.position,
            )),
            Some(NamedEntry::Opcode(spec)) => match spec.form {
                Form::Store(params) => Ok(Instruction::Store {
                    op: spec.op,
                    result,
                    args: self.args(params, &head.args, &head.name, head.position)?,
                }),
                _ => Err(ScummError::InvalidArgument(
                    format!("{} does not produce a value", head.name),
                    head.position,
                )),
            },
            Some(NamedEntry::Setter(spec, sub)) if sub.stores => Ok(Instruction::Select {
                op: spec.op,
                call: SubCall {
                    code: sub.code,
                    name: sub.name,
                    result: Some(result),
                    args: self.args(sub.params, &head.args, &head.name, head.position)?,
                },
                spare: self.spare(spec, opcode, 0)?,
            }),
            Some(NamedEntry::Setter(..)) => Err(ScummError::InvalidArgument(
                format!("{} does not produce a value", head.name),
                head.position,
            )),
            None => Err(ScummError::UnknownInstruction(head.name.clone(), head.position)),
        }
    }

    fn expr(&self, expr: &ast::Expr) -> Result<Expr, ScummError> {
        match expr {
            ast::Expr::Paren(inner, _) => self.expr(inner),
            ast::Expr::Binary(left, op, right) => Ok(Expr::Binary(
                Box::new(self.expr(left)?),
                *op,
                Box::new(self.expr(right)?),
            )),
            ast::Expr::Call(chain) => Ok(Expr::Nested(Box::new(
                self.value_call(chain, scratch_var())?,
            ))),
            other => Ok(Expr::Leaf(self.operand(other, Width::Word)?)),
        }
    }

    fn condition(
        &self,
        condition: &Condition,
        target: JumpTarget,
        at: usize,
    ) -> Result<Instruction, ScummError> {
        match condition {
            Condition::Zero(var) => Ok(Instruction::Test {
                op: Op::EqualZero,
                var: self.variable(var)?,
                target,
            }),
            Condition::Truth(ast::Expr::Call(chain)) => {
                let head = &chain.head;
                match self.table.by_name(&head.name) {
                    Some(NamedEntry::Opcode(spec)) if chain.setters.is_empty() => match spec.form {
                        Form::Predicate(params) => Ok(Instruction::Predicate {
                            op: spec.op,
                            args: self.args(params, &head.args, &head.name, head.position)?,
                            target,
                        }),
                        _ => Err(ScummError::InvalidArgument(
                            format!("{} cannot be used as a condition", head.name),
                            head.position,
                        )),
                    },
                    Some(_) => Err(ScummError::InvalidArgument(
                        format!("{} cannot be used as a condition", head.name),
                        head.position,
                    )),
                    None => Err(ScummError::UnknownInstruction(head.name.clone(), head.position)),
                }
            }
            Condition::Truth(var) => Ok(Instruction::Test {
                op: Op::NotEqualZero,
                var: self.variable(var)?,
                target,
            }),
            Condition::Compare(var, symbol, value) => {
                let spec = self
                    .table
                    .find(|form| matches!(form, Form::Compare(s) if s == symbol))
                    .ok_or_else(|| {
                        ScummError::InvalidArgument(format!("no comparison for '{}'", symbol), at)
                    })?;
                Ok(Instruction::Compare {
                    op: spec.op,
                    var: self.variable(var)?,
                    value: self.operand(value, Width::Word)?,
                    target,
                })
            }
        }
    }

    fn update_op(&self, symbol: &str, with_value: bool, at: usize) -> Result<Op, ScummError> {
        self.table
            .find(|form| {
                matches!(form, Form::Update { symbol: s, with_value: w } if *s == symbol && *w == with_value)
            })
            .map(|spec| spec.op)
            .ok_or_else(|| ScummError::InvalidArgument(format!("no update for '{}'", symbol), at))
    }

    fn call_statement(&self, chain: &CallChain) -> Result<Instruction, ScummError> {
        let head = &chain.head;
        let at = head.position;

        match head.name.as_str() {
            "stopSentence" => {
                let (setters, opcode) = split_opcode(chain)?;
                if let Some(setter) = setters.first() {
                    return Err(ScummError::InvalidArgument(
                        "stopSentence does not take setters".to_string(),
                        setter.position,
                    ));
                }
                if !head.args.is_empty() {
                    return Err(ScummError::InvalidArgument(
                        "stopSentence takes no arguments".to_string(),
                        at,
                    ));
                }
                let spec = self.table.spec(Op::DoSentence).ok_or_else(|| {
                    ScummError::UnknownInstruction(head.name.clone(), at)
                })?;
                return Ok(Instruction::StopSentence {
                    spare: self.spare(spec, opcode, 0)?,
                });
            }
            "beginOverride" => {
                self.no_args(chain)?;
                return Ok(Instruction::BeginOverride);
            }
            "endOverride" => {
                self.no_args(chain)?;
                return Ok(Instruction::EndOverride);
            }
            _ => {}
        }

        let spec = match self.table.by_name(&head.name) {
            Some(NamedEntry::Opcode(spec)) => spec,
            Some(NamedEntry::Setter(spec, sub)) => {
                if sub.stores {
                    return Err(ScummError::InvalidArgument(
                        format!("{} needs a result variable", sub.name),
                        at,
                    ));
                }
                let (setters, opcode) = split_opcode(chain)?;
                if let Some(setter) = setters.first() {
                    return Err(ScummError::InvalidArgument(
                        format!("{} does not take setters", head.name),
                        setter.position,
                    ));
                }
                return Ok(Instruction::Select {
                    op: spec.op,
                    call: SubCall {
                        code: sub.code,
                        name: sub.name,
                        result: None,
                        args: self.args(sub.params, &head.args, &head.name, at)?,
                    },
                    spare: self.spare(spec, opcode, 0)?,
                });
            }
            None => return Err(ScummError::UnknownInstruction(head.name.clone(), at)),
        };

        if let Form::Block { leading, table } = spec.form {
            let (setters, opcode) = split_opcode(chain)?;
            let args = self.args(leading, &head.args, &head.name, at)?;
            let props = setters
                .iter()
                .map(|call| self.setter(table, call))
                .collect::<Result<Vec<_>, _>>()?;
            let spare = self.spare(spec, opcode, leading_modes(leading, &args))?;
            return Ok(Instruction::Block {
                op: spec.op,
                args,
                props,
                spare,
            });
        }

        self.no_setters(chain)?;
        match spec.form {
            Form::Call(params) => Ok(Instruction::Call {
                op: spec.op,
                args: self.args(params, &head.args, &head.name, at)?,
            }),
            Form::StartScript => self.start_script(&head.args, at),
            Form::Sentence => {
                let [verb, object_a, object_b] = self.exact::<3>(&head.args, &head.name, at)?;
                Ok(Instruction::DoSentence {
                    verb: self.operand(verb, Width::Byte)?,
                    object_a: self.operand(object_a, Width::Word)?,
                    object_b: self.operand(object_b, Width::Word)?,
                })
            }
            Form::SetVarRange => self.set_var_range(&head.args, at),
            Form::PseudoRoom => {
                let [room, aliases] = self.exact::<2>(&head.args, &head.name, at)?;
                let room = match self.constant(room, Width::Byte)? {
                    Operand::Byte(room) => room,
                    other => {
                        return Err(ScummError::InvalidArgument(
                            format!("pseudoRoom room {} is not a byte", other),
                            at,
                        ))
                    }
                };
                let aliases = self
                    .integers(aliases)?
                    .into_iter()
                    .map(|(value, at)| {
                        u8::try_from(value).ok().filter(|v| *v < 0x80).ok_or_else(|| {
                            ScummError::InvalidArgument(
                                format!("pseudoRoom alias {} must be 0..=127", value),
                                at,
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Instruction::PseudoRoom { room, aliases })
            }
            _ => Err(ScummError::InvalidArgument(
                format!("{} cannot be used as a statement", head.name),
                at,
            )),
        }
    }

    /// Ignored bits of an explicit opcode byte, which must otherwise be the
    /// byte the operands select.
    fn spare(
        &self,
        spec: &OpcodeSpec,
        opcode: Option<(u8, usize)>,
        modes: u8,
    ) -> Result<u8, ScummError> {
        let (byte, at) = match opcode {
            Some(opcode) => opcode,
            None => return Ok(0),
        };
        let belongs = self.table.lookup(byte).map_or(false, |found| found.op == spec.op);
        if belongs && byte & !spec.ignored == spec.base | modes {
            Ok(byte & spec.ignored)
        } else {
            Err(ScummError::InvalidArgument(
                format!(
                    "opcode 0x{:02x} does not fit {} with these operands",
                    byte,
                    spec.op.name()
                ),
                at,
            ))
        }
    }

    fn setter(&self, table: &SubOpTable, call: &ast::Call) -> Result<SubCall, ScummError> {
        let sub = table.by_name(&call.name).ok_or_else(|| {
            ScummError::UnknownInstruction(format!("{}.{}", table.family, call.name), call.position)
        })?;
        Ok(SubCall {
            code: sub.code,
            name: sub.name,
            result: None,
            args: self.args(sub.params, &call.args, &call.name, call.position)?,
        })
    }

    fn start_script(&self, args: &[ast::Expr], at: usize) -> Result<Instruction, ScummError> {
        if args.len() < 2 {
            return Err(ScummError::InvalidArgument(
                "startScript expects a script and an argument list".to_string(),
                at,
            ));
        }
        let script = self.operand(&args[0], Width::Byte)?;
        let list = self.list(&args[1])?;
        let mut recursive = false;
        let mut freeze_resistant = false;

        for flag in &args[2..] {
            match flag {
                ast::Expr::Identifier(name, _) if name == "recursive" => recursive = true,
                ast::Expr::Identifier(name, _) if name == "freezeResistant" => {
                    freeze_resistant = true
                }
                other => {
                    return Err(ScummError::InvalidArgument(
                        "startScript flags are 'recursive' and 'freezeResistant'".to_string(),
                        other.position(),
                    ))
                }
            }
        }

        Ok(Instruction::StartScript {
            script,
            args: list,
            recursive,
            freeze_resistant,
        })
    }

    fn set_var_range(&self, args: &[ast::Expr], at: usize) -> Result<Instruction, ScummError> {
        let words = match args.get(2) {
            None => false,
            Some(ast::Expr::Identifier(name, _)) if name == "words" && args.len() == 3 => true,
            Some(other) => {
                return Err(ScummError::InvalidArgument(
                    "setVarRange takes a variable, a value list and an optional 'words'"
                        .to_string(),
                    other.position(),
                ))
            }
        };
        if args.len() < 2 {
            return Err(ScummError::InvalidArgument(
                "setVarRange takes a variable and a value list".to_string(),
                at,
            ));
        }

        let result = self.variable(&args[0])?;
        let values = self
            .integers(&args[1])?
            .into_iter()
            .map(|(value, at)| {
                let fits = if words {
                    (i16::MIN as i64..=u16::MAX as i64).contains(&value)
                } else {
                    (0..=0xff).contains(&value)
                };
                if fits {
                    Ok(value as u16 as i16)
                } else {
                    Err(ScummError::InvalidArgument(
                        format!("setVarRange value {} out of range", value),
                        at,
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Instruction::SetVarRange {
            result,
            values,
            words,
        })
    }

    /// Match call arguments against a parameter layout.
    fn args(
        &self,
        params: &[Param],
        exprs: &[ast::Expr],
        name: &str,
        at: usize,
    ) -> Result<Vec<Arg>, ScummError> {
        let slots: Vec<&Param> = params
            .iter()
            .filter(|p| !matches!(p, Param::Modes | Param::Skip))
            .collect();
        if slots.len() != exprs.len() {
            return Err(ScummError::InvalidArgument(
                format!(
                    "{} expects {} arguments, found {}",
                    name,
                    slots.len(),
                    exprs.len()
                ),
                at,
            ));
        }

        slots
            .into_iter()
            .zip(exprs)
            .map(|(param, expr)| match param {
                Param::Byte => Ok(Arg::Value(self.operand(expr, Width::Byte)?)),
                Param::Word => Ok(Arg::Value(self.operand(expr, Width::Word)?)),
                Param::Var => Ok(Arg::Value(self.variable(expr)?)),
                Param::RawByte => Ok(Arg::Value(self.constant(expr, Width::Byte)?)),
                Param::RawWord => Ok(Arg::Value(self.constant(expr, Width::Word)?)),
                Param::Ticks => match expr {
                    ast::Expr::Integer(ticks, _) if (0..=0x00ff_ffff).contains(ticks) => {
                        Ok(Arg::Ticks(*ticks as u32))
                    }
                    other => Err(ScummError::InvalidArgument(
                        format!("{} expects a tick count", name),
                        other.position(),
                    )),
                },
                Param::List => Ok(Arg::List(self.list(expr)?)),
                Param::Text => match expr {
                    ast::Expr::String(raw, at) => Ok(Arg::Text(self.markup(raw, *at)?)),
                    other => Err(ScummError::InvalidArgument(
                        format!("{} expects a string", name),
                        other.position(),
                    )),
                },
                Param::Modes | Param::Skip => Err(ScummError::InvalidArgument(
                    format!("{} has a malformed layout", name),
                    at,
                )),
            })
            .collect()
    }

    fn exact<'a, const N: usize>(
        &self,
        args: &'a [ast::Expr],
        name: &str,
        at: usize,
    ) -> Result<[&'a ast::Expr; N], ScummError> {
        let refs: Vec<&ast::Expr> = args.iter().collect();
        refs.try_into().map_err(|_| {
            ScummError::InvalidArgument(
                format!("{} expects {} arguments, found {}", name, N, args.len()),
                at,
            )
        })
    }

    fn no_args(&self, chain: &CallChain) -> Result<(), ScummError> {
        self.no_setters(chain)?;
        if chain.head.args.is_empty() {
            Ok(())
        } else {
            Err(ScummError::InvalidArgument(
                format!("{} takes no arguments", chain.head.name),
                chain.head.position,
            ))
        }
    }

    fn no_setters(&self, chain: &CallChain) -> Result<(), ScummError> {
        match chain.setters.first() {
            None => Ok(()),
            Some(setter) => Err(ScummError::InvalidArgument(
                format!("{} does not take setters", chain.head.name),
                setter.position,
            )),
        }
    }

    fn list(&self, expr: &ast::Expr) -> Result<Vec<Operand>, ScummError> {
        match expr {
            ast::Expr::List(items, _) => items
                .iter()
                .map(|item| self.operand(item, Width::Word))
                .collect(),
            other => Err(ScummError::InvalidArgument(
                "expected a '[...]' list".to_string(),
                other.position(),
            )),
        }
    }

    fn integers(&self, expr: &ast::Expr) -> Result<Vec<(i64, usize)>, ScummError> {
        match expr {
            ast::Expr::List(items, _) => items
                .iter()
                .map(|item| match item {
                    ast::Expr::Integer(value, at) => Ok((*value, *at)),
                    other => Err(ScummError::InvalidArgument(
                        "expected a number".to_string(),
                        other.position(),
                    )),
                })
                .collect(),
            other => Err(ScummError::InvalidArgument(
                "expected a '[...]' list of numbers".to_string(),
                other.position(),
            )),
        }
    }

    fn markup(&self, raw: &str, at: usize) -> Result<ScummString, ScummError> {
        ScummString::parse_markup(raw, at, |src, _| {
            let tokens = Lexer::new(src).tokenize()?;
            let expr = Parser::new(tokens).parse_operand()?;
            self.operand(&expr, Width::Word)
        })
    }

    /// Value in a mode-bit slot: a variable or a literal of `width`.
    fn operand(&self, expr: &ast::Expr, width: Width) -> Result<Operand, ScummError> {
        match expr {
            ast::Expr::Var(var) => var_operand(var),
            ast::Expr::Identifier(name, at) => SystemVar::by_name(name)
                .map(Operand::System)
                .ok_or_else(|| {
                    ScummError::InvalidArgument(format!("unknown variable '{}'", name), *at)
                }),
            _ => self.constant(expr, width),
        }
    }

    fn constant(&self, expr: &ast::Expr, width: Width) -> Result<Operand, ScummError> {
        match (expr, width) {
            (ast::Expr::Integer(value, _), Width::Byte) if (0..=0xff).contains(value) => {
                Ok(Operand::Byte(*value as u8))
            }
            (ast::Expr::Integer(value, _), Width::Word)
                if (i16::MIN as i64..=u16::MAX as i64).contains(value) =>
            {
                Ok(Operand::Word(*value as u16 as i16))
            }
            (ast::Expr::Integer(value, at), _) => Err(ScummError::InvalidArgument(
                format!("{} does not fit a {:?} parameter", value, width),
                *at,
            )),
            (other, _) => Err(ScummError::InvalidArgument(
                "expected a number or a variable".to_string(),
                other.position(),
            )),
        }
    }

    fn variable(&self, expr: &ast::Expr) -> Result<Operand, ScummError> {
        let operand = self.operand(expr, Width::Word)?;
        if operand.is_variable() {
            Ok(operand)
        } else {
            Err(ScummError::InvalidArgument(
                format!("expected a variable, found {}", operand),
                expr.position(),
            ))
        }
    }
}

/// Split a trailing `.opcode(0xNN)` off a call chain.
fn split_opcode(chain: &CallChain) -> Result<(&[ast::Call], Option<(u8, usize)>), ScummError> {
    match chain.setters.split_last() {
        Some((last, rest)) if last.name == "opcode" => match last.args.as_slice() {
            [ast::Expr::Integer(value, at)] => {
                let byte = u8::try_from(*value).map_err(|_| {
                    ScummError::InvalidArgument(format!("opcode {} is not a byte", value), *at)
                })?;
                Ok((rest, Some((byte, *at))))
            }
            _ => Err(ScummError::InvalidArgument(
                "opcode takes one byte value".to_string(),
                last.position,
            )),
        },
        _ => Ok((chain.setters.as_slice(), None)),
    }
}

fn jump_target(target: &Target) -> JumpTarget {
    match target {
        Target::Label(name) => JumpTarget::Label(name.clone()),
        Target::Offset(offset) => JumpTarget::Offset(*offset),
    }
}

fn plain_var(var: &VarRef) -> Result<Var, ScummError> {
    let index = u16::try_from(var.index).map_err(|_| {
        ScummError::InvalidArgument(format!("variable index {} out of range", var.index), var.position)
    })?;
    Var::new(var.kind, index)
}

fn var_operand(var: &VarRef) -> Result<Operand, ScummError> {
    let base = plain_var(var)?;
    match var.offset.as_deref() {
        None => Ok(Operand::Var(base)),
        Some(VarIndex::Literal(offset)) => {
            let offset = u16::try_from(*offset)
                .ok()
                .filter(|o| o & INDIRECT_FLAG == 0)
                .ok_or_else(|| {
                    ScummError::InvalidArgument(
                        format!("variable offset {} out of range", offset),
                        var.position,
                    )
                })?;
            Ok(Operand::Compound(base, VarOffset::Literal(offset)))
        }
        Some(VarIndex::Var(inner)) => {
            if inner.offset.is_some() {
                return Err(ScummError::InvalidArgument(
                    "only one level of indirection is allowed".to_string(),
                    inner.position,
                ));
            }
            Ok(Operand::Compound(base, VarOffset::Var(plain_var(inner)?)))
        }
    }
}
