//! Statement renderer: one line of text per instruction.

use std::fmt::Write as _;

use crate::instruction::{leading_modes, Arg, Expr, Instruction, JumpTarget, SubCall};
use crate::opcode_tables::{Form, Op, OpcodeTable};
use crate::var::Operand;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Show well-known globals by name (`VAR_EGO`) instead of `Var[1]`.
    pub named_system_vars: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            named_system_vars: true,
        }
    }
}

pub struct Renderer<'t> {
    table: &'t OpcodeTable,
    options: RenderOptions,
}

impl<'t> Renderer<'t> {
    pub fn new(table: &'t OpcodeTable, options: RenderOptions) -> Self {
        Renderer { table, options }
    }

    pub fn operand(&self, operand: &Operand) -> String {
        if self.options.named_system_vars {
            operand.to_string()
        } else {
            operand.canonical().to_string()
        }
    }

    fn arg(&self, arg: &Arg) -> String {
        match arg {
            Arg::Value(op) => self.operand(op),
            Arg::List(items) => self.list(items),
            Arg::Text(text) => format!("\"{}\"", text.to_markup(self.options.named_system_vars)),
            Arg::Ticks(ticks) => ticks.to_string(),
        }
    }

    fn list(&self, items: &[Operand]) -> String {
        let items: Vec<String> = items.iter().map(|op| self.operand(op)).collect();
        format!("[{}]", items.join(", "))
    }

    fn args(&self, args: &[Arg]) -> String {
        args.iter()
            .map(|a| self.arg(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn call(&self, name: &str, args: &[Arg]) -> String {
        format!("{}({})", name, self.args(args))
    }

    fn sub_call(&self, call: &SubCall) -> String {
        self.call(call.name, &call.args)
    }

    /// `.opcode(0xNN)` naming the exact byte, when it carries ignored bits.
    fn opcode_suffix(&self, op: Op, modes: u8, spare: u8) -> String {
        match self.table.spec(op) {
            Some(spec) if spare != 0 => format!(".opcode(0x{:02x})", spec.base | modes | spare),
            _ => String::new(),
        }
    }

    fn target(&self, target: &JumpTarget) -> String {
        match target {
            JumpTarget::Label(label) => label.clone(),
            JumpTarget::Offset(offset) => format!("0x{:04x}", offset),
        }
    }

    /// Value of an instruction as it appears inside an expression.
    fn value_call(&self, instruction: &Instruction) -> String {
        match instruction {
            Instruction::Store { op, args, .. } => self.call(op.name(), args),
            Instruction::Select { op, call, spare } => {
                format!("{}{}", self.sub_call(call), self.opcode_suffix(*op, 0, *spare))
            }
            other => self.render(other),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Leaf(op) => self.operand(op),
            Expr::Binary(left, op, right) => {
                format!("({} {} {})", self.expr(left), op.symbol(), self.expr(right))
            }
            Expr::Nested(instruction) => self.value_call(instruction),
        }
    }

    pub fn render(&self, instruction: &Instruction) -> String {
        match instruction {
            Instruction::Call { op, args } => self.call(op.name(), args),
            Instruction::Store { op, result, args } => {
                format!("{} = {}", self.operand(result), self.call(op.name(), args))
            }
            Instruction::Update { op, target, value } => {
                let symbol = match self.table.spec(*op).map(|s| s.form) {
                    Some(Form::Update { symbol, .. }) => symbol,
                    _ => "=",
                };
                match value {
                    Some(value) => format!(
                        "{} {} {}",
                        self.operand(target),
                        symbol,
                        self.operand(value)
                    ),
                    None => format!("{}{}", self.operand(target), symbol),
                }
            }
            Instruction::Expression { result, expr } => {
                let body = match expr {
                    Expr::Binary(..) => self.expr(expr),
                    _ => format!("({})", self.expr(expr)),
                };
                format!("{} = {}", self.operand(result), body)
            }
            Instruction::Compare {
                op,
                var,
                value,
                target,
            } => {
                let symbol = match self.table.spec(*op).map(|s| s.form) {
                    Some(Form::Compare(symbol)) => symbol,
                    _ => "==",
                };
                format!(
                    "unless ({} {} {}) goto {}",
                    self.operand(var),
                    symbol,
                    self.operand(value),
                    self.target(target)
                )
            }
            Instruction::Test { op, var, target } => {
                let negated = matches!(
                    self.table.spec(*op).map(|s| s.form),
                    Some(Form::Test { negated: true })
                );
                format!(
                    "unless ({}{}) goto {}",
                    if negated { "!" } else { "" },
                    self.operand(var),
                    self.target(target)
                )
            }
            Instruction::Predicate { op, args, target } => format!(
                "unless ({}) goto {}",
                self.call(op.name(), args),
                self.target(target)
            ),
            Instruction::Jump { target } => format!("goto {}", self.target(target)),
            Instruction::Block {
                op,
                args,
                props,
                spare,
            } => {
                let mut line = self.call(op.name(), args);
                for prop in props {
                    let _ = write!(line, ".{}", self.sub_call(prop));
                }
                if let Some(Form::Block { leading, .. }) = self.table.spec(*op).map(|s| s.form) {
                    line.push_str(&self.opcode_suffix(*op, leading_modes(leading, args), *spare));
                }
                line
            }
            Instruction::Select { op, call, spare } => {
                let line = format!("{}{}", self.sub_call(call), self.opcode_suffix(*op, 0, *spare));
                match &call.result {
                    Some(result) => format!("{} = {}", self.operand(result), line),
                    None => line,
                }
            }
            Instruction::StartScript {
                script,
                args,
                recursive,
                freeze_resistant,
            } => {
                let mut line = format!("startScript({}, {}", self.operand(script), self.list(args));
                if *recursive {
                    line.push_str(", recursive");
                }
                if *freeze_resistant {
                    line.push_str(", freezeResistant");
                }
                line.push(')');
                line
            }
            Instruction::DoSentence {
                verb,
                object_a,
                object_b,
            } => format!(
                "doSentence({}, {}, {})",
                self.operand(verb),
                self.operand(object_a),
                self.operand(object_b)
            ),
            Instruction::StopSentence { spare } => format!(
                "stopSentence(){}",
                self.opcode_suffix(Op::DoSentence, 0, *spare)
            ),
            Instruction::SetVarRange {
                result,
                values,
                words,
            } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!(
                    "setVarRange({}, [{}]{})",
                    self.operand(result),
                    values.join(", "),
                    if *words { ", words" } else { "" }
                )
            }
            Instruction::PseudoRoom { room, aliases } => {
                let aliases: Vec<String> = aliases.iter().map(|a| a.to_string()).collect();
                format!("pseudoRoom({}, [{}])", room, aliases.join(", "))
            }
            Instruction::BeginOverride => "beginOverride()".to_string(),
            Instruction::EndOverride => "endOverride()".to_string(),
        }
    }
}
