//! Script execution state used to drive disassembly.
//!
//! A script owns a cursor into one byte range. Each pass steps instructions
//! until the range is exhausted or an instruction yields (`breakHere`,
//! `delay`). Suspension is logical: a pending delay records a deadline on
//! the caller's clock and the caller decides when to resume.

use log::{debug, trace};

use crate::cursor::ByteReader;
use crate::error::ScummError;
use crate::instruction::{decode, Arg, Instruction};
use crate::opcode_tables::{Op, OpcodeTable};

/// Receives each instruction as it is decoded.
pub trait InstructionSink {
    fn instruction(
        &mut self,
        offset: usize,
        opcode: u8,
        instruction: Instruction,
    ) -> Result<(), ScummError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Active,
    Stopped,
}

/// How a stepping pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// An instruction asked to stop stepping for now.
    Yielded,
    /// Frozen or still delayed; nothing was stepped.
    Suspended,
    /// A non-recursive script ran off the end of its range.
    Finished,
    /// A recursive script ran off the end and rewound to the start.
    Rewound,
}

/// `delay` tick count to milliseconds.
pub fn ticks_to_millis(ticks: u32) -> u64 {
    ticks as u64 * 1000 / 60
}

pub struct Script<'a> {
    reader: ByteReader<'a>,
    locals: Vec<i32>,
    state: ScriptState,
    frozen: u32,
    stop_now: bool,
    delay_until: Option<u64>,
    recursive: bool,
}

impl<'a> Script<'a> {
    pub fn new(bytes: &'a [u8], args: &[i32], recursive: bool) -> Self {
        Script {
            reader: ByteReader::new(bytes),
            locals: args.to_vec(),
            state: ScriptState::Active,
            frozen: 0,
            stop_now: false,
            delay_until: None,
            recursive,
        }
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    pub fn len(&self) -> usize {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    pub fn state(&self) -> ScriptState {
        self.state
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Local slot value; slots that were never written read as 0.
    pub fn local(&self, index: usize) -> i32 {
        self.locals.get(index).copied().unwrap_or(0)
    }

    pub fn set_local(&mut self, index: usize, value: i32) {
        if index >= self.locals.len() {
            self.locals.resize(index + 1, 0);
        }
        self.locals[index] = value;
    }

    pub fn freeze(&mut self) {
        self.frozen += 1;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = self.frozen.saturating_sub(1);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen > 0
    }

    pub fn delay_until(&self) -> Option<u64> {
        self.delay_until
    }

    /// Whether a pass at `now` would step at all.
    pub fn is_runnable(&self, now: u64) -> bool {
        self.state == ScriptState::Active
            && !self.is_frozen()
            && self.delay_until.map_or(true, |deadline| deadline <= now)
    }

    /// Step until a yield or the end of the range.
    pub fn run_pass(
        &mut self,
        now: u64,
        table: &OpcodeTable,
        sink: &mut dyn InstructionSink,
    ) -> Result<PassOutcome, ScummError> {
        if !self.is_runnable(now) {
            return Ok(PassOutcome::Suspended);
        }
        self.delay_until = None;
        self.stop_now = false;

        loop {
            if self.reader.is_at_end() {
                return Ok(self.exhausted());
            }
            self.step(now, table, sink)?;
            if self.stop_now {
                trace!("pass yielded at 0x{:04x}", self.reader.position());
                return Ok(PassOutcome::Yielded);
            }
        }
    }

    /// Decode and dispatch a single instruction.
    pub fn step(
        &mut self,
        now: u64,
        table: &OpcodeTable,
        sink: &mut dyn InstructionSink,
    ) -> Result<(), ScummError> {
        let offset = self.reader.position();
        let (opcode, instruction) = decode(&mut self.reader, table)?;
        self.apply(now, &instruction);
        sink.instruction(offset, opcode, instruction)
    }

    fn apply(&mut self, now: u64, instruction: &Instruction) {
        match instruction {
            Instruction::Call {
                op: Op::BreakHere, ..
            } => self.stop_now = true,
            Instruction::Call {
                op: Op::Delay,
                args,
            } => {
                if let Some(Arg::Ticks(ticks)) = args.first() {
                    self.delay_until = Some(now + ticks_to_millis(*ticks));
                }
                self.stop_now = true;
            }
            _ => {}
        }
    }

    fn exhausted(&mut self) -> PassOutcome {
        if self.recursive {
            debug!("recursive script exhausted, rewinding");
            self.reader.seek(0);
            PassOutcome::Rewound
        } else {
            debug!("script exhausted after {} bytes", self.reader.len());
            self.state = ScriptState::Stopped;
            PassOutcome::Finished
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembler::Statement;

    type Collected = Vec<Statement>;

    #[test]
    fn test_ticks_conversion() {
        assert_eq!(ticks_to_millis(60), 1000);
        assert_eq!(ticks_to_millis(1), 16);
        assert_eq!(ticks_to_millis(0), 0);
    }

    #[test]
    fn test_locals_default_and_args() {
        let mut script = Script::new(&[], &[7, 8], false);
        assert_eq!(script.local(0), 7);
        assert_eq!(script.local(1), 8);
        assert_eq!(script.local(5), 0);
        script.set_local(5, 3);
        assert_eq!(script.local(5), 3);
        assert_eq!(script.local(4), 0);
    }

    #[test]
    fn test_break_here_yields_without_stopping() {
        let bytes = [0x80, 0x20];
        let table = OpcodeTable::standard();
        let mut script = Script::new(&bytes, &[], false);
        let mut out = Collected::new();

        assert_eq!(script.run_pass(0, table, &mut out).unwrap(), PassOutcome::Yielded);
        assert_eq!(script.state(), ScriptState::Active);
        assert_eq!(out.len(), 1);

        assert_eq!(script.run_pass(0, table, &mut out).unwrap(), PassOutcome::Finished);
        assert_eq!(script.state(), ScriptState::Stopped);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].offset, 1);
    }

    #[test]
    fn test_delay_suspends_until_deadline() {
        // delay(60), stopMusic()
        let bytes = [0x2e, 0x3c, 0x00, 0x00, 0x20];
        let table = OpcodeTable::standard();
        let mut script = Script::new(&bytes, &[], false);
        let mut out = Collected::new();

        assert_eq!(script.run_pass(100, table, &mut out).unwrap(), PassOutcome::Yielded);
        assert_eq!(script.delay_until(), Some(1100));
        assert_eq!(script.run_pass(500, table, &mut out).unwrap(), PassOutcome::Suspended);
        assert_eq!(script.run_pass(1100, table, &mut out).unwrap(), PassOutcome::Finished);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_frozen_script_does_not_step() {
        let bytes = [0x20];
        let table = OpcodeTable::standard();
        let mut script = Script::new(&bytes, &[], false);
        let mut out = Collected::new();
        script.freeze();
        assert_eq!(script.run_pass(0, table, &mut out).unwrap(), PassOutcome::Suspended);
        script.unfreeze();
        assert_eq!(script.run_pass(0, table, &mut out).unwrap(), PassOutcome::Finished);
    }

    #[test]
    fn test_recursive_script_rewinds() {
        let bytes = [0x20];
        let table = OpcodeTable::standard();
        let mut script = Script::new(&bytes, &[], true);
        let mut out = Collected::new();
        assert_eq!(script.run_pass(0, table, &mut out).unwrap(), PassOutcome::Rewound);
        assert_eq!(script.state(), ScriptState::Active);
        assert_eq!(script.position(), 0);
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let bytes = [0x45];
        let table = OpcodeTable::standard();
        let mut script = Script::new(&bytes, &[], false);
        let mut out = Collected::new();
        assert_eq!(
            script.run_pass(0, table, &mut out),
            Err(ScummError::UnknownOpcode(0x45, 0))
        );
    }
}
