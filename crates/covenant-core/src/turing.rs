//! Turing machine covenant - one transition per spend
//!
//! The machine decides whether a tape of parentheses is balanced. The whole
//! snapshot lives in the UTXO; each spend applies exactly one transition and
//! must re-commit the updated machine at the same value. The chain of
//! covenants halts when the machine reaches ACCEPT, and dies when no
//! transition applies.
//!
//! The transition table is a fixed constant scanned linearly, first match
//! wins. Cost per step is bounded by the table size.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{decode_script_num, encode_script_num, hex_bytes, push_data, read_push};
use crate::commitment::verify_outputs;
use crate::outputs::{OutputSet, Stateful};
use crate::{Error, Result, SpendContext};

// ── Machine alphabet ──────────────────────────────────────

/// Machine state label; one byte on the tape's companion push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MachineState {
    A = 0x00,
    B = 0x01,
    C = 0x02,
    Accept = 0x03,
}

impl MachineState {
    pub const INITIAL: MachineState = MachineState::A;

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MachineState {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(MachineState::A),
            0x01 => Ok(MachineState::B),
            0x02 => Ok(MachineState::C),
            0x03 => Ok(MachineState::Accept),
            other => Err(Error::Codec(format!("unknown machine state {:#04x}", other))),
        }
    }
}

/// Tape cell symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Symbol {
    Blank = 0x00,
    Open = 0x01,
    Close = 0x02,
    /// Matched parenthesis
    Marked = 0x03,
}

impl Symbol {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::Blank => '_',
            Symbol::Open => '(',
            Symbol::Close => ')',
            Symbol::Marked => 'X',
        }
    }

    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '_' => Ok(Symbol::Blank),
            '(' => Ok(Symbol::Open),
            ')' => Ok(Symbol::Close),
            'X' | 'x' => Ok(Symbol::Marked),
            other => Err(Error::Codec(format!("unknown tape character '{}'", other))),
        }
    }
}

impl TryFrom<u8> for Symbol {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(Symbol::Blank),
            0x01 => Ok(Symbol::Open),
            0x02 => Ok(Symbol::Close),
            0x03 => Ok(Symbol::Marked),
            other => Err(Error::Codec(format!("unknown tape symbol {:#04x}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    Left,
    Right,
}

impl Move {
    fn delta(self) -> i64 {
        match self {
            Move::Left => -1,
            Move::Right => 1,
        }
    }
}

/// Parse a tape written with `(`, `)`, `X` and `_`
pub fn parse_tape(s: &str) -> Result<Vec<Symbol>> {
    s.chars().map(Symbol::from_char).collect()
}

pub fn render_tape(tape: &[Symbol]) -> String {
    tape.iter().map(|s| s.as_char()).collect()
}

// ── Transition table ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionInput {
    pub old_state: MachineState,
    pub read: Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutput {
    pub new_state: MachineState,
    pub write: Symbol,
    pub head_move: Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEntry {
    pub input: TransitionInput,
    pub output: TransitionOutput,
}

const fn rule(
    old_state: MachineState,
    read: Symbol,
    new_state: MachineState,
    write: Symbol,
    head_move: Move,
) -> TransitionEntry {
    TransitionEntry {
        input: TransitionInput { old_state, read },
        output: TransitionOutput {
            new_state,
            write,
            head_move,
        },
    }
}

/// Balanced-parentheses recognizer
pub const TRANSITION_TABLE: [TransitionEntry; 8] = {
    use MachineState::{Accept, A, B, C};
    use Move::{Left, Right};
    use Symbol::{Blank, Close, Marked, Open};
    [
        rule(A, Open, A, Open, Right),
        rule(A, Marked, A, Marked, Right),
        rule(A, Close, B, Marked, Left),
        rule(A, Blank, C, Blank, Left),
        rule(B, Open, A, Marked, Right),
        rule(B, Marked, B, Marked, Left),
        rule(C, Marked, C, Marked, Left),
        rule(C, Blank, Accept, Blank, Right),
    ]
};

/// First entry matching `(state, symbol)`, with its table index
pub fn lookup(state: MachineState, symbol: Symbol) -> Option<(usize, &'static TransitionOutput)> {
    let table: &'static [TransitionEntry] = &TRANSITION_TABLE;
    table
        .iter()
        .enumerate()
        .find(|(_, e)| e.input.old_state == state && e.input.read == symbol)
        .map(|(i, e)| (i, &e.output))
}

// ── Machine snapshot ──────────────────────────────────────

/// Machine snapshot carried in the covenant's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TuringStateRepr", into = "TuringStateRepr")]
pub struct TuringState {
    pub head_pos: i64,
    pub tape: Vec<Symbol>,
    pub cur_state: MachineState,
    pub script_code: Vec<u8>,
}

/// Wire form: tape and state as raw bytes
#[derive(Serialize, Deserialize)]
struct TuringStateRepr {
    head_pos: i64,
    #[serde(with = "hex_bytes")]
    tape: Vec<u8>,
    cur_state: u8,
    #[serde(with = "hex_bytes")]
    script_code: Vec<u8>,
}

impl TryFrom<TuringStateRepr> for TuringState {
    type Error = Error;

    fn try_from(repr: TuringStateRepr) -> Result<Self> {
        let state = TuringState {
            head_pos: repr.head_pos,
            tape: decode_tape(&repr.tape)?,
            cur_state: MachineState::try_from(repr.cur_state)?,
            script_code: repr.script_code,
        };
        state.validate()?;
        Ok(state)
    }
}

impl From<TuringState> for TuringStateRepr {
    fn from(state: TuringState) -> Self {
        TuringStateRepr {
            head_pos: state.head_pos,
            tape: state.tape_bytes(),
            cur_state: state.cur_state.as_byte(),
            script_code: state.script_code,
        }
    }
}

fn decode_tape(bytes: &[u8]) -> Result<Vec<Symbol>> {
    bytes.iter().map(|b| Symbol::try_from(*b)).collect()
}

impl fmt::Display for TuringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} head={} tape={}",
            self.cur_state,
            self.head_pos,
            render_tape(&self.tape)
        )
    }
}

/// Result of one covenant step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// More steps needed; the next snapshot was committed
    Continue(TuringState),
    /// Reached ACCEPT; nothing further is constrained
    Halted(TuringState),
}

impl Stateful for TuringState {
    fn script_code(&self) -> &[u8] {
        &self.script_code
    }

    /// `push(num(head_pos)) || push(tape) || push(cur_state)`
    fn encode_state(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.tape.len() + 16);
        push_data(&mut out, &encode_script_num(self.head_pos));
        push_data(&mut out, &self.tape_bytes());
        push_data(&mut out, &[self.cur_state.as_byte()]);
        Ok(out)
    }
}

impl TuringState {
    /// Machine in its initial state
    pub fn new(tape: Vec<Symbol>, head_pos: i64, script_code: Vec<u8>) -> Result<Self> {
        let state = TuringState {
            head_pos,
            tape,
            cur_state: MachineState::INITIAL,
            script_code,
        };
        state.validate()?;
        Ok(state)
    }

    /// Tape must be non-empty and the head inside it
    pub fn validate(&self) -> Result<()> {
        if self.tape.is_empty() {
            return Err(Error::Codec("tape must not be empty".into()));
        }
        if self.head_pos < 0 || self.head_pos as u64 >= self.tape.len() as u64 {
            return Err(Error::Codec(format!(
                "head position {} outside tape of length {}",
                self.head_pos,
                self.tape.len()
            )));
        }
        Ok(())
    }

    pub fn tape_bytes(&self) -> Vec<u8> {
        self.tape.iter().map(|s| s.as_byte()).collect()
    }

    pub fn is_accepting(&self) -> bool {
        self.cur_state == MachineState::Accept
    }

    /// Rebuild a snapshot from the state bytes of a locking script
    pub fn decode_state(script_code: &[u8], state: &[u8]) -> Result<Self> {
        let (head, used_head) = read_push(state)?;
        let rest = &state[used_head..];
        let (tape, used_tape) = read_push(rest)?;
        let rest = &rest[used_tape..];
        let (label, used_label) = read_push(rest)?;
        if used_label != rest.len() {
            return Err(Error::Codec("trailing bytes after machine state".into()));
        }
        let [label] = label else {
            return Err(Error::Codec("machine state must be one byte".into()));
        };
        let decoded = TuringState {
            head_pos: decode_script_num(head)?,
            tape: decode_tape(tape)?,
            cur_state: MachineState::try_from(*label)?,
            script_code: script_code.to_vec(),
        };
        decoded.validate()?;
        Ok(decoded)
    }

    /// Apply one transition without any commitment check
    ///
    /// Returns the next snapshot and the index of the rule that fired.
    pub fn transition(&self) -> Result<(TuringState, usize)> {
        self.validate()?;
        let head = self.head_pos as usize;
        let observed = self.tape[head];
        let (index, out) = lookup(self.cur_state, observed).ok_or(Error::NoTransition {
            state: self.cur_state.as_byte(),
            symbol: observed.as_byte(),
        })?;

        let mut tape = self.tape.clone();
        tape[head] = out.write;
        let mut head_pos = self.head_pos + out.head_move.delta();
        if head_pos < 0 {
            tape.insert(0, Symbol::Blank);
            head_pos = 0;
        } else if head_pos as usize >= tape.len() {
            tape.push(Symbol::Blank);
        }

        let next = TuringState {
            head_pos,
            tape,
            cur_state: out.new_state,
            script_code: self.script_code.clone(),
        };
        debug!(rule = index, from = %self, to = %next, "transition applied");
        Ok((next, index))
    }

    /// Apply one transition and return the outputs the spend must carry
    pub fn build_step(&self, ctx: &SpendContext) -> Result<(StepOutcome, OutputSet)> {
        let (next, _) = self.transition()?;
        if next.is_accepting() {
            return Ok((StepOutcome::Halted(next), OutputSet::new()));
        }
        let mut outputs = OutputSet::new();
        outputs.push(next.continuation(ctx.utxo.value)?);
        Ok((StepOutcome::Continue(next), outputs))
    }

    /// One covenant step: transition, then verify the continuation
    ///
    /// Returns the outcome together with the outputs that were verified.
    pub fn step(&self, ctx: &SpendContext) -> Result<(StepOutcome, OutputSet)> {
        let (outcome, outputs) = self.build_step(ctx)?;
        if let StepOutcome::Continue(_) = outcome {
            verify_outputs(&outputs, &ctx.hash_outputs)?;
        }
        Ok((outcome, outputs))
    }
}

// ── Offline runner ────────────────────────────────────────

/// How an offline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Accepted,
    Rejected { state: u8, symbol: u8 },
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub steps: usize,
    pub final_state: TuringState,
}

/// Simulate the machine without commitments, for at most `max_steps`
pub fn run(initial: &TuringState, max_steps: usize) -> Result<RunReport> {
    initial.validate()?;
    let mut current = initial.clone();
    let mut steps = 0;
    while steps < max_steps {
        if current.is_accepting() {
            break;
        }
        match current.transition() {
            Ok((next, _)) => {
                current = next;
                steps += 1;
            }
            Err(Error::NoTransition { state, symbol }) => {
                return Ok(RunReport {
                    outcome: RunOutcome::Rejected { state, symbol },
                    steps,
                    final_state: current,
                })
            }
            Err(e) => return Err(e),
        }
    }
    let outcome = if current.is_accepting() {
        RunOutcome::Accepted
    } else {
        RunOutcome::Exhausted
    };
    Ok(RunReport {
        outcome,
        steps,
        final_state: current,
    })
}
