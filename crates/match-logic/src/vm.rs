//! Stack-based bytecode VM for file-defined bots.
//!
//! Programs are at most 64 bytes and run on a fixed 8-slot u8 stack.
//! Values that name moves are indices into the active rule set's move
//! list; `NONE` (255) stands for "no move" (empty history or a forfeit).
//! A runtime fault (stack underflow, fuel exhaustion, falling off the end)
//! is a bot execution failure; returning an index that names no active
//! move is an invalid move. Both are forfeits for the round.

use thiserror::Error;

use crate::error::DecisionError;
use crate::random::SeededRng;
use crate::strategy::{Decider, MatchState, Move};

// ── Constants ────────────────────────────────────────────────────────

/// Maximum bytecode program length in bytes.
pub const MAX_BYTECODE_LEN: usize = 64;

/// Maximum instructions the VM will execute before halting (fuel limit).
pub const MAX_FUEL: u32 = 128;

/// Stack depth (fixed array, no heap).
const STACK_SIZE: usize = 8;

/// Encodes "no move" on the stack.
pub const NONE: u8 = u8::MAX;

// ── Opcodes ──────────────────────────────────────────────────────────

pub mod op {
    pub const PLAY: u8 = 0x00;
    pub const PUSH: u8 = 0x01;
    pub const OPP_LAST: u8 = 0x02;
    pub const MY_LAST: u8 = 0x03;
    pub const OPP_N: u8 = 0x04;
    pub const MY_N: u8 = 0x05;
    pub const OPP_COUNT: u8 = 0x06;
    pub const MY_COUNT: u8 = 0x07;
    pub const ROUND: u8 = 0x08;
    pub const RAND: u8 = 0x09;
    pub const ADD: u8 = 0x0A;
    pub const SUB: u8 = 0x0B;
    pub const MUL: u8 = 0x0C;
    pub const GT: u8 = 0x0D;
    pub const LT: u8 = 0x0E;
    pub const EQ: u8 = 0x0F;
    pub const NOT: u8 = 0x10;
    pub const AND: u8 = 0x11;
    pub const OR: u8 = 0x12;
    pub const DUP: u8 = 0x13;
    pub const JMP_FWD: u8 = 0x14;
    pub const JMP_FWD_IF: u8 = 0x15;
    pub const MOD: u8 = 0x16;
    pub const BEATS: u8 = 0x17;
    pub const RETURN: u8 = 0x18;
    pub const MOVES: u8 = 0x19;
}

// ── Validation ───────────────────────────────────────────────────────

/// Errors that can occur during bytecode validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BytecodeError {
    #[error("bytecode is empty")]
    Empty,
    #[error("bytecode exceeds {MAX_BYTECODE_LEN} bytes")]
    TooLong,
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },
    #[error("truncated immediate at offset {offset}")]
    TruncatedImmediate { offset: usize },
    #[error("forward jump out of bounds at offset {offset}")]
    JumpOutOfBounds { offset: usize },
    #[error("no terminal instruction (PLAY/RETURN)")]
    NoTerminal,
}

/// Runtime faults. Each one forfeits the round for the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum VmFault {
    #[error("stack underflow at offset {0}")]
    StackUnderflow(usize),
    #[error("stack overflow at offset {0}")]
    StackOverflow(usize),
    #[error("fuel exhausted after {MAX_FUEL} instructions")]
    FuelExhausted,
    #[error("unknown opcode 0x{1:02X} at offset {0}")]
    UnknownOpcode(usize, u8),
    #[error("division by zero at offset {0}")]
    DivideByZero(usize),
    #[error("operand names no active move at offset {0}")]
    BadMoveOperand(usize),
    #[error("program ended without choosing a move")]
    FellOffEnd,
}

/// Static checks run when a bytecode bot is loaded.
///
/// A program passes when it has 1..=`MAX_BYTECODE_LEN` bytes, every opcode
/// and its immediate are complete, jump targets stay inside the program,
/// and some `PLAY` or `RETURN` is reachable by a linear scan.
pub fn validate_bytecode(bytecode: &[u8]) -> Result<(), BytecodeError> {
    if bytecode.is_empty() {
        return Err(BytecodeError::Empty);
    }
    if bytecode.len() > MAX_BYTECODE_LEN {
        return Err(BytecodeError::TooLong);
    }

    let mut pc = 0usize;
    let mut has_terminal = false;

    while pc < bytecode.len() {
        let opcode = bytecode[pc];
        match opcode {
            // 2-byte terminal: opcode + move index
            op::PLAY => {
                if pc + 1 >= bytecode.len() {
                    return Err(BytecodeError::TruncatedImmediate { offset: pc });
                }
                has_terminal = true;
                pc += 2;
            }
            // 1-byte terminal (pops stack)
            op::RETURN => {
                has_terminal = true;
                pc += 1;
            }
            op::PUSH => {
                if pc + 1 >= bytecode.len() {
                    return Err(BytecodeError::TruncatedImmediate { offset: pc });
                }
                pc += 2;
            }
            // 2-byte: opcode + forward offset
            op::JMP_FWD | op::JMP_FWD_IF => {
                if pc + 1 >= bytecode.len() {
                    return Err(BytecodeError::TruncatedImmediate { offset: pc });
                }
                let offset = bytecode[pc + 1] as usize;
                let target = pc + 2 + offset;
                if target > bytecode.len() {
                    return Err(BytecodeError::JumpOutOfBounds { offset: pc });
                }
                pc += 2;
            }
            op::OPP_LAST | op::MY_LAST | op::OPP_N | op::MY_N |
            op::OPP_COUNT | op::MY_COUNT | op::ROUND | op::RAND |
            op::ADD | op::SUB | op::MUL | op::GT | op::LT | op::EQ |
            op::NOT | op::AND | op::OR | op::DUP | op::MOD |
            op::BEATS | op::MOVES => {
                pc += 1;
            }
            _ => {
                return Err(BytecodeError::UnknownOpcode { offset: pc, opcode });
            }
        }
    }

    if !has_terminal {
        return Err(BytecodeError::NoTerminal);
    }

    Ok(())
}

// ── Execution ────────────────────────────────────────────────────────

/// A validated bytecode program usable as a bot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BytecodeBot {
    program: Vec<u8>,
}

impl BytecodeBot {
    pub fn new(program: Vec<u8>) -> Result<Self, BytecodeError> {
        validate_bytecode(&program)?;
        Ok(Self { program })
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }
}

impl Decider for BytecodeBot {
    fn decide(&mut self, state: &MatchState<'_>, rng: &mut SeededRng) -> Result<Move, DecisionError> {
        execute_bytecode(&self.program, state, rng)
    }
}

/// Execute a bytecode program and return the chosen move.
pub fn execute_bytecode(
    bytecode: &[u8],
    state: &MatchState<'_>,
    rng: &mut SeededRng,
) -> Result<Move, DecisionError> {
    let index = execute_inner(bytecode, state, rng)
        .map_err(|fault| DecisionError::execution(fault.to_string()))?;

    state.rules.move_at(index as usize).ok_or_else(|| {
        DecisionError::invalid_move(format!(
            "program returned move index {index}, only {} moves are active",
            state.rules.moves().len()
        ))
    })
}

/// Runs the program to a terminal, yielding the raw move index.
fn execute_inner(
    bytecode: &[u8],
    state: &MatchState<'_>,
    rng: &mut SeededRng,
) -> Result<u8, VmFault> {
    let mut stack = Stack::default();
    let mut pc: usize = 0;
    let mut fuel: u32 = 0;

    while pc < bytecode.len() {
        fuel += 1;
        if fuel > MAX_FUEL {
            return Err(VmFault::FuelExhausted);
        }

        let opcode = bytecode[pc];
        match opcode {
            op::PLAY => {
                return bytecode.get(pc + 1).copied().ok_or(VmFault::FellOffEnd);
            }

            op::RETURN => return stack.pop(pc),

            op::PUSH => {
                let imm = *bytecode.get(pc + 1).ok_or(VmFault::FellOffEnd)?;
                stack.push(pc, imm)?;
                pc += 2;
            }

            op::OPP_LAST => {
                stack.push(pc, encode(state, state.opponent_last()))?;
                pc += 1;
            }

            op::MY_LAST => {
                stack.push(pc, encode(state, state.my_last()))?;
                pc += 1;
            }

            op::OPP_N => {
                let n = stack.pop(pc)? as usize;
                stack.push(pc, history_n_ago(state, state.opponent_moves, n))?;
                pc += 1;
            }

            op::MY_N => {
                let n = stack.pop(pc)? as usize;
                stack.push(pc, history_n_ago(state, state.my_moves, n))?;
                pc += 1;
            }

            op::OPP_COUNT => {
                let target = decode(state, stack.pop(pc)?, pc)?;
                stack.push(pc, count_plays(state.opponent_moves, target))?;
                pc += 1;
            }

            op::MY_COUNT => {
                let target = decode(state, stack.pop(pc)?, pc)?;
                stack.push(pc, count_plays(state.my_moves, target))?;
                pc += 1;
            }

            op::ROUND => {
                stack.push(pc, state.round.min(u8::MAX as u32) as u8)?;
                pc += 1;
            }

            op::RAND => {
                let bound = stack.pop(pc)?;
                if bound == 0 {
                    return Err(VmFault::DivideByZero(pc));
                }
                stack.push(pc, rng.next_range(bound as u32) as u8)?;
                pc += 1;
            }

            op::ADD => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, a.saturating_add(b))?;
                pc += 1;
            }

            op::SUB => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, a.saturating_sub(b))?;
                pc += 1;
            }

            op::MUL => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, a.saturating_mul(b))?;
                pc += 1;
            }

            op::MOD => {
                let (a, b) = stack.pop2(pc)?;
                if b == 0 {
                    return Err(VmFault::DivideByZero(pc));
                }
                stack.push(pc, a % b)?;
                pc += 1;
            }

            op::GT => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, u8::from(a > b))?;
                pc += 1;
            }

            op::LT => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, u8::from(a < b))?;
                pc += 1;
            }

            op::EQ => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, u8::from(a == b))?;
                pc += 1;
            }

            op::NOT => {
                let a = stack.pop(pc)?;
                stack.push(pc, u8::from(a == 0))?;
                pc += 1;
            }

            op::AND => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, u8::from(a != 0 && b != 0))?;
                pc += 1;
            }

            op::OR => {
                let (a, b) = stack.pop2(pc)?;
                stack.push(pc, u8::from(a != 0 || b != 0))?;
                pc += 1;
            }

            op::DUP => {
                let a = stack.pop(pc)?;
                stack.push(pc, a)?;
                stack.push(pc, a)?;
                pc += 1;
            }

            op::JMP_FWD => {
                let offset = *bytecode.get(pc + 1).ok_or(VmFault::FellOffEnd)? as usize;
                pc = pc + 2 + offset;
            }

            op::JMP_FWD_IF => {
                let cond = stack.pop(pc)?;
                let offset = *bytecode.get(pc + 1).ok_or(VmFault::FellOffEnd)? as usize;
                if cond != 0 {
                    pc = pc + 2 + offset;
                } else {
                    pc += 2;
                }
            }

            op::BEATS => {
                let target = decode(state, stack.pop(pc)?, pc)?;
                let beater = state
                    .rules
                    .beaters_of(target)
                    .first()
                    .and_then(|m| state.rules.index_of(*m))
                    .ok_or(VmFault::BadMoveOperand(pc))?;
                stack.push(pc, beater as u8)?;
                pc += 1;
            }

            op::MOVES => {
                stack.push(pc, state.rules.moves().len() as u8)?;
                pc += 1;
            }

            _ => return Err(VmFault::UnknownOpcode(pc, opcode)),
        }
    }

    Err(VmFault::FellOffEnd)
}

// ── Stack ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Stack {
    slots: [u8; STACK_SIZE],
    sp: usize,
}

impl Stack {
    #[inline]
    fn push(&mut self, pc: usize, val: u8) -> Result<(), VmFault> {
        if self.sp >= STACK_SIZE {
            return Err(VmFault::StackOverflow(pc));
        }
        self.slots[self.sp] = val;
        self.sp += 1;
        Ok(())
    }

    #[inline]
    fn pop(&mut self, pc: usize) -> Result<u8, VmFault> {
        if self.sp == 0 {
            return Err(VmFault::StackUnderflow(pc));
        }
        self.sp -= 1;
        Ok(self.slots[self.sp])
    }

    /// Pops `b` then `a`, returning `(a, b)`
    #[inline]
    fn pop2(&mut self, pc: usize) -> Result<(u8, u8), VmFault> {
        let b = self.pop(pc)?;
        let a = self.pop(pc)?;
        Ok((a, b))
    }
}

// ── History helpers ──────────────────────────────────────────────────

#[inline]
fn encode(state: &MatchState<'_>, mv: Option<Move>) -> u8 {
    mv.and_then(|m| state.rules.index_of(m))
        .map_or(NONE, |i| i as u8)
}

#[inline]
fn decode(state: &MatchState<'_>, value: u8, pc: usize) -> Result<Move, VmFault> {
    state
        .rules
        .move_at(value as usize)
        .ok_or(VmFault::BadMoveOperand(pc))
}

#[inline]
fn history_n_ago(state: &MatchState<'_>, history: &[Option<Move>], n: usize) -> u8 {
    if n >= history.len() {
        return NONE;
    }
    encode(state, history[history.len() - 1 - n])
}

#[inline]
fn count_plays(history: &[Option<Move>], target: Move) -> u8 {
    let count = history.iter().filter(|m| **m == Some(target)).count();
    count.min(255) as u8
}

// ── Tests ────────────────────────────────────────────────────────────
