//! The closed Redcode instruction set.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::redcode::word::WordParseError;

/// One of the eleven executable Redcode operations.
///
/// `DAT` doubles as the halt marker: executing it kills the thread.
/// The assembler pseudo-ops `EQU` and `END` never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Data / halt.
    Dat,
    /// Move A to B.
    Mov,
    /// Add A to B.
    Add,
    /// Subtract A from B.
    Sub,
    /// Unconditional jump to A.
    Jmp,
    /// Jump to A if B is zero.
    Jmz,
    /// Jump to A if B is non-zero.
    Jmn,
    /// Decrement B, jump to A if the result is non-zero.
    Djn,
    /// Skip the next instruction if A equals B.
    Cmp,
    /// Skip the next instruction if A is less than B.
    Slt,
    /// Start a new thread at A.
    Spl,
}

impl Opcode {
    /// Every opcode, in standard Redcode order.
    pub const ALL: [Opcode; 11] = [
        Opcode::Dat,
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Jmp,
        Opcode::Jmz,
        Opcode::Jmn,
        Opcode::Djn,
        Opcode::Cmp,
        Opcode::Slt,
        Opcode::Spl,
    ];

    /// Upper-case mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Dat => "DAT",
            Opcode::Mov => "MOV",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Jmp => "JMP",
            Opcode::Jmz => "JMZ",
            Opcode::Jmn => "JMN",
            Opcode::Djn => "DJN",
            Opcode::Cmp => "CMP",
            Opcode::Slt => "SLT",
            Opcode::Spl => "SPL",
        }
    }

    /// Look up an opcode by mnemonic, ignoring case.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    /// True for the halt marker.
    #[inline]
    pub const fn is_halt(self) -> bool {
        matches!(self, Opcode::Dat)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for Opcode {
    type Err = WordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mnemonic(s.trim()).ok_or_else(|| WordParseError::UnknownOpcode(s.trim().to_string()))
    }
}
