//! # Redcode MARS
//!
//! A Memory Array Redcode Simulator: the virtual machine behind Corewar.
//!
//! Programs written in Redcode are assembled into [`Word`]s, copied into a
//! circular [`Memory`] shared by every contestant, and executed one
//! instruction per program per round. A program dies when its last thread
//! executes a `DAT` or faults; the last program standing wins.

pub mod redcode;
pub mod core;
pub mod asm;

// Re-export commonly used types
pub use redcode::{Field, FieldId, Mode, Opcode, Word, WordParseError};
pub use crate::core::{
    Mars, MarsConfig, MarsError, MiniMars, Memory, ProgramCounter, RuntimeFault, StepReport, RunOutcome,
};
pub use asm::{assemble, AssemblerError, SyntaxFault, Warrior};
