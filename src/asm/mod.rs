//! Redcode assembler and program records.
//!
//! This module provides:
//! - A two-pass assembler (source lines → words + symbol table)
//! - [`Warrior`], an assembled program ready to load
//! - Plain-text listings of code and memory

pub mod assembler;
pub mod warrior;
pub mod listing;

pub use assembler::{assemble, Assembler, Assembly, AssemblerError, SymbolTable, SyntaxFault, START_SYMBOL};
pub use warrior::Warrior;
pub use listing::{format_code, format_dump, format_warrior};
