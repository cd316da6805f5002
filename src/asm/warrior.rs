//! Assembled programs.
//!
//! A [`Warrior`] is what the engine loads: a name, the assembled words and
//! the symbol table they came from. It is built once and never changes;
//! the engine copies its words into memory.

use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::asm::assembler::{Assembler, AssemblerError, SymbolTable, START_SYMBOL};
use crate::redcode::Word;

/// An assembled Redcode program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warrior {
    /// Display name.
    pub name: String,
    /// Assembled code.
    pub code: Vec<Word>,
    /// Labels and constants, including the start symbol.
    pub symbols: SymbolTable,
}

impl Warrior {
    /// Wrap already assembled code.
    pub fn new(name: impl Into<String>, code: Vec<Word>, symbols: SymbolTable) -> Self {
        Self { name: name.into(), code, symbols }
    }

    /// Build a warrior from bare words, starting at the first one.
    pub fn from_code(name: impl Into<String>, code: Vec<Word>) -> Self {
        let mut symbols = SymbolTable::new();
        symbols.insert(START_SYMBOL.to_string(), 0);
        Self::new(name, code, symbols)
    }

    /// Assemble source lines. Any syntax fault rejects the whole program.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, AssemblerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::assemble_named(lines, "unknown0")
    }

    /// Assemble source lines, naming the program `default_name` unless it
    /// carries a `;name` comment.
    pub fn assemble_named<I, S>(lines: I, default_name: &str) -> Result<Self, AssemblerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Assembler::new(default_name).assemble(lines).into_warrior()
    }

    /// Assemble a whole source text.
    pub fn from_source(source: &str) -> Result<Self, AssemblerError> {
        Self::from_lines(source.lines())
    }

    /// Read and assemble a source file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssemblerError> {
        let source = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AssemblerError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_source(&source)
    }

    /// Offset of the first instruction to execute, relative to the load
    /// address.
    pub fn start_offset(&self) -> i64 {
        self.symbols.get(START_SYMBOL).copied().unwrap_or(0)
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// True if there is no code.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}
