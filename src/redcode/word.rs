//! A single MARS memory cell.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::redcode::{Field, FieldId, Opcode};

/// An instruction or datum stored in one memory cell.
///
/// Equality compares opcode and both fields; the source line is
/// diagnostic metadata only.
#[derive(Debug, Clone, Copy, Eq, Serialize, Deserialize)]
pub struct Word {
    /// Operation.
    pub opcode: Opcode,
    /// A operand.
    pub a: Field,
    /// B operand.
    pub b: Field,
    /// Source line this word was assembled from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Word {
    /// Create a word with no source line.
    pub const fn new(opcode: Opcode, a: Field, b: Field) -> Self {
        Self { opcode, a, b, line: None }
    }

    /// Create a word from a mnemonic, rejecting anything outside the
    /// instruction set.
    pub fn from_mnemonic(name: &str, a: Field, b: Field) -> Result<Self, WordParseError> {
        let opcode = name.parse::<Opcode>()?;
        Ok(Self::new(opcode, a, b))
    }

    /// The canonical empty cell, `DAT #0, #0`.
    pub const fn zero() -> Self {
        Self::new(Opcode::Dat, Field::immediate(0), Field::immediate(0))
    }

    /// Attach a source line.
    pub const fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Borrow one of the fields.
    #[inline]
    pub const fn field(&self, id: FieldId) -> &Field {
        match id {
            FieldId::A => &self.a,
            FieldId::B => &self.b,
        }
    }

    /// Mutably borrow one of the fields.
    #[inline]
    pub fn field_mut(&mut self, id: FieldId) -> &mut Field {
        match id {
            FieldId::A => &mut self.a,
            FieldId::B => &mut self.b,
        }
    }
}

impl Default for Word {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        self.opcode == other.opcode && self.a == other.a && self.b == other.b
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}, {}", self.opcode, self.a, self.b)
    }
}

impl FromStr for Word {
    type Err = WordParseError;

    /// Parse a fully numeric instruction, e.g. `MOV 0, 1` or `DAT #4`.
    ///
    /// A lone operand on `DAT` is the B-field; on other opcodes it is A and
    /// B defaults to `#0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = match s.find(char::is_whitespace) {
            Some(idx) => (&s[..idx], s[idx..].trim()),
            None => (s, ""),
        };
        let opcode = name.parse::<Opcode>()?;

        let mut operands = rest.split(',').map(str::trim).filter(|p| !p.is_empty());
        let first = operands.next().map(str::parse::<Field>).transpose()?;
        let second = operands.next().map(str::parse::<Field>).transpose()?;
        if operands.next().is_some() {
            return Err(WordParseError::TooManyOperands(s.to_string()));
        }

        let (a, b) = match (first, second) {
            (Some(a), Some(b)) => (a, b),
            (Some(only), None) if opcode.is_halt() => (Field::immediate(0), only),
            (Some(a), None) => (a, Field::immediate(0)),
            (None, _) => (Field::immediate(0), Field::immediate(0)),
        };
        Ok(Word::new(opcode, a, b))
    }
}

/// Errors from parsing words, fields and opcodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordParseError {
    #[error("unknown opcode: '{0}'")]
    UnknownOpcode(String),

    #[error("malformed operand: '{0}'")]
    BadField(String),

    #[error("too many operands in '{0}'")]
    TooManyOperands(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_word() {
        assert_eq!(Word::zero().to_string(), "DAT #0, #0");
        assert_eq!(Word::default(), Word::zero());
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let err = Word::from_mnemonic("HLT", Field::immediate(0), Field::immediate(0));
        assert_eq!(err, Err(WordParseError::UnknownOpcode("HLT".into())));
        assert!(Word::from_mnemonic("spl", Field::direct(2), Field::immediate(0)).is_ok());
    }

    #[test]
    fn test_parse_word() {
        let w: Word = "MOV 0, 1".parse().unwrap();
        assert_eq!(w, Word::new(Opcode::Mov, Field::direct(0), Field::direct(1)));

        let d: Word = "dat #4".parse().unwrap();
        assert_eq!(d, Word::new(Opcode::Dat, Field::immediate(0), Field::immediate(4)));

        let j: Word = "JMP -1".parse().unwrap();
        assert_eq!(j.b, Field::immediate(0));

        assert!("MOV 0, 1, 2".parse::<Word>().is_err());
        assert!("MOV x, 1".parse::<Word>().is_err());
    }

    #[test]
    fn test_equality_ignores_line() {
        let w: Word = "ADD #3, 2".parse().unwrap();
        assert_eq!(w.at_line(7), w);
    }

    #[test]
    fn test_field_access() {
        let mut w: Word = "SUB @1, <2".parse().unwrap();
        assert_eq!(w.field(FieldId::A), &Field::indirect(1));
        w.field_mut(FieldId::B).value = 5;
        assert_eq!(w.b, Field::auto_decrement(5));
    }
}
