//! Operand fields and addressing modes.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::redcode::word::WordParseError;

/// Addressing mode of an operand.
///
/// Written as an optional prefix character in Redcode source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// `#n`: the value itself; the operand address is the instruction's own.
    Immediate,
    /// `n`: relative to the executing instruction.
    #[default]
    Direct,
    /// `@n`: the B-field of the cell at `n` is a further offset.
    Indirect,
    /// `<n`: as indirect, but the pointer's B-field is decremented first.
    AutoDecrement,
}

impl Mode {
    /// Parse a mode prefix character.
    pub const fn from_prefix(c: char) -> Option<Self> {
        match c {
            '#' => Some(Mode::Immediate),
            '@' => Some(Mode::Indirect),
            '<' => Some(Mode::AutoDecrement),
            _ => None,
        }
    }

    /// Source prefix for this mode (empty for direct).
    pub const fn prefix(self) -> &'static str {
        match self {
            Mode::Immediate => "#",
            Mode::Direct => "",
            Mode::Indirect => "@",
            Mode::AutoDecrement => "<",
        }
    }
}

/// Selects the A or B field of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldId {
    /// First operand.
    A,
    /// Second operand.
    B,
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::A => write!(f, "A"),
            FieldId::B => write!(f, "B"),
        }
    }
}

/// One operand of a word: an addressing mode and a signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Field {
    /// Addressing mode.
    pub mode: Mode,
    /// Offset or literal.
    pub value: i64,
}

impl Field {
    /// Create a field.
    pub const fn new(mode: Mode, value: i64) -> Self {
        Self { mode, value }
    }

    /// `#value`
    pub const fn immediate(value: i64) -> Self {
        Self::new(Mode::Immediate, value)
    }

    /// `value`
    pub const fn direct(value: i64) -> Self {
        Self::new(Mode::Direct, value)
    }

    /// `@value`
    pub const fn indirect(value: i64) -> Self {
        Self::new(Mode::Indirect, value)
    }

    /// `<value`
    pub const fn auto_decrement(value: i64) -> Self {
        Self::new(Mode::AutoDecrement, value)
    }

    /// True if this operand is immediate.
    #[inline]
    pub const fn is_immediate(&self) -> bool {
        matches!(self.mode, Mode::Immediate)
    }

    /// Same mode, different value.
    #[inline]
    pub const fn with_value(self, value: i64) -> Self {
        Self { mode: self.mode, value }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mode.prefix(), self.value)
    }
}

impl FromStr for Field {
    type Err = WordParseError;

    /// Parse a numeric operand such as `#0`, `-3`, `@+2` or `<1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let (mode, rest) = match chars.next().and_then(Mode::from_prefix) {
            Some(mode) => (mode, chars.as_str()),
            None => (Mode::Direct, s),
        };
        rest.parse::<i64>()
            .map(|value| Field::new(mode, value))
            .map_err(|_| WordParseError::BadField(s.to_string()))
    }
}
