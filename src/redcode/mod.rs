//! Redcode instruction representation.
//!
//! A memory cell of the MARS holds one [`Word`]: an [`Opcode`] plus two
//! operand [`Field`]s, each tagged with an addressing [`Mode`].

pub mod opcode;
pub mod field;
pub mod word;

pub use opcode::Opcode;
pub use field::{Field, FieldId, Mode};
pub use word::{Word, WordParseError};
