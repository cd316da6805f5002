//! Two-pass Redcode assembler.
//!
//! Syntax:
//! ```text
//! ;name Dwarf        ; metadata comment sets the program name
//! STEP    EQU  4      ; bind a symbol to a constant
//! BOMB    DAT  #0     ; labels start in the first column
//! START   ADD  #STEP, BOMB
//!         MOV  BOMB, @BOMB
//!         JMP  START  ; unlabeled lines start with white space
//!         END  START  ; optional start label
//! ```
//!
//! Pass 1 splits each line into label, opcode and operands and records
//! label addresses. Pass 2 turns every symbol into an offset relative to
//! the instruction that uses it. Faults are collected rather than returned
//! early so one run reports every bad line; any fault means the code must
//! not be used.

use std::collections::HashMap;
use thiserror::Error;

use crate::asm::Warrior;
use crate::redcode::{Field, Mode, Opcode, Word};

/// Symbol table key holding the program's start offset.
pub const START_SYMBOL: &str = ":start";

/// Label (upper case) → value. Labels map to code indices, `EQU`
/// symbols to their constant.
pub type SymbolTable = HashMap<String, i64>;

/// Assemble source lines with the default program name.
pub fn assemble<I, S>(lines: I) -> Assembly
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Assembler::new("unknown0").assemble(lines)
}

/// Everything the assembler produced for one source.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Name from a `;name` comment, or the default.
    pub name: String,
    /// One word per instruction line.
    pub code: Vec<Word>,
    /// Labels, `EQU` constants and [`START_SYMBOL`].
    pub symbols: SymbolTable,
    /// Every fault found, in source order.
    pub errors: Vec<SyntaxFault>,
}

impl Assembly {
    /// True if no faults were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn a clean assembly into a [`Warrior`], or hand back all faults.
    pub fn into_warrior(self) -> Result<Warrior, AssemblerError> {
        if !self.errors.is_empty() {
            return Err(AssemblerError::Syntax(self.errors));
        }
        Ok(Warrior::new(self.name, self.code, self.symbols))
    }
}

/// Opcode field of a source line, pseudo-ops included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mnemonic {
    Op(Opcode),
    Equ,
    End,
}

impl Mnemonic {
    fn lookup(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "EQU" => Some(Mnemonic::Equ),
            "END" => Some(Mnemonic::End),
            other => Opcode::from_mnemonic(other).map(Mnemonic::Op),
        }
    }
}

/// Value part of an operand before symbols are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Number(i64),
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Operand {
    mode: Mode,
    term: Term,
}

/// An instruction line after pass 1.
#[derive(Debug, Clone)]
struct Statement {
    opcode: Opcode,
    a: Option<Operand>,
    b: Option<Operand>,
    line: usize,
}

enum Flow {
    Continue,
    Stop,
}

/// Assembler state for one source.
#[derive(Debug)]
pub struct Assembler {
    name: String,
    symbols: SymbolTable,
    statements: Vec<Statement>,
    errors: Vec<SyntaxFault>,
}

impl Assembler {
    /// Create an assembler; `default_name` is used unless the source
    /// names itself.
    pub fn new(default_name: impl Into<String>) -> Self {
        let mut symbols = SymbolTable::new();
        symbols.insert(START_SYMBOL.to_string(), 0);
        Self {
            name: default_name.into(),
            symbols,
            statements: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Run both passes over `lines`.
    pub fn assemble<I, S>(mut self, lines: I) -> Assembly
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // Pass 1: split lines, record labels
        for (idx, raw) in lines.into_iter().enumerate() {
            let line_num = idx + 1;
            let line = raw.as_ref().trim_end();

            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix(';') {
                if let Some(name) = parse_name(comment) {
                    self.name = name;
                }
                continue;
            }

            let line = match line.find(';') {
                Some(idx) => &line[..idx],
                None => line,
            };
            if line.trim().is_empty() {
                continue;
            }

            match self.process_line(line, line_num) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(message) => self.errors.push(SyntaxFault { line: line_num, message }),
            }
        }

        // Pass 2: symbols become relative offsets
        let mut code = Vec::with_capacity(self.statements.len());
        for (loc, st) in self.statements.iter().enumerate() {
            let fields = self
                .translate(st.a.as_ref(), loc)
                .and_then(|a| Ok((a, self.translate(st.b.as_ref(), loc)?)));
            match fields {
                Ok((a, b)) => code.push(Word::new(st.opcode, a, b).at_line(st.line)),
                Err(message) => self.errors.push(SyntaxFault {
                    line: st.line,
                    message: format!("instruction {}: {}", loc, message),
                }),
            }
        }

        Assembly {
            name: self.name,
            code,
            symbols: self.symbols,
            errors: self.errors,
        }
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<Flow, String> {
        let (label, rest) = parse_label(line)?;
        let (mnemonic, rest) = parse_opcode(rest)?;
        let (a, rest) = parse_operand(rest)?;
        let (comma, rest) = parse_separator(rest)?;
        let (b, rest) = parse_operand(rest)?;

        if comma && b.is_none() {
            return Err(format!("missing operand after comma in '{}'", line.trim()));
        }
        if !rest.trim().is_empty() {
            return Err(format!("unexpected text '{}'", rest.trim()));
        }

        match mnemonic {
            Mnemonic::Equ => {
                let label = label.ok_or_else(|| "EQU must have a label".to_string())?;
                match a {
                    Some(Operand { mode: Mode::Direct, term: Term::Number(value) }) => {
                        self.define(label, value)?;
                    }
                    _ => return Err("EQU operand must be an integer".into()),
                }
            }

            Mnemonic::End => {
                match a {
                    None => {}
                    Some(Operand { mode: Mode::Direct, term: Term::Symbol(sym) }) => {
                        match self.symbols.get(&sym) {
                            Some(&value) => {
                                self.symbols.insert(START_SYMBOL.to_string(), value);
                            }
                            None => self.errors.push(SyntaxFault {
                                line: line_num,
                                message: format!("unknown operand in END: {}", sym),
                            }),
                        }
                    }
                    Some(_) => self.errors.push(SyntaxFault {
                        line: line_num,
                        message: "END operand must be a label".into(),
                    }),
                }
                return Ok(Flow::Stop);
            }

            Mnemonic::Op(opcode) => {
                let defined = match label {
                    Some(label) => self.define(label, self.statements.len() as i64),
                    None => Ok(()),
                };
                // A lone DAT operand is the B-field
                let (a, b) = match (opcode, a, b) {
                    (Opcode::Dat, Some(only), None) => (None, Some(only)),
                    (_, a, b) => (a, b),
                };
                // keep the statement so later labels stay at their index
                self.statements.push(Statement { opcode, a, b, line: line_num });
                defined?;
            }
        }

        Ok(Flow::Continue)
    }

    fn define(&mut self, label: String, value: i64) -> Result<(), String> {
        if self.symbols.contains_key(&label) {
            return Err(format!("duplicate label '{}'", label));
        }
        self.symbols.insert(label, value);
        Ok(())
    }

    fn translate(&self, operand: Option<&Operand>, loc: usize) -> Result<Field, String> {
        let Some(operand) = operand else {
            return Ok(Field::immediate(0));
        };
        match &operand.term {
            Term::Number(n) => Ok(Field::new(operand.mode, *n)),
            Term::Symbol(sym) => self
                .symbols
                .get(sym)
                .map(|value| Field::new(operand.mode, value - loc as i64))
                .ok_or_else(|| format!("unknown/illegal label: {}", sym)),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split off the leading run of word characters.
fn take_word(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_word_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

fn starts_with_blank(s: &str) -> bool {
    s.starts_with([' ', '\t'])
}

/// `;name X` metadata, given the text after the `;`.
fn parse_name(comment: &str) -> Option<String> {
    let rest = comment.trim_start().strip_prefix("name")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, _) = take_word(rest.trim_start());
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Labels start in the first column; a blank first column means none.
fn parse_label(s: &str) -> Result<(Option<String>, &str), String> {
    if starts_with_blank(s) {
        return Ok((None, s));
    }
    let (label, rest) = take_word(s);
    if label.is_empty() {
        return Err(format!("illegal label in '{}'", s.trim()));
    }
    let label = label.to_ascii_uppercase();
    if Mnemonic::lookup(&label).is_some() {
        return Err(format!("can't use opcode '{}' as a label", label));
    }
    Ok((Some(label), rest))
}

/// The opcode must be separated from the label by white space.
fn parse_opcode(s: &str) -> Result<(Mnemonic, &str), String> {
    if !starts_with_blank(s) {
        return Err(format!("illegal label in '{}'", s.trim()));
    }
    let s = s.trim_start();
    let (name, rest) = take_word(s);
    if name.is_empty() {
        return Err(format!("illegal opcode in '{}'", s));
    }
    Mnemonic::lookup(name)
        .map(|mnemonic| (mnemonic, rest))
        .ok_or_else(|| format!("unknown opcode: '{}'", name.to_ascii_uppercase()))
}

/// `[@<#]?[+-]?\w+`, or nothing at all.
fn parse_operand(s: &str) -> Result<(Option<Operand>, &str), String> {
    let s = s.trim_start();
    if s.is_empty() {
        return Ok((None, s));
    }

    let mut body = s;
    let mode = match body.chars().next().and_then(Mode::from_prefix) {
        Some(mode) => {
            body = &body[1..];
            mode
        }
        None => Mode::Direct,
    };
    let sign_len = usize::from(body.starts_with(['+', '-']));
    let (word, rest) = take_word(&body[sign_len..]);
    if word.is_empty() {
        return Err(format!("illegal operand in '{}'", s.trim()));
    }

    let text = &body[..sign_len + word.len()];
    let term = if word.bytes().all(|b| b.is_ascii_digit()) {
        let value = text
            .parse::<i64>()
            .map_err(|_| format!("operand out of range: '{}'", text))?;
        Term::Number(value)
    } else {
        Term::Symbol(text.to_ascii_uppercase())
    };
    Ok((Some(Operand { mode, term }), rest))
}

/// Operands are separated by a comma.
fn parse_separator(s: &str) -> Result<(bool, &str), String> {
    let s = s.trim_start();
    if s.is_empty() {
        return Ok((false, s));
    }
    match s.strip_prefix(',') {
        Some(rest) => Ok((true, rest)),
        None => Err(format!("operands must be separated by a comma in '{}'", s)),
    }
}

/// A single assembly diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SyntaxFault {
    /// 1-based source line.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

/// Errors that can occur while producing a [`Warrior`].
#[derive(Debug, Clone, Error)]
pub enum AssemblerError {
    #[error("{} syntax error(s)", .0.len())]
    Syntax(Vec<SyntaxFault>),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AssemblerError {
    /// Every syntax fault, empty for I/O errors.
    pub fn faults(&self) -> &[SyntaxFault] {
        match self {
            AssemblerError::Syntax(faults) => faults,
            AssemblerError::Io(_) => &[],
        }
    }
}
