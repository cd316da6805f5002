//! Plain-text listings of code and memory.

use crate::asm::Warrior;
use crate::redcode::Word;

/// One word per line, prefixed with its index.
pub fn format_code(code: &[Word]) -> String {
    let mut output = String::new();
    for (addr, word) in code.iter().enumerate() {
        output.push_str(&format!("{:04}: {}\n", addr, word));
    }
    output
}

/// A warrior's header, labels and code.
pub fn format_warrior(warrior: &Warrior) -> String {
    let mut output = String::new();
    output.push_str(&format!("; {} ({} words, start {})\n", warrior.name, warrior.len(), warrior.start_offset()));

    let mut labels: Vec<_> = warrior
        .symbols
        .iter()
        .filter(|(name, _)| !name.starts_with(':'))
        .collect();
    labels.sort_by(|x, y| (x.1, x.0).cmp(&(y.1, y.0)));
    for (name, value) in labels {
        output.push_str(&format!(";   {:<8} = {}\n", name, value));
    }

    output.push_str(&format_code(&warrior.code));
    output
}

/// Memory cells as `(address, word)` pairs, with `>` marking `next`.
pub fn format_dump(cells: &[(usize, Word)], next: Option<usize>) -> String {
    let mut output = String::new();
    for (addr, word) in cells {
        let mark = if Some(*addr) == next { '>' } else { ' ' };
        output.push_str(&format!(" {}{:04}: {}\n", mark, addr, word));
    }
    output
}
