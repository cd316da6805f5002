//! MARS core memory.
//!
//! A fixed-size circular array of words. Cells start out empty and read
//! as `DAT #0, #0`, so a reset never has to touch every cell.

use crate::redcode::{Field, FieldId, Word};
use serde::{Serialize, Deserialize};

/// Circular word memory.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<Option<Word>>,
}

impl Memory {
    /// Create a memory of `size` empty cells.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "memory size must be positive");
        Self { cells: vec![None; size] }
    }

    /// Number of cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Reduce a signed offset into a valid address.
    #[inline]
    pub fn wrap(&self, value: i64) -> usize {
        value.rem_euclid(self.cells.len() as i64) as usize
    }

    /// Address `delta` cells away from `base`, wrapping both ways. Any
    /// `i64` is accepted.
    #[inline]
    pub fn offset(&self, base: usize, delta: i64) -> usize {
        let size = self.cells.len();
        (base % size + self.wrap(delta)) % size
    }

    /// Read a copy of the word at `addr` (taken modulo the size).
    #[inline]
    pub fn fetch(&self, addr: usize) -> Word {
        self.cells[addr % self.cells.len()].unwrap_or_else(Word::zero)
    }

    /// Store a copy of `word` at `addr` (taken modulo the size).
    #[inline]
    pub fn store(&mut self, addr: usize, word: &Word) {
        let idx = addr % self.cells.len();
        self.cells[idx] = Some(*word);
    }

    /// Read one field of the word at `addr`.
    pub fn fetch_field(&self, addr: usize, id: FieldId) -> Field {
        *self.fetch(addr).field(id)
    }

    /// Overwrite the value of one field at `addr`, keeping that field's
    /// addressing mode and the rest of the word.
    pub fn store_field(&mut self, addr: usize, value: i64, id: FieldId) {
        let mut word = self.fetch(addr);
        let field = word.field_mut(id);
        *field = field.with_value(value);
        self.store(addr, &word);
    }

    /// True if nothing has been stored at `addr` since the last clear.
    pub fn is_untouched(&self, addr: usize) -> bool {
        self.cells[addr % self.cells.len()].is_none()
    }

    /// Forget every stored word.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = None;
        }
    }

    /// `count` words starting at `start`, wrapping past the end.
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, Word)> {
        (0..count)
            .map(|i| {
                let addr = (start + i) % self.cells.len();
                (addr, self.fetch(addr))
            })
            .collect()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.cells.iter().filter(|cell| cell.is_some()).count();

        f.debug_struct("Memory")
            .field("used_cells", &used)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redcode::Opcode;

    #[test]
    fn test_empty_cells_read_as_zero() {
        let mem = Memory::new(8);
        assert_eq!(mem.fetch(3), Word::zero());
        assert!(mem.is_untouched(3));
    }

    #[test]
    fn test_store_copies() {
        let mut mem = Memory::new(8);
        let mut word: Word = "MOV 0, 1".parse().unwrap();
        mem.store(2, &word);
        word.opcode = Opcode::Add;
        assert_eq!(mem.fetch(2).opcode, Opcode::Mov);
    }

    #[test]
    fn test_addresses_wrap() {
        let mut mem = Memory::new(10);
        let word: Word = "JMP -1".parse().unwrap();
        mem.store(13, &word);
        assert_eq!(mem.fetch(3), word);
        assert_eq!(mem.wrap(-1), 9);
        assert_eq!(mem.wrap(25), 5);
    }

    #[test]
    fn test_offset_takes_any_delta() {
        let mem = Memory::new(10);
        assert_eq!(mem.offset(7, 5), 2);
        assert_eq!(mem.offset(3, -4), 9);
        assert_eq!(mem.offset(9, i64::MAX), (9 + 7) % 10);
        assert_eq!(mem.offset(0, i64::MIN), 2);
    }

    #[test]
    fn test_store_field_keeps_mode() {
        let mut mem = Memory::new(10);
        mem.store(4, &"DAT #0, @7".parse().unwrap());
        mem.store_field(4, 3, FieldId::B);
        assert_eq!(mem.fetch(4).to_string(), "DAT #0, @3");

        mem.store_field(6, 1, FieldId::B);
        assert_eq!(mem.fetch(6).to_string(), "DAT #0, #1");
        assert_eq!(mem.fetch_field(6, FieldId::B), Field::immediate(1));
    }

    #[test]
    fn test_clear_and_dump() {
        let mut mem = Memory::new(4);
        mem.store(3, &"SPL 2".parse().unwrap());
        let dump = mem.dump(3, 2);
        assert_eq!(dump[0].0, 3);
        assert_eq!(dump[1].0, 0);
        assert_eq!(dump[0].1.opcode, Opcode::Spl);

        mem.clear();
        assert!(mem.is_untouched(3));
    }
}
