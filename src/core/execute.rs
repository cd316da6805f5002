//! Instruction semantics.
//!
//! Executing a [`Word`] reads and writes [`Memory`] and steers the
//! [`ProgramCounter`] of the program that fetched it. Operand addresses are
//! always relative to the executing instruction, recorded by the counter's
//! last `increment`.
//!
//! Immediate A operands of MOV, ADD and SUB always target the B-field of the
//! destination.

use crate::core::{Memory, ProgramCounter};
use crate::redcode::{Field, FieldId, Mode, Opcode, Word};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Outcome of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// The thread keeps running.
    Continue,
    /// The thread executed a halt and must be removed.
    Halt,
}

/// Resolve an operand to a memory address.
///
/// Immediate operands resolve to `pc_addr` itself. An auto-decrement
/// operand writes the decremented pointer back before resolving, whatever
/// the instruction goes on to do.
pub fn dereference(field: &Field, pc_addr: usize, mem: &mut Memory) -> usize {
    match field.mode {
        Mode::Immediate => pc_addr % mem.size(),
        Mode::Direct => mem.offset(pc_addr, field.value),
        Mode::Indirect => {
            let ptrloc = mem.offset(pc_addr, field.value);
            let offset = mem.fetch_field(ptrloc, FieldId::B).value;
            mem.offset(ptrloc, offset)
        }
        Mode::AutoDecrement => {
            let ptrloc = mem.offset(pc_addr, field.value);
            let pointer = mem.fetch_field(ptrloc, FieldId::B).value;
            let stored = mem.offset(mem.wrap(pointer), -1);
            mem.store_field(ptrloc, stored as i64, FieldId::B);
            mem.offset(ptrloc, stored as i64)
        }
    }
}

impl Word {
    /// Execute this word as fetched by `pc`.
    pub fn execute(&self, pc: &mut ProgramCounter, mem: &mut Memory) -> Result<Signal, RuntimeFault> {
        let here = pc.current().ok_or(RuntimeFault::NoFetch)?.addr;

        match self.opcode {
            Opcode::Dat => {
                dereference(&self.a, here, mem);
                dereference(&self.b, here, mem);
                return Ok(Signal::Halt);
            }

            Opcode::Mov => {
                self.forbid_immediate(FieldId::B)?;
                let src = dereference(&self.a, here, mem);
                let val = mem.fetch(src);
                let dest = dereference(&self.b, here, mem);
                if self.a.is_immediate() {
                    mem.store_field(dest, val.a.value, FieldId::B);
                } else {
                    mem.store(dest, &val);
                }
                pc.log(dest);
            }

            Opcode::Add | Opcode::Sub => {
                self.forbid_immediate(FieldId::B)?;
                let src = dereference(&self.a, here, mem);
                let source = mem.fetch(src);
                let dest = dereference(&self.b, here, mem);
                let target = mem.fetch(dest);
                let combine = |d: i64, s: i64| match self.opcode {
                    Opcode::Add => d.wrapping_add(s),
                    _ => d.wrapping_sub(s),
                };
                if self.a.is_immediate() {
                    mem.store_field(dest, combine(target.b.value, source.a.value), FieldId::B);
                } else {
                    mem.store_field(dest, combine(target.a.value, source.a.value), FieldId::A);
                    mem.store_field(dest, combine(target.b.value, source.b.value), FieldId::B);
                }
                pc.log(dest);
            }

            Opcode::Jmp => {
                self.forbid_immediate(FieldId::A)?;
                let target = dereference(&self.a, here, mem);
                dereference(&self.b, here, mem);
                pc.branch(target);
            }

            Opcode::Jmz | Opcode::Jmn => {
                self.forbid_immediate(FieldId::A)?;
                let target = dereference(&self.a, here, mem);
                let operand_addr = dereference(&self.b, here, mem);
                let is_zero = mem.fetch(operand_addr).b.value == 0;
                if is_zero == (self.opcode == Opcode::Jmz) {
                    pc.branch(target);
                }
            }

            Opcode::Djn => {
                self.forbid_immediate(FieldId::A)?;
                let target = dereference(&self.a, here, mem);
                let operand_addr = dereference(&self.b, here, mem);
                let counter = mem.fetch(operand_addr).b.value;
                let stored = mem.offset(mem.wrap(counter), -1);
                mem.store_field(operand_addr, stored as i64, FieldId::B);
                if counter != 1 {
                    pc.branch(target);
                }
                pc.log(operand_addr);
            }

            Opcode::Cmp => {
                self.forbid_immediate(FieldId::B)?;
                let right_addr = dereference(&self.b, here, mem);
                let right = mem.fetch(right_addr);
                let equal = if self.a.is_immediate() {
                    self.a.value == right.a.value
                } else {
                    let left_addr = dereference(&self.a, here, mem);
                    mem.fetch(left_addr) == right
                };
                if equal {
                    pc.skip();
                }
            }

            Opcode::Slt => {
                self.forbid_immediate(FieldId::B)?;
                let left = if self.a.is_immediate() {
                    self.a.value
                } else {
                    let left_addr = dereference(&self.a, here, mem);
                    mem.fetch(left_addr).b.value
                };
                let right_addr = dereference(&self.b, here, mem);
                let right = mem.fetch(right_addr).b.value;
                if left < right {
                    pc.skip();
                }
            }

            Opcode::Spl => {
                self.forbid_immediate(FieldId::A)?;
                let target = dereference(&self.a, here, mem);
                pc.add_thread(target);
            }
        }

        Ok(Signal::Continue)
    }

    fn forbid_immediate(&self, id: FieldId) -> Result<(), RuntimeFault> {
        if self.field(id).is_immediate() {
            return Err(RuntimeFault::ImmediateOperand { opcode: self.opcode, field: id });
        }
        Ok(())
    }
}

/// Errors raised while executing a single instruction.
///
/// A fault kills the thread that raised it and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeFault {
    #[error("{opcode}: immediate {field}-field not allowed")]
    ImmediateOperand { opcode: Opcode, field: FieldId },

    #[error("instruction executed without a fetch")]
    NoFetch,

    #[error("SPL: this machine runs a single thread")]
    SingleThreaded,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Load `program` at 0 in a memory of `size` and return a counter
    /// ready to fetch the first word.
    fn machine(program: &[&str], size: usize) -> (ProgramCounter, Memory) {
        let mut mem = Memory::new(size);
        for (i, src) in program.iter().enumerate() {
            mem.store(i, &src.parse::<Word>().unwrap());
        }
        (ProgramCounter::new("test", 0, size), mem)
    }

    fn step(pc: &mut ProgramCounter, mem: &mut Memory) -> Result<Signal, RuntimeFault> {
        let addr = pc.increment().unwrap();
        mem.fetch(addr).execute(pc, mem)
    }

    #[test]
    fn test_dereference_modes() {
        let mut mem = Memory::new(20);
        mem.store(5, &"DAT #0, 3".parse().unwrap());

        assert_eq!(dereference(&Field::immediate(7), 2, &mut mem), 2);
        assert_eq!(dereference(&Field::direct(-3), 2, &mut mem), 19);
        assert_eq!(dereference(&Field::indirect(3), 2, &mut mem), 8);
        assert_eq!(dereference(&Field::auto_decrement(3), 2, &mut mem), 7);
        assert_eq!(mem.fetch(5).b, Field::direct(2));
    }

    #[test]
    fn test_auto_decrement_wraps() {
        let mut mem = Memory::new(10);
        mem.store(1, &"DAT #0, #0".parse().unwrap());
        assert_eq!(dereference(&Field::auto_decrement(1), 0, &mut mem), 0);
        assert_eq!(mem.fetch(1).b, Field::immediate(9));
    }

    #[test]
    fn test_dat_halts_and_decrements() {
        let (mut pc, mut mem) = machine(&["DAT #0, <1", "DAT #0, #1"], 2);
        assert_eq!(step(&mut pc, &mut mem), Ok(Signal::Halt));
        assert_eq!(mem.fetch(1).to_string(), "DAT #0, #0");
    }

    #[test]
    fn test_imp_replicates() {
        let (mut pc, mut mem) = machine(&["MOV 0, 1"], 10);
        assert_eq!(step(&mut pc, &mut mem), Ok(Signal::Continue));
        assert_eq!(step(&mut pc, &mut mem), Ok(Signal::Continue));
        assert_eq!(mem.fetch(1), mem.fetch(0));
        assert_eq!(pc.next_instr(), Some(2));
    }

    #[test]
    fn test_mov_immediate_writes_b_field() {
        let (mut pc, mut mem) = machine(&["MOV #1, 1", "DAT #0, #0"], 2);
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(mem.fetch(1).to_string(), "DAT #0, #1");
        assert_eq!(pc.history().back(), Some(&1));
    }

    #[test]
    fn test_mov_immediate_b_faults() {
        let (mut pc, mut mem) = machine(&["MOV 0, #1"], 4);
        assert_eq!(
            step(&mut pc, &mut mem),
            Err(RuntimeFault::ImmediateOperand { opcode: Opcode::Mov, field: FieldId::B })
        );
    }

    #[test]
    fn test_add() {
        let (mut pc, mut mem) = machine(
            &["ADD #3, 3", "ADD 3, 4", "ADD 2, #0", "DAT #1, #2", "DAT #3, #4", "DAT #5, #6"],
            6,
        );
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(mem.fetch(3).to_string(), "DAT #1, #5");
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(mem.fetch(5).to_string(), "DAT #8, #10");
        assert!(step(&mut pc, &mut mem).is_err());
    }

    #[test]
    fn test_sub() {
        let (mut pc, mut mem) = machine(
            &["SUB #3, 3", "SUB 3, 4", "SUB 2, #0", "DAT #1, #10", "DAT #3, #4", "DAT #5, #6"],
            6,
        );
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(mem.fetch(3).to_string(), "DAT #1, #7");
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(mem.fetch(5).to_string(), "DAT #2, #2");
        assert!(step(&mut pc, &mut mem).is_err());
    }

    #[test]
    fn test_jmp() {
        let (mut pc, mut mem) = machine(&["JMP 2", "DAT #0, #0", "JMP #0"], 3);
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(2));
        assert_eq!(
            step(&mut pc, &mut mem),
            Err(RuntimeFault::ImmediateOperand { opcode: Opcode::Jmp, field: FieldId::A })
        );
    }

    #[test]
    fn test_jmz_and_jmn() {
        let (mut pc, mut mem) = machine(&["JMZ 3, #1", "JMZ 2, #0", "DAT #0, #0", "JMZ #0, #0"], 4);
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(1));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(3));
        assert!(step(&mut pc, &mut mem).is_err());

        let (mut pc, mut mem) = machine(&["JMN 3, #0", "JMN 2, #1", "DAT #0, #0", "JMN #0, #0"], 4);
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(1));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(3));
        assert!(step(&mut pc, &mut mem).is_err());
    }

    #[test]
    fn test_djn() {
        let (mut pc, mut mem) = machine(&["DJN 3, 2", "DJN 2, 1", "DAT #0, #1", "DJN #0, #0"], 4);
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(1));
        assert_eq!(mem.fetch(2).b, Field::immediate(0));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(3));
        assert_eq!(mem.fetch(2).b, Field::immediate(3));
        assert!(step(&mut pc, &mut mem).is_err());
    }

    #[test]
    fn test_cmp() {
        let (mut pc, mut mem) = machine(
            &[
                "CMP #1, 7",
                "CMP #0, 6",
                "DAT #0, #0",
                "CMP 4, 5",
                "CMP 3, 3",
                "DAT #0, #0",
                "CMP 1, #0",
                "DAT #0, #0",
                "DAT #0, #1",
            ],
            9,
        );
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(1));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(3));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(4));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(6));
        assert!(step(&mut pc, &mut mem).is_err());
    }

    #[test]
    fn test_slt() {
        let (mut pc, mut mem) = machine(
            &[
                "SLT #3, 7",
                "SLT #1, 6",
                "DAT #0, #0",
                "SLT 4, 5",
                "SLT 4, 3",
                "DAT #0, #0",
                "SLT #0, #0",
                "DAT #2",
                "DAT #0",
            ],
            9,
        );
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(1));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(3));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(4));
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.next_instr(), Some(6));
        assert!(step(&mut pc, &mut mem).is_err());
    }

    #[test]
    fn test_spl_appends_thread() {
        let (mut pc, mut mem) = machine(&["SPL 3", "DAT #0, #0", "DAT #0, #0", "MOV 0, 1"], 8);
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(pc.threads(), &[1, 3]);
    }

    #[test]
    fn test_extreme_operands_wrap() {
        let (mut pc, mut mem) = machine(&["JMP 9223372036854775807"], 10);
        assert_eq!(step(&mut pc, &mut mem), Ok(Signal::Continue));
        assert_eq!(pc.next_instr(), Some(7));

        let (mut pc, mut mem) = machine(&["MOV @1, 0", "DAT #0, 9223372036854775807"], 10);
        assert_eq!(step(&mut pc, &mut mem), Ok(Signal::Continue));

        let (mut pc, mut mem) = machine(&["DAT <1, <-9223372036854775808", "DAT #0, -9223372036854775808"], 10);
        assert_eq!(step(&mut pc, &mut mem), Ok(Signal::Halt));
        assert_eq!(mem.fetch(1).b.value, 1);
    }

    #[test]
    fn test_djn_extreme_counter() {
        let (mut pc, mut mem) = machine(&["DJN 0, 1", "DAT #0, #-9223372036854775808"], 10);
        step(&mut pc, &mut mem).unwrap();
        assert_eq!(mem.fetch(1).b.value, 1);
        assert_eq!(pc.next_instr(), Some(0));
    }

    #[test]
    fn test_execute_requires_fetch() {
        let (mut pc, mut mem) = machine(&["MOV 0, 1"], 4);
        let word = mem.fetch(0);
        assert_eq!(word.execute(&mut pc, &mut mem), Err(RuntimeFault::NoFetch));
    }
}
