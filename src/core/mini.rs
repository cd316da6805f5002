//! A single-program machine for stepping through code.
//!
//! [`MiniMars`] loads one warrior at address 0 into a memory just large
//! enough to hold it (or a requested size) and runs it on one thread. It is
//! the debugger's view of a program: no placement, no rivals, no `SPL`.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::asm::{format_dump, Warrior};
use crate::core::execute::{RuntimeFault, Signal};
use crate::core::{MarsError, Memory, ProgramCounter};
use crate::redcode::{Opcode, Word};

/// Where a [`MiniMars`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Loaded, nothing executed yet.
    Ready,
    /// At least one instruction executed and the program is still running.
    Continue,
    /// The program executed a halt.
    Halt,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MachineState::Ready => "ready",
            MachineState::Continue => "continue",
            MachineState::Halt => "halt",
        };
        write!(f, "{}", name)
    }
}

/// A one-program, one-thread MARS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniMars {
    mem: Memory,
    pc: ProgramCounter,
    state: MachineState,
}

impl MiniMars {
    /// Load `warrior` at address 0. Memory holds exactly the program unless
    /// `size` asks for more.
    pub fn new(warrior: &Warrior, size: Option<usize>) -> Result<Self, MarsError> {
        if warrior.is_empty() {
            return Err(MarsError::EmptyProgram);
        }
        let size = size.unwrap_or(warrior.len());
        if size < warrior.len() {
            return Err(MarsError::ProgramTooLarge { size: warrior.len(), max: size });
        }

        let mut mem = Memory::new(size);
        for (addr, word) in warrior.code.iter().enumerate() {
            mem.store(addr, word);
        }
        let start = mem.wrap(warrior.start_offset());
        let pc = ProgramCounter::new(warrior.name.clone(), start, size);

        Ok(Self { mem, pc, state: MachineState::Ready })
    }

    /// Assemble `lines` and load the result.
    pub fn from_lines<I, S>(lines: I, size: Option<usize>) -> Result<Self, MarsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let warrior = Warrior::from_lines(lines)?;
        Self::new(&warrior, size)
    }

    /// Execute one instruction and return it. `None` once the program has
    /// halted.
    ///
    /// A fault leaves the machine as it was after the fetch.
    pub fn step(&mut self) -> Result<Option<Word>, RuntimeFault> {
        if self.state == MachineState::Halt {
            return Ok(None);
        }
        let Some(addr) = self.pc.increment() else {
            self.state = MachineState::Halt;
            return Ok(None);
        };
        let word = self.mem.fetch(addr);
        if word.opcode == Opcode::Spl {
            return Err(RuntimeFault::SingleThreaded);
        }
        self.state = match word.execute(&mut self.pc, &mut self.mem)? {
            Signal::Halt => MachineState::Halt,
            Signal::Continue => MachineState::Continue,
        };
        Ok(Some(word))
    }

    /// Step until the program halts or `nsteps` instructions have run.
    /// Returns the number executed, counting the halt.
    pub fn run(&mut self, nsteps: usize) -> Result<usize, RuntimeFault> {
        let mut count = 0;
        while count < nsteps && self.state != MachineState::Halt {
            self.step()?;
            count += 1;
        }
        Ok(count)
    }

    /// Address of the next instruction.
    pub fn next_instr(&self) -> Option<usize> {
        self.pc.next_instr()
    }

    /// Listing of `start..=end` with the next instruction marked.
    pub fn dump(&self, start: usize, end: usize) -> String {
        let count = end.saturating_sub(start) + 1;
        format_dump(&self.mem.dump(start, count), self.next_instr())
    }

    /// Listing of the whole memory.
    pub fn dump_all(&self) -> String {
        self.dump(0, self.mem.size() - 1)
    }

    /// The machine's memory.
    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// The program counter.
    pub fn pc(&self) -> &ProgramCounter {
        &self.pc
    }

    /// Where the machine is in its life.
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Name of the loaded program.
    pub fn name(&self) -> &str {
        self.pc.tag()
    }
}

impl fmt::Display for MiniMars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<MiniMars name: {} PC: ", self.name())?;
        match self.next_instr() {
            Some(addr) => write!(f, "{}", addr)?,
            None => write!(f, "-")?,
        }
        write!(f, " status: {}>", self.state)
    }
}
