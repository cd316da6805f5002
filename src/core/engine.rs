//! The MARS engine.
//!
//! Owns core memory and one [`ProgramCounter`] per loaded program. Programs
//! are placed at random, non-overlapping addresses and stepped round-robin:
//! each round every live program executes exactly one instruction, in load
//! order.

use std::fmt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slog::{debug, info, o, trace, warn, Discard, Logger};
use thiserror::Error;

use crate::asm::{AssemblerError, Warrior};
use crate::core::execute::{RuntimeFault, Signal};
use crate::core::observer::{CoreObserver, Event, Observers};
use crate::core::{MarsConfig, Memory, ProgramCounter};

/// A program resident in memory.
#[derive(Debug, Clone)]
pub struct LoadedProgram {
    /// The program as assembled.
    pub warrior: Warrior,
    /// Address of its first word.
    pub start: usize,
}

impl LoadedProgram {
    /// Address of its last word.
    pub fn end(&self, memory_size: usize) -> usize {
        (self.start + self.warrior.len().saturating_sub(1)) % memory_size
    }
}

/// A runtime fault caught by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    /// Load-order index of the faulting program.
    pub program: usize,
    /// Its name.
    pub name: String,
    /// Address of the faulting instruction.
    pub address: usize,
    /// What went wrong.
    pub fault: RuntimeFault,
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program {} at address {}: {}", self.name, self.address, self.fault)
    }
}

/// What happened during one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Instructions executed.
    pub executed: usize,
    /// Faults caught; each one killed its thread.
    pub faults: Vec<FaultReport>,
    /// `(program, address)` of every thread that died.
    pub halted: Vec<(usize, usize)>,
}

/// Result of [`Mars::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Rounds executed.
    pub rounds: u64,
    /// True if the survivor threshold stopped the run before the budget ran out.
    pub halted_early: bool,
    /// Runtime faults caught along the way.
    pub faults: usize,
}

/// One line of [`Mars::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramStatus {
    /// Program name.
    pub name: String,
    /// First address of its code.
    pub first: usize,
    /// Last address of its code.
    pub last: usize,
    /// Thread addresses, active thread starred.
    pub pc: String,
    /// True while any thread survives.
    pub alive: bool,
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10}: {:>4}..{:<4}  PC: {}", self.name, self.first, self.last, self.pc)
    }
}

/// The Memory Array Redcode Simulator.
pub struct Mars {
    config: MarsConfig,
    memory: Memory,
    pcs: Vec<ProgramCounter>,
    entries: Vec<LoadedProgram>,
    reserved: Vec<(usize, usize)>,
    rng: StdRng,
    logger: Logger,
    observers: Observers,
}

impl Mars {
    /// Create an empty engine.
    pub fn new(config: MarsConfig) -> Result<Self, MarsError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MarsConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            memory: Memory::new(config.memory_size),
            pcs: Vec::new(),
            entries: Vec::new(),
            reserved: Vec::new(),
            rng,
            logger: Logger::root(Discard, o!()),
            observers: Observers::default(),
            config,
        }
    }

    /// Replace the logger.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the logger in place.
    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    /// Register a viewer for cell update notifications.
    pub fn add_observer<O: CoreObserver + 'static>(&mut self, observer: O) {
        self.observers.add(observer);
    }

    /// Active configuration.
    pub fn config(&self) -> &MarsConfig {
        &self.config
    }

    /// Core memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Program counters in load order.
    pub fn pcs(&self) -> &[ProgramCounter] {
        &self.pcs
    }

    /// Loaded programs in load order.
    pub fn entries(&self) -> &[LoadedProgram] {
        &self.entries
    }

    /// Reserved address ranges, inclusive.
    pub fn reserved(&self) -> &[(usize, usize)] {
        &self.reserved
    }

    /// Assemble `lines` and load the result.
    pub fn load_source<I, S>(&mut self, lines: I, addr: Option<usize>) -> Result<&LoadedProgram, MarsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.check_roster()?;
        let default_name = format!("unknown{}", self.entries.len());
        let warrior = Warrior::assemble_named(lines, &default_name)?;
        self.load(warrior, addr)
    }

    /// Copy a program into memory and give it a program counter.
    ///
    /// Without an address the program goes to a random spot clear of every
    /// other program's reservation. A rejected load changes nothing.
    pub fn load(&mut self, warrior: Warrior, addr: Option<usize>) -> Result<&LoadedProgram, MarsError> {
        self.check_roster()?;
        if warrior.is_empty() {
            return Err(MarsError::EmptyProgram);
        }
        let max = self.config.max_program_size();
        if warrior.len() > max {
            return Err(MarsError::ProgramTooLarge { size: warrior.len(), max });
        }

        let size = self.memory.size();
        let addr = match addr {
            Some(addr) => addr % size,
            None => self.place(warrior.len())?,
        };
        self.use_loc(addr, warrior.len());

        let cells: Vec<usize> = (0..warrior.len()).map(|i| (addr + i) % size).collect();
        for (word, &cell) in warrior.code.iter().zip(&cells) {
            self.memory.store(cell, word);
        }

        let start = self.memory.offset(addr, warrior.start_offset());
        let slot = self.entries.len();
        self.pcs.push(ProgramCounter::with_history(
            warrior.name.clone(),
            start,
            size,
            self.config.history_size,
        ));
        info!(self.logger, "program loaded";
            "name" => %warrior.name, "address" => addr, "size" => warrior.len(), "start" => start);

        if !self.observers.is_empty() {
            self.observers.dispatch(Event::Loaded { program: slot, cells: &cells });
        }

        self.entries.push(LoadedProgram { warrior, start: addr });
        Ok(&self.entries[slot])
    }

    fn check_roster(&self) -> Result<(), MarsError> {
        if self.entries.len() >= self.config.max_programs {
            return Err(MarsError::RosterFull { max: self.config.max_programs });
        }
        Ok(())
    }

    /// Pick a random address whose `len` cells avoid every reservation.
    fn place(&mut self, len: usize) -> Result<usize, MarsError> {
        let size = self.memory.size();
        for _ in 0..size.saturating_mul(4) {
            let addr = self.rng.gen_range(0..size);
            let last = addr + len - 1;
            let clear = if last < size {
                self.check_loc(addr, last)
            } else {
                self.check_loc(addr, size - 1) && self.check_loc(0, last - size)
            };
            if clear {
                return Ok(addr);
            }
        }
        Err(MarsError::NoSpace { size: len })
    }

    /// True if `lb..=ub` overlaps no reserved range.
    pub fn check_loc(&self, lb: usize, ub: usize) -> bool {
        self.reserved.iter().all(|&(i, j)| ub < i || lb > j)
    }

    /// Reserve a program of `n` words at `addr` plus the buffer on both
    /// sides. A reservation that crosses either end of memory is split in
    /// two.
    pub fn use_loc(&mut self, addr: usize, n: usize) {
        let size = self.memory.size() as i64;
        let buf = self.config.buffer as i64;
        let lb = addr as i64 - buf;
        let ub = addr as i64 + n as i64 + buf - 1;

        if ub - lb + 1 >= size {
            self.reserved.push((0, (size - 1) as usize));
        } else if lb < 0 {
            self.reserved.push((0, ub as usize));
            self.reserved.push(((size + lb) as usize, (size - 1) as usize));
        } else if ub >= size {
            self.reserved.push((lb as usize, (size - 1) as usize));
            self.reserved.push((0, (ub - size) as usize));
        } else {
            self.reserved.push((lb as usize, ub as usize));
        }
    }

    /// True if program `i` has a live thread.
    pub fn alive(&self, i: usize) -> bool {
        self.pcs.get(i).map_or(false, ProgramCounter::is_alive)
    }

    /// Number of programs with a live thread.
    pub fn num_alive(&self) -> usize {
        self.pcs.iter().filter(|pc| pc.is_alive()).count()
    }

    /// One line per loaded program.
    pub fn status(&self) -> Vec<ProgramStatus> {
        let size = self.memory.size();
        self.entries
            .iter()
            .zip(&self.pcs)
            .map(|(entry, pc)| ProgramStatus {
                name: entry.warrior.name.clone(),
                first: entry.start,
                last: entry.end(size),
                pc: pc.to_string(),
                alive: pc.is_alive(),
            })
            .collect()
    }

    /// Execute one instruction from every live program, in load order.
    ///
    /// A runtime fault kills only the thread that raised it.
    pub fn step(&mut self) -> StepReport {
        let mut report = StepReport::default();
        if self.entries.is_empty() {
            debug!(self.logger, "no programs loaded");
            return report;
        }

        for i in 0..self.pcs.len() {
            let Some(addr) = self.pcs[i].increment() else {
                continue;
            };
            let word = self.memory.fetch(addr);
            trace!(self.logger, "fetch"; "program" => i, "address" => addr, "word" => %word);
            report.executed += 1;

            let signal = match word.execute(&mut self.pcs[i], &mut self.memory) {
                Ok(signal) => signal,
                Err(fault) => {
                    let name = self.entries[i].warrior.name.clone();
                    warn!(self.logger, "runtime fault";
                        "program" => %name, "address" => addr, "fault" => %fault);
                    report.faults.push(FaultReport { program: i, name, address: addr, fault });
                    Signal::Halt
                }
            };

            match signal {
                Signal::Halt => {
                    let left = self.pcs[i].kill_thread();
                    debug!(self.logger, "thread halted";
                        "program" => i, "address" => addr, "threads_left" => left);
                    report.halted.push((i, addr));
                    if !self.observers.is_empty() {
                        self.observers.dispatch(Event::Halted { program: i, address: addr });
                    }
                }
                Signal::Continue => {
                    if !self.observers.is_empty() {
                        let cells: Vec<usize> = self.pcs[i].history().iter().copied().collect();
                        self.observers.dispatch(Event::Touched { program: i, cells: &cells });
                    }
                }
            }
        }

        report
    }

    /// Step until `steps` rounds (default: the configured maximum) have run
    /// or too few programs survive. With `require_multiple` the threshold is
    /// the configured minimum; without it a lone program keeps running.
    pub fn run(&mut self, steps: Option<u64>, require_multiple: bool) -> RunOutcome {
        let mut remaining = steps.unwrap_or(self.config.max_rounds);
        let min_survivors = if require_multiple { self.config.min_survivors } else { 1 };
        let mut rounds = 0;
        let mut faults = 0;

        while remaining > 0 && self.num_alive() >= min_survivors {
            faults += self.step().faults.len();
            remaining -= 1;
            rounds += 1;
        }

        info!(self.logger, "run finished";
            "rounds" => rounds, "alive" => self.num_alive(), "faults" => faults);
        RunOutcome { rounds, halted_early: remaining > 0, faults }
    }

    /// Forget every program, counter and reservation and clear memory.
    pub fn reset(&mut self) {
        self.memory = Memory::new(self.config.memory_size);
        self.pcs.clear();
        self.entries.clear();
        self.reserved.clear();
        info!(self.logger, "engine reset");
    }
}

impl Default for Mars {
    fn default() -> Self {
        Self::build(MarsConfig::default())
    }
}

impl fmt::Debug for Mars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mars")
            .field("config", &self.config)
            .field("memory", &self.memory)
            .field("programs", &self.entries.len())
            .field("alive", &self.num_alive())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Errors that reject a load or a configuration.
///
/// A rejected load leaves the engine untouched.
#[derive(Debug, Clone, Error)]
pub enum MarsError {
    #[error("maximum number of programs ({max}) already loaded")]
    RosterFull { max: usize },

    #[error("program size {size} exceeds maximum program size {max}")]
    ProgramTooLarge { size: usize, max: usize },

    #[error("program has no code")]
    EmptyProgram,

    #[error("no free space for a program of {size} words")]
    NoSpace { size: usize },

    #[error("assembly failed: {0}")]
    Assembly(#[from] AssemblerError),

    #[error("bad configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redcode::Word;

    fn seeded(config: MarsConfig) -> Mars {
        Mars::new(MarsConfig { seed: Some(1), ..config }).unwrap()
    }

    #[test]
    fn test_reserve_without_wrap() {
        let mut mars = seeded(MarsConfig { buffer: 10, ..MarsConfig::default() });
        mars.use_loc(500, 10);
        assert_eq!(mars.reserved(), &[(490, 519)]);
    }

    #[test]
    fn test_reserve_wraps_low_end() {
        let mut mars = seeded(MarsConfig { buffer: 10, ..MarsConfig::default() });
        mars.use_loc(5, 10);
        assert_eq!(mars.reserved(), &[(0, 24), (4091, 4095)]);
    }

    #[test]
    fn test_reserve_wraps_high_end() {
        let mut mars = seeded(MarsConfig { buffer: 10, ..MarsConfig::default() });
        mars.use_loc(4090, 10);
        assert_eq!(mars.reserved(), &[(4080, 4095), (0, 13)]);
    }

    #[test]
    fn test_check_loc() {
        let mut mars = seeded(MarsConfig { buffer: 10, ..MarsConfig::default() });
        mars.use_loc(500, 10);
        assert!(!mars.check_loc(519, 530));
        assert!(mars.check_loc(520, 530));
        assert!(mars.check_loc(400, 489));
    }

    #[test]
    fn test_load_at_address() {
        let mut mars = seeded(MarsConfig { memory_size: 10, ..MarsConfig::default() });
        let loaded = mars.load_source([" MOV 0, 1"], Some(0)).unwrap();
        assert_eq!(loaded.start, 0);
        assert_eq!(loaded.warrior.name, "unknown0");

        mars.step();
        mars.step();
        assert_eq!(mars.memory().fetch(1), mars.memory().fetch(0));
        assert_eq!(mars.pcs()[0].next_instr(), Some(2));
    }

    #[test]
    fn test_random_placement_avoids_reservations() {
        let mut mars = seeded(MarsConfig::default());
        let imp = Warrior::from_lines([" MOV 0, 1"]).unwrap();
        for _ in 0..3 {
            let _ = mars.load(imp.clone(), None).unwrap();
        }
        let starts: Vec<usize> = mars.entries().iter().map(|e| e.start).collect();
        for (i, a) in starts.iter().enumerate() {
            for b in &starts[i + 1..] {
                let gap = a.abs_diff(*b).min(4096 - a.abs_diff(*b));
                assert!(gap > 100, "programs at {} and {} are too close", a, b);
            }
        }
    }

    #[test]
    fn test_roster_full() {
        let mut mars = seeded(MarsConfig { max_programs: 1, ..MarsConfig::default() });
        let _ = mars.load_source([" MOV 0, 1"], None).unwrap();
        assert!(matches!(
            mars.load_source([" MOV 0, 1"], None),
            Err(MarsError::RosterFull { max: 1 })
        ));
        assert_eq!(mars.entries().len(), 1);
    }

    #[test]
    fn test_program_too_large() {
        let mut mars = seeded(MarsConfig { memory_size: 16, ..MarsConfig::default() });
        let code = vec![Word::zero(); 5];
        let err = mars.load(Warrior::from_code("big", code), None).unwrap_err();
        assert!(matches!(err, MarsError::ProgramTooLarge { size: 5, max: 4 }));
        assert!(mars.reserved().is_empty());
        assert!(mars.pcs().is_empty());
    }

    #[test]
    fn test_empty_program_rejected() {
        let mut mars = seeded(MarsConfig::default());
        assert!(matches!(
            mars.load(Warrior::from_code("nothing", Vec::new()), None),
            Err(MarsError::EmptyProgram)
        ));
    }

    #[test]
    fn test_syntax_errors_reject_load() {
        let mut mars = seeded(MarsConfig::default());
        let err = mars.load_source([" MUV 0, 1"], None).unwrap_err();
        assert!(matches!(err, MarsError::Assembly(_)));
        assert!(mars.entries().is_empty());
    }

    #[test]
    fn test_start_label_sets_pc() {
        let mut mars = seeded(MarsConfig::default());
        let _ = mars.load_source(["bomb DAT #0", "go   JMP go", "     END go"], Some(4095)).unwrap();
        assert_eq!(mars.pcs()[0].next_instr(), Some(0));
        assert_eq!(mars.memory().fetch(0).to_string(), "JMP 0, #0");
    }

    #[test]
    fn test_fault_kills_only_that_thread() {
        let mut mars = seeded(MarsConfig::default());
        let _ = mars.load_source([" MOV 0, #1"], Some(0)).unwrap();
        let _ = mars.load_source([" MOV 0, 1"], Some(2000)).unwrap();

        let report = mars.step();
        assert_eq!(report.executed, 2);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].program, 0);
        assert_eq!(report.faults[0].address, 0);
        assert_eq!(report.halted, vec![(0, 0)]);
        assert!(!mars.alive(0));
        assert!(mars.alive(1));
        assert_eq!(
            report.faults[0].to_string(),
            "Program unknown0 at address 0: MOV: immediate B-field not allowed"
        );
    }

    #[test]
    fn test_run_stops_with_one_survivor() {
        let mut mars = seeded(MarsConfig::default());
        let _ = mars.load_source([" JMP 0"], Some(100)).unwrap();
        let _ = mars.load_source([" JMP 1", " JMP 1", " DAT #0"], Some(2000)).unwrap();

        let outcome = mars.run(Some(50), true);
        assert_eq!(outcome.rounds, 3);
        assert!(outcome.halted_early);
        assert_eq!(mars.num_alive(), 1);
        assert!(mars.alive(0));
    }

    #[test]
    fn test_run_single_keeps_going() {
        let mut mars = seeded(MarsConfig::default());
        let _ = mars.load_source([" JMP 0"], Some(100)).unwrap();
        let outcome = mars.run(Some(25), false);
        assert_eq!(outcome.rounds, 25);
        assert!(!outcome.halted_early);

        let outcome = mars.run(None, true);
        assert_eq!(outcome.rounds, 0);
    }

    #[test]
    fn test_status_and_reset() {
        let mut mars = seeded(MarsConfig::default());
        let _ = mars.load_source([";name Dwarf", " ADD #4, 3", " MOV 2, @2", " JMP -2", " DAT #0"], Some(10)).unwrap();
        let status = mars.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].first, 10);
        assert_eq!(status[0].last, 13);
        assert_eq!(status[0].to_string(), "Dwarf     :   10..13    PC: [ *10 ]");

        mars.reset();
        assert!(mars.entries().is_empty());
        assert!(mars.reserved().is_empty());
        assert!(mars.memory().is_untouched(10));
        assert_eq!(mars.step(), StepReport::default());
    }

    #[test]
    fn test_observer_sees_events() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut mars = seeded(MarsConfig::default());
        mars.add_observer(move |event: &Event<'_>| {
            let tag = match event {
                Event::Loaded { cells, .. } => format!("loaded {:?}", cells),
                Event::Touched { cells, .. } => format!("touched {:?}", cells),
                Event::Halted { address, .. } => format!("halted {}", address),
            };
            sink.borrow_mut().push(tag);
        });

        let _ = mars.load_source([" JMP 1", " DAT #0"], Some(7)).unwrap();
        mars.step();
        mars.step();

        assert_eq!(
            *seen.borrow(),
            vec!["loaded [7, 8]", "touched [7]", "halted 8"]
        );
    }

    #[test]
    fn test_extreme_operands_do_not_abort_round() {
        let mut mars = seeded(MarsConfig::default());
        let _ = mars.load_source([" JMP 9223372036854775807"], Some(10)).unwrap();
        let _ = mars.load_source([" MOV @1, 0", " DAT #0, 9223372036854775807"], Some(1000)).unwrap();
        let _ = mars.load_source([" DJN 0, <-9223372036854775808"], Some(2000)).unwrap();

        let report = mars.step();
        assert_eq!(report.executed, 3);
        assert!(report.faults.is_empty());
        // i64::MAX is 4095 mod 4096
        assert_eq!(mars.pcs()[0].next_instr(), Some(9));
        assert_eq!(mars.num_alive(), 3);
    }

    #[test]
    fn test_extreme_start_offset() {
        let mut mars = seeded(MarsConfig::default());
        let mut warrior = Warrior::from_lines([" JMP 0"]).unwrap();
        warrior.symbols.insert(crate::asm::START_SYMBOL.to_string(), i64::MIN);
        let _ = mars.load(warrior, Some(100)).unwrap();
        assert_eq!(mars.pcs()[0].next_instr(), Some(100));
    }
}
