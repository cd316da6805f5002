//! The MARS machine: memory, program counters, instruction semantics and
//! the engine that ties them together.

pub mod memory;
pub mod counter;
pub mod execute;
pub mod config;
pub mod observer;
pub mod engine;
pub mod mini;

pub use memory::Memory;
pub use counter::{Fetch, ProgramCounter, DEFAULT_HISTORY};
pub use execute::{dereference, RuntimeFault, Signal};
pub use config::MarsConfig;
pub use observer::{CoreObserver, Event};
pub use engine::{FaultReport, LoadedProgram, Mars, MarsError, ProgramStatus, RunOutcome, StepReport};
pub use mini::{MachineState, MiniMars};
