//! Per-program counters with cooperative threads.
//!
//! Each loaded program owns one [`ProgramCounter`]. It holds the next
//! address of every thread and hands them out round-robin, one per
//! [`increment`](ProgramCounter::increment). Instructions that branch,
//! skip, fork or die act on the thread recorded by the most recent
//! increment, which by then is no longer the active one.

use std::collections::VecDeque;
use std::fmt;
use serde::{Serialize, Deserialize};

/// Default number of addresses kept in the history ring.
pub const DEFAULT_HISTORY: usize = 10;

/// The thread and address handed out by the last `increment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fetch {
    /// Index into the thread list.
    pub thread: usize,
    /// Address that was fetched.
    pub addr: usize,
}

/// Program counter for one loaded program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramCounter {
    tag: String,
    addrs: Vec<usize>,
    thread: usize,
    current: Option<Fetch>,
    first: usize,
    memsize: usize,
    history: VecDeque<usize>,
    history_max: usize,
}

impl ProgramCounter {
    /// A counter with one thread at `addr` and the default history size.
    pub fn new(tag: impl Into<String>, addr: usize, memsize: usize) -> Self {
        Self::with_history(tag, addr, memsize, DEFAULT_HISTORY)
    }

    /// A counter with one thread at `addr` remembering `history_max`
    /// recent references.
    ///
    /// # Panics
    /// Panics if `memsize` is zero.
    pub fn with_history(tag: impl Into<String>, addr: usize, memsize: usize, history_max: usize) -> Self {
        assert!(memsize > 0, "memory size must be positive");
        let first = addr % memsize;
        Self {
            tag: tag.into(),
            addrs: vec![first],
            thread: 0,
            current: None,
            first,
            memsize,
            history: VecDeque::with_capacity(history_max),
            history_max,
        }
    }

    /// Name of the owning program.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Next address of every thread, in execution order.
    pub fn threads(&self) -> &[usize] {
        &self.addrs
    }

    /// Index of the thread the next `increment` will fetch from.
    pub fn active_thread(&self) -> usize {
        self.thread
    }

    /// The fetch recorded by the last `increment`.
    pub fn current(&self) -> Option<Fetch> {
        self.current
    }

    /// Recently referenced addresses, oldest first.
    pub fn history(&self) -> &VecDeque<usize> {
        &self.history
    }

    /// Address the program was loaded to start at.
    pub fn first(&self) -> usize {
        self.first
    }

    /// True while at least one thread survives.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.addrs.is_empty()
    }

    /// Restore a single thread at the load address and forget history.
    pub fn reset(&mut self) -> usize {
        self.addrs = vec![self.first];
        self.history.clear();
        self.thread = 0;
        self.current = None;
        self.first
    }

    /// Peek at the address the next `increment` will return.
    pub fn next_instr(&self) -> Option<usize> {
        self.addrs.get(self.thread).copied()
    }

    /// Hand out the active thread's address, advance that thread by one
    /// and rotate to the next thread. `None` once every thread is dead.
    pub fn increment(&mut self) -> Option<usize> {
        let addr = *self.addrs.get(self.thread)?;
        self.log(addr);
        self.current = Some(Fetch { thread: self.thread, addr });
        self.addrs[self.thread] = (addr + 1) % self.memsize;
        self.thread = (self.thread + 1) % self.addrs.len();
        Some(addr)
    }

    /// Send the thread that executed last to `addr`.
    pub fn branch(&mut self, addr: usize) {
        if let Some(fetch) = self.current {
            if let Some(slot) = self.addrs.get_mut(fetch.thread) {
                *slot = addr % self.memsize;
            }
        }
    }

    /// Step the thread that executed last past its next instruction.
    pub fn skip(&mut self) {
        if let Some(fetch) = self.current {
            if let Some(slot) = self.addrs.get_mut(fetch.thread) {
                *slot = (*slot + 1) % self.memsize;
            }
        }
    }

    /// Start a new thread at `addr`, last in the rotation.
    pub fn add_thread(&mut self, addr: usize) {
        self.addrs.push(addr % self.memsize);
    }

    /// Remove the thread that executed last. Returns the number of
    /// threads left.
    pub fn kill_thread(&mut self) -> usize {
        let Some(fetch) = self.current.take() else {
            return self.addrs.len();
        };
        if fetch.thread >= self.addrs.len() {
            return self.addrs.len();
        }
        self.addrs.remove(fetch.thread);
        if self.addrs.is_empty() {
            self.thread = 0;
        } else if fetch.thread < self.thread {
            self.thread -= 1;
        } else {
            self.thread %= self.addrs.len();
        }
        self.addrs.len()
    }

    /// Record a memory reference in the history ring.
    pub fn log(&mut self, addr: usize) {
        if self.history_max == 0 {
            return;
        }
        if self.history.len() == self.history_max {
            self.history.pop_front();
        }
        self.history.push_back(addr);
    }
}

impl fmt::Display for ProgramCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ ")?;
        for (i, addr) in self.addrs.iter().enumerate() {
            if i == self.thread {
                write!(f, "*")?;
            }
            write!(f, "{} ", addr)?;
        }
        write!(f, "]")
    }
}
