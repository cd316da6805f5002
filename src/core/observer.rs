//! Hooks for presentation layers.
//!
//! The engine never draws anything. A viewer registers a [`CoreObserver`]
//! with [`Mars::add_observer`](crate::core::Mars::add_observer) and is told
//! which cells each program touched. A blanket implementation covers any
//! `FnMut(&Event)`.

/// Something a viewer may want to repaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// A program was copied into memory.
    Loaded {
        /// Load-order index of the program.
        program: usize,
        /// Cells it now occupies.
        cells: &'a [usize],
    },

    /// A program executed an instruction and did not halt.
    Touched {
        /// Load-order index of the program.
        program: usize,
        /// The program counter's recent references, oldest first.
        cells: &'a [usize],
    },

    /// A thread died at `address`.
    Halted {
        /// Load-order index of the program.
        program: usize,
        /// Address of the halting instruction.
        address: usize,
    },
}

/// Receives cell update notifications from the engine.
pub trait CoreObserver {
    /// Called for every event, in the order they happen.
    fn event(&mut self, event: &Event<'_>);
}

impl<F> CoreObserver for F
where
    F: FnMut(&Event<'_>),
{
    fn event(&mut self, event: &Event<'_>) {
        self(event)
    }
}

#[derive(Default)]
pub(crate) struct Observers {
    listeners: Vec<Box<dyn CoreObserver>>,
}

impl Observers {
    pub fn add<O: CoreObserver + 'static>(&mut self, observer: O) {
        self.listeners.push(Box::new(observer));
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn dispatch(&mut self, event: Event<'_>) {
        for listener in &mut self.listeners {
            listener.event(&event);
        }
    }
}
