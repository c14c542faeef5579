//! One CPU core behind the link.

use emu_core::{PinCpu, Register};
use tracing::trace;

use crate::Pins;

/// A live core owned by the registry.
///
/// Forwards clock edges and register access to the core without adding
/// validation; range checks belong to the call surface.
#[derive(Debug, Clone)]
pub struct Instance<C> {
    core: C,
}

impl<C: PinCpu + Default> Instance<C> {
    /// Zero a core and run its init routine.
    #[must_use]
    pub fn new(config: &C::Config) -> Self {
        let mut core = C::default();
        core.init(config);
        Self { core }
    }
}

impl<C: PinCpu> Instance<C> {
    /// Advance one clock edge and return the pins the core drives.
    pub fn tick(&mut self, pins: u64) -> u64 {
        let out = self.core.tick(pins);
        trace!(pins_in = pins, pins_out = out, "tick");
        out
    }

    /// Current register value, zero-extended.
    #[must_use]
    pub fn register(&self, register: Register) -> u16 {
        self.core.register(register)
    }

    /// Write a register. Values wider than the register are truncated.
    pub fn set_register(&mut self, register: Register, value: u16) {
        self.core.set_register(register, value);
    }

    /// Raw pin word as of the last init or tick.
    #[must_use]
    pub fn raw_pins(&self) -> u64 {
        self.core.pins()
    }

    /// Decoded pins as of the last init or tick.
    #[must_use]
    pub fn pins(&self) -> Pins {
        Pins::decode(self.core.pins())
    }

    /// Instruction register: `opcode << 3 | step`.
    #[must_use]
    pub fn ir(&self) -> u16 {
        self.core.ir()
    }

    /// Opcode the instruction register holds.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        (self.core.ir() >> 3) as u8
    }

    /// Cycle within the current instruction.
    #[must_use]
    pub fn step(&self) -> u8 {
        (self.core.ir() & 7) as u8
    }
}
