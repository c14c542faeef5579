//! Pin-driven CPU core capability.

use crate::Register;

/// A CPU core driven through its pin bus.
///
/// Unlike a bus-owning core, a pin-driven core never touches memory. Each
/// `tick` receives the pins as the outside world left them (with the data
/// lines answering the previous request) and returns the pins the core
/// asserts for the next cycle. Servicing that request is the caller's job.
///
/// Register accessors do no validation: setters truncate to the register
/// width.
pub trait PinCpu {
    /// Init-time options for the core.
    type Config: Default;

    /// Bring the core to its power-on state and return the initial pins.
    fn init(&mut self, config: &Self::Config) -> u64;

    /// Advance exactly one clock cycle.
    fn tick(&mut self, pins: u64) -> u64;

    /// Read a register, zero-extended to 16 bits.
    fn register(&self, register: Register) -> u16;

    /// Write a register, truncating to its width.
    fn set_register(&mut self, register: Register, value: u16);

    /// Pins as of the last `init` or `tick`.
    fn pins(&self) -> u64;

    /// Instruction register: `opcode << 3 | step`.
    fn ir(&self) -> u16;
}
