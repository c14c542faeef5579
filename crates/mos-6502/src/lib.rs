//! Pin-driven, cycle-stepped 6502 core.
//!
//! The core owns no memory. Every `tick()` consumes the pin word the outside
//! world hands back (data lines answering the previous request) and returns
//! the next request: address, RW, data on writes, SYNC on opcode fetches.

mod cpu;
pub mod flags;
mod registers;

pub use cpu::{Mos6502, Mos6502Config};
pub use registers::Registers;
