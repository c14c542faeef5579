//! Core traits and types for hosting cycle-stepped CPU cores.
//!
//! A core is driven one clock edge at a time by exchanging a packed 64-bit
//! pin word. Nothing here knows how instructions decode; that belongs to the
//! core behind [`PinCpu`].

pub mod pins;

mod observable;
mod pin_cpu;
mod register;

pub use observable::{Observable, Value};
pub use pin_cpu::PinCpu;
pub use register::{ParseRegisterError, Register};
