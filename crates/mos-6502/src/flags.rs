//! Processor status (P) bits.

/// Carry.
pub const C: u8 = 0x01;

/// Zero.
pub const Z: u8 = 0x02;

/// IRQ disable.
pub const I: u8 = 0x04;

/// Decimal mode for ADC/SBC.
pub const D: u8 = 0x08;

/// Break. Only meaningful in a pushed copy of P: set by BRK/PHP, clear
/// when an IRQ or NMI pushes it.
pub const B: u8 = 0x10;

/// Unused, always pushed as 1.
pub const U: u8 = 0x20;

/// Overflow.
pub const V: u8 = 0x40;

/// Negative.
pub const N: u8 = 0x80;

/// Value P takes when pulled from the stack by PLP or RTI.
#[must_use]
pub const fn pulled(value: u8) -> u8 {
    (value | U) & !B
}
