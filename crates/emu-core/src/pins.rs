//! 6502 pin-bus bit layout.
//!
//! One `u64` carries every pin the core exchanges with the outside world on
//! a clock edge:
//!
//! ```text
//!  bit  0..=15  A0-A15   address bus
//!  bit 16..=23  D0-D7    data bus
//!  bit 24       RW       1 = read, 0 = write
//!  bit 25       SYNC     opcode fetch cycle
//!  bit 26       IRQ      maskable interrupt request (active high)
//!  bit 27       NMI      non-maskable interrupt (rising edge)
//!  bit 28       RDY      halt on read cycles
//!  bit 30       RES      reset request
//! ```
//!
//! Bit 29 and everything above bit 30 are unused by the 6502 and pass
//! through untouched.

/// Address bus mask (A0-A15).
pub const ADDRESS_MASK: u64 = 0xFFFF;

/// First data bus bit (D0).
pub const DATA_SHIFT: u32 = 16;

/// Data bus mask (D0-D7).
pub const DATA_MASK: u64 = 0xFF << DATA_SHIFT;

/// Read/write: set for a read cycle, clear for a write cycle.
pub const RW: u64 = 1 << 24;

/// Set by the core on the cycle that fetches an opcode.
pub const SYNC: u64 = 1 << 25;

/// Maskable interrupt request.
pub const IRQ: u64 = 1 << 26;

/// Non-maskable interrupt request.
pub const NMI: u64 = 1 << 27;

/// Ready: when set on a read cycle the core stalls.
pub const RDY: u64 = 1 << 28;

/// Reset request, serviced at the next opcode fetch.
pub const RES: u64 = 1 << 30;

/// Control pins in host order.
pub const CONTROL: [u64; 6] = [IRQ, NMI, RDY, RES, RW, SYNC];

/// Address lines of a pin word.
#[must_use]
pub const fn address(pins: u64) -> u16 {
    (pins & ADDRESS_MASK) as u16
}

/// Data lines of a pin word.
#[must_use]
pub const fn data(pins: u64) -> u8 {
    ((pins & DATA_MASK) >> DATA_SHIFT) as u8
}

/// Replace the address lines.
#[must_use]
pub const fn with_address(pins: u64, address: u16) -> u64 {
    (pins & !ADDRESS_MASK) | address as u64
}

/// Replace the data lines.
#[must_use]
pub const fn with_data(pins: u64, data: u8) -> u64 {
    (pins & !DATA_MASK) | ((data as u64) << DATA_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_do_not_overlap() {
        let mut seen = ADDRESS_MASK;
        assert_eq!(seen & DATA_MASK, 0);
        seen |= DATA_MASK;
        for pin in CONTROL {
            assert_eq!(pin.count_ones(), 1);
            assert_eq!(seen & pin, 0, "pin {pin:#x} overlaps");
            seen |= pin;
        }
    }

    #[test]
    fn accessors_leave_other_lines_alone() {
        let pins = RW | SYNC | 0x00AB_1234;
        assert_eq!(address(pins), 0x1234);
        assert_eq!(data(pins), 0xAB);

        let pins = with_address(pins, 0xBEEF);
        assert_eq!(address(pins), 0xBEEF);
        assert_eq!(data(pins), 0xAB);
        assert_eq!(pins & (RW | SYNC), RW | SYNC);

        let pins = with_data(pins, 0x42);
        assert_eq!(data(pins), 0x42);
        assert_eq!(address(pins), 0xBEEF);
    }
}
