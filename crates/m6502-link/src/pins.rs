//! Pin bus codec: the packed pin word as named fields.

use emu_core::pins::{self, IRQ, NMI, RDY, RES, RW, SYNC};
use serde::{Serialize, Serializer};

/// A decoded pin word, in host order.
///
/// Flags serialise as 0/1 integers, the shape the host expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Pins {
    #[serde(rename = "IRQ", serialize_with = "bit")]
    pub irq: bool,
    #[serde(rename = "NMI", serialize_with = "bit")]
    pub nmi: bool,
    #[serde(rename = "RDY", serialize_with = "bit")]
    pub rdy: bool,
    #[serde(rename = "RES", serialize_with = "bit")]
    pub res: bool,
    #[serde(rename = "RW", serialize_with = "bit")]
    pub rw: bool,
    #[serde(rename = "SYNC", serialize_with = "bit")]
    pub sync: bool,
    #[serde(rename = "AddressBus")]
    pub address: u16,
    #[serde(rename = "DataBus")]
    pub data: u8,
}

fn bit<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

impl Pins {
    /// Split a pin word into fields. Lines the 6502 does not use are
    /// ignored.
    #[must_use]
    pub const fn decode(word: u64) -> Self {
        Self {
            irq: word & IRQ > 0,
            nmi: word & NMI > 0,
            rdy: word & RDY > 0,
            res: word & RES > 0,
            rw: word & RW > 0,
            sync: word & SYNC > 0,
            address: pins::address(word),
            data: pins::data(word),
        }
    }

    /// Pack the fields back into a pin word.
    #[must_use]
    pub const fn encode(&self) -> u64 {
        let mut word = pins::with_data(pins::with_address(0, self.address), self.data);
        if self.irq {
            word |= IRQ;
        }
        if self.nmi {
            word |= NMI;
        }
        if self.rdy {
            word |= RDY;
        }
        if self.res {
            word |= RES;
        }
        if self.rw {
            word |= RW;
        }
        if self.sync {
            word |= SYNC;
        }
        word
    }

    /// Control flags in host order: IRQ, NMI, RDY, RES, RW, SYNC.
    #[must_use]
    pub const fn flags(&self) -> [bool; 6] {
        [self.irq, self.nmi, self.rdy, self.res, self.rw, self.sync]
    }
}

impl From<u64> for Pins {
    fn from(word: u64) -> Self {
        Self::decode(word)
    }
}

impl From<Pins> for u64 {
    fn from(pins: Pins) -> Self {
        pins.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_power_on_word() {
        let pins = Pins::decode(RW | SYNC | RES);
        assert!(pins.rw && pins.sync && pins.res);
        assert!(!pins.irq && !pins.nmi && !pins.rdy);
        assert_eq!(pins.address, 0);
        assert_eq!(pins.data, 0);
    }

    #[test]
    fn decode_masks_unused_lines() {
        // Bit 29 and the upper half carry nothing for the 6502
        let word = (1 << 29) | (0xDEAD << 32) | 0x00_5A_C000;
        let pins = Pins::decode(word);
        assert_eq!(pins.address, 0xC000);
        assert_eq!(pins.data, 0x5A);
        assert_eq!(pins.flags(), [false; 6]);
        assert_eq!(pins.encode(), 0x00_5A_C000);
    }

    #[test]
    fn each_flag_has_its_own_line() {
        for (i, line) in pins::CONTROL.into_iter().enumerate() {
            let flags = Pins::decode(line).flags();
            for (j, set) in flags.into_iter().enumerate() {
                assert_eq!(set, i == j, "line {line:#x}, flag {j}");
            }
            assert_eq!(Pins::decode(line).encode(), line);
        }
    }

    #[test]
    fn serialises_flags_as_integers() {
        let pins = Pins::decode(RW | NMI | 0x0012_0300);
        let json = serde_json::to_value(pins).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "IRQ": 0, "NMI": 1, "RDY": 0, "RES": 0, "RW": 1, "SYNC": 0,
                "AddressBus": 0x0300, "DataBus": 0x12,
            })
        );
    }
}
