//! 6502 programmer-visible registers.

/// 6502 register set.
///
/// Power-on leaves every register zero; the reset sequence then sets I,
/// moves S down by three and loads PC from $FFFC/$FFFD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Stack pointer (points at the next free slot in $0100-$01FF).
    pub s: u8,
    /// Program counter.
    pub pc: u16,
    /// Processor status.
    pub p: u8,
}

impl Registers {
    /// Decrement S, returning the slot a push writes.
    pub fn push(&mut self) -> u16 {
        let addr = self.stack_addr();
        self.s = self.s.wrapping_sub(1);
        addr
    }

    /// Increment S, returning the slot a pull reads.
    pub fn pop(&mut self) -> u16 {
        self.s = self.s.wrapping_add(1);
        self.stack_addr()
    }

    /// Current stack slot without moving S.
    #[must_use]
    pub const fn stack_addr(&self) -> u16 {
        0x0100 | (self.s as u16)
    }

    /// Post-increment PC, returning the old value.
    pub fn next_pc(&mut self) -> u16 {
        let pc = self.pc;
        self.pc = pc.wrapping_add(1);
        pc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_wraps_inside_page_one() {
        let mut regs = Registers::default();
        assert_eq!(regs.push(), 0x0100);
        assert_eq!(regs.s, 0xFF);
        assert_eq!(regs.pop(), 0x0100);
        assert_eq!(regs.s, 0x00);
    }

    #[test]
    fn next_pc_wraps() {
        let mut regs = Registers {
            pc: 0xFFFF,
            ..Registers::default()
        };
        assert_eq!(regs.next_pc(), 0xFFFF);
        assert_eq!(regs.pc, 0x0000);
    }
}
