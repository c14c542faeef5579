//! 6502 CPU implementation.
//!
//! Each `tick()` is one clock cycle and one bus access. The data lines of the
//! incoming pins answer the access requested by the previous tick; the
//! returned pins carry the next request. The instruction register holds
//! `opcode << 3 | step`, and `step` selects the cycle within the instruction.

use emu_core::pins::{self, IRQ, NMI, RDY, RES, RW, SYNC};
use emu_core::{Observable, PinCpu, Register, Value};

use crate::Registers;
use crate::flags::{self, B, C, D, I, N, U, V, Z};

/// Interrupt sources latched for the next BRK sequence.
const BRK_IRQ: u8 = 1 << 0;
const BRK_NMI: u8 = 1 << 1;
const BRK_RESET: u8 = 1 << 2;

/// Last step index the instruction register can hold.
const MAX_STEP: u16 = 7;

/// Options applied by `init`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mos6502Config {
    /// Treat the D flag as inert (2A03-style ADC/SBC).
    pub bcd_disabled: bool,
}

/// The MOS 6502 CPU, driven through its pins.
///
/// `Default` is the zeroed core before `init`; use [`Mos6502::new`] for a
/// core ready to run its reset sequence.
#[derive(Debug, Clone, Default)]
pub struct Mos6502 {
    /// CPU registers.
    pub regs: Registers,

    /// Instruction register: opcode << 3 | step.
    ir: u16,

    /// Effective address being built by the current addressing mode.
    addr: u16,

    /// Operand latched by read-modify-write instructions.
    data: u8,

    /// Pins as of the last tick.
    pins: u64,

    /// IRQ recognition pipeline, shifted once per tick.
    irq_pip: u16,

    /// NMI recognition pipeline, shifted once per tick.
    nmi_pip: u16,

    /// Pending `BRK_*` sources for the current BRK sequence.
    brk_flags: u8,

    /// Whether the D flag selects decimal arithmetic.
    bcd_enabled: bool,
}

#[inline]
fn set_addr(pins: &mut u64, addr: u16) {
    *pins = pins::with_address(*pins, addr);
}

#[inline]
fn set_data(pins: &mut u64, data: u8) {
    *pins = pins::with_data(*pins, data);
}

#[inline]
fn get_data(pins: u64) -> u8 {
    pins::data(pins)
}

/// `target`'s low byte in `page`'s page: the address seen before a carry
/// into the high byte is fixed up.
#[inline]
fn same_page(page: u16, target: u16) -> u16 {
    (page & 0xFF00) | (target & 0x00FF)
}

/// Zero page address `base + offset`, wrapping inside page zero.
#[inline]
fn zp(base: u16, offset: u8) -> u16 {
    u16::from((base as u8).wrapping_add(offset))
}

impl Mos6502 {
    /// Create a core with the default config, ready to run its reset sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&Mos6502Config::default())
    }

    /// Create a core with explicit init options.
    #[must_use]
    pub fn with_config(config: &Mos6502Config) -> Self {
        let mut cpu = Self::default();
        cpu.init(config);
        cpu
    }

    /// Zero the core and return the power-on pins.
    ///
    /// The power-on pins request an opcode fetch with RES held, so the first
    /// fetch the host answers turns into the reset sequence.
    pub fn init(&mut self, config: &Mos6502Config) -> u64 {
        *self = Self {
            bcd_enabled: !config.bcd_disabled,
            pins: RW | SYNC | RES,
            ..Self::default()
        };
        self.pins
    }

    /// Execute one clock cycle.
    pub fn tick(&mut self, mut pins: u64) -> u64 {
        if pins & (SYNC | IRQ | NMI | RDY | RES) != 0 {
            // NMI is edge-triggered, IRQ is level-triggered and masked by I
            if pins & NMI != 0 && self.pins & NMI == 0 {
                self.nmi_pip |= 1;
            }
            if pins & IRQ != 0 && self.regs.p & I == 0 {
                self.irq_pip |= 1;
            }

            // RDY only halts read cycles
            if pins & (RW | RDY) == (RW | RDY) {
                self.pins = pins;
                self.irq_pip <<= 1;
                return pins;
            }

            if pins & SYNC != 0 {
                self.ir = u16::from(get_data(pins)) << 3;
                pins &= !SYNC;

                if self.irq_pip & 4 != 0 {
                    self.brk_flags |= BRK_IRQ;
                }
                if self.nmi_pip & 0xFFFC != 0 {
                    self.brk_flags |= BRK_NMI;
                }
                if pins & RES != 0 {
                    self.brk_flags |= BRK_RESET;
                }
                self.irq_pip &= 3;
                self.nmi_pip &= 3;

                if self.brk_flags == 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                } else {
                    // Interrupts hijack the fetch and run the BRK sequence
                    self.ir = 0;
                    pins &= !RES;
                }
            }
        }

        pins |= RW;
        self.execute(&mut pins);
        if self.ir & 7 != MAX_STEP {
            self.ir += 1;
        }

        self.pins = pins;
        self.irq_pip <<= 1;
        self.nmi_pip <<= 1;
        pins
    }

    /// Instruction register: opcode << 3 | step.
    #[must_use]
    pub fn ir(&self) -> u16 {
        self.ir
    }

    /// Opcode currently executing.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        (self.ir >> 3) as u8
    }

    /// Step the next tick will execute.
    #[must_use]
    pub fn step(&self) -> u8 {
        (self.ir & 7) as u8
    }

    /// Pins as of the last tick.
    #[must_use]
    pub fn pins(&self) -> u64 {
        self.pins
    }

    /// Request the opcode at PC on the next cycle.
    fn fetch(&self, pins: &mut u64) {
        set_addr(pins, self.regs.pc);
        *pins |= SYNC;
    }

    /// Request a write cycle.
    fn write(pins: &mut u64, addr: u16, value: u8) {
        set_addr(pins, addr);
        set_data(pins, value);
        *pins &= !RW;
    }

    fn is_set(&self, flag: u8) -> bool {
        self.regs.p & flag != 0
    }

    fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.regs.p |= flag;
        } else {
            self.regs.p &= !flag;
        }
    }

    /// Update N and Z from a result, passing it through.
    fn nz(&mut self, value: u8) -> u8 {
        self.set_if(N, value & 0x80 != 0);
        self.set_if(Z, value == 0);
        value
    }

    /// Run one step of the current instruction.
    fn execute(&mut self, pins: &mut u64) {
        let step = (self.ir & 7) as u8;
        let (x, y) = (self.regs.x, self.regs.y);

        match (self.ir >> 3) as u8 {
            0x00 => self.op_brk(pins, step),
            0x01 => self.addr_izx(pins, step, Self::do_ora),
            0x05 => self.addr_zp(pins, step, Self::do_ora),
            0x06 => self.addr_zp_rmw(pins, step, Self::do_asl),
            0x08 => self.op_push(pins, step, |c| c.regs.p | B | U),
            0x09 => self.addr_imm(pins, step, Self::do_ora),
            0x0A => self.op_accumulator(pins, step, Self::do_asl),
            0x0D => self.addr_abs(pins, step, Self::do_ora),
            0x0E => self.addr_abs_rmw(pins, step, Self::do_asl),

            0x10 => self.op_branch(pins, step, !self.is_set(N)),
            0x11 => self.addr_izy(pins, step, Self::do_ora),
            0x15 => self.addr_zpi(pins, step, x, Self::do_ora),
            0x16 => self.addr_zpx_rmw(pins, step, Self::do_asl),
            0x18 => self.op_implied(pins, step, |c| c.set_if(C, false)),
            0x19 => self.addr_abi(pins, step, y, Self::do_ora),
            0x1D => self.addr_abi(pins, step, x, Self::do_ora),
            0x1E => self.addr_abx_rmw(pins, step, Self::do_asl),

            0x20 => self.op_jsr(pins, step),
            0x21 => self.addr_izx(pins, step, Self::do_and),
            0x24 => self.addr_zp(pins, step, Self::do_bit),
            0x25 => self.addr_zp(pins, step, Self::do_and),
            0x26 => self.addr_zp_rmw(pins, step, Self::do_rol),
            0x28 => self.op_pull(pins, step, |c, v| c.regs.p = flags::pulled(v)),
            0x29 => self.addr_imm(pins, step, Self::do_and),
            0x2A => self.op_accumulator(pins, step, Self::do_rol),
            0x2C => self.addr_abs(pins, step, Self::do_bit),
            0x2D => self.addr_abs(pins, step, Self::do_and),
            0x2E => self.addr_abs_rmw(pins, step, Self::do_rol),

            0x30 => self.op_branch(pins, step, self.is_set(N)),
            0x31 => self.addr_izy(pins, step, Self::do_and),
            0x35 => self.addr_zpi(pins, step, x, Self::do_and),
            0x36 => self.addr_zpx_rmw(pins, step, Self::do_rol),
            0x38 => self.op_implied(pins, step, |c| c.set_if(C, true)),
            0x39 => self.addr_abi(pins, step, y, Self::do_and),
            0x3D => self.addr_abi(pins, step, x, Self::do_and),
            0x3E => self.addr_abx_rmw(pins, step, Self::do_rol),

            0x40 => self.op_rti(pins, step),
            0x41 => self.addr_izx(pins, step, Self::do_eor),
            0x45 => self.addr_zp(pins, step, Self::do_eor),
            0x46 => self.addr_zp_rmw(pins, step, Self::do_lsr),
            0x48 => self.op_push(pins, step, |c| c.regs.a),
            0x49 => self.addr_imm(pins, step, Self::do_eor),
            0x4A => self.op_accumulator(pins, step, Self::do_lsr),
            0x4C => self.op_jmp_abs(pins, step),
            0x4D => self.addr_abs(pins, step, Self::do_eor),
            0x4E => self.addr_abs_rmw(pins, step, Self::do_lsr),

            0x50 => self.op_branch(pins, step, !self.is_set(V)),
            0x51 => self.addr_izy(pins, step, Self::do_eor),
            0x55 => self.addr_zpi(pins, step, x, Self::do_eor),
            0x56 => self.addr_zpx_rmw(pins, step, Self::do_lsr),
            0x58 => self.op_implied(pins, step, |c| c.set_if(I, false)),
            0x59 => self.addr_abi(pins, step, y, Self::do_eor),
            0x5D => self.addr_abi(pins, step, x, Self::do_eor),
            0x5E => self.addr_abx_rmw(pins, step, Self::do_lsr),

            0x60 => self.op_rts(pins, step),
            0x61 => self.addr_izx(pins, step, Self::do_adc),
            0x65 => self.addr_zp(pins, step, Self::do_adc),
            0x66 => self.addr_zp_rmw(pins, step, Self::do_ror),
            0x68 => self.op_pull(pins, step, |c, v| c.regs.a = c.nz(v)),
            0x69 => self.addr_imm(pins, step, Self::do_adc),
            0x6A => self.op_accumulator(pins, step, Self::do_ror),
            0x6C => self.op_jmp_ind(pins, step),
            0x6D => self.addr_abs(pins, step, Self::do_adc),
            0x6E => self.addr_abs_rmw(pins, step, Self::do_ror),

            0x70 => self.op_branch(pins, step, self.is_set(V)),
            0x71 => self.addr_izy(pins, step, Self::do_adc),
            0x75 => self.addr_zpi(pins, step, x, Self::do_adc),
            0x76 => self.addr_zpx_rmw(pins, step, Self::do_ror),
            0x78 => self.op_implied(pins, step, |c| c.set_if(I, true)),
            0x79 => self.addr_abi(pins, step, y, Self::do_adc),
            0x7D => self.addr_abi(pins, step, x, Self::do_adc),
            0x7E => self.addr_abx_rmw(pins, step, Self::do_ror),

            0x81 => self.addr_izx_w(pins, step, |c| c.regs.a),
            0x84 => self.addr_zp_w(pins, step, |c| c.regs.y),
            0x85 => self.addr_zp_w(pins, step, |c| c.regs.a),
            0x86 => self.addr_zp_w(pins, step, |c| c.regs.x),
            0x88 => self.op_implied(pins, step, |c| c.regs.y = c.nz(c.regs.y.wrapping_sub(1))),
            0x8A => self.op_implied(pins, step, |c| c.regs.a = c.nz(c.regs.x)),
            0x8C => self.addr_abs_w(pins, step, |c| c.regs.y),
            0x8D => self.addr_abs_w(pins, step, |c| c.regs.a),
            0x8E => self.addr_abs_w(pins, step, |c| c.regs.x),

            0x90 => self.op_branch(pins, step, !self.is_set(C)),
            0x91 => self.addr_izy_w(pins, step, |c| c.regs.a),
            0x94 => self.addr_zpi_w(pins, step, x, |c| c.regs.y),
            0x95 => self.addr_zpi_w(pins, step, x, |c| c.regs.a),
            0x96 => self.addr_zpi_w(pins, step, y, |c| c.regs.x),
            0x98 => self.op_implied(pins, step, |c| c.regs.a = c.nz(c.regs.y)),
            0x99 => self.addr_abi_w(pins, step, y, |c| c.regs.a),
            // TXS does not affect flags
            0x9A => self.op_implied(pins, step, |c| c.regs.s = c.regs.x),
            0x9D => self.addr_abi_w(pins, step, x, |c| c.regs.a),

            0xA0 => self.addr_imm(pins, step, Self::do_ldy),
            0xA1 => self.addr_izx(pins, step, Self::do_lda),
            0xA2 => self.addr_imm(pins, step, Self::do_ldx),
            0xA4 => self.addr_zp(pins, step, Self::do_ldy),
            0xA5 => self.addr_zp(pins, step, Self::do_lda),
            0xA6 => self.addr_zp(pins, step, Self::do_ldx),
            0xA8 => self.op_implied(pins, step, |c| c.regs.y = c.nz(c.regs.a)),
            0xA9 => self.addr_imm(pins, step, Self::do_lda),
            0xAA => self.op_implied(pins, step, |c| c.regs.x = c.nz(c.regs.a)),
            0xAC => self.addr_abs(pins, step, Self::do_ldy),
            0xAD => self.addr_abs(pins, step, Self::do_lda),
            0xAE => self.addr_abs(pins, step, Self::do_ldx),

            0xB0 => self.op_branch(pins, step, self.is_set(C)),
            0xB1 => self.addr_izy(pins, step, Self::do_lda),
            0xB4 => self.addr_zpi(pins, step, x, Self::do_ldy),
            0xB5 => self.addr_zpi(pins, step, x, Self::do_lda),
            0xB6 => self.addr_zpi(pins, step, y, Self::do_ldx),
            0xB8 => self.op_implied(pins, step, |c| c.set_if(V, false)),
            0xB9 => self.addr_abi(pins, step, y, Self::do_lda),
            0xBA => self.op_implied(pins, step, |c| c.regs.x = c.nz(c.regs.s)),
            0xBC => self.addr_abi(pins, step, x, Self::do_ldy),
            0xBD => self.addr_abi(pins, step, x, Self::do_lda),
            0xBE => self.addr_abi(pins, step, y, Self::do_ldx),

            0xC0 => self.addr_imm(pins, step, Self::do_cpy),
            0xC1 => self.addr_izx(pins, step, Self::do_cmp),
            0xC4 => self.addr_zp(pins, step, Self::do_cpy),
            0xC5 => self.addr_zp(pins, step, Self::do_cmp),
            0xC6 => self.addr_zp_rmw(pins, step, Self::do_dec),
            0xC8 => self.op_implied(pins, step, |c| c.regs.y = c.nz(c.regs.y.wrapping_add(1))),
            0xC9 => self.addr_imm(pins, step, Self::do_cmp),
            0xCA => self.op_implied(pins, step, |c| c.regs.x = c.nz(c.regs.x.wrapping_sub(1))),
            0xCC => self.addr_abs(pins, step, Self::do_cpy),
            0xCD => self.addr_abs(pins, step, Self::do_cmp),
            0xCE => self.addr_abs_rmw(pins, step, Self::do_dec),

            0xD0 => self.op_branch(pins, step, !self.is_set(Z)),
            0xD1 => self.addr_izy(pins, step, Self::do_cmp),
            0xD5 => self.addr_zpi(pins, step, x, Self::do_cmp),
            0xD6 => self.addr_zpx_rmw(pins, step, Self::do_dec),
            0xD8 => self.op_implied(pins, step, |c| c.set_if(D, false)),
            0xD9 => self.addr_abi(pins, step, y, Self::do_cmp),
            0xDD => self.addr_abi(pins, step, x, Self::do_cmp),
            0xDE => self.addr_abx_rmw(pins, step, Self::do_dec),

            0xE0 => self.addr_imm(pins, step, Self::do_cpx),
            0xE1 => self.addr_izx(pins, step, Self::do_sbc),
            0xE4 => self.addr_zp(pins, step, Self::do_cpx),
            0xE5 => self.addr_zp(pins, step, Self::do_sbc),
            0xE6 => self.addr_zp_rmw(pins, step, Self::do_inc),
            0xE8 => self.op_implied(pins, step, |c| c.regs.x = c.nz(c.regs.x.wrapping_add(1))),
            0xE9 => self.addr_imm(pins, step, Self::do_sbc),
            0xEC => self.addr_abs(pins, step, Self::do_cpx),
            0xED => self.addr_abs(pins, step, Self::do_sbc),
            0xEE => self.addr_abs_rmw(pins, step, Self::do_inc),

            0xF0 => self.op_branch(pins, step, self.is_set(Z)),
            0xF1 => self.addr_izy(pins, step, Self::do_sbc),
            0xF5 => self.addr_zpi(pins, step, x, Self::do_sbc),
            0xF6 => self.addr_zpx_rmw(pins, step, Self::do_inc),
            0xF8 => self.op_implied(pins, step, |c| c.set_if(D, true)),
            0xF9 => self.addr_abi(pins, step, y, Self::do_sbc),
            0xFD => self.addr_abi(pins, step, x, Self::do_sbc),
            0xFE => self.addr_abx_rmw(pins, step, Self::do_inc),

            // NOP ($EA) and every undocumented opcode
            _ => self.op_implied(pins, step, |_| {}),
        }
    }

    // ========================================================================
    // Addressing mode helpers - read operations
    // ========================================================================

    /// Immediate: operand is the next byte.
    fn addr_imm(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8)) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Zero page.
    fn addr_zp(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8)) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => set_addr(pins, u16::from(get_data(*pins))),
            2 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Zero page indexed by X or Y, wrapping inside page zero.
    fn addr_zpi(&mut self, pins: &mut u64, step: u8, index: u8, op: fn(&mut Self, u8)) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                // Dummy read of the unindexed address
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.addr);
            }
            2 => set_addr(pins, zp(self.addr, index)),
            3 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Absolute.
    fn addr_abs(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8)) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => set_addr(pins, (u16::from(get_data(*pins)) << 8) | self.addr),
            3 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Absolute indexed by X or Y. A page cross costs one extra cycle.
    fn addr_abi(&mut self, pins: &mut u64, step: u8, index: u8, op: fn(&mut Self, u8)) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => {
                let base = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.addr = base.wrapping_add(u16::from(index));
                set_addr(pins, same_page(base, self.addr));
                if base & 0xFF00 == self.addr & 0xFF00 {
                    // The read from the unfixed address was the real one
                    self.ir += 1;
                }
            }
            3 => set_addr(pins, self.addr),
            4 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// (Indirect,X).
    fn addr_izx(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8)) {
        match step {
            0..=3 => self.izx_pointer(pins, step),
            4 => set_addr(pins, (u16::from(get_data(*pins)) << 8) | self.addr),
            5 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// (Indirect),Y. A page cross costs one extra cycle.
    fn addr_izy(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8)) {
        match step {
            0..=3 => {
                if self.izy_pointer(pins, step) {
                    self.ir += 1;
                }
            }
            4 => set_addr(pins, self.addr),
            5 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Shared (Indirect,X) pointer cycles. Leaves the low target byte
    /// request outstanding with `addr` holding the low byte.
    fn izx_pointer(&mut self, pins: &mut u64, step: u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                // Dummy read of the pointer before X is added
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.addr);
            }
            2 => {
                self.addr = zp(self.addr, self.regs.x);
                set_addr(pins, self.addr);
            }
            _ => {
                set_addr(pins, zp(self.addr, 1));
                self.addr = u16::from(get_data(*pins));
            }
        }
    }

    /// Shared (Indirect),Y pointer cycles. Returns true on the indexing
    /// step when no page was crossed.
    fn izy_pointer(&mut self, pins: &mut u64, step: u8) -> bool {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.addr);
            }
            2 => {
                set_addr(pins, zp(self.addr, 1));
                self.addr = u16::from(get_data(*pins));
            }
            _ => {
                let base = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.addr = base.wrapping_add(u16::from(self.regs.y));
                set_addr(pins, same_page(base, self.addr));
                return base & 0xFF00 == self.addr & 0xFF00;
            }
        }
        false
    }

    // ========================================================================
    // Addressing mode helpers - write operations
    // ========================================================================

    fn addr_zp_w(&mut self, pins: &mut u64, step: u8, val: fn(&Self) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => Self::write(pins, u16::from(get_data(*pins)), val(self)),
            _ => self.fetch(pins),
        }
    }

    fn addr_zpi_w(&mut self, pins: &mut u64, step: u8, index: u8, val: fn(&Self) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.addr);
            }
            2 => Self::write(pins, zp(self.addr, index), val(self)),
            _ => self.fetch(pins),
        }
    }

    fn addr_abs_w(&mut self, pins: &mut u64, step: u8, val: fn(&Self) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => {
                let target = (u16::from(get_data(*pins)) << 8) | self.addr;
                Self::write(pins, target, val(self));
            }
            _ => self.fetch(pins),
        }
    }

    /// Stores always take the page-fix cycle.
    fn addr_abi_w(&mut self, pins: &mut u64, step: u8, index: u8, val: fn(&Self) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => {
                let base = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.addr = base.wrapping_add(u16::from(index));
                set_addr(pins, same_page(base, self.addr));
            }
            3 => Self::write(pins, self.addr, val(self)),
            _ => self.fetch(pins),
        }
    }

    fn addr_izx_w(&mut self, pins: &mut u64, step: u8, val: fn(&Self) -> u8) {
        match step {
            0..=3 => self.izx_pointer(pins, step),
            4 => {
                let target = (u16::from(get_data(*pins)) << 8) | self.addr;
                Self::write(pins, target, val(self));
            }
            _ => self.fetch(pins),
        }
    }

    fn addr_izy_w(&mut self, pins: &mut u64, step: u8, val: fn(&Self) -> u8) {
        match step {
            0..=3 => {
                self.izy_pointer(pins, step);
            }
            4 => Self::write(pins, self.addr, val(self)),
            _ => self.fetch(pins),
        }
    }

    // ========================================================================
    // Addressing mode helpers - read-modify-write operations
    // ========================================================================

    /// Shared tail of every RMW: dummy write of the old value, write of the
    /// new one, then fetch. `first` is the step that receives the operand.
    fn rmw_tail(&mut self, pins: &mut u64, step: u8, first: u8, op: fn(&mut Self, u8) -> u8) {
        if step == first {
            self.data = get_data(*pins);
            Self::write(pins, self.addr, self.data);
        } else if step == first + 1 {
            self.data = op(self, self.data);
            Self::write(pins, self.addr, self.data);
        } else {
            self.fetch(pins);
        }
    }

    fn addr_zp_rmw(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.addr);
            }
            _ => self.rmw_tail(pins, step, 2, op),
        }
    }

    fn addr_zpx_rmw(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.addr);
            }
            2 => {
                self.addr = zp(self.addr, self.regs.x);
                set_addr(pins, self.addr);
            }
            _ => self.rmw_tail(pins, step, 3, op),
        }
    }

    fn addr_abs_rmw(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => {
                self.addr |= u16::from(get_data(*pins)) << 8;
                set_addr(pins, self.addr);
            }
            _ => self.rmw_tail(pins, step, 3, op),
        }
    }

    fn addr_abx_rmw(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => {
                let base = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.addr = base.wrapping_add(u16::from(self.regs.x));
                set_addr(pins, same_page(base, self.addr));
            }
            3 => set_addr(pins, self.addr),
            _ => self.rmw_tail(pins, step, 4, op),
        }
    }

    // ========================================================================
    // ALU operations
    // ========================================================================

    fn do_lda(&mut self, val: u8) {
        self.regs.a = self.nz(val);
    }

    fn do_ldx(&mut self, val: u8) {
        self.regs.x = self.nz(val);
    }

    fn do_ldy(&mut self, val: u8) {
        self.regs.y = self.nz(val);
    }

    fn do_ora(&mut self, val: u8) {
        self.regs.a = self.nz(self.regs.a | val);
    }

    fn do_and(&mut self, val: u8) {
        self.regs.a = self.nz(self.regs.a & val);
    }

    fn do_eor(&mut self, val: u8) {
        self.regs.a = self.nz(self.regs.a ^ val);
    }

    fn do_adc(&mut self, val: u8) {
        if self.bcd_enabled && self.is_set(D) {
            self.do_adc_decimal(val);
        } else {
            self.do_adc_binary(val);
        }
    }

    fn do_adc_binary(&mut self, val: u8) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(val) + u16::from(self.is_set(C));
        let result = sum as u8;

        self.set_if(C, sum > 0xFF);
        self.set_if(V, (a ^ result) & (val ^ result) & 0x80 != 0);
        self.regs.a = self.nz(result);
    }

    fn do_adc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u8::from(self.is_set(C));

        let mut lo = (a & 0x0F) + (val & 0x0F) + carry;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = (a >> 4) + (val >> 4) + u8::from(lo > 0x0F);

        // NMOS: Z follows the binary sum, N and V the uncorrected high nibble
        let binary = a.wrapping_add(val).wrapping_add(carry);
        let intermediate = hi << 4;
        self.set_if(Z, binary == 0);
        self.set_if(N, hi & 0x08 != 0);
        self.set_if(V, (a ^ intermediate) & !(a ^ val) & 0x80 != 0);

        if hi > 9 {
            hi += 6;
        }
        self.set_if(C, hi > 0x0F);
        self.regs.a = (hi << 4) | (lo & 0x0F);
    }

    fn do_sbc(&mut self, val: u8) {
        if self.bcd_enabled && self.is_set(D) {
            self.do_sbc_decimal(val);
        } else {
            self.do_adc_binary(!val);
        }
    }

    fn do_sbc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let borrow = i16::from(!self.is_set(C));

        // Flags follow the binary subtraction on NMOS
        let binary = i16::from(a) - i16::from(val) - borrow;
        self.set_if(C, binary >= 0);
        self.set_if(Z, binary as u8 == 0);
        self.set_if(N, binary & 0x80 != 0);
        self.set_if(V, (i16::from(a) ^ binary) & (i16::from(a) ^ i16::from(val)) & 0x80 != 0);

        let mut lo = i16::from(a & 0x0F) - i16::from(val & 0x0F) - borrow;
        let mut hi = i16::from(a >> 4) - i16::from(val >> 4);
        if lo < 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 6;
        }
        self.regs.a = ((hi << 4) as u8) | ((lo & 0x0F) as u8);
    }

    fn compare(&mut self, reg: u8, val: u8) {
        self.set_if(C, reg >= val);
        self.nz(reg.wrapping_sub(val));
    }

    fn do_cmp(&mut self, val: u8) {
        self.compare(self.regs.a, val);
    }

    fn do_cpx(&mut self, val: u8) {
        self.compare(self.regs.x, val);
    }

    fn do_cpy(&mut self, val: u8) {
        self.compare(self.regs.y, val);
    }

    fn do_bit(&mut self, val: u8) {
        self.set_if(Z, self.regs.a & val == 0);
        self.set_if(N, val & 0x80 != 0);
        self.set_if(V, val & 0x40 != 0);
    }

    fn do_asl(&mut self, val: u8) -> u8 {
        self.set_if(C, val & 0x80 != 0);
        self.nz(val << 1)
    }

    fn do_lsr(&mut self, val: u8) -> u8 {
        self.set_if(C, val & 0x01 != 0);
        self.nz(val >> 1)
    }

    fn do_rol(&mut self, val: u8) -> u8 {
        let carry = u8::from(self.is_set(C));
        self.set_if(C, val & 0x80 != 0);
        self.nz((val << 1) | carry)
    }

    fn do_ror(&mut self, val: u8) -> u8 {
        let carry = if self.is_set(C) { 0x80 } else { 0 };
        self.set_if(C, val & 0x01 != 0);
        self.nz((val >> 1) | carry)
    }

    fn do_inc(&mut self, val: u8) -> u8 {
        self.nz(val.wrapping_add(1))
    }

    fn do_dec(&mut self, val: u8) -> u8 {
        self.nz(val.wrapping_sub(1))
    }

    // ========================================================================
    // Individual instruction implementations
    // ========================================================================

    /// BRK, and the IRQ/NMI/RES sequences that hijack it.
    fn op_brk(&mut self, pins: &mut u64, step: u8) {
        match step {
            // Padding byte (or the interrupted opcode, re-read)
            0 => set_addr(pins, self.regs.pc),
            1 => {
                if self.brk_flags == 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                }
                let pch = (self.regs.pc >> 8) as u8;
                self.push_brk(pins, pch);
            }
            2 => {
                let pcl = self.regs.pc as u8;
                self.push_brk(pins, pcl);
            }
            3 => {
                let b = if self.brk_flags == 0 { B } else { 0 };
                let p = self.regs.p | U | b;
                self.push_brk(pins, p);
                self.addr = if self.brk_flags & BRK_RESET != 0 {
                    0xFFFC
                } else if self.brk_flags & BRK_NMI != 0 {
                    0xFFFA
                } else {
                    0xFFFE
                };
            }
            4 => {
                set_addr(pins, self.addr);
                self.addr = self.addr.wrapping_add(1);
                self.regs.p |= I;
                self.brk_flags = 0;
            }
            5 => {
                set_addr(pins, self.addr);
                self.addr = u16::from(get_data(*pins));
            }
            6 => {
                self.regs.pc = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Stack push inside the BRK sequence. Reset turns it into a read.
    fn push_brk(&mut self, pins: &mut u64, value: u8) {
        let addr = self.regs.push();
        if self.brk_flags & BRK_RESET == 0 {
            Self::write(pins, addr, value);
        } else {
            set_addr(pins, addr);
        }
    }

    fn op_jsr(&mut self, pins: &mut u64, step: u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                // Internal cycle: stack read while the low byte is held
                set_addr(pins, self.regs.stack_addr());
                self.addr = u16::from(get_data(*pins));
            }
            2 => {
                let addr = self.regs.push();
                Self::write(pins, addr, (self.regs.pc >> 8) as u8);
            }
            3 => {
                let addr = self.regs.push();
                Self::write(pins, addr, self.regs.pc as u8);
            }
            4 => set_addr(pins, self.regs.pc),
            5 => {
                self.regs.pc = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    fn op_rts(&mut self, pins: &mut u64, step: u8) {
        match step {
            0 => set_addr(pins, self.regs.pc),
            1 => set_addr(pins, self.regs.stack_addr()),
            2 => {
                let addr = self.regs.pop();
                set_addr(pins, addr);
            }
            3 => {
                let addr = self.regs.pop();
                set_addr(pins, addr);
                self.addr = u16::from(get_data(*pins));
            }
            4 => {
                self.regs.pc = (u16::from(get_data(*pins)) << 8) | self.addr;
                set_addr(pins, self.regs.next_pc());
            }
            _ => self.fetch(pins),
        }
    }

    fn op_rti(&mut self, pins: &mut u64, step: u8) {
        match step {
            0 => set_addr(pins, self.regs.pc),
            1 => set_addr(pins, self.regs.stack_addr()),
            2 => {
                let addr = self.regs.pop();
                set_addr(pins, addr);
            }
            3 => {
                let addr = self.regs.pop();
                set_addr(pins, addr);
                self.regs.p = flags::pulled(get_data(*pins));
            }
            4 => {
                let addr = self.regs.pop();
                set_addr(pins, addr);
                self.addr = u16::from(get_data(*pins));
            }
            5 => {
                self.regs.pc = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    fn op_jmp_abs(&mut self, pins: &mut u64, step: u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => {
                self.regs.pc = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// JMP (ind). The pointer high byte never carries into the next page.
    fn op_jmp_ind(&mut self, pins: &mut u64, step: u8) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                self.addr = u16::from(get_data(*pins));
                set_addr(pins, self.regs.next_pc());
            }
            2 => {
                self.addr |= u16::from(get_data(*pins)) << 8;
                set_addr(pins, self.addr);
            }
            3 => {
                set_addr(pins, same_page(self.addr, self.addr.wrapping_add(1)));
                self.addr = u16::from(get_data(*pins));
            }
            4 => {
                self.regs.pc = (u16::from(get_data(*pins)) << 8) | self.addr;
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    fn op_branch(&mut self, pins: &mut u64, step: u8, taken: bool) {
        match step {
            0 => set_addr(pins, self.regs.next_pc()),
            1 => {
                set_addr(pins, self.regs.pc);
                let offset = get_data(*pins) as i8;
                self.addr = self.regs.pc.wrapping_add(offset as u16);
                if !taken {
                    self.fetch(pins);
                }
            }
            2 => {
                set_addr(pins, same_page(self.regs.pc, self.addr));
                if self.addr & 0xFF00 == self.regs.pc & 0xFF00 {
                    // Taken branches without a page cross delay interrupts
                    self.regs.pc = self.addr;
                    self.irq_pip >>= 1;
                    self.nmi_pip >>= 1;
                    self.fetch(pins);
                }
            }
            3 => {
                self.regs.pc = self.addr;
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// PHA/PHP.
    fn op_push(&mut self, pins: &mut u64, step: u8, val: fn(&Self) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.pc),
            1 => {
                let addr = self.regs.push();
                Self::write(pins, addr, val(self));
            }
            _ => self.fetch(pins),
        }
    }

    /// PLA/PLP.
    fn op_pull(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8)) {
        match step {
            0 => set_addr(pins, self.regs.pc),
            1 => set_addr(pins, self.regs.stack_addr()),
            2 => {
                let addr = self.regs.pop();
                set_addr(pins, addr);
            }
            3 => {
                op(self, get_data(*pins));
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Two-cycle implied instructions: dummy read of the next byte, then
    /// the register operation.
    fn op_implied(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self)) {
        match step {
            0 => set_addr(pins, self.regs.pc),
            1 => {
                op(self);
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }

    /// Accumulator-mode shifts and rotates.
    fn op_accumulator(&mut self, pins: &mut u64, step: u8, op: fn(&mut Self, u8) -> u8) {
        match step {
            0 => set_addr(pins, self.regs.pc),
            1 => {
                self.regs.a = op(self, self.regs.a);
                self.fetch(pins);
            }
            _ => self.fetch(pins),
        }
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl PinCpu for Mos6502 {
    type Config = Mos6502Config;

    fn init(&mut self, config: &Mos6502Config) -> u64 {
        Mos6502::init(self, config)
    }

    fn tick(&mut self, pins: u64) -> u64 {
        Mos6502::tick(self, pins)
    }

    fn register(&self, register: Register) -> u16 {
        match register {
            Register::Pc => self.regs.pc,
            Register::A => u16::from(self.regs.a),
            Register::X => u16::from(self.regs.x),
            Register::Y => u16::from(self.regs.y),
            Register::S => u16::from(self.regs.s),
            Register::P => u16::from(self.regs.p),
        }
    }

    fn set_register(&mut self, register: Register, value: u16) {
        match register {
            Register::Pc => self.regs.pc = value,
            Register::A => self.regs.a = value as u8,
            Register::X => self.regs.x = value as u8,
            Register::Y => self.regs.y = value as u8,
            Register::S => self.regs.s = value as u8,
            Register::P => self.regs.p = value as u8,
        }
    }

    fn pins(&self) -> u64 {
        self.pins
    }

    fn ir(&self) -> u16 {
        self.ir
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "p" | "status" => Some(self.regs.p.into()),
            "flags.c" => Some(self.is_set(C).into()),
            "flags.z" => Some(self.is_set(Z).into()),
            "flags.i" => Some(self.is_set(I).into()),
            "flags.d" => Some(self.is_set(D).into()),
            "flags.v" => Some(self.is_set(V).into()),
            "flags.n" => Some(self.is_set(N).into()),
            "ir" => Some(self.ir.into()),
            "opcode" => Some(self.opcode().into()),
            "step" => Some(self.step().into()),
            "pins" => Some(self.pins.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "a", "x", "y", "s", "p", "flags.c", "flags.z", "flags.i", "flags.d", "flags.v",
            "flags.n", "ir", "opcode", "step", "pins",
        ]
    }
}
