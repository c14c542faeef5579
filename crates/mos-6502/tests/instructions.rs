//! Instruction behaviour and timing, driven purely through the pin bus.

use emu_core::pins::{self, IRQ, NMI, RDY, RW, SYNC};
use mos_6502::{Mos6502, Mos6502Config, flags};

const PROGRAM: u16 = 0x0200;

/// Flat 64KB RAM servicing the pin bus, one tick at a time.
struct Harness {
    cpu: Mos6502,
    ram: Vec<u8>,
    pins: u64,
    cycles: u64,
}

impl Harness {
    fn new(program: &[u8]) -> Self {
        Self::with_config(program, &Mos6502Config::default())
    }

    /// Load `program` at $0200, point every vector somewhere sane and run
    /// the reset sequence.
    fn with_config(program: &[u8], config: &Mos6502Config) -> Self {
        let mut ram = vec![0; 0x1_0000];
        ram[PROGRAM as usize..PROGRAM as usize + program.len()].copy_from_slice(program);
        // RESET -> $0200, NMI -> $0400, IRQ/BRK -> $0300
        ram[0xFFFA..=0xFFFF].copy_from_slice(&[0x00, 0x04, 0x00, 0x02, 0x00, 0x03]);

        let cpu = Mos6502::with_config(config);
        let mut harness = Self {
            pins: cpu.pins(),
            cpu,
            ram,
            cycles: 0,
        };
        harness.service();
        let reset_cycles = harness.run_instruction();
        assert_eq!(reset_cycles, 7, "reset sequence takes 7 cycles");
        assert_eq!(harness.cpu.regs.pc, PROGRAM);
        harness.cycles = 0;
        harness
    }

    /// Answer the request the core just made.
    fn service(&mut self) {
        let addr = usize::from(pins::address(self.pins));
        if self.pins & RW != 0 {
            self.pins = pins::with_data(self.pins, self.ram[addr]);
        } else {
            self.ram[addr] = pins::data(self.pins);
        }
    }

    fn tick(&mut self) {
        self.pins = self.cpu.tick(self.pins);
        self.service();
        self.cycles += 1;
    }

    /// Tick until the core requests the next opcode. Returns cycles taken.
    fn run_instruction(&mut self) -> u64 {
        let start = self.cycles;
        for _ in 0..16 {
            self.tick();
            if self.pins & SYNC != 0 {
                return self.cycles - start;
            }
        }
        panic!("instruction did not complete within 16 cycles");
    }

    fn run(&mut self, instructions: usize) {
        for _ in 0..instructions {
            self.run_instruction();
        }
    }
}

#[test]
fn test_reset_does_not_write_stack() {
    let h = Harness::new(&[]);
    // The three reset pushes are reads: page one stays untouched
    assert!(h.ram[0x0100..0x0200].iter().all(|&b| b == 0));
    assert_eq!(h.cpu.regs.s, 0xFD);
    assert!(h.cpu.regs.p & flags::I != 0);
}

#[test]
fn test_lda_immediate() {
    let mut h = Harness::new(&[0xA9, 0x00]);
    assert_eq!(h.run_instruction(), 2);
    assert_eq!(h.cpu.regs.a, 0x00);
    assert!(h.cpu.regs.p & flags::Z != 0);
    assert_eq!(h.cpu.regs.pc, 0x0202);
}

#[test]
fn test_sta_zeropage() {
    // LDA #$55; STA $10
    let mut h = Harness::new(&[0xA9, 0x55, 0x85, 0x10]);
    h.run_instruction();
    assert_eq!(h.run_instruction(), 3);
    assert_eq!(h.ram[0x0010], 0x55);
}

#[test]
fn test_absolute_x_page_cross_costs_a_cycle() {
    // LDX #$01; LDA $12F0,X; LDX #$20; LDA $12F0,X
    let mut h = Harness::new(&[0xA2, 0x01, 0xBD, 0xF0, 0x12, 0xA2, 0x20, 0xBD, 0xF0, 0x12]);
    h.ram[0x12F1] = 0x11;
    h.ram[0x1310] = 0x22;

    h.run_instruction();
    assert_eq!(h.run_instruction(), 4);
    assert_eq!(h.cpu.regs.a, 0x11);

    h.run_instruction();
    assert_eq!(h.run_instruction(), 5);
    assert_eq!(h.cpu.regs.a, 0x22);
}

#[test]
fn test_indirect_y() {
    // LDY #$10; LDA ($40),Y; STA ($40),Y
    let mut h = Harness::new(&[0xA0, 0x10, 0xB1, 0x40, 0x91, 0x40]);
    h.ram[0x0040] = 0xF8;
    h.ram[0x0041] = 0x30;
    h.ram[0x3108] = 0x99;

    h.run_instruction();
    assert_eq!(h.run_instruction(), 6, "page crossed");
    assert_eq!(h.cpu.regs.a, 0x99);
    assert_eq!(h.run_instruction(), 6, "stores always take 6");
    assert_eq!(h.ram[0x3108], 0x99);
}

#[test]
fn test_indirect_x_wraps_in_zero_page() {
    // LDX #$01; LDA ($FE,X) -> pointer at $FF/$00
    let mut h = Harness::new(&[0xA2, 0x01, 0xA1, 0xFE]);
    h.ram[0x00FF] = 0x34;
    h.ram[0x0000] = 0x12;
    h.ram[0x1234] = 0x5A;

    h.run_instruction();
    assert_eq!(h.run_instruction(), 6);
    assert_eq!(h.cpu.regs.a, 0x5A);
}

#[test]
fn test_inc_zeropage_rmw() {
    let mut h = Harness::new(&[0xE6, 0x20]);
    h.ram[0x0020] = 0xFF;
    assert_eq!(h.run_instruction(), 5);
    assert_eq!(h.ram[0x0020], 0x00);
    assert!(h.cpu.regs.p & flags::Z != 0);
}

#[test]
fn test_asl_absolute_x_takes_seven() {
    // LDX #$02; ASL $1000,X
    let mut h = Harness::new(&[0xA2, 0x02, 0x1E, 0x00, 0x10]);
    h.ram[0x1002] = 0x81;
    h.run_instruction();
    assert_eq!(h.run_instruction(), 7);
    assert_eq!(h.ram[0x1002], 0x02);
    assert!(h.cpu.regs.p & flags::C != 0);
}

#[test]
fn test_jmp_absolute_and_indirect_page_bug() {
    // JMP $0300 ; at $0300: JMP ($10FF)
    let mut h = Harness::new(&[0x4C, 0x00, 0x03]);
    h.ram[0x0300..0x0303].copy_from_slice(&[0x6C, 0xFF, 0x10]);
    h.ram[0x10FF] = 0x78;
    h.ram[0x1000] = 0x56;
    h.ram[0x1100] = 0xEE;

    assert_eq!(h.run_instruction(), 3);
    assert_eq!(h.cpu.regs.pc, 0x0300);
    assert_eq!(h.run_instruction(), 5);
    assert_eq!(h.cpu.regs.pc, 0x5678);
}

#[test]
fn test_jsr_rts_round_trip() {
    // JSR $0300; LDA #$01 ... at $0300: RTS
    let mut h = Harness::new(&[0x20, 0x00, 0x03, 0xA9, 0x01]);
    h.ram[0x0300] = 0x60;

    assert_eq!(h.run_instruction(), 6);
    assert_eq!(h.cpu.regs.pc, 0x0300);
    // Return address is the last byte of the JSR
    assert_eq!(h.ram[0x01FD], 0x02);
    assert_eq!(h.ram[0x01FC], 0x02);
    assert_eq!(h.cpu.regs.s, 0xFB);

    assert_eq!(h.run_instruction(), 6);
    assert_eq!(h.cpu.regs.pc, 0x0203);
    assert_eq!(h.cpu.regs.s, 0xFD);
    h.run_instruction();
    assert_eq!(h.cpu.regs.a, 0x01);
}

#[test]
fn test_branch_timing() {
    // $0200: CLC; BCS +2 (not taken); BCC +0 (taken, same page)
    let mut h = Harness::new(&[0x18, 0xB0, 0x02, 0x90, 0x00]);
    h.run_instruction();
    assert_eq!(h.run_instruction(), 2);
    assert_eq!(h.cpu.regs.pc, 0x0203);
    assert_eq!(h.run_instruction(), 3);
    assert_eq!(h.cpu.regs.pc, 0x0205);
}

#[test]
fn test_branch_page_cross_timing() {
    // At $02F0: BNE +$20 -> $0312
    let mut h = Harness::new(&[0x4C, 0xF0, 0x02]);
    h.ram[0x02F0..0x02F2].copy_from_slice(&[0xD0, 0x20]);
    h.run_instruction();
    assert_eq!(h.run_instruction(), 4);
    assert_eq!(h.cpu.regs.pc, 0x0312);
}

#[test]
fn test_stack_pha_pla() {
    // LDA #$42; LDX #$FF; TXS; PHA; LDA #$00; PLA
    let mut h = Harness::new(&[0xA9, 0x42, 0xA2, 0xFF, 0x9A, 0x48, 0xA9, 0x00, 0x68]);
    h.run(3);
    assert_eq!(h.run_instruction(), 3, "PHA");
    assert_eq!(h.ram[0x01FF], 0x42);
    h.run_instruction();
    assert_eq!(h.run_instruction(), 4, "PLA");
    assert_eq!(h.cpu.regs.a, 0x42);
    assert_eq!(h.cpu.regs.s, 0xFF);
}

#[test]
fn test_stack_php_plp() {
    // SEC; PHP; CLC; PLP
    let mut h = Harness::new(&[0x38, 0x08, 0x18, 0x28]);
    h.run(2);
    // Pushed copy carries B and U
    assert_eq!(h.ram[0x01FD] & (flags::B | flags::U), flags::B | flags::U);
    h.run(2);
    assert!(h.cpu.regs.p & flags::C != 0, "PLP restores carry");
    assert_eq!(h.cpu.regs.p & flags::B, 0);
}

#[test]
fn test_brk_stack_layout() {
    // CLI; BRK; padding
    let mut h = Harness::new(&[0x58, 0x00, 0xEA]);
    h.run_instruction();
    assert_eq!(h.run_instruction(), 7);

    assert_eq!(h.cpu.regs.pc, 0x0300);
    assert_eq!(h.cpu.regs.s, 0xFA);
    assert!(h.cpu.regs.p & flags::I != 0);
    // Return address skips the padding byte
    assert_eq!(h.ram[0x01FD], 0x02);
    assert_eq!(h.ram[0x01FC], 0x03);
    assert_eq!(h.ram[0x01FB] & flags::B, flags::B);
}

#[test]
fn test_rti_restores_state() {
    // BRK; padding; LDA #$07 ... handler at $0300: RTI
    let mut h = Harness::new(&[0x00, 0xEA, 0xA9, 0x07]);
    h.ram[0x0300] = 0x40;
    h.run_instruction();
    assert_eq!(h.run_instruction(), 6);
    assert_eq!(h.cpu.regs.pc, 0x0202);
    assert_eq!(h.cpu.regs.s, 0xFD);
    h.run_instruction();
    assert_eq!(h.cpu.regs.a, 0x07);
}

#[test]
fn test_irq_taken_only_when_enabled() {
    // NOPs, then CLI, then NOPs
    let mut program = vec![0xEA; 4];
    program.push(0x58);
    program.extend([0xEA; 8]);
    let mut h = Harness::new(&program);
    h.ram[0x0300..0x0310].fill(0xEA);

    h.pins |= IRQ;
    h.run(4);
    assert!(h.cpu.regs.pc < 0x0300, "I is set after reset");

    let mut taken = false;
    for _ in 0..6 {
        h.run_instruction();
        if h.cpu.regs.pc == 0x0300 {
            taken = true;
            break;
        }
    }
    assert!(taken, "IRQ never taken");
    assert!(h.cpu.regs.p & flags::I != 0);
    // IRQ pushes P with B clear
    assert_eq!(h.ram[0x01FB] & flags::B, 0);
    assert_eq!(h.ram[0x01FB] & flags::U, flags::U);
}

#[test]
fn test_nmi_is_edge_triggered() {
    let mut h = Harness::new(&[0xEA; 16]);
    h.ram[0x0400..0x0420].fill(0xEA);

    h.pins |= NMI;
    let mut taken = false;
    for _ in 0..4 {
        h.run_instruction();
        if h.cpu.regs.pc == 0x0400 {
            taken = true;
            break;
        }
    }
    assert!(taken, "NMI never taken");

    // Line still held: no second NMI
    h.run(4);
    assert_eq!(h.cpu.regs.pc, 0x0404);
}

#[test]
fn test_rdy_stalls_reads() {
    // LDA $10
    let mut h = Harness::new(&[0xA5, 0x10]);
    h.ram[0x0010] = 0x77;

    h.tick();
    h.pins |= RDY;
    let held = h.pins;
    for _ in 0..3 {
        h.tick();
    }
    assert_eq!(h.pins, held, "pins frozen while RDY is held");
    assert_eq!(h.cpu.step(), 1);

    h.pins &= !RDY;
    while h.pins & SYNC == 0 {
        h.tick();
    }
    assert_eq!(h.cpu.regs.a, 0x77);
    assert_eq!(h.cycles, 1 + 3 + 2);
}

#[test]
fn test_decimal_mode_adc() {
    // SED; CLC; LDA #$09; ADC #$01
    let program = [0xF8, 0x18, 0xA9, 0x09, 0x69, 0x01];
    let mut h = Harness::new(&program);
    h.run(4);
    assert_eq!(h.cpu.regs.a, 0x10);

    let mut h = Harness::with_config(
        &program,
        &Mos6502Config {
            bcd_disabled: true,
        },
    );
    h.run(4);
    assert_eq!(h.cpu.regs.a, 0x0A);
}

#[test]
fn test_decimal_mode_sbc() {
    // SED; SEC; LDA #$10; SBC #$01
    let mut h = Harness::new(&[0xF8, 0x38, 0xA9, 0x10, 0xE9, 0x01]);
    h.run(4);
    assert_eq!(h.cpu.regs.a, 0x09);
    assert!(h.cpu.regs.p & flags::C != 0);
}

#[test]
fn test_binary_adc_overflow() {
    // CLC; LDA #$7F; ADC #$01
    let mut h = Harness::new(&[0x18, 0xA9, 0x7F, 0x69, 0x01]);
    h.run(3);
    assert_eq!(h.cpu.regs.a, 0x80);
    assert!(h.cpu.regs.p & flags::V != 0);
    assert!(h.cpu.regs.p & flags::N != 0);
    assert_eq!(h.cpu.regs.p & flags::C, 0);
}

#[test]
fn test_compare_sets_carry() {
    // LDA #$40; CMP #$40; CPX #$01
    let mut h = Harness::new(&[0xA9, 0x40, 0xC9, 0x40, 0xE0, 0x01]);
    h.run(2);
    assert!(h.cpu.regs.p & flags::Z != 0);
    assert!(h.cpu.regs.p & flags::C != 0);
    h.run(1);
    assert_eq!(h.cpu.regs.p & flags::C, 0);
    assert!(h.cpu.regs.p & flags::N != 0);
}
