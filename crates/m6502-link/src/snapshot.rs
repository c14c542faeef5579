//! State snapshots: the host's view of an instance.
//!
//! A snapshot is recomputed from the core on every query and owns no state
//! of its own.

use emu_core::{Observable, PinCpu, Register, Value};
use serde::Serialize;

use crate::{Instance, LinkError, Pins};

/// Pin, register and decode-cycle state of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    #[serde(rename = "Pin")]
    pub pin: Pins,
    #[serde(rename = "Register")]
    pub register: RegisterState,
    #[serde(rename = "Extra")]
    pub extra: ExtraState,
}

/// Architectural registers. `ir` is the opcode half of the instruction
/// register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct RegisterState {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub ir: u8,
}

/// Decode state below instruction granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtraState {
    /// Cycle within the current instruction (low 3 bits of IR).
    #[serde(rename = "TickCount")]
    pub tick_count: u8,
}

impl Snapshot {
    /// Read the current state of `instance`.
    #[must_use]
    pub fn capture<C: PinCpu>(instance: &Instance<C>) -> Self {
        let reg = |r| instance.register(r);
        Self {
            pin: instance.pins(),
            register: RegisterState {
                pc: reg(Register::Pc),
                a: reg(Register::A) as u8,
                x: reg(Register::X) as u8,
                y: reg(Register::Y) as u8,
                s: reg(Register::S) as u8,
                p: reg(Register::P) as u8,
                ir: instance.opcode(),
            },
            extra: ExtraState {
                tick_count: instance.step(),
            },
        }
    }

    /// Serialise with the host key names.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl RegisterState {
    /// Host order: PC, A, X, Y, S, P.
    #[must_use]
    pub fn to_array(&self) -> [i64; 6] {
        [
            i64::from(self.pc),
            i64::from(self.a),
            i64::from(self.x),
            i64::from(self.y),
            i64::from(self.s),
            i64::from(self.p),
        ]
    }
}

impl Observable for Snapshot {
    fn query(&self, path: &str) -> Option<Value> {
        let (pin, reg, extra) = (&self.pin, &self.register, &self.extra);
        let value: Value = match path {
            "Pin.IRQ" => pin.irq.into(),
            "Pin.NMI" => pin.nmi.into(),
            "Pin.RDY" => pin.rdy.into(),
            "Pin.RES" => pin.res.into(),
            "Pin.RW" => pin.rw.into(),
            "Pin.SYNC" => pin.sync.into(),
            "Pin.AddressBus" => pin.address.into(),
            "Pin.DataBus" => pin.data.into(),
            "Register.PC" => reg.pc.into(),
            "Register.A" => reg.a.into(),
            "Register.X" => reg.x.into(),
            "Register.Y" => reg.y.into(),
            "Register.S" => reg.s.into(),
            "Register.P" => reg.p.into(),
            "Register.IR" => reg.ir.into(),
            "Extra.TickCount" => extra.tick_count.into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "Pin.IRQ",
            "Pin.NMI",
            "Pin.RDY",
            "Pin.RES",
            "Pin.RW",
            "Pin.SYNC",
            "Pin.AddressBus",
            "Pin.DataBus",
            "Register.PC",
            "Register.A",
            "Register.X",
            "Register.Y",
            "Register.S",
            "Register.P",
            "Register.IR",
            "Extra.TickCount",
        ]
    }
}

/// The six register arguments of a SetState call, as the host sent them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterArgs {
    pub pc: i64,
    pub a: i64,
    pub x: i64,
    pub y: i64,
    pub s: i64,
    pub p: i64,
}

impl RegisterArgs {
    /// Pair each argument with its register, in host order.
    #[must_use]
    pub fn fields(&self) -> [(Register, i64); 6] {
        [
            (Register::Pc, self.pc),
            (Register::A, self.a),
            (Register::X, self.x),
            (Register::Y, self.y),
            (Register::S, self.s),
            (Register::P, self.p),
        ]
    }

    /// Check every argument against its register width. Fails on the first
    /// one that does not fit.
    pub fn validate(&self) -> Result<[(Register, u16); 6], LinkError> {
        let mut checked = [(Register::Pc, 0); 6];
        for (slot, (register, value)) in checked.iter_mut().zip(self.fields()) {
            *slot = (register, checked_value(register, value)?);
        }
        Ok(checked)
    }
}

impl From<RegisterState> for RegisterArgs {
    fn from(state: RegisterState) -> Self {
        let [pc, a, x, y, s, p] = state.to_array();
        Self { pc, a, x, y, s, p }
    }
}

/// `value` narrowed to `register`'s width, or `OutOfRange`.
pub(crate) fn checked_value(register: Register, value: i64) -> Result<u16, LinkError> {
    if register.fits(value) {
        Ok(value as u16)
    } else {
        Err(LinkError::OutOfRange { register, value })
    }
}
