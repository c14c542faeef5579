//! Read-only, path-based state inspection.
//!
//! Queries never affect core state.

use std::fmt;

/// A dynamically-typed value returned by a state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// Single pin or flag.
    Bool(bool),
    /// 8-bit register or bus.
    U8(u8),
    /// 16-bit register or bus.
    U16(u16),
    /// Raw pin word.
    U64(u64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", u8::from(*v)),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U64(v) => write!(f, "{v:#018X}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

/// Something whose state can be inspected by path.
pub trait Observable {
    /// Query one property. Returns `None` for an unknown path.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path `query` answers.
    fn query_paths(&self) -> &'static [&'static str];
}
