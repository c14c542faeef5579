//! Architectural registers addressable from the host.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A 6502 programmer-visible register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Program counter (16-bit).
    Pc,
    /// Accumulator.
    A,
    /// X index register.
    X,
    /// Y index register.
    Y,
    /// Stack pointer (stack lives at $0100-$01FF).
    S,
    /// Processor status.
    P,
}

impl Register {
    /// Host order: PC, A, X, Y, S, P.
    pub const ALL: [Register; 6] = [
        Register::Pc,
        Register::A,
        Register::X,
        Register::Y,
        Register::S,
        Register::P,
    ];

    /// Largest value the register can hold.
    #[must_use]
    pub const fn max(self) -> u16 {
        match self {
            Register::Pc => 0xFFFF,
            _ => 0xFF,
        }
    }

    /// Name used on the host boundary.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Register::Pc => "PC",
            Register::A => "A",
            Register::X => "X",
            Register::Y => "Y",
            Register::S => "S",
            Register::P => "P",
        }
    }

    /// Check a host integer against the register width.
    #[must_use]
    pub fn fits(self, value: i64) -> bool {
        (0..=i64::from(self.max())).contains(&value)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no register.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown register name {0:?}")]
pub struct ParseRegisterError(pub String);

impl FromStr for Register {
    type Err = ParseRegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseRegisterError(s.to_string()))
    }
}
