//! Call failures and their host status codes.

use emu_core::Register;
use thiserror::Error;

use crate::Handle;

/// Host status: success.
pub const LIBRARY_NO_ERROR: i32 = 0;
/// Host status: an argument had the wrong type or shape.
pub const LIBRARY_TYPE_ERROR: i32 = 1;
/// Host status: a number outside the accepted range.
pub const LIBRARY_NUMERICAL_ERROR: i32 = 4;
/// Host status: a null or undersized buffer.
pub const LIBRARY_MEMORY_ERROR: i32 = 5;
/// Host status: the call itself failed.
pub const LIBRARY_FUNCTION_ERROR: i32 = 6;

/// Why a call on the link failed. A failed call leaves every instance as it
/// was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    /// No live instance under this handle.
    #[error("no instance with handle {0}")]
    UnknownInstance(Handle),

    /// A register value wider than the register.
    #[error(
        "{value:#X} is out of range for register {register} (max {max:#X})",
        max = .register.max()
    )]
    OutOfRange { register: Register, value: i64 },

    /// A negative pin word.
    #[error("invalid pin word {0}: the pin bus is unsigned")]
    InvalidPins(i64),
}

impl LinkError {
    /// Status code reported to the host for this failure.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            LinkError::UnknownInstance(_) => LIBRARY_FUNCTION_ERROR,
            LinkError::OutOfRange { .. } => LIBRARY_NUMERICAL_ERROR,
            LinkError::InvalidPins(_) => LIBRARY_TYPE_ERROR,
        }
    }
}
