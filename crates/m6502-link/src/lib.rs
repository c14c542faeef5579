//! Host call surface for pin-stepped 6502 cores.
//!
//! The host names CPU instances by integer handle, drives them one clock
//! edge at a time by exchanging packed pin words, and reads or writes their
//! architectural state. Everything here is glue: the instruction state
//! machine lives in the core behind [`PinCpu`], and servicing the memory
//! requests the core puts on the bus is the host's job.
//!
//! ```
//! use m6502_link::Link;
//!
//! let mut link = Link::new();
//! link.create_instance(1);
//! let pins = link.tick(1, 0).unwrap();
//! assert!(pins >= 0);
//! link.destroy_instance(1);
//! ```

mod error;
pub mod ffi;
mod instance;
mod link;
mod pins;
mod registry;
mod snapshot;

pub use emu_core::{PinCpu, Register};
pub use error::{
    LIBRARY_FUNCTION_ERROR, LIBRARY_MEMORY_ERROR, LIBRARY_NO_ERROR, LIBRARY_NUMERICAL_ERROR,
    LIBRARY_TYPE_ERROR, LinkError,
};
pub use instance::Instance;
pub use link::{LIBRARY_VERSION, Link};
pub use pins::Pins;
pub use registry::{Handle, Registry};
pub use snapshot::{ExtraState, RegisterArgs, RegisterState, Snapshot};
