//! The host call surface.

use emu_core::{PinCpu, Register};
use mos_6502::{Mos6502, Mos6502Config};
use tracing::debug;

use crate::snapshot::checked_value;
use crate::{Handle, LinkError, RegisterArgs, Registry, Snapshot};

/// Interface version reported to the host loader.
pub const LIBRARY_VERSION: i64 = 7;

/// Every operation the host can call, over one registry.
///
/// All integers cross the boundary as host-native `i64`. Failed calls leave
/// the addressed instance untouched.
#[derive(Debug)]
pub struct Link<C: PinCpu = Mos6502> {
    registry: Registry<C>,
}

/// Log and pass through a rejected call.
fn rejected<T>(call: &str, handle: Handle, result: Result<T, LinkError>) -> Result<T, LinkError> {
    if let Err(err) = &result {
        debug!(call, handle, %err, "call rejected");
    }
    result
}

impl Link<Mos6502> {
    /// A link driving the bundled 6502 core.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Mos6502Config::default())
    }
}

impl Default for Link<Mos6502> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PinCpu + Default> Link<C> {
    /// A link whose instances are all initialised from `config`.
    #[must_use]
    pub fn with_config(config: C::Config) -> Self {
        Self {
            registry: Registry::with_config(config),
        }
    }

    /// CreateInstance: a fresh, initialised core under `handle`, replacing
    /// any live one.
    pub fn create_instance(&mut self, handle: Handle) {
        self.registry.create(handle);
    }

    /// The host's instance-manager callback: mode 0 creates, anything else
    /// destroys.
    pub fn manage_instance(&mut self, mode: i64, handle: Handle) {
        if mode == 0 {
            self.create_instance(handle);
        } else {
            self.destroy_instance(handle);
        }
    }
}

impl<C: PinCpu> Link<C> {
    /// DestroyInstance. Unknown handles are ignored.
    pub fn destroy_instance(&mut self, handle: Handle) {
        self.registry.destroy(handle);
    }

    /// GetState.
    pub fn get_state(&self, handle: Handle) -> Result<Snapshot, LinkError> {
        let result = self.registry.lookup(handle).map(Snapshot::capture);
        rejected("get_state", handle, result)
    }

    /// SetState. Every field is checked first; one bad field rejects the
    /// whole call.
    pub fn set_state(&mut self, handle: Handle, args: RegisterArgs) -> Result<(), LinkError> {
        let result = self.apply_state(handle, args);
        rejected("set_state", handle, result)
    }

    fn apply_state(&mut self, handle: Handle, args: RegisterArgs) -> Result<(), LinkError> {
        let instance = self.registry.lookup_mut(handle)?;
        for (register, value) in args.validate()? {
            instance.set_register(register, value);
        }
        Ok(())
    }

    /// SetRegister. Returns the register as read back after the write.
    pub fn set_register(
        &mut self,
        handle: Handle,
        register: Register,
        value: i64,
    ) -> Result<i64, LinkError> {
        let result = self.registry.lookup_mut(handle).and_then(|instance| {
            instance.set_register(register, checked_value(register, value)?);
            Ok(i64::from(instance.register(register)))
        });
        rejected("set_register", handle, result)
    }

    pub fn set_program_counter(&mut self, handle: Handle, value: i64) -> Result<i64, LinkError> {
        self.set_register(handle, Register::Pc, value)
    }

    pub fn set_stack_pointer(&mut self, handle: Handle, value: i64) -> Result<i64, LinkError> {
        self.set_register(handle, Register::S, value)
    }

    pub fn set_processor_status(&mut self, handle: Handle, value: i64) -> Result<i64, LinkError> {
        self.set_register(handle, Register::P, value)
    }

    /// Tick: forward one clock edge. The handle is checked before the pins.
    pub fn tick(&mut self, handle: Handle, pins: i64) -> Result<i64, LinkError> {
        let result = self.registry.lookup_mut(handle).and_then(|instance| {
            let pins = u64::try_from(pins).map_err(|_| LinkError::InvalidPins(pins))?;
            Ok(instance.tick(pins) as i64)
        });
        rejected("tick", handle, result)
    }

    /// Registers in host order: PC, A, X, Y, S, P.
    pub fn registers(&self, handle: Handle) -> Result<[i64; 6], LinkError> {
        let result = self
            .registry
            .lookup(handle)
            .map(|instance| Register::ALL.map(|r| i64::from(instance.register(r))));
        rejected("registers", handle, result)
    }

    /// Instruction register as `[opcode, step]`.
    pub fn instruction_register(&self, handle: Handle) -> Result<[i64; 2], LinkError> {
        let result = self
            .registry
            .lookup(handle)
            .map(|instance| [i64::from(instance.opcode()), i64::from(instance.step())]);
        rejected("instruction_register", handle, result)
    }

    /// Interface version reported to the host loader.
    #[must_use]
    pub const fn library_version() -> i64 {
        LIBRARY_VERSION
    }

    #[must_use]
    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }
}
