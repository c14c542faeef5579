//! Handle-to-instance registry.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use emu_core::PinCpu;
use tracing::{debug, warn};

use crate::{Instance, LinkError};

/// Host-assigned instance name.
pub type Handle = i64;

/// Owns every live instance, keyed by handle.
///
/// A handle in the map always names a fully initialised core; an absent
/// handle is simply unknown. Dropping an entry drops its core.
pub struct Registry<C: PinCpu> {
    instances: HashMap<Handle, Instance<C>>,
    config: C::Config,
}

impl<C: PinCpu + Default> Registry<C> {
    /// Empty registry whose cores use the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(C::Config::default())
    }

    /// Empty registry; every core it creates is initialised from `config`.
    #[must_use]
    pub fn with_config(config: C::Config) -> Self {
        Self {
            instances: HashMap::new(),
            config,
        }
    }

    /// Create a fresh instance under `handle`. A live instance already
    /// there is dropped first.
    pub fn create(&mut self, handle: Handle) -> &mut Instance<C> {
        let instance = Instance::new(&self.config);
        match self.instances.entry(handle) {
            Entry::Occupied(mut entry) => {
                warn!(handle, "create replaced a live instance");
                entry.insert(instance);
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                debug!(handle, "instance created");
                entry.insert(instance)
            }
        }
    }
}

impl<C: PinCpu + Default> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PinCpu> Registry<C> {
    /// Drop the instance under `handle`. Returns whether one was live;
    /// destroying an unknown handle is not an error.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        let removed = self.instances.remove(&handle).is_some();
        if removed {
            debug!(handle, "instance destroyed");
        }
        removed
    }

    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&Instance<C>> {
        self.instances.get(&handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Instance<C>> {
        self.instances.get_mut(&handle)
    }

    /// Like [`get`](Self::get), failing with `UnknownInstance`.
    pub fn lookup(&self, handle: Handle) -> Result<&Instance<C>, LinkError> {
        self.get(handle).ok_or(LinkError::UnknownInstance(handle))
    }

    /// Like [`get_mut`](Self::get_mut), failing with `UnknownInstance`.
    pub fn lookup_mut(&mut self, handle: Handle) -> Result<&mut Instance<C>, LinkError> {
        self.get_mut(handle).ok_or(LinkError::UnknownInstance(handle))
    }

    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.instances.contains_key(&handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Live handles in ascending order.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<_> = self.instances.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    #[must_use]
    pub fn config(&self) -> &C::Config {
        &self.config
    }
}

impl<C: PinCpu> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handles", &self.handles())
            .finish_non_exhaustive()
    }
}
