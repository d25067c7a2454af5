use std::sync::Arc;

use super::bus::MessageBus;
use super::Structs::Payload_Structs::PayloadFactory;
use crate::Core::alloc::MessageSlab;
use crate::Core::error::Result;
use crate::Core::registry::TypeRegistry;

pub const DEFAULT_SLOT_SIZE: usize = 256;
pub const DEFAULT_SLOT_COUNT: usize = 1024;

pub struct BusBuilder {
    slot_size: usize,
    slot_count: usize,
    registry: Option<Arc<TypeRegistry>>,
    factory: Option<Arc<PayloadFactory>>,
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self {
            slot_size: DEFAULT_SLOT_SIZE,   // 256B per payload
            slot_count: DEFAULT_SLOT_COUNT, // 256KB of slots
            registry: None,                 // process-wide registry
            factory: None,                  // built-in payload kinds
        }
    }
}

impl BusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot_size(mut self, size: usize) -> Self {
        self.slot_size = size;
        self
    }

    pub fn with_slot_count(mut self, count: usize) -> Self {
        self.slot_count = count;
        self
    }

    /// Use a private registry instead of the process-wide one, e.g. for
    /// deterministic type ids.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_factory(mut self, factory: Arc<PayloadFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<MessageBus> {
        let slab = MessageSlab::new(self.slot_size, self.slot_count)?;
        let registry = self.registry.unwrap_or_else(TypeRegistry::global);
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(PayloadFactory::with_builtins()));
        Ok(MessageBus::from_parts(slab, registry, factory))
    }
}
