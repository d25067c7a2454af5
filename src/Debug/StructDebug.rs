use std::fmt;
use crate::Bus::listener::MessageListener;
use crate::Bus::Message::MessageHandle;
use crate::Bus::MessageBus;
use crate::Core::alloc::MessageSlab;

/// Debug function for MessageSlab
///
/// Provides a safe debug representation that shows:
/// - Storage location
/// - Slot geometry
/// - Occupancy snapshot
pub fn debug_message_slab(slab: &MessageSlab, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MessageSlab")
        .field("storage", &format_args!("{:p}", slab.storage_ptr()))
        .field("slot_size", &slab.slot_size())
        .field("slot_stride", &slab.slot_stride())
        .field("slot_count", &slab.slot_count())
        .field("occupied", &slab.occupied_slots())
        .finish()
}

/// Debug function for MessageBus
///
/// Shows the slab and the size of the type registry, not the subscriber lists
pub fn debug_message_bus(bus: &MessageBus, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MessageBus")
        .field("slab", bus.slab())
        .field("registered_types", &bus.registry().len())
        .field("wildcard_listeners", &bus.subscriber_count(crate::Core::WILDCARD))
        .finish()
}

/// Debug function for MessageHandle
///
/// Never dereferences the payload, only the slot header
pub fn debug_message_handle(handle: &MessageHandle, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MessageHandle")
        .field("slot", &handle.slot())
        .field("generation", &handle.generation())
        .field("type_id", &handle.type_id())
        .field("payload", &handle.payload_type_name())
        .field("ref_count", &handle.ref_count())
        .finish()
}

/// Debug function for MessageListener
pub fn debug_message_listener(listener: &MessageListener, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MessageListener")
        .field("id", &listener.id())
        .field("subscriptions", &listener.subscriptions())
        .field("pending", &listener.pending())
        .finish()
}

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_message_bus(self, f)
    }
}

impl fmt::Debug for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_message_handle(self, f)
    }
}

impl fmt::Debug for MessageListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_message_listener(self, f)
    }
}
