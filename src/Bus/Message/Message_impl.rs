use std::any::TypeId;
use std::fmt;
use std::sync::atomic::Ordering::{Relaxed, Release};
use std::sync::Arc;

use super::layout::{PayloadVTable, SlotHeader};
use super::Message::{MessageHandle, Payload};
use crate::Bus::bus::BusShared;
use crate::Core::error::{BusError, Result};
use crate::Core::registry::MsgTypeId;

impl MessageHandle {
    /// Takes the first reference on a freshly constructed slot.
    ///
    /// Must only be called with the slab locked, right after `construct`
    /// returned `vtable` for `slot`.
    pub(crate) fn retain(shared: &Arc<BusShared>, slot: usize, vtable: PayloadVTable) -> Self {
        let header = shared.slab.header(slot);
        header.refcount.fetch_add(1, Relaxed);
        Self {
            shared: Arc::clone(shared),
            slot,
            generation: header.generation.load(Relaxed),
            vtable,
        }
    }

    #[inline]
    fn header(&self) -> &SlotHeader {
        self.shared.slab.header(self.slot)
    }

    /// Message type id stamped at publish time
    pub fn type_id(&self) -> MsgTypeId {
        self.header().type_id.load(Relaxed)
    }

    /// Message type name, resolved through the bus registry
    pub fn type_name(&self) -> Result<String> {
        self.shared.registry.id_to_name(self.type_id())
    }

    /// Number of live handles to this payload, including this one
    pub fn ref_count(&self) -> usize {
        self.header().refcount.load(Relaxed)
    }

    /// Slab slot index holding the payload
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Construction generation of the slot when this handle was taken
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rust type name of the payload
    pub fn payload_type_name(&self) -> &'static str {
        self.vtable.type_name
    }

    /// Type-erased access to the payload
    pub fn payload(&self) -> &dyn Payload {
        debug_assert_eq!(self.header().generation.load(Relaxed), self.generation);
        // Safety: the slot holds a payload of the vtable's type for as long as
        // this handle keeps its refcount above zero.
        unsafe { &*(self.vtable.as_dyn)(self.shared.slab.slot_ptr(self.slot)) }
    }

    /// True if the payload is a `T`
    pub fn is<T: Payload>(&self) -> bool {
        self.vtable.rust_type == TypeId::of::<T>()
    }

    /// Checked downcast to the concrete payload type.
    pub fn downcast_ref<T: Payload>(&self) -> Result<&T> {
        if !self.is::<T>() {
            return Err(BusError::TypeMismatch {
                requested: std::any::type_name::<T>(),
                actual: self.vtable.type_name,
            });
        }
        debug_assert_eq!(self.header().generation.load(Relaxed), self.generation);
        // Safety: type tag checked above; slot kept alive by this handle.
        Ok(unsafe { &*(self.shared.slab.slot_ptr(self.slot) as *const T) })
    }

    /// Renders the payload through `Payload::write_text`
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.payload().write_text(&mut out);
        out
    }
}

impl Clone for MessageHandle {
    fn clone(&self) -> Self {
        self.header().refcount.fetch_add(1, Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
            slot: self.slot,
            generation: self.generation,
            vtable: self.vtable,
        }
    }
}

impl Drop for MessageHandle {
    fn drop(&mut self) {
        // Pairs with the acquire load in the sweep
        self.header().refcount.fetch_sub(1, Release);
    }
}

impl PartialEq for MessageHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
            && self.slot == other.slot
            && self.generation == other.generation
    }
}

impl Eq for MessageHandle {}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.payload().write_text(f)
    }
}
