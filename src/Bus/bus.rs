// Publish/dispatch protocol and sweeping over the shared slab
use std::sync::Arc;

use crate::Bus::client::{Attached, BusClient};
use crate::Bus::listener::MessageListener;
use crate::Bus::Message::{MessageHandle, Payload, TextPayload};
use crate::Bus::Structs::Payload_Structs::PayloadFactory;
use crate::Bus::Structs::Subscription_Structs::SubscriptionTable;
use crate::Core::alloc::MessageSlab;
use crate::Core::error::{BusError, Result};
use crate::Core::registry::{IntoTypeId, MsgTypeId, TypeRegistry, WILDCARD};

/// State shared by a bus, its listeners and every outstanding handle.
pub(crate) struct BusShared {
    pub(crate) slab: MessageSlab,
    pub(crate) subscriptions: SubscriptionTable,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) factory: Arc<PayloadFactory>,
}

/// Typed publish/subscribe bus over a fixed-capacity slab.
///
/// Cloning yields another handle to the same bus. The bus state lives as long
/// as any bus handle, listener or message handle refers to it.
///
/// ### Publish protocol:
/// 1. resolve the type id (the wildcard is not a valid target)
/// 2. reject payload types larger than a slot
/// 3. allocate a slot, construct the payload in it and stamp its type id
/// 4. push one handle to every wildcard listener, then to every listener of
///    that type
///
/// Steps 3 and 4 run under the slab lock, which `sweep` also takes.
#[derive(Clone)]
pub struct MessageBus {
    pub(crate) shared: Arc<BusShared>,
}

impl MessageBus {
    /// Bus of `slot_count` slots of `slot_size` bytes, using the global type
    /// registry and the built-in payload kinds.
    pub fn new(slot_size: usize, slot_count: usize) -> Result<Self> {
        crate::Bus::BusBuilder::new()
            .with_slot_size(slot_size)
            .with_slot_count(slot_count)
            .build()
    }

    pub(crate) fn from_parts(
        slab: MessageSlab,
        registry: Arc<TypeRegistry>,
        factory: Arc<PayloadFactory>,
    ) -> Self {
        log::info!(
            "MessageBus initialized: {} slots of {} bytes",
            slab.slot_count(),
            slab.slot_size()
        );
        Self {
            shared: Arc::new(BusShared {
                slab,
                subscriptions: SubscriptionTable::new(),
                registry,
                factory,
            }),
        }
    }

    /// Publish `payload` under `msg_type`.
    ///
    /// # Returns
    /// * `Ok(())` once the payload is in every subscribed inbox
    /// * `Err(BusError::WildcardPublish)` for type id 0
    /// * `Err(BusError::PayloadTooLarge)` if `T` does not fit a slot
    /// * `Err(BusError::BufferFull)` if every slot is occupied
    pub fn publish<T: Payload>(&self, msg_type: impl IntoTypeId, payload: T) -> Result<()> {
        self.publish_with(msg_type, move || payload)
    }

    /// Publish a payload built by `construct`, which only runs once a slot
    /// has been secured.
    ///
    /// `construct` runs with the slab locked and must not publish or sweep.
    pub fn publish_with<T, F>(&self, msg_type: impl IntoTypeId, construct: F) -> Result<()>
    where
        T: Payload,
        F: FnOnce() -> T,
    {
        let type_id = msg_type.into_type_id(&self.shared.registry);
        if type_id == WILDCARD {
            log::warn!("failed to send message, type 0 is reserved for wildcard subscriptions");
            return Err(BusError::WildcardPublish);
        }
        let shared = &self.shared;
        if let Err(e) = shared.slab.check_fits::<T>() {
            log::error!("failed to send message of type {}: {}", type_id, e);
            return Err(e);
        }

        let mut guard = shared.slab.lock();
        let slot = guard.allocate()?;
        let vtable = guard.construct(slot, construct(), type_id);

        // Transient handle: keeps the count above zero during fan-out
        let handle = MessageHandle::retain(shared, slot, vtable);
        let delivered = shared
            .subscriptions
            .fan_out(type_id, |inbox| inbox.push_message(handle.clone()));
        drop(handle);
        drop(guard);

        log::trace!(
            "published message of type {} in slot {} to {} listeners",
            type_id,
            slot,
            delivered
        );
        Ok(())
    }

    /// Parse `text` as payload kind `kind` (see `PayloadFactory`) and publish it.
    pub fn publish_text(&self, msg_type: impl IntoTypeId, kind: &str, text: &str) -> Result<()> {
        let type_id = msg_type.into_type_id(&self.shared.registry);
        let publish = self.shared.factory.publisher(kind)?;
        publish(self, type_id, kind, text)
    }

    /// Make `T` available to `publish_text` under `kind`.
    pub fn register_payload<T: TextPayload>(&self, kind: &str) -> bool {
        self.shared.factory.register::<T>(kind)
    }

    /// Destroy every payload without live handles and free its slot.
    ///
    /// Must be called periodically by the owner; nothing is reclaimed
    /// otherwise. Returns the number of slots freed.
    pub fn sweep(&self) -> usize {
        let released = self.shared.slab.lock().sweep();
        if released > 0 {
            log::trace!("sweep released {} message slots", released);
        }
        released
    }

    /// Attach a new listener with no subscriptions.
    pub fn listener(&self) -> MessageListener {
        MessageListener::attach(self)
    }

    /// Attach an engine system; see `BusClient`.
    pub fn attach<C: BusClient>(&self, client: C) -> Attached<C> {
        Attached::new(self, client)
    }

    /// Id of `name`, assigning one if the name is new
    pub fn type_id(&self, name: &str) -> MsgTypeId {
        self.shared.registry.name_to_id(name)
    }

    /// Name of an assigned id
    pub fn type_name(&self, id: MsgTypeId) -> Result<String> {
        self.shared.registry.id_to_name(id)
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.shared.registry
    }

    pub fn factory(&self) -> &Arc<PayloadFactory> {
        &self.shared.factory
    }

    /// Listeners subscribed specifically to `msg_type` (wildcard listeners for id 0).
    /// Never assigns an id to an unknown name.
    pub fn subscriber_count(&self, msg_type: impl IntoTypeId) -> usize {
        msg_type
            .lookup_type_id(&self.shared.registry)
            .map_or(0, |id| self.shared.subscriptions.subscriber_count(id))
    }

    pub fn slot_size(&self) -> usize {
        self.shared.slab.slot_size()
    }

    pub fn slot_count(&self) -> usize {
        self.shared.slab.slot_count()
    }

    pub fn occupied_slots(&self) -> usize {
        self.shared.slab.occupied_slots()
    }

    pub fn free_slots(&self) -> usize {
        self.shared.slab.free_slots()
    }

    /// Payloads with no handle left that the next sweep will free
    pub fn pending_sweep(&self) -> usize {
        self.shared.slab.pending_sweep()
    }

    /// The underlying slab, for diagnostics
    pub fn slab(&self) -> &MessageSlab {
        &self.shared.slab
    }

    /// True if both values refer to the same bus
    pub fn same_bus(&self, other: &MessageBus) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
