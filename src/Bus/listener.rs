// Listener inbox and subscription state

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::Bus::bus::{BusShared, MessageBus};
use crate::Bus::Message::MessageHandle;
use crate::Bus::Structs::Subscription_Structs::SubscriptionSet;
use crate::Core::error::{BusError, Result};
use crate::Core::registry::{IntoTypeId, MsgTypeId, WILDCARD};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// The part of a listener the bus delivers into.
///
/// The queue lock is independent of every bus-wide lock, so a slow consumer
/// only ever contends with deliveries to itself.
pub(crate) struct Inbox {
    pub(crate) id: u64,
    queue: Mutex<VecDeque<MessageHandle>>,
    subscriptions: Mutex<SubscriptionSet>,
}

impl Inbox {
    pub(crate) fn push_message(&self, msg: MessageHandle) {
        self.queue.lock().push_back(msg);
    }
}

/// A consumer attached to a bus: a FIFO inbox of message handles plus the
/// set of message types it receives.
///
/// Dropping the listener (or calling `detach`) unsubscribes it from every
/// type and releases the handles still queued. The listener keeps the bus
/// state alive, so it can never outlive the bus it is attached to.
pub struct MessageListener {
    shared: Arc<BusShared>,
    inbox: Arc<Inbox>,
}

impl MessageListener {
    /// Attach a new listener, with no subscriptions, to `bus`.
    pub fn attach(bus: &MessageBus) -> Self {
        let inbox = Arc::new(Inbox {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            queue: Mutex::new(VecDeque::new()),
            subscriptions: Mutex::new(SubscriptionSet::default()),
        });
        log::debug!("MessageListener {} attached", inbox.id);
        Self {
            shared: Arc::clone(&bus.shared),
            inbox,
        }
    }

    /// Unique id of this listener, for diagnostics
    pub fn id(&self) -> u64 {
        self.inbox.id
    }

    /// Subscribe to a message type by id or name; returns the resolved id.
    ///
    /// Subscribing to `WILDCARD` is the same as `subscribe_to_all`. A specific
    /// subscription while wildcard-subscribed is rejected.
    pub fn subscribe(&self, msg_type: impl IntoTypeId) -> Result<MsgTypeId> {
        let id = msg_type.into_type_id(&self.shared.registry);
        if id == WILDCARD {
            self.subscribe_to_all();
            return Ok(id);
        }

        let mut subs = self.inbox.subscriptions.lock();
        match &mut *subs {
            SubscriptionSet::Wildcard => {
                log::warn!(
                    "failed to subscribe MessageListener {} to messages of type {}, MessageListener is subscribed to every type",
                    self.inbox.id,
                    id
                );
                Err(BusError::InvalidSubscription(format!(
                    "listener {} is subscribed to every type, cannot subscribe to {}",
                    self.inbox.id, id
                )))
            }
            SubscriptionSet::Specific(ids) => {
                if ids.insert(id) {
                    self.shared.subscriptions.subscribe(&self.inbox, id);
                }
                Ok(id)
            }
        }
    }

    /// Unsubscribe from a message type by id or name; returns the resolved id.
    pub fn unsubscribe(&self, msg_type: impl IntoTypeId) -> Result<MsgTypeId> {
        let id = msg_type.into_type_id(&self.shared.registry);
        if id == WILDCARD {
            log::warn!(
                "failed to unsubscribe MessageListener {} from messages of type 0, invalid type id",
                self.inbox.id
            );
            return Err(BusError::InvalidSubscription(
                "cannot unsubscribe from the wildcard type id, use unsubscribe_from_all".to_string(),
            ));
        }

        let mut subs = self.inbox.subscriptions.lock();
        match &mut *subs {
            SubscriptionSet::Wildcard => {
                log::warn!(
                    "failed to unsubscribe MessageListener {} from messages of type {}, MessageListener is subscribed to every type",
                    self.inbox.id,
                    id
                );
                Err(BusError::InvalidSubscription(format!(
                    "listener {} is subscribed to every type, cannot unsubscribe from {}",
                    self.inbox.id, id
                )))
            }
            SubscriptionSet::Specific(ids) => {
                if ids.remove(&id) {
                    self.shared.subscriptions.unsubscribe(&self.inbox, id);
                }
                Ok(id)
            }
        }
    }

    /// Receive every message type. Clears any specific subscription.
    pub fn subscribe_to_all(&self) {
        let mut subs = self.inbox.subscriptions.lock();
        if subs.is_wildcard() {
            return;
        }
        self.clear_table_entries(&subs);
        *subs = SubscriptionSet::Wildcard;
        self.shared.subscriptions.subscribe(&self.inbox, WILDCARD);
    }

    /// Drop every subscription, wildcard included.
    pub fn unsubscribe_from_all(&self) {
        let mut subs = self.inbox.subscriptions.lock();
        self.clear_table_entries(&subs);
        *subs = SubscriptionSet::default();
    }

    fn clear_table_entries(&self, subs: &SubscriptionSet) {
        match subs {
            SubscriptionSet::Wildcard => self.shared.subscriptions.unsubscribe(&self.inbox, WILDCARD),
            SubscriptionSet::Specific(ids) => {
                for &id in ids {
                    self.shared.subscriptions.unsubscribe(&self.inbox, id);
                }
            }
        }
    }

    /// True if messages of `msg_type` are delivered to this listener.
    ///
    /// Always true while wildcard-subscribed, even for types registered later.
    pub fn is_subscribed_to(&self, msg_type: impl IntoTypeId) -> bool {
        let subs = self.inbox.subscriptions.lock();
        match msg_type.lookup_type_id(&self.shared.registry) {
            Some(id) => subs.contains(id),
            // A name without an id cannot have a specific subscription
            None => subs.is_wildcard(),
        }
    }

    pub fn is_subscribed_to_all(&self) -> bool {
        self.inbox.subscriptions.lock().is_wildcard()
    }

    /// Snapshot of the current subscription state
    pub fn subscriptions(&self) -> SubscriptionSet {
        self.inbox.subscriptions.lock().clone()
    }

    /// Next message in the inbox, or `None` if it is empty. Never blocks.
    pub fn pop_message(&self) -> Option<MessageHandle> {
        self.inbox.queue.lock().pop_front()
    }

    /// Number of messages waiting in the inbox
    pub fn pending(&self) -> usize {
        self.inbox.queue.lock().len()
    }

    /// Iterator popping messages until the inbox is empty.
    ///
    /// Messages delivered while iterating are yielded too.
    pub fn drain(&self) -> impl Iterator<Item = MessageHandle> + '_ {
        std::iter::from_fn(move || self.pop_message())
    }

    /// Bus this listener is attached to
    pub fn bus(&self) -> MessageBus {
        MessageBus {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Unsubscribe from everything and release queued handles.
    pub fn detach(self) {
        // Work happens in Drop
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        self.unsubscribe_from_all();
        let dropped = {
            let mut queue = self.inbox.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        log::debug!(
            "MessageListener {} detached, {} queued messages released",
            self.inbox.id,
            dropped
        );
    }
}
