// Per-type subscriber lists shared by the bus and its listeners

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::Bus::listener::Inbox;
use crate::Core::registry::{MsgTypeId, WILDCARD};

/// What a single listener is subscribed to.
///
/// `Wildcard` is a distinct state rather than a member of the set: it
/// supersedes every specific subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionSet {
    Specific(BTreeSet<MsgTypeId>),
    Wildcard,
}

impl SubscriptionSet {
    pub fn contains(&self, id: MsgTypeId) -> bool {
        match self {
            SubscriptionSet::Wildcard => true,
            SubscriptionSet::Specific(ids) => ids.contains(&id),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, SubscriptionSet::Wildcard)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SubscriptionSet::Specific(ids) if ids.is_empty())
    }
}

impl Default for SubscriptionSet {
    fn default() -> Self {
        SubscriptionSet::Specific(BTreeSet::new())
    }
}

/// Type id -> ordered list of subscribed inboxes. The wildcard list is keyed by `WILDCARD`.
///
/// Keyed sparsely, so a raw id from anywhere in the `MsgTypeId` range is a
/// valid key. Empty lists are removed.
///
/// Guarded by a re-entrant lock: a thread already inside a subscribe or a
/// fan-out may subscribe or publish again without deadlocking. Fan-out never
/// holds a `RefCell` borrow across a delivery, so nested mutation is safe.
pub(crate) struct SubscriptionTable {
    lists: ReentrantMutex<RefCell<HashMap<MsgTypeId, Vec<Arc<Inbox>>>>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self {
            lists: ReentrantMutex::new(RefCell::new(HashMap::new())),
        }
    }

    /// Append `inbox` to the list of `id`. Already-present inboxes are not added twice.
    pub fn subscribe(&self, inbox: &Arc<Inbox>, id: MsgTypeId) {
        let guard = self.lists.lock();
        let mut lists = guard.borrow_mut();
        let list = lists.entry(id).or_default();
        if !list.iter().any(|l| Arc::ptr_eq(l, inbox)) {
            list.push(Arc::clone(inbox));
        }
    }

    /// Remove `inbox` from the list of `id`, if present.
    pub fn unsubscribe(&self, inbox: &Arc<Inbox>, id: MsgTypeId) {
        let guard = self.lists.lock();
        let mut lists = guard.borrow_mut();
        if let Some(list) = lists.get_mut(&id) {
            list.retain(|l| !Arc::ptr_eq(l, inbox));
            if list.is_empty() {
                lists.remove(&id);
            }
        }
    }

    /// Number of inboxes in the list of `id` (the wildcard list for `WILDCARD`)
    pub fn subscriber_count(&self, id: MsgTypeId) -> usize {
        let guard = self.lists.lock();
        let lists = guard.borrow();
        lists.get(&id).map_or(0, Vec::len)
    }

    /// Call `deliver` for every wildcard subscriber, then every subscriber of `id`.
    ///
    /// Returns the number of deliveries.
    pub fn fan_out(&self, id: MsgTypeId, mut deliver: impl FnMut(&Inbox)) -> usize {
        let guard = self.lists.lock();
        let mut delivered = 0;
        let lists = [WILDCARD, id];
        let targets = if id == WILDCARD { &lists[..1] } else { &lists[..] };
        for list_id in targets {
            let mut index = 0;
            loop {
                // Borrow only long enough to fetch the next recipient
                let next = guard
                    .borrow()
                    .get(list_id)
                    .and_then(|list| list.get(index))
                    .cloned();
                match next {
                    Some(inbox) => {
                        deliver(&inbox);
                        delivered += 1;
                        index += 1;
                    }
                    None => break,
                }
            }
        }
        delivered
    }
}
