use crate::Bus::Message::layout::{slot_stride_for, PayloadVTable, SlotHeader, SLOT_ALIGN, STORAGE_ALIGN};
use crate::Bus::Message::Payload;
use crate::Core::error::{BusError, Result};
use crate::Core::registry::MsgTypeId;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering::{Acquire, Relaxed};
mod debug;
mod getters;

// Use parking_lot's Mutex for better performance
use parking_lot::{Mutex, MutexGuard};

/// Occupancy state of the slab, only touched under the slab lock.
pub struct SlabState {
    /// `occupied[i]` is true iff slot `i` holds (or is being filled with) a payload
    occupied: Vec<bool>,
    /// Occupied slots in allocation order; the sweep walks this list
    live: Vec<usize>,
}

/// Fixed-capacity pool of fixed-size slots that payloads are written into.
///
/// ### Layout:
/// One contiguous, 64-byte aligned block of `slot_count * slot_stride` bytes,
/// plus a header array (refcount, type id, generation, vtable) kept apart from
/// the payload bytes.
///
/// ### Locking:
/// All occupancy changes go through a `SlabGuard`. The bus holds the guard
/// for the whole allocate, construct, fan-out sequence and for sweeps, so a
/// half-published payload is never visible to a sweep.
pub struct MessageSlab {
    storage: NonNull<u8>,
    layout: Layout,
    slot_size: usize,
    slot_stride: usize,
    slot_count: usize,
    headers: Box<[SlotHeader]>,
    state: Mutex<SlabState>,
}

/// Exclusive access to the slab's occupancy table.
pub struct SlabGuard<'a> {
    slab: &'a MessageSlab,
    state: MutexGuard<'a, SlabState>,
}

impl MessageSlab {
    /// Create a slab of `slot_count` slots of at least `slot_size` bytes each.
    pub fn new(slot_size: usize, slot_count: usize) -> Result<Self> {
        if slot_size == 0 || slot_count == 0 {
            return Err(BusError::InvalidConfig(format!(
                "MessageSlab::new(): slot size and slot count must be non-zero. Requested: {} x {}",
                slot_size, slot_count
            )));
        }

        let slot_stride = slot_stride_for(slot_size);
        let total = slot_stride.checked_mul(slot_count).ok_or_else(|| {
            BusError::InvalidConfig(format!(
                "MessageSlab::new(): {} slots of {} bytes overflow the address space",
                slot_count, slot_stride
            ))
        })?;
        let layout = Layout::from_size_align(total, STORAGE_ALIGN)
            .map_err(|e| BusError::InvalidConfig(format!("MessageSlab::new(): {}", e)))?;

        // Safety: layout has a non-zero size
        let storage = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or_else(|| {
            BusError::InvalidConfig(format!(
                "MessageSlab::new(): failed to allocate {} bytes of slot storage",
                total
            ))
        })?;

        let headers = (0..slot_count).map(|_| SlotHeader::new()).collect();

        log::debug!(
            "MessageSlab created: {} slots, {} bytes each (stride {})",
            slot_count,
            slot_size,
            slot_stride
        );

        Ok(Self {
            storage,
            layout,
            slot_size,
            slot_stride,
            slot_count,
            headers,
            state: Mutex::new(SlabState {
                occupied: vec![false; slot_count],
                live: Vec::with_capacity(slot_count),
            }),
        })
    }

    /// Lock the occupancy table.
    pub fn lock(&self) -> SlabGuard<'_> {
        SlabGuard {
            slab: self,
            state: self.state.lock(),
        }
    }

    /// Reject payload types that cannot fit in a slot.
    pub fn check_fits<T>(&self) -> Result<()> {
        let size = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>();
        if size > self.slot_size || align > SLOT_ALIGN {
            return Err(BusError::PayloadTooLarge {
                type_name: std::any::type_name::<T>(),
                size,
                align,
                slot_size: self.slot_size,
                slot_align: SLOT_ALIGN,
            });
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn header(&self, slot: usize) -> &SlotHeader {
        &self.headers[slot]
    }

    #[inline]
    pub(crate) fn slot_ptr(&self, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.slot_count);
        // Safety: slot < slot_count keeps the offset inside the allocation
        unsafe { self.storage.as_ptr().add(slot * self.slot_stride) }
    }
}

impl SlabGuard<'_> {
    /// Claim the first free slot.
    pub fn allocate(&mut self) -> Result<usize> {
        match self.state.occupied.iter().position(|used| !used) {
            Some(slot) => {
                self.state.occupied[slot] = true;
                self.state.live.push(slot);
                Ok(slot)
            }
            None => {
                log::error!(
                    "failed to allocate message on MessageSlab, the message buffer is full ({} slots)",
                    self.slab.slot_count
                );
                Err(BusError::BufferFull {
                    slot_count: self.slab.slot_count,
                })
            }
        }
    }

    /// Move `value` into an allocated slot and stamp its type id.
    ///
    /// The payload starts with a reference count of zero. Returns the vtable
    /// installed for the slot.
    pub(crate) fn construct<T: Payload>(
        &mut self,
        slot: usize,
        value: T,
        type_id: MsgTypeId,
    ) -> PayloadVTable {
        debug_assert!(self.state.occupied[slot]);
        debug_assert!(std::mem::size_of::<T>() <= self.slab.slot_size);
        let header = self.slab.header(slot);
        debug_assert_eq!(header.refcount.load(Relaxed), 0);

        // Safety: the slot is occupied by us, has no handles, is SLOT_ALIGN
        // aligned and large enough for T (checked by `check_fits`).
        let vtable = PayloadVTable::of::<T>();
        unsafe {
            ptr::write(self.slab.slot_ptr(slot) as *mut T, value);
            *header.vtable.get() = Some(vtable);
        }
        header.type_id.store(type_id, Relaxed);
        header.generation.fetch_add(1, Relaxed);
        vtable
    }

    /// Drop the payload in place, zero the slot and mark it free.
    ///
    /// Returns false (and leaves the slot alone) if the slot is free or a
    /// handle to it is still alive.
    pub fn release(&mut self, slot: usize) -> bool {
        if slot >= self.slab.slot_count || !self.state.occupied[slot] {
            log::warn!("MessageSlab::release(): slot {} is not occupied", slot);
            return false;
        }
        let refs = self.slab.header(slot).refcount.load(Acquire);
        if refs > 0 {
            log::warn!(
                "MessageSlab::release(): slot {} is still referenced by {} handles",
                slot,
                refs
            );
            return false;
        }
        self.state.live.retain(|&s| s != slot);
        self.release_unchecked(slot);
        true
    }

    /// Mark `slot` free, then drop its payload in place and zero it.
    ///
    /// The caller has already removed `slot` from `live`. Bookkeeping is done
    /// before the payload destructor runs, so a panicking `Drop` leaves the
    /// slab consistent (the slot is free, its bytes are left as they are).
    fn release_unchecked(&mut self, slot: usize) {
        let header = self.slab.header(slot);
        self.state.occupied[slot] = false;
        header.type_id.store(0, Relaxed);
        // Safety: we hold the lock and the slot has no handles left
        unsafe {
            if let Some(vtable) = (*header.vtable.get()).take() {
                (vtable.drop_in_place)(self.slab.slot_ptr(slot));
            }
            ptr::write_bytes(self.slab.slot_ptr(slot), 0, self.slab.slot_stride);
        }
    }

    /// Release every tracked slot whose reference count is zero.
    ///
    /// Returns the number of slots released.
    pub fn sweep(&mut self) -> usize {
        let mut released = 0;
        let mut index = 0;
        while index < self.state.live.len() {
            let slot = self.state.live[index];
            // Pairs with the release decrement in MessageHandle::drop
            if self.slab.header(slot).refcount.load(Acquire) == 0 {
                self.state.live.remove(index);
                released += 1;
                self.release_unchecked(slot);
            } else {
                index += 1;
            }
        }
        released
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.state.live.len()
    }

    /// Occupied slots whose payload has no handle left
    pub fn pending_sweep(&self) -> usize {
        self.state
            .live
            .iter()
            .filter(|&&slot| self.slab.header(slot).refcount.load(Acquire) == 0)
            .count()
    }

    /// True if `slot` is currently occupied
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.state.occupied.get(slot).copied().unwrap_or(false)
    }
}

impl Drop for MessageSlab {
    fn drop(&mut self) {
        // No handle can exist here: every handle keeps the owning bus alive.
        let released = self.lock().sweep();
        let leaked = self.state.get_mut().live.len();
        if leaked > 0 {
            log::error!(
                "MessageSlab dropped with {} referenced payloads, skipping their destructors",
                leaked
            );
        }
        log::trace!("MessageSlab dropped, released {} payloads", released);
        // Safety: allocated in `new` with this exact layout
        unsafe { dealloc(self.storage.as_ptr(), self.layout) };
    }
}

// Implement Send + Sync since we manage synchronization internally
unsafe impl Send for MessageSlab {}
unsafe impl Sync for MessageSlab {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob([u8; 32]);
    impl Payload for Blob {}

    struct Huge([u8; 128]);
    impl Payload for Huge {}

    #[test]
    fn slot_conservation() {
        let slab = MessageSlab::new(64, 2).unwrap();
        let mut guard = slab.lock();
        let a = guard.allocate().unwrap();
        let b = guard.allocate().unwrap();
        assert_ne!(a, b);
        assert_eq!(guard.allocate(), Err(BusError::BufferFull { slot_count: 2 }));
        assert_eq!(guard.occupied(), 2);
    }

    #[test]
    fn sweep_releases_unreferenced_slots() {
        let slab = MessageSlab::new(64, 2).unwrap();
        let mut guard = slab.lock();
        let slot = guard.allocate().unwrap();
        guard.construct(slot, Blob([7; 32]), 3);
        assert_eq!(guard.pending_sweep(), 1);
        assert_eq!(guard.sweep(), 1);
        assert!(!guard.is_occupied(slot));
        assert_eq!(slab.header(slot).type_id.load(Relaxed), 0);
        // Zeroed on release
        let bytes = unsafe { std::slice::from_raw_parts(slab.slot_ptr(slot), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn construct_returns_the_installed_vtable() {
        let slab = MessageSlab::new(64, 1).unwrap();
        let mut guard = slab.lock();
        let slot = guard.allocate().unwrap();
        let vtable = guard.construct(slot, Blob([5; 32]), 2);
        assert_eq!(vtable.rust_type, std::any::TypeId::of::<Blob>());
        let installed = unsafe { (*slab.header(slot).vtable.get()).map(|v| v.rust_type) };
        assert_eq!(installed, Some(vtable.rust_type));
        assert_eq!(slab.header(slot).generation.load(Relaxed), 1);
    }

    #[test]
    fn referenced_slots_survive_sweep() {
        let slab = MessageSlab::new(64, 1).unwrap();
        let mut guard = slab.lock();
        let slot = guard.allocate().unwrap();
        guard.construct(slot, Blob([1; 32]), 1);
        slab.header(slot).refcount.fetch_add(1, Relaxed);
        assert_eq!(guard.sweep(), 0);
        assert!(guard.is_occupied(slot));
        slab.header(slot).refcount.fetch_sub(1, Relaxed);
        assert_eq!(guard.sweep(), 1);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let slab = MessageSlab::new(64, 1).unwrap();
        assert!(slab.check_fits::<Blob>().is_ok());
        assert!(matches!(
            slab.check_fits::<Huge>(),
            Err(BusError::PayloadTooLarge { size: 128, slot_size: 64, .. })
        ));
    }

    #[test]
    fn zero_sized_configuration_is_rejected() {
        assert!(matches!(MessageSlab::new(0, 4), Err(BusError::InvalidConfig(_))));
        assert!(matches!(MessageSlab::new(64, 0), Err(BusError::InvalidConfig(_))));
    }

    #[test]
    fn release_of_free_slot_is_a_no_op() {
        let slab = MessageSlab::new(16, 1).unwrap();
        let mut guard = slab.lock();
        assert!(!guard.release(0));
        assert!(!guard.release(99));
        assert_eq!(guard.occupied(), 0);
    }

    #[test]
    fn release_refuses_referenced_slots() {
        let slab = MessageSlab::new(64, 1).unwrap();
        let mut guard = slab.lock();
        let slot = guard.allocate().unwrap();
        guard.construct(slot, Blob([3; 32]), 1);
        slab.header(slot).refcount.fetch_add(1, Relaxed);
        assert!(!guard.release(slot));
        assert!(guard.is_occupied(slot));
        slab.header(slot).refcount.fetch_sub(1, Relaxed);
        assert!(guard.release(slot));
        assert_eq!(guard.occupied(), 0);
    }
}
