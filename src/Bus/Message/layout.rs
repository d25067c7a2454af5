use crossbeam_utils::CachePadded;
use std::any::TypeId;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize};

use super::Message::Payload;

/// Largest alignment a payload may require. Slot strides are rounded up to it.
pub const SLOT_ALIGN: usize = 16;

/// Alignment of the whole slab storage block.
pub const STORAGE_ALIGN: usize = 64;

/// Type-erased operations on the payload living in a slot.
///
/// Written once per construction while the slot has no handles; read by
/// handles afterwards.
#[derive(Clone, Copy)]
pub(crate) struct PayloadVTable {
    pub rust_type: TypeId,
    pub type_name: &'static str,
    pub drop_in_place: unsafe fn(*mut u8),
    pub as_dyn: unsafe fn(*const u8) -> *const dyn Payload,
}

impl PayloadVTable {
    pub fn of<T: Payload>() -> Self {
        Self {
            rust_type: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            drop_in_place: drop_erased::<T>,
            as_dyn: erase::<T>,
        }
    }
}

unsafe fn drop_erased<T>(ptr: *mut u8) {
    std::ptr::drop_in_place(ptr as *mut T);
}

unsafe fn erase<T: Payload>(ptr: *const u8) -> *const dyn Payload {
    ptr as *const T as *const dyn Payload
}

/// Per-slot bookkeeping kept beside (not inside) the payload bytes.
///
/// ### Lifecycle:
/// - `refcount` is touched by handles only; it starts at zero when the slot is
///   constructed and the payload may be released once it is back at zero.
/// - `type_id`, `generation` and `vtable` change only under the slab lock,
///   while no handle to the slot exists.
#[repr(C, align(64))]
pub struct SlotHeader {
    /// Live handles referencing the payload.
    pub refcount: CachePadded<AtomicUsize>,

    /// Message type id stamped at publish time.
    pub type_id: AtomicUsize,

    /// Bumped every time the slot is constructed, so a stale handle is detectable.
    pub generation: AtomicU64,

    pub(crate) vtable: UnsafeCell<Option<PayloadVTable>>,
}

impl SlotHeader {
    pub(crate) fn new() -> Self {
        Self {
            refcount: CachePadded::new(AtomicUsize::new(0)),
            type_id: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            vtable: UnsafeCell::new(None),
        }
    }
}

/// Rounds `size` up to a multiple of `SLOT_ALIGN`.
#[inline]
pub const fn slot_stride_for(size: usize) -> usize {
    (size + SLOT_ALIGN - 1) & !(SLOT_ALIGN - 1)
}
