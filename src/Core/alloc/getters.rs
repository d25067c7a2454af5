use super::*;

/// Read-only accessors on MessageSlab
///
/// These take the slab lock briefly where occupancy is involved, so the
/// values are snapshots and may be stale as soon as they are returned.
impl MessageSlab {
    /// Usable bytes per slot (the largest payload accepted)
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Distance in bytes between two consecutive slots
    pub fn slot_stride(&self) -> usize {
        self.slot_stride
    }

    /// Total number of slots
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Number of slots currently holding a payload
    pub fn occupied_slots(&self) -> usize {
        self.lock().occupied()
    }

    /// Number of slots available for allocation
    pub fn free_slots(&self) -> usize {
        self.slot_count - self.occupied_slots()
    }

    /// Occupied slots whose payload is waiting for a sweep
    pub fn pending_sweep(&self) -> usize {
        self.lock().pending_sweep()
    }

    /// Total bytes of payload storage
    pub fn storage_bytes(&self) -> usize {
        self.layout.size()
    }

    /// Raw pointer to the start of the slot storage, for diagnostics only
    pub fn storage_ptr(&self) -> *const u8 {
        self.storage.as_ptr()
    }
}
