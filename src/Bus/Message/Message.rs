// Payload contract and the reference-counting handle to a resident payload

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::layout::PayloadVTable;
use crate::Bus::bus::BusShared;

/// A value that can travel on the bus.
///
/// Payloads are written in place into a slab slot by the publish path and
/// are dropped in place by a sweep once every handle is gone. They are
/// shared read-only between listeners, hence `Send + Sync`.
///
/// A payload's `Drop` runs inside a sweep and must not publish or sweep.
pub trait Payload: Any + Send + Sync {
    /// Writes a textual rendering of the payload. Empty by default.
    fn write_text(&self, _out: &mut dyn fmt::Write) -> fmt::Result {
        Ok(())
    }
}

/// A payload kind that can be created from text by name (see `PayloadFactory`).
pub trait TextPayload: Payload + Sized {
    /// Parses the textual form written by `Payload::write_text`.
    fn parse_text(text: &str) -> Result<Self, String>;
}

/// Reference-counted view of a payload resident in the bus slab.
///
/// While at least one handle exists the payload is neither destroyed nor is
/// its slot reused. Cloning increments the slot's count, dropping decrements
/// it; reclamation itself is deferred to `MessageBus::sweep`.
///
/// The absence of a message is `Option::<MessageHandle>::None`; there is no
/// null handle.
pub struct MessageHandle {
    pub(crate) shared: Arc<BusShared>,
    pub(crate) slot: usize,
    pub(crate) generation: u64,
    pub(crate) vtable: PayloadVTable,
}
