//! Typed, reference-counted, fixed-capacity publish/subscribe message bus.
//!
//! Payloads are written in place into the slots of a fixed-size slab and
//! shared with listeners through reference-counted handles. A slot is freed
//! by an explicit `MessageBus::sweep` once its last handle is dropped.

// Module naming follows project convention (PascalCase subsystem modules)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Bus;
#[allow(non_snake_case)]
mod Debug {
    pub mod StructDebug;
}

pub use Bus::Message::{MessageHandle, Payload, TextPayload};
pub use Bus::Structs::SubscriptionSet;
pub use Bus::{Attached, BusBuilder, BusClient, MessageBus, MessageListener};
pub use Core::{BusError, MsgTypeId, Result, TypeRegistry, WILDCARD};
