pub mod alloc;
pub mod error;
pub mod registry;

pub use alloc::{MessageSlab, SlabGuard};
pub use error::{BusError, Result};
pub use registry::{IntoTypeId, MsgTypeId, TypeRegistry, WILDCARD};
