//! Error types for bus operations

use crate::Core::registry::MsgTypeId;

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Recoverable failures reported by the bus.
///
/// None of these unwind the process: the operation that failed leaves the
/// bus unchanged and the caller decides whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// Every slot of the slab is occupied
    #[error("message buffer full: all {slot_count} slots are occupied")]
    BufferFull { slot_count: usize },

    /// Payload does not fit into a slot
    #[error(
        "payload `{type_name}` too large: {size} bytes (align {align}) exceeds slot of {slot_size} bytes (align {slot_align})"
    )]
    PayloadTooLarge {
        type_name: &'static str,
        size: usize,
        align: usize,
        slot_size: usize,
        slot_align: usize,
    },

    /// The type id was never assigned a name
    #[error("unknown message type id {0}")]
    UnknownType(MsgTypeId),

    /// Subscribe/unsubscribe request that conflicts with the wildcard state
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),

    /// The wildcard id is a subscription concept only
    #[error("cannot publish to the wildcard type id")]
    WildcardPublish,

    /// Checked downcast to the wrong payload type
    #[error("type mismatch: message holds `{actual}`, requested `{requested}`")]
    TypeMismatch {
        requested: &'static str,
        actual: &'static str,
    },

    /// No payload kind registered under this name
    #[error("unknown payload kind `{0}`")]
    UnknownPayload(String),

    /// Text could not be parsed into the requested payload kind
    #[error("failed to parse `{kind}` payload: {message}")]
    Parse { kind: String, message: String },

    /// Invalid bus construction parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BusError {
    pub(crate) fn parse(kind: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// True for conditions the caller may retry after a sweep
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BufferFull { .. })
    }
}
