use super::*;
use std::fmt;

// Debug proxy implementation that calls the standalone debug function
impl fmt::Debug for MessageSlab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_message_slab(self, f)
    }
}
