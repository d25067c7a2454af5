// Message type registry: bidirectional name <-> dense id map

use crate::Core::error::{BusError, Result};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Dense integer identifier of a message type.
pub type MsgTypeId = usize;

/// Reserved id meaning "every message type". Never assigned to a name.
pub const WILDCARD: MsgTypeId = 0;

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<TypeRegistry> = Arc::new(TypeRegistry::new());
}

struct RegistryInner {
    by_name: HashMap<String, MsgTypeId>,
    /// `names[id - 1]` is the name of `id`
    names: Vec<String>,
}

/// Maps message type names to small dense ids, assigning ids on first use.
///
/// Ids start at 1 and grow monotonically; they are never reclaimed for the
/// lifetime of the registry. Lookups from any thread are safe.
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_name: HashMap::new(),
                names: Vec::new(),
            }),
        }
    }

    /// The process-wide registry shared by buses built without their own.
    pub fn global() -> Arc<TypeRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Returns the id of `name`, assigning the next free id if the name is new.
    pub fn name_to_id(&self, name: &str) -> MsgTypeId {
        if let Some(&id) = self.inner.read().by_name.get(name) {
            return id;
        }

        let mut inner = self.inner.write();
        // Another writer may have won the race between the two locks
        if let Some(&id) = inner.by_name.get(name) {
            return id;
        }
        inner.names.push(name.to_string());
        let id = inner.names.len();
        inner.by_name.insert(name.to_string(), id);
        log::debug!("registered message type \"{}\" as id {}", name, id);
        id
    }

    /// Reverse lookup of an assigned id.
    pub fn id_to_name(&self, id: MsgTypeId) -> Result<String> {
        let inner = self.inner.read();
        match id.checked_sub(1).and_then(|index| inner.names.get(index)) {
            Some(name) => Ok(name.clone()),
            None => {
                log::warn!(
                    "failed to get message type name from type id, this message type doesn't exist ({})",
                    id
                );
                Err(BusError::UnknownType(id))
            }
        }
    }

    /// Looks a name up without assigning an id.
    pub fn lookup(&self, name: &str) -> Option<MsgTypeId> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Number of assigned ids
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that names a message type: a raw id or a type name.
pub trait IntoTypeId {
    /// Resolves to an id, assigning one to a new name.
    fn into_type_id(self, registry: &TypeRegistry) -> MsgTypeId;

    /// Resolves to an id without assigning; `None` for a name never seen.
    fn lookup_type_id(self, registry: &TypeRegistry) -> Option<MsgTypeId>;
}

impl IntoTypeId for MsgTypeId {
    fn into_type_id(self, _registry: &TypeRegistry) -> MsgTypeId {
        self
    }

    fn lookup_type_id(self, _registry: &TypeRegistry) -> Option<MsgTypeId> {
        Some(self)
    }
}

impl IntoTypeId for &str {
    fn into_type_id(self, registry: &TypeRegistry) -> MsgTypeId {
        registry.name_to_id(self)
    }

    fn lookup_type_id(self, registry: &TypeRegistry) -> Option<MsgTypeId> {
        registry.lookup(self)
    }
}

impl IntoTypeId for &String {
    fn into_type_id(self, registry: &TypeRegistry) -> MsgTypeId {
        registry.name_to_id(self)
    }

    fn lookup_type_id(self, registry: &TypeRegistry) -> Option<MsgTypeId> {
        registry.lookup(self)
    }
}

impl IntoTypeId for String {
    fn into_type_id(self, registry: &TypeRegistry) -> MsgTypeId {
        registry.name_to_id(&self)
    }

    fn lookup_type_id(self, registry: &TypeRegistry) -> Option<MsgTypeId> {
        registry.lookup(&self)
    }
}
