// Built-in payload kinds and the name-keyed factory used to publish from text

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

use crate::Bus::bus::MessageBus;
use crate::Bus::Message::{Payload, TextPayload};
use crate::Core::error::{BusError, Result};
use crate::Core::registry::MsgTypeId;

/// Message without data, e.g. `exit`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EmptyMessage;

/// Message carrying a 64-bit integer
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntMessage(pub i64);

/// Message carrying a 64-bit float
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RealMessage(pub f64);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector2Message(pub [f32; 2]);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3Message(pub [f32; 3]);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector4Message(pub [f32; 4]);

/// Message carrying an owned string. Only the `String` header lives in the slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringMessage(pub String);

impl Payload for EmptyMessage {}

impl TextPayload for EmptyMessage {
    fn parse_text(_text: &str) -> std::result::Result<Self, String> {
        Ok(EmptyMessage)
    }
}

impl Payload for IntMessage {
    fn write_text(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "{}", self.0)
    }
}

impl TextPayload for IntMessage {
    fn parse_text(text: &str) -> std::result::Result<Self, String> {
        text.trim().parse().map(IntMessage).map_err(|e| e.to_string())
    }
}

impl Payload for RealMessage {
    fn write_text(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "{}", self.0)
    }
}

impl TextPayload for RealMessage {
    fn parse_text(text: &str) -> std::result::Result<Self, String> {
        text.trim().parse().map(RealMessage).map_err(|e| e.to_string())
    }
}

impl Payload for StringMessage {
    fn write_text(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        out.write_str(&self.0)
    }
}

impl TextPayload for StringMessage {
    fn parse_text(text: &str) -> std::result::Result<Self, String> {
        Ok(StringMessage(text.trim().to_string()))
    }
}

fn parse_components<const N: usize>(text: &str) -> std::result::Result<[f32; N], String> {
    let mut out = [0.0f32; N];
    let mut parts = text.split_whitespace();
    for (i, slot) in out.iter_mut().enumerate() {
        let part = parts
            .next()
            .ok_or_else(|| format!("expected {} components, got {}", N, i))?;
        *slot = part
            .parse()
            .map_err(|e| format!("component {} (`{}`): {}", i, part, e))?;
    }
    if parts.next().is_some() {
        return Err(format!("expected {} components, got more", N));
    }
    Ok(out)
}

fn write_components(out: &mut dyn fmt::Write, values: &[f32]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.write_char(' ')?;
        }
        write!(out, "{}", v)?;
    }
    Ok(())
}

macro_rules! vector_payload {
    ($name:ident, $n:literal) => {
        impl Payload for $name {
            fn write_text(&self, out: &mut dyn fmt::Write) -> fmt::Result {
                write_components(out, &self.0)
            }
        }

        impl TextPayload for $name {
            fn parse_text(text: &str) -> std::result::Result<Self, String> {
                parse_components::<$n>(text).map($name)
            }
        }
    };
}

vector_payload!(Vector2Message, 2);
vector_payload!(Vector3Message, 3);
vector_payload!(Vector4Message, 4);

type PublishFn = fn(&MessageBus, MsgTypeId, &str, &str) -> Result<()>;

fn publish_parsed<T: TextPayload>(
    bus: &MessageBus,
    type_id: MsgTypeId,
    kind: &str,
    text: &str,
) -> Result<()> {
    let value = T::parse_text(text).map_err(|message| {
        log::warn!("failed to parse `{}` payload from {:?}: {}", kind, text, message);
        BusError::parse(kind, message)
    })?;
    bus.publish(type_id, value)
}

/// Payload kinds that can be created by name from text.
///
/// Keyed by kind name (`"int"`, `"vector3"`, ...), independent of the
/// message type a payload is published under.
pub struct PayloadFactory {
    entries: RwLock<HashMap<String, PublishFn>>,
}

impl PayloadFactory {
    /// Factory without any kind registered
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Factory with the built-in kinds registered
    pub fn with_builtins() -> Self {
        let factory = Self::new();
        factory.register::<EmptyMessage>("empty");
        factory.register::<IntMessage>("int");
        factory.register::<RealMessage>("real");
        factory.register::<Vector2Message>("vector2");
        factory.register::<Vector3Message>("vector3");
        factory.register::<Vector4Message>("vector4");
        factory.register::<StringMessage>("string");
        factory
    }

    /// Register `T` under `kind`. Returns false (and keeps the existing
    /// entry) if the name is already taken.
    pub fn register<T: TextPayload>(&self, kind: &str) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(kind) {
            log::warn!(
                "failed to register payload kind, there is already another entry with the same name (\"{}\")",
                kind
            );
            return false;
        }
        entries.insert(kind.to_string(), publish_parsed::<T>);
        true
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.read().contains_key(kind)
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.entries.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub(crate) fn publisher(&self, kind: &str) -> Result<PublishFn> {
        self.entries.read().get(kind).copied().ok_or_else(|| {
            log::warn!("failed to create message, unknown payload kind \"{}\"", kind);
            BusError::UnknownPayload(kind.to_string())
        })
    }
}

impl Default for PayloadFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}
