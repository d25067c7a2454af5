mod builder;
pub(crate) mod bus;
mod client;
pub(crate) mod listener;

pub use builder::{BusBuilder, DEFAULT_SLOT_COUNT, DEFAULT_SLOT_SIZE};
pub use bus::MessageBus;
pub use client::{Attached, BusClient};
pub use listener::MessageListener;

#[allow(non_snake_case)]
pub mod Message {
    #[allow(clippy::module_inception)]
    pub mod Message;
    pub mod Message_impl;
    pub mod layout;
    pub use Message::{MessageHandle, Payload, TextPayload}; // re-export for stable path
}

#[allow(non_snake_case)]
pub mod Structs {
    pub mod Payload_Structs;
    pub mod Subscription_Structs;
    pub use Payload_Structs::{
        EmptyMessage, IntMessage, PayloadFactory, RealMessage, StringMessage, Vector2Message,
        Vector3Message, Vector4Message,
    };
    pub use Subscription_Structs::SubscriptionSet; // re-export for stable path
}
