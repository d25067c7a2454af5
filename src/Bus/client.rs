// Lifecycle contract for engine systems that talk over the bus

use std::ops::{Deref, DerefMut};

use crate::Bus::bus::MessageBus;
use crate::Bus::listener::MessageListener;

/// An engine system (core loop, terminal, input, ...) living on a bus.
///
/// `on_attach` runs once when the system is attached and is where it
/// subscribes; `on_detach` runs once before its listener is torn down.
pub trait BusClient {
    fn on_attach(&mut self, listener: &MessageListener);

    fn on_detach(&mut self, _listener: &MessageListener) {}
}

/// A `BusClient` together with its listener.
///
/// Detaching happens exactly once, either through `detach` or on drop, so a
/// client can never be destroyed while still attached.
pub struct Attached<C: BusClient> {
    client: Option<C>,
    listener: MessageListener,
}

impl<C: BusClient> Attached<C> {
    pub(crate) fn new(bus: &MessageBus, mut client: C) -> Self {
        let listener = MessageListener::attach(bus);
        client.on_attach(&listener);
        Self {
            client: Some(client),
            listener,
        }
    }

    /// The listener owned on behalf of the client
    pub fn listener(&self) -> &MessageListener {
        &self.listener
    }

    /// Split-borrow the client and its listener, typically to drain the inbox
    /// from the client's update step.
    pub fn parts(&mut self) -> (&mut C, &MessageListener) {
        match self.client.as_mut() {
            Some(client) => (client, &self.listener),
            // `client` is only taken by `detach`, which consumes self
            None => unreachable!("client already detached"),
        }
    }

    /// Run `on_detach`, drop the listener and hand the client back.
    pub fn detach(mut self) -> C {
        self.run_detach()
            .unwrap_or_else(|| unreachable!("client already detached"))
    }

    fn run_detach(&mut self) -> Option<C> {
        let mut client = self.client.take()?;
        client.on_detach(&self.listener);
        self.listener.unsubscribe_from_all();
        Some(client)
    }
}

impl<C: BusClient> Deref for Attached<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match self.client.as_ref() {
            Some(client) => client,
            None => unreachable!("client already detached"),
        }
    }
}

impl<C: BusClient> DerefMut for Attached<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.parts().0
    }
}

impl<C: BusClient> Drop for Attached<C> {
    fn drop(&mut self) {
        if self.run_detach().is_some() {
            log::debug!("bus client detached on drop (listener {})", self.listener.id());
        }
    }
}
