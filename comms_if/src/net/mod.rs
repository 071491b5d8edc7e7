//! # Network Module
//!
//! In-process publish/subscribe distribution of messages. The arm core never
//! returns responses to its caller directly: it publishes them on a bus and
//! every subscriber (console, log archive, transport bridge) receives its
//! own copy over a `std::sync::mpsc` channel.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::tc::TcResponse;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A one-to-many message bus.
///
/// Subscribers whose receiver has been dropped are pruned on the next publish.
pub struct Bus<T: Clone> {
    subscribers: Vec<Sender<T>>,
}

/// The bus carrying telecommand responses.
pub type ResponseBus = Bus<TcResponse>;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: Clone> Bus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a new subscriber, returning the receiving end of its channel.
    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Send a copy of `msg` to every live subscriber.
    ///
    /// Returns the number of subscribers the message was delivered to.
    pub fn publish(&mut self, msg: T) -> usize {
        self.subscribers.retain(|tx| tx.send(msg.clone()).is_ok());

        trace!("Published message to {} subscribers", self.subscribers.len());

        self.subscribers.len()
    }

    /// Number of subscribers registered at the last publish.
    pub fn num_subscribers(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: Clone> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}
