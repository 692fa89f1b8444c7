//! # State Channel
//!
//! Single-slot, multi-observer cell holding the live [`ControllerHandle`] or
//! nothing.
//!
//! The connection proxy is the only writer. Any number of observers may
//! subscribe at any time; each one first receives the value in the slot at
//! subscription time and then every later publish, in order.
//!
//! ```rust,no_run
//! use core_playback::StateChannel;
//! use futures::StreamExt;
//!
//! # async fn example(channel: StateChannel) {
//! let mut updates = channel.observe().into_stream().boxed();
//! while let Some(slot) = updates.next().await {
//!     match slot {
//!         Some(controller) => println!("connected to {}", controller.instance_id()),
//!         None => println!("no playback service"),
//!     }
//! }
//! # }
//! ```

use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, trace};

use crate::controller::ControllerHandle;

const OBSERVER_BUFFER: usize = 16;

type Slot = Option<ControllerHandle>;

struct Inner {
    slot: Slot,
    sender: broadcast::Sender<Slot>,
}

/// Cloning yields another handle to the same slot.
#[derive(Clone)]
pub struct StateChannel {
    inner: Arc<Mutex<Inner>>,
}

impl StateChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(OBSERVER_BUFFER);
        Self {
            inner: Arc::new(Mutex::new(Inner { slot: None, sender })),
        }
    }

    /// Replace the slot and notify observers.
    ///
    /// Returns `false` when `value` is identical to the current slot (same
    /// service instance, or absent over absent); nothing is delivered then.
    pub fn publish(&self, value: Slot) -> bool {
        let mut inner = self.inner.lock();
        if inner.slot == value {
            trace!("Suppressing identical state channel publish");
            return false;
        }

        debug!(
            instance_id = ?value.as_ref().map(ControllerHandle::instance_id),
            "Publishing controller"
        );
        inner.slot = value.clone();
        // No observers is fine; the slot still holds the value.
        let _ = inner.sender.send(value);
        true
    }

    pub fn current(&self) -> Slot {
        self.inner.lock().slot.clone()
    }

    /// Subscribe. The current slot value is the observer's first item.
    pub fn observe(&self) -> StateObserver {
        let inner = self.inner.lock();
        StateObserver {
            pending: Some(inner.slot.clone()),
            receiver: inner.sender.subscribe(),
            channel: Arc::clone(&self.inner),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().sender.receiver_count()
    }
}

impl Default for StateChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateChannel")
            .field("slot", &self.current())
            .finish()
    }
}

/// One observer of a [`StateChannel`]. The sequence never ends.
pub struct StateObserver {
    pending: Option<Slot>,
    receiver: broadcast::Receiver<Slot>,
    channel: Arc<Mutex<Inner>>,
}

impl StateObserver {
    /// Next slot value.
    pub async fn next(&mut self) -> Slot {
        if let Some(value) = self.pending.take() {
            return value;
        }

        loop {
            match self.receiver.recv().await {
                Ok(value) => return value,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "State observer lagged, resynchronizing");
                    return self.resync();
                }
                // Unreachable while we hold the channel, but resubscribing
                // keeps the sequence infinite.
                Err(RecvError::Closed) => {
                    self.resync();
                }
            }
        }
    }

    /// Next slot value if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<Slot> {
        if let Some(value) = self.pending.take() {
            return Some(value);
        }

        match self.receiver.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Lagged(_)) => Some(self.resync()),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Slot> + Send {
        futures::stream::unfold(self, |mut observer| async move {
            let value = observer.next().await;
            Some((value, observer))
        })
    }

    /// Skip whatever is buffered and restart from the current slot.
    fn resync(&mut self) -> Slot {
        let inner = self.channel.lock();
        self.receiver = inner.sender.subscribe();
        inner.slot.clone()
    }
}
