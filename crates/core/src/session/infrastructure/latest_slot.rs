//! Single-slot handoff between two threads with a drop-oldest-pending policy.
//!
//! The sending side never blocks: when the slot still holds an item the
//! receiver has not picked up, that item is evicted and replaced.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

/// Outcome of [`SlotSender::offer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    Delivered,
    /// The slot held an unconsumed item, which was dropped.
    ReplacedStale,
}

pub struct SlotSender<T> {
    tx: Sender<T>,
    // Keeps a receiver on the sending side so stale items can be evicted.
    evict: Receiver<T>,
}

pub struct SlotReceiver<T> {
    rx: Receiver<T>,
}

pub fn latest_slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        SlotSender {
            tx,
            evict: rx.clone(),
        },
        SlotReceiver { rx },
    )
}

impl<T> SlotSender<T> {
    pub fn offer(&self, item: T) -> Offer {
        let mut item = item;
        let mut outcome = Offer::Delivered;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return outcome,
                Err(TrySendError::Full(back)) => {
                    if self.evict.try_recv().is_ok() {
                        outcome = Offer::ReplacedStale;
                    }
                    item = back;
                }
                // Unreachable while `evict` is alive; treat as delivered.
                Err(TrySendError::Disconnected(_)) => return outcome,
            }
        }
    }
}

impl<T> SlotReceiver<T> {
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.rx.try_recv()
    }
}

impl<T> Clone for SlotReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}
