//! Bounded, drop-oldest listener delivery.
//!
//! Each registered listener gets its own queue and consumer task, so a slow
//! callback only ever backs up its own queue — never the Packet Reader, and
//! never another listener. Overflow drops the oldest queued item and bumps
//! a counter that's surfaced in the `warn!` log line, per the documented
//! policy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;
use tokio::sync::Notify;

use crate::constants::LISTENER_QUEUE_DEPTH;

struct Queue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
    label: &'static str,
}

impl<T> Queue<T> {
    fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(VecDeque::with_capacity(LISTENER_QUEUE_DEPTH)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            label,
        })
    }

    fn push(&self, item: T) {
        let mut items = self.items.lock().expect("listener queue lock poisoned");
        if items.len() >= LISTENER_QUEUE_DEPTH {
            items.pop_front();
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "{} listener queue full (depth {}); dropped oldest entry ({} total)",
                self.label, LISTENER_QUEUE_DEPTH, total
            );
        }
        items.push_back(item);
        drop(items);
        self.notify.notify_one();
    }

    async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut items = self.items.lock().expect("listener queue lock poisoned");
                if let Some(item) = items.pop_front() {
                    return Some(item);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Handle returned by a listener registration method.
///
/// Deregistering is idempotent: calling it more than once has no further
/// effect.
#[derive(Clone)]
pub struct ListenerHandle {
    id: u64,
    close: Arc<dyn Fn() + Send + Sync>,
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

impl ListenerHandle {
    /// Stop delivering to this listener and let its consumer task exit once
    /// its queue drains.
    pub fn deregister(&self) {
        (self.close)();
    }

    /// The opaque identity of this registration.
    pub fn id(&self) -> u64 {
        self.id
    }
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// A registry of listeners for one entity class, sharing a delivery label
/// used in overflow log lines (e.g. `"door"`, `"event"`).
pub(crate) struct Registry<T> {
    label: &'static str,
    slots: Mutex<Vec<(u64, Arc<Queue<T>>)>>,
}

impl<T: Clone + Send + 'static> Registry<T> {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Register `callback` and spawn its consumer task. Returns a handle
    /// usable for deregistration.
    pub(crate) fn register<F>(&self, mut callback: F) -> ListenerHandle
    where
        F: FnMut(T) + Send + 'static,
    {
        let queue = Queue::new(self.label);
        let consumer_queue = Arc::clone(&queue);
        tokio::spawn(async move {
            while let Some(item) = consumer_queue.recv().await {
                callback(item);
            }
        });

        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        self.slots
            .lock()
            .expect("listener registry lock poisoned")
            .push((id, Arc::clone(&queue)));

        ListenerHandle {
            id,
            close: Arc::new(move || queue.close()),
        }
    }

    /// Push `item` to every still-open listener, reaping closed slots.
    ///
    /// Never awaits — safe to call from the Packet Reader.
    pub(crate) fn dispatch(&self, item: T) {
        let mut slots = self.slots.lock().expect("listener registry lock poisoned");
        slots.retain(|(_, queue)| !queue.is_closed());
        for (_, queue) in slots.iter() {
            queue.push(item.clone());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().expect("listener registry lock poisoned").len()
    }
}
