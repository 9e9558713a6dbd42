use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::double_buffer::DoubleBuffer;
use crate::net::Packet;

/// Transports hold clones and may enqueue from any thread.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    inner: Arc<Mutex<DoubleBuffer<Packet>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, packet: Packet) {
        self.lock().enqueue(packet);
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending_len()
    }

    pub(crate) fn swap_and_take(&self) -> VecDeque<Packet> {
        self.lock().swap_and_drain().collect()
    }

    pub fn same_queue(&self, other: &Inbox) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, DoubleBuffer<Packet>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
