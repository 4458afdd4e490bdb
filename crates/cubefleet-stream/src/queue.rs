//! Bounded frame queue with drop-oldest overflow.
//!
//! Capture must never block on a slow network, so a full queue sheds its
//! oldest frame to admit the newest one. The dropped counter makes the
//! shedding observable.

use crate::frame::Frame;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::trace;

pub struct FrameQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

struct Inner {
    frames: VecDeque<Frame>,
    closed: bool,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame, shedding the oldest one if the queue is full.
    /// Never blocks. Frames pushed after [`close`](Self::close) are
    /// discarded.
    pub fn push(&self, frame: Frame) {
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            if inner.frames.len() == self.capacity
                && let Some(shed) = inner.frames.pop_front()
            {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(agent = %shed.agent, seq = shed.seq, "queue full, shedding oldest frame");
            }
            inner.frames.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Dequeue the oldest frame, waiting if the queue is empty. Returns
    /// `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<Frame> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.lock();
                if let Some(frame) = inner.frames.pop_front() {
                    return Some(frame);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop admitting frames and wake any waiting consumer. Frames already
    /// queued remain poppable.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Total frames shed since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
