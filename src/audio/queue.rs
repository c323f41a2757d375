//! Hand-off queue between the capture callback and consumer threads.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::chunk::AudioChunk;

/// Unbounded FIFO of audio chunks.
///
/// `push` never blocks, so it is safe to call from the capture callback.
/// `pop` blocks up to its timeout and then returns `None`, which lets
/// consumer loops observe a cancellation token between waits without
/// busy-spinning.
///
/// Each consumer owns its own queue; a producer feeding two consumers pushes
/// into both. A single queue drained by two consumers would split the stream
/// between them.
#[derive(Clone, Default)]
pub struct ChunkQueue {
    inner: Arc<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    chunks: Mutex<VecDeque<AudioChunk>>,
    condvar: Condvar,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: AudioChunk) {
        let mut chunks = self.inner.chunks.lock().unwrap();
        chunks.push_back(chunk);
        self.inner.condvar.notify_one();
    }

    /// Pop the next chunk in push order, waiting up to `timeout`.
    pub fn pop(&self, timeout: Duration) -> Option<AudioChunk> {
        let deadline = Instant::now() + timeout;
        let mut chunks = self.inner.chunks.lock().unwrap();
        loop {
            if let Some(chunk) = chunks.pop_front() {
                return Some(chunk);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .inner
                .condvar
                .wait_timeout(chunks, deadline - now)
                .unwrap();
            chunks = guard;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.chunks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
