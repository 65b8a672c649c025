// src/fabric.rs
//! Software model of the AXI-Stream FIFO sitting between the feed front-end
//! and the host processor: a bounded queue of byte chunks with backpressure
//! and flow-control accounting.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default FIFO depth in bytes. In hardware this would be the BRAM
/// allocation for the stream FIFO; 512B-4KB is typical for low latency.
pub const DEFAULT_FIFO_DEPTH: usize = 4096;

/// Flow-control counters, reset on demand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FifoStats {
    /// Number of writes rejected because the FIFO was full.
    pub backpressure_events: u64,
    pub total_bytes_written: u64,
    pub total_bytes_dropped: u64,
    pub total_bytes_read: u64,
    /// High-water mark of the occupancy in bytes.
    pub max_depth_reached: usize,
}

#[derive(Default)]
struct Inner {
    chunks: VecDeque<Bytes>,
    depth_bytes: usize,
    stats: FifoStats,
}

/// Bounded producer/consumer byte channel.
///
/// A write is accepted whole or rejected whole: if the chunk would push the
/// occupancy past `max_depth_bytes` the write returns `false` and the chunk
/// is counted as dropped. Rejection is the backpressure signal to the
/// producer, not an error.
///
/// One logical producer, one consumer. The mutex exists to give both ends a
/// shared `&self` API behind an `Arc`; the usage contract stays
/// single-writer / single-reader.
pub struct ChunkFifo {
    max_depth_bytes: usize,
    inner: Mutex<Inner>,
}

impl ChunkFifo {
    /// `max_depth_bytes` must be at least 1.
    pub fn new(max_depth_bytes: usize) -> Self {
        assert!(max_depth_bytes >= 1, "fifo depth must be at least 1 byte");
        Self {
            max_depth_bytes,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Enqueue a chunk. Returns `false` and asserts backpressure when the
    /// chunk does not fit; the chunk is never partially accepted.
    pub fn write_chunk(&self, chunk: Bytes) -> bool {
        let mut g = self.inner.lock().expect("fifo mutex");
        if g.depth_bytes + chunk.len() > self.max_depth_bytes {
            g.stats.backpressure_events += 1;
            g.stats.total_bytes_dropped += chunk.len() as u64;
            return false;
        }
        g.depth_bytes += chunk.len();
        g.stats.total_bytes_written += chunk.len() as u64;
        if g.depth_bytes > g.stats.max_depth_reached {
            g.stats.max_depth_reached = g.depth_bytes;
        }
        g.chunks.push_back(chunk);
        true
    }

    /// Dequeue the oldest chunk, or `None` when the FIFO is empty.
    pub fn read_chunk(&self) -> Option<Bytes> {
        let mut g = self.inner.lock().expect("fifo mutex");
        let chunk = g.chunks.pop_front()?;
        g.depth_bytes -= chunk.len();
        g.stats.total_bytes_read += chunk.len() as u64;
        Some(chunk)
    }

    pub fn empty(&self) -> bool {
        self.inner.lock().expect("fifo mutex").chunks.is_empty()
    }

    pub fn full(&self) -> bool {
        self.depth_bytes() >= self.max_depth_bytes
    }

    /// Current occupancy in bytes.
    pub fn depth_bytes(&self) -> usize {
        self.inner.lock().expect("fifo mutex").depth_bytes
    }

    pub fn available_bytes(&self) -> usize {
        self.max_depth_bytes - self.depth_bytes()
    }

    pub fn utilization(&self) -> f32 {
        self.depth_bytes() as f32 / self.max_depth_bytes as f32
    }

    pub fn stats(&self) -> FifoStats {
        self.inner.lock().expect("fifo mutex").stats
    }

    pub fn reset_stats(&self) {
        self.inner.lock().expect("fifo mutex").stats = FifoStats::default();
    }
}
