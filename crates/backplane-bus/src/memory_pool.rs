//! # Buffer Pool
//!
//! Tiered allocator reused by the serialization path so that publishing does
//! not allocate a fresh buffer per message.
//!
//! ## Tiers
//!
//! | Element | Size | Retained |
//! |---------|------|----------|
//! | byte | 1024 | 256 |
//! | byte | 2048 | 64 |
//! | char | 128 | 256 |
//!
//! A rented buffer has exactly its tier's length, which may exceed the
//! request. Requests larger than every tier get a fresh buffer of exactly the
//! requested length that is never pooled. Size 0 returns an empty buffer that
//! owns no allocation.
//!
//! A buffer goes back to the tier whose size equals its length; any other
//! length is dropped.

use std::io;

use parking_lot::Mutex;
use tracing::trace;

use backplane_telemetry::BUFFER_POOL_RENTS;

/// `(size, max_retained)` byte tiers.
pub const BYTE_TIERS: &[(usize, usize)] = &[(1024, 256), (2048, 64)];

/// `(size, max_retained)` char tiers.
pub const CHAR_TIERS: &[(usize, usize)] = &[(128, 256)];

/// One size class of reusable buffers.
#[derive(Debug)]
struct BufferTier<T> {
    size: usize,
    max_retained: usize,
    idle: Mutex<Vec<Vec<T>>>,
}

impl<T: Copy + Default> BufferTier<T> {
    fn new(size: usize, max_retained: usize) -> Self {
        Self {
            size,
            max_retained,
            idle: Mutex::new(Vec::new()),
        }
    }

    fn rent(&self) -> (Vec<T>, bool) {
        match self.idle.lock().pop() {
            Some(buffer) => (buffer, true),
            None => (vec![T::default(); self.size], false),
        }
    }

    fn give_back(&self, buffer: Vec<T>) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_retained {
            idle.push(buffer);
        }
    }

    fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Pool of buffers for one element type, backed by a table of tiers sorted
/// by size.
#[derive(Debug)]
pub struct TieredPool<T> {
    element: &'static str,
    tiers: Vec<BufferTier<T>>,
}

impl<T: Copy + Default> TieredPool<T> {
    /// Build a pool from `(size, max_retained)` pairs.
    #[must_use]
    pub fn new(element: &'static str, tiers: &[(usize, usize)]) -> Self {
        let mut tiers: Vec<BufferTier<T>> = tiers
            .iter()
            .filter(|(size, _)| *size > 0)
            .map(|&(size, max_retained)| BufferTier::new(size, max_retained))
            .collect();
        tiers.sort_by_key(|tier| tier.size);
        tiers.dedup_by_key(|tier| tier.size);
        Self { element, tiers }
    }

    /// Rent a buffer of at least `minimum_size` elements.
    #[must_use]
    pub fn alloc(&self, minimum_size: usize) -> Vec<T> {
        if minimum_size == 0 {
            return Vec::new();
        }

        match self.tiers.iter().find(|tier| minimum_size <= tier.size) {
            Some(tier) => {
                let (buffer, reused) = tier.rent();
                let outcome = if reused { "reused" } else { "allocated" };
                BUFFER_POOL_RENTS
                    .with_label_values(&[self.element, &tier.size.to_string(), outcome])
                    .inc();
                buffer
            }
            None => {
                trace!(element = self.element, size = minimum_size, "Oversized buffer bypasses pool");
                BUFFER_POOL_RENTS
                    .with_label_values(&[self.element, "none", "oversized"])
                    .inc();
                vec![T::default(); minimum_size]
            }
        }
    }

    /// Return a buffer. Only exact tier lengths are pooled.
    pub fn free(&self, buffer: Vec<T>) {
        if let Some(tier) = self.tier_for_len(buffer.len()) {
            tier.give_back(buffer);
        }
    }

    /// Whether a buffer of this length would be accepted by [`TieredPool::free`].
    #[must_use]
    pub fn is_poolable(&self, len: usize) -> bool {
        self.tier_for_len(len).is_some()
    }

    /// Idle buffers currently held by the tier of `size`.
    #[must_use]
    pub fn idle(&self, size: usize) -> usize {
        self.tier_for_len(size).map_or(0, BufferTier::idle_count)
    }

    /// Size of the largest tier.
    #[must_use]
    pub fn max_tier(&self) -> usize {
        self.tiers.last().map_or(0, |tier| tier.size)
    }

    fn tier_for_len(&self, len: usize) -> Option<&BufferTier<T>> {
        self.tiers
            .binary_search_by_key(&len, |tier| tier.size)
            .ok()
            .map(|index| &self.tiers[index])
    }
}

/// A rented byte buffer with an offset/length view, handed to serializers
/// without copying.
#[derive(Debug)]
pub struct BufferSegment {
    buffer: Vec<u8>,
    offset: usize,
    len: usize,
}

impl BufferSegment {
    /// View of the segment's bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.len]
    }

    /// Mutable view of the segment's bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer[self.offset..self.offset + self.len]
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the whole backing buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

/// Byte and char buffer pools.
#[derive(Debug)]
pub struct MemoryPool {
    bytes: TieredPool<u8>,
    chars: TieredPool<char>,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    /// Pool with the default tiers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tiers(BYTE_TIERS, CHAR_TIERS)
    }

    /// Pool with custom `(size, max_retained)` tiers.
    #[must_use]
    pub fn with_tiers(byte_tiers: &[(usize, usize)], char_tiers: &[(usize, usize)]) -> Self {
        Self {
            bytes: TieredPool::new("byte", byte_tiers),
            chars: TieredPool::new("char", char_tiers),
        }
    }

    #[must_use]
    pub fn alloc_byte(&self, minimum_size: usize) -> Vec<u8> {
        self.bytes.alloc(minimum_size)
    }

    pub fn free_byte(&self, buffer: Vec<u8>) {
        self.bytes.free(buffer);
    }

    #[must_use]
    pub fn alloc_char(&self, minimum_size: usize) -> Vec<char> {
        self.chars.alloc(minimum_size)
    }

    pub fn free_char(&self, buffer: Vec<char>) {
        self.chars.free(buffer);
    }

    /// Rent a byte buffer and view its first `minimum_size` bytes.
    #[must_use]
    pub fn alloc_segment(&self, minimum_size: usize) -> BufferSegment {
        BufferSegment {
            buffer: self.alloc_byte(minimum_size),
            offset: 0,
            len: minimum_size,
        }
    }

    pub fn free_segment(&self, segment: BufferSegment) {
        self.free_byte(segment.buffer);
    }

    /// Byte tier table.
    #[must_use]
    pub fn byte_pool(&self) -> &TieredPool<u8> {
        &self.bytes
    }

    /// Char tier table.
    #[must_use]
    pub fn char_pool(&self) -> &TieredPool<char> {
        &self.chars
    }

    /// Writer that accumulates into rented buffers.
    #[must_use]
    pub fn writer(&self) -> PooledWriter<'_> {
        PooledWriter {
            pool: self,
            buffer: Vec::new(),
            written: 0,
        }
    }
}

/// `io::Write` sink backed by the byte tiers.
///
/// Grows by renting a bigger buffer and returning the old one. Call
/// [`PooledWriter::finish`] to copy the written bytes out; every rented
/// buffer is returned to the pool, including on drop.
#[derive(Debug)]
pub struct PooledWriter<'a> {
    pool: &'a MemoryPool,
    buffer: Vec<u8>,
    written: usize,
}

impl PooledWriter<'_> {
    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buffer[..self.written]
    }

    /// Copy the written bytes into an owned buffer and release the rental.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        let out = self.written().to_vec();
        self.release();
        out
    }

    fn reserve(&mut self, additional: usize) {
        let needed = self.written + additional;
        if needed <= self.buffer.len() {
            return;
        }

        let target = needed.max(self.buffer.len() * 2);
        let mut grown = self.pool.alloc_byte(target);
        grown[..self.written].copy_from_slice(&self.buffer[..self.written]);
        let old = std::mem::replace(&mut self.buffer, grown);
        self.pool.free_byte(old);
    }

    fn release(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.written = 0;
        self.pool.free_byte(buffer);
    }
}

impl io::Write for PooledWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reserve(buf.len());
        self.buffer[self.written..self.written + buf.len()].copy_from_slice(buf);
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledWriter<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
