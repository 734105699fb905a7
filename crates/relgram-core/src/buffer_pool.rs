/// A simple allocator that recycles datagram buffers.
///
/// The socket flush path builds one wire buffer per outbound datagram;
/// recycling them keeps that path free of per-datagram allocations.
pub struct BufferPool {
    pool: Vec<Vec<u8>>,
    buffer_size: usize,
    max_pool_size: usize,
}

impl BufferPool {
    /// Creates a pool handing out buffers with at least `buffer_size`
    /// capacity, retaining up to `max_pool_size` of them.
    pub fn new(buffer_size: usize, max_pool_size: usize) -> Self {
        Self { pool: Vec::with_capacity(max_pool_size), buffer_size, max_pool_size }
    }

    /// Takes a cleared buffer from the pool or allocates a fresh one.
    pub fn allocate(&mut self) -> Vec<u8> {
        self.pool.pop().unwrap_or_else(|| Vec::with_capacity(self.buffer_size))
    }

    /// Returns a buffer to the pool for reuse.
    pub fn deallocate(&mut self, mut buffer: Vec<u8>) {
        if self.pool.len() < self.max_pool_size {
            buffer.clear();
            self.pool.push(buffer);
        }
    }

    /// Number of buffers currently held by the pool.
    pub fn available(&self) -> usize {
        self.pool.len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(crate::constants::MAX_DATAGRAM_SIZE, 256)
    }
}
