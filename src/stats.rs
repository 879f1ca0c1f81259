use core::fmt;

/// Totals from a full walk of the heap, as returned by
/// [`Heap::check_heap`](crate::Heap::check_heap).
///
/// Byte totals count whole chunks, headers included, so that
/// `allocated_bytes + free_bytes` is the size of the heap.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub allocated_count: usize,
    pub allocated_bytes: usize,
    pub free_count: usize,
    pub free_bytes: usize,
}

impl HeapStats {
    /// Bytes covered by all chunks, allocated or free.
    pub fn total_bytes(&self) -> usize {
        self.allocated_bytes + self.free_bytes
    }

    /// Number of chunks, allocated or free.
    pub fn chunk_count(&self) -> usize {
        self.allocated_count + self.free_count
    }
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocated: {} chunks, {} bytes; free: {} chunks, {} bytes",
            self.allocated_count, self.allocated_bytes, self.free_count, self.free_bytes,
        )
    }
}
