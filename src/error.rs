use thiserror::Error;

/// Errors returned by [`Heap`](crate::Heap) operations.
///
/// Every operation that returns one of these has left the heap exactly as it
/// found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The grower could not extend the heap by the chunk size needed.
    #[error("heap could not grow by {requested} bytes")]
    OutOfMemory { requested: usize },

    /// A request so large that its chunk size does not fit in a `usize`.
    #[error("a request of {0} bytes overflows the address space")]
    SizeOverflow(usize),

    /// The pointer is not the payload of a live allocation on this heap. This
    /// includes pointers that were already released.
    #[error("{0:#x} is not a live allocation")]
    InvalidRelease(usize),
}

/// Errors from a [`HeapGrower`](crate::HeapGrower).
#[derive(Debug, Error)]
pub enum GrowError {
    /// The backing region has no room left for this growth.
    #[error("cannot grow by {requested} bytes, only {remaining} left")]
    Exhausted { requested: usize, remaining: usize },

    /// Reserving the backing region failed.
    #[cfg(feature = "use_libc")]
    #[error("mmap failed: {0}")]
    Map(errno::Errno),
}
