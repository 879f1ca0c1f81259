use core::fmt;
use core::ptr::NonNull;

use static_assertions::const_assert_eq;

use crate::align::ALIGNMENT;

/// The header at the start of every chunk, free or allocated.
///
/// It holds only the size of the chunk (including the header) and whether it
/// is in use. There is no link to any other chunk: the next chunk starts
/// `size` bytes further on.
///
/// We use C representation and align to 16 bytes, so that the header is
/// exactly one alignment unit and the payload after it is aligned too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct ChunkHeader {
    size: usize,
    allocated: bool,
}

/// Bytes taken by a chunk header. This is also the smallest possible chunk.
pub const HEADER_SIZE: usize = core::mem::size_of::<ChunkHeader>();
const_assert_eq!(HEADER_SIZE, ALIGNMENT);
const_assert_eq!(core::mem::align_of::<ChunkHeader>(), ALIGNMENT);

impl ChunkHeader {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }
}

/// A handle to a chunk somewhere in a heap.
///
/// This is a thin wrapper around a pointer to a [`ChunkHeader`]. It is `Copy`
/// because chunks are not owned by their handles: the heap owns every header,
/// and a handle is only a position to read or rewrite.
///
/// A handle is only meaningful while the chunk boundary it points to exists.
/// After a chunk has been absorbed into its predecessor, old handles to it
/// must not be used again.
///
/// Outside this crate a handle can only be read. Handles from
/// [`Heap::chunks`](crate::Heap::chunks) cannot be used to rewrite a header:
///
/// ```compile_fail
/// use implicit_alloc::{Heap, ToyHeap};
///
/// let mut heap = Heap::new(ToyHeap::default());
/// heap.allocate(8).unwrap();
/// let mut chunk = heap.chunks().next().unwrap();
/// chunk.set_allocated(false);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Chunk {
    header: NonNull<ChunkHeader>,
}

impl Chunk {
    /// Write a fresh header at `ptr` and return a handle to it.
    ///
    /// # Safety
    ///
    /// `ptr` must be 16-aligned and point to `size` writable bytes that belong
    /// to the heap and that no live chunk header or payload overlaps.
    ///
    /// # Panics
    ///
    /// Panics if `size` is smaller than a header or is not aligned.
    pub unsafe fn init(ptr: NonNull<u8>, size: usize, allocated: bool) -> Chunk {
        if size < HEADER_SIZE || size % ALIGNMENT != 0 {
            panic!("Can't make a chunk of {} bytes", size);
        }
        let header: NonNull<ChunkHeader> = ptr.cast();
        header.as_ptr().write(ChunkHeader { size, allocated });
        Chunk { header }
    }

    /// Get a handle to an existing header at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a header previously written by [`Chunk::init`]
    /// that is still a chunk boundary.
    pub unsafe fn from_header(ptr: NonNull<u8>) -> Chunk {
        Chunk { header: ptr.cast() }
    }

    /// Recover the chunk owning a payload pointer.
    ///
    /// # Safety
    ///
    /// `payload` must have come from [`Chunk::payload`] on a chunk that still
    /// exists.
    pub unsafe fn from_payload(payload: NonNull<u8>) -> Chunk {
        let header = payload.as_ptr().sub(HEADER_SIZE);
        Chunk {
            header: NonNull::new_unchecked(header).cast(),
        }
    }

    /// The size of the chunk, in bytes, including the header.
    pub fn size(&self) -> usize {
        self.header_view().size
    }

    pub fn is_allocated(&self) -> bool {
        self.header_view().allocated
    }

    pub fn is_free(&self) -> bool {
        !self.is_allocated()
    }

    /// How many bytes a caller may use in the payload.
    pub fn capacity(&self) -> usize {
        self.size() - HEADER_SIZE
    }

    /// Address of the header.
    pub fn start(&self) -> *mut u8 {
        self.header.as_ptr() as *mut u8
    }

    /// Address one past the last byte of the chunk, where the next chunk
    /// would begin.
    pub fn end(&self) -> *mut u8 {
        self.start().wrapping_add(self.size())
    }

    /// The pointer handed out to callers.
    pub fn payload(&self) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(self.start().add(HEADER_SIZE)) }
    }

    /// An immutable view of the header.
    pub fn header_view(&self) -> &ChunkHeader {
        unsafe { self.header.as_ref() }
    }

    /// Get a mutable view of the header.
    ///
    /// # Safety
    ///
    /// Changing the size of a chunk moves the boundary of the next one. The
    /// caller must keep the heap tiled.
    pub unsafe fn header_mut(&mut self) -> &mut ChunkHeader {
        self.header.as_mut()
    }

    /// Mark the chunk as in use (or not). Sizes are untouched.
    pub(crate) fn set_allocated(&mut self, allocated: bool) {
        unsafe { self.header_mut().allocated = allocated }
    }

    /// Cut this chunk in two: this one keeps the first `size` bytes, and a new
    /// free chunk covering the rest is written right after it and returned.
    ///
    /// Returns `None`, leaving the chunk untouched, if the remainder would be
    /// too small to hold a header.
    ///
    /// # Panics
    ///
    /// Panics if `size` is larger than the chunk or is not a valid chunk size.
    pub(crate) fn split(&mut self, size: usize) -> Option<Chunk> {
        let self_size = self.size();
        if size > self_size || size < HEADER_SIZE || size % ALIGNMENT != 0 {
            panic!(
                "Can't split a chunk of {} bytes off of a chunk of {} bytes",
                size, self_size,
            );
        }

        let remainder = self_size - size;
        if remainder < HEADER_SIZE {
            return None;
        }

        unsafe {
            self.header_mut().size = size;
            let rest = NonNull::new_unchecked(self.start().add(size));
            Some(Chunk::init(rest, remainder, false))
        }
    }

    /// Merge `next`, which must start exactly where this chunk ends, into this
    /// chunk. `next`'s header becomes part of this chunk's payload.
    ///
    /// # Panics
    ///
    /// Panics if the two chunks are not adjacent.
    pub(crate) fn absorb(&mut self, next: Chunk) {
        if self.end() != next.start() {
            panic!(
                "Can't merge {:?} into non-adjacent chunk {:?}",
                next, self
            );
        }
        unsafe { self.header_mut().size += next.size() }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_allocated() { "used" } else { "free" };
        write!(f, "Chunk({:?}, {}, {})", self.header, self.size(), state)
    }
}
