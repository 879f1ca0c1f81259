//! The allocator itself.
//!
//! A [`Heap`] owns a [`HeapGrower`] and carves the memory it provides into
//! chunks. Allocation takes the first free chunk that is large enough,
//! splitting off whatever is left over; if there is none, the heap grows by
//! exactly one chunk. Release marks a chunk free and merges it with any free
//! chunks directly after it. Chunks before it are never merged: a free chunk
//! followed by a newly freed one stays separate until something before them
//! is released.

use core::ptr::{self, NonNull};

use log::{debug, info, trace, warn};

use crate::align::{checked_align, ALIGNMENT};
use crate::chunk::{Chunk, HEADER_SIZE};
use crate::error::AllocError;
use crate::grower::HeapGrower;
use crate::stats::HeapStats;
use crate::walker::{next_chunk, Chunks};

/// A single-threaded heap, managing the memory of one grower.
///
/// Note: It never returns memory to the OS.
///
/// All methods take `&mut self` where they may change the heap; a `Heap` is
/// not safe to share between threads, and no locking is provided.
pub struct Heap<G> {
    grower: G,
    checking: bool,
}

impl<G: HeapGrower + Default> Default for Heap<G> {
    fn default() -> Self {
        Heap::new(G::default())
    }
}

impl<G: HeapGrower> Heap<G> {
    /// Start managing an empty heap.
    ///
    /// Heap checks run after every change in debug builds; see
    /// [`with_checking`](Heap::with_checking).
    ///
    /// # Panics
    ///
    /// Panics if the grower has already grown.
    pub fn new(grower: G) -> Self {
        Heap::with_checking(grower, cfg!(debug_assertions))
    }

    /// Start managing an empty heap, choosing whether to run
    /// [`check_heap`](Heap::check_heap) after every allocate, release and
    /// resize.
    ///
    /// # Panics
    ///
    /// Panics if the grower has already grown.
    pub fn with_checking(grower: G, checking: bool) -> Self {
        assert_eq!(grower.heap_size(), 0, "A heap must start out empty");
        debug_assert_eq!(grower.heap_lo() as usize % ALIGNMENT, 0);
        Heap { grower, checking }
    }

    pub fn grower(&self) -> &G {
        &self.grower
    }

    pub fn set_checking(&mut self, checking: bool) {
        self.checking = checking;
    }

    /// Iterate over every chunk, allocated or free, in address order.
    pub fn chunks(&self) -> Chunks<'_, G> {
        Chunks::new(&self.grower)
    }

    /// Total size of a chunk holding a payload of `size` bytes.
    fn chunk_size(size: usize) -> Result<usize, AllocError> {
        checked_align(size)
            .and_then(|payload| payload.checked_add(HEADER_SIZE))
            .ok_or(AllocError::SizeOverflow(size))
    }

    /// The lowest-addressed free chunk of at least `size` bytes.
    fn first_fit(&self, size: usize) -> Option<Chunk> {
        self.chunks()
            .find(|chunk| chunk.is_free() && chunk.size() >= size)
    }

    /// Grow the heap by a single free chunk of exactly `size` bytes.
    fn grow(&mut self, size: usize) -> Result<Chunk, AllocError> {
        let ptr = match unsafe { self.grower.grow_heap(size) } {
            Ok(ptr) => ptr,
            Err(err) => {
                warn!("Heap growth of {} bytes failed: {}", size, err);
                return Err(AllocError::OutOfMemory { requested: size });
            }
        };
        debug!("Grew heap by {} bytes at {:?}", size, ptr);

        // The grower handed us fresh memory, at the old end of the heap
        Ok(unsafe { Chunk::init(ptr, size, false) })
    }

    /// Merge every free chunk directly after `chunk` into it, and return how
    /// many were merged.
    fn coalesce(&mut self, chunk: &mut Chunk) -> usize {
        let mut merges = 0;
        while let Some(next) = next_chunk(&self.grower, Some(*chunk)) {
            if next.is_allocated() {
                break;
            }
            chunk.absorb(next);
            merges += 1;
        }
        merges
    }

    /// Look up the chunk behind a payload pointer, making sure it is a live
    /// allocation on this heap.
    ///
    /// The header must be a chunk boundary found by walking the heap, so a
    /// stale pointer into memory that has since been merged or reused is
    /// never read as a header.
    fn live_chunk(&self, ptr: NonNull<u8>) -> Result<Chunk, AllocError> {
        let addr = ptr.as_ptr() as usize;
        let lo = self.grower.heap_lo() as usize;
        let hi = self.grower.heap_hi() as usize;
        if addr % ALIGNMENT != 0 || addr < lo + HEADER_SIZE || addr > hi {
            return Err(AllocError::InvalidRelease(addr));
        }

        let header = addr - HEADER_SIZE;
        let found = self
            .chunks()
            .take_while(|c| c.start() as usize <= header)
            .find(|c| c.start() as usize == header);

        match found {
            Some(chunk) if chunk.is_allocated() => Ok(chunk),
            _ => Err(AllocError::InvalidRelease(addr)),
        }
    }

    fn after_change(&self) {
        if self.checking {
            self.check_heap(false);
        }
    }

    /// Allocate at least `size` bytes, aligned to 16.
    ///
    /// The memory is not initialized. On failure the heap is unchanged.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let needed_size = Heap::<G>::chunk_size(size)?;

        let mut chunk = match self.first_fit(needed_size) {
            Some(mut fit) => {
                debug!("Found {:?} for {} bytes", fit, needed_size);
                if let Some(rest) = fit.split(needed_size) {
                    trace!("  Split off {:?}", rest);
                }
                fit
            }
            None => self.grow(needed_size)?,
        };

        chunk.set_allocated(true);
        self.after_change();
        Ok(chunk.payload())
    }

    /// Release an allocation, merging it with any free chunks after it.
    ///
    /// Releasing a pointer that is not a live allocation from this heap,
    /// including one that has already been released, returns
    /// [`AllocError::InvalidRelease`] and changes nothing.
    pub fn release(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        let mut chunk = self.live_chunk(ptr)?;
        chunk.set_allocated(false);

        let merges = self.coalesce(&mut chunk);
        debug!("Released {:?}, merging {} chunks after it", chunk, merges);

        self.after_change();
        Ok(())
    }

    /// Change the size of an allocation, like `realloc`.
    ///
    /// - `resize(None, n)` allocates `n` bytes; `resize(None, 0)` does
    ///   nothing and returns `None`.
    /// - `resize(Some(p), 0)` releases `p` and returns `None`.
    /// - Otherwise the first `min(old, new)` bytes are kept and a pointer to
    ///   them is returned. This is the same pointer if the chunk was already
    ///   big enough, or could grow into free chunks right after it; if not,
    ///   the data is copied into a new allocation and the old one released.
    ///
    /// On error, the heap is unchanged and `ptr` is still valid.
    pub fn resize(
        &mut self,
        ptr: Option<NonNull<u8>>,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let ptr = match ptr {
            None if size == 0 => return Ok(None),
            None => return self.allocate(size).map(Some),
            Some(ptr) => ptr,
        };
        if size == 0 {
            self.release(ptr)?;
            return Ok(None);
        }

        let mut chunk = self.live_chunk(ptr)?;
        let needed_size = Heap::<G>::chunk_size(size)?;

        if chunk.size() < needed_size {
            // See how far the free chunks after this one would take us,
            // without touching anything yet
            let mut available = chunk.size();
            let mut last = chunk;
            while available < needed_size {
                match next_chunk(&self.grower, Some(last)) {
                    Some(next) if next.is_free() => {
                        available += next.size();
                        last = next;
                    }
                    _ => break,
                }
            }

            if available < needed_size {
                let new_ptr = self.allocate(size)?;
                let count = chunk.capacity().min(size);
                unsafe { ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), count) };
                self.release(ptr)?;
                debug!("Moved {} bytes from {:?} to {:?}", count, ptr, new_ptr);
                return Ok(Some(new_ptr));
            }

            while chunk.size() < needed_size {
                let Some(next) = next_chunk(&self.grower, Some(chunk)) else {
                    break;
                };
                chunk.absorb(next);
            }
            debug!("Grew {:?} in place", chunk);
        }

        if let Some(mut rest) = chunk.split(needed_size) {
            let merges = self.coalesce(&mut rest);
            trace!("  Trimmed {:?}, merging {} chunks after it", rest, merges);
        }

        self.after_change();
        Ok(Some(ptr))
    }

    /// The number of bytes usable at `ptr`, which is at least what was asked
    /// for.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> Result<usize, AllocError> {
        Ok(self.live_chunk(ptr)?.capacity())
    }

    /// Walk the whole heap, and count up allocated and free chunks.
    ///
    /// With `verbose`, the totals are logged at `info` level.
    ///
    /// # Panics
    ///
    /// Panics if the chunks do not exactly cover the heap. That means a header
    /// has been overwritten, and nothing the heap does after that can be
    /// trusted.
    pub fn check_heap(&self, verbose: bool) -> HeapStats {
        let mut stats = HeapStats::default();

        for chunk in self.chunks() {
            let size = chunk.size();
            if size < HEADER_SIZE || size % ALIGNMENT != 0 {
                panic!(
                    "Corrupt chunk {:?} in heap {:?}..{:?}",
                    chunk,
                    self.grower.heap_lo(),
                    self.grower.heap_hi(),
                );
            }

            if chunk.is_allocated() {
                stats.allocated_count += 1;
                stats.allocated_bytes += size;
            } else {
                stats.free_count += 1;
                stats.free_bytes += size;
            }
        }

        let heap_size = self.grower.heap_size();
        if verbose {
            info!("Heap of {} bytes: {}", heap_size, stats);
        } else {
            trace!("Heap of {} bytes: {}", heap_size, stats);
        }

        assert_eq!(
            stats.total_bytes(),
            heap_size,
            "Chunks do not tile the heap ({})",
            stats
        );
        stats
    }
}
