//! Address-order traversal of the chunks in a heap.
//!
//! Nothing links one chunk to the next: chunk *i + 1* starts where chunk *i*
//! ends. Walking the heap is therefore just adding sizes, starting from
//! `heap_lo()` and stopping at `heap_hi()`.

use core::ptr::NonNull;

use crate::chunk::Chunk;
use crate::grower::HeapGrower;

/// Return the chunk after `chunk`, or the first chunk of the heap if `chunk`
/// is `None`.
///
/// Returns `None` at the end of the heap, or immediately if the heap is empty.
/// This never writes to the heap.
pub fn next_chunk<G: HeapGrower + ?Sized>(grower: &G, chunk: Option<Chunk>) -> Option<Chunk> {
    let hi = grower.heap_hi();
    let next = match chunk {
        None => grower.heap_lo(),
        Some(chunk) => chunk.end() as *const u8,
    };

    if next >= hi {
        return None;
    }

    // Every boundary below heap_hi is a header written by the heap
    unsafe { Some(Chunk::from_header(NonNull::new_unchecked(next as *mut u8))) }
}

/// An iterator over every chunk in a heap, in address order.
pub struct Chunks<'heap, G: ?Sized> {
    grower: &'heap G,
    last: Option<Chunk>,
    done: bool,
}

impl<'heap, G: HeapGrower + ?Sized> Chunks<'heap, G> {
    pub fn new(grower: &'heap G) -> Self {
        Chunks {
            grower,
            last: None,
            done: false,
        }
    }
}

impl<'heap, G: HeapGrower + ?Sized> Iterator for Chunks<'heap, G> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match next_chunk(self.grower, self.last) {
            Some(chunk) => {
                self.last = Some(chunk);
                Some(chunk)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl<'heap, G: HeapGrower + ?Sized> core::iter::FusedIterator for Chunks<'heap, G> {}
