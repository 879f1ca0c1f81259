#![cfg_attr(not(test), no_std)]

//! A basic `malloc`/`free`/`realloc` over a single growable heap.
//!
//! The heap is an *implicit free list*: every chunk of memory, free or in use,
//! starts with a small header holding its size and whether it is allocated.
//! There are no pointers between chunks. The chunks simply follow one another
//! from the bottom of the heap to the top, and free chunks are found by
//! walking all of them.
//!
//! ```text
//!  heap_lo                                                          heap_hi
//!  +--------+---------+--------+-------+--------+-----------------+
//!  | header | payload | header | free  | header | payload         |
//!  | 48 use |         | 32 free|       | 64 use |                 |
//!  +--------+---------+--------+-------+--------+-----------------+
//!  |<------ 48 ------>|<----- 32 ----->|<------------ 64 -------->|
//! ```
//!
//! ## Basic Types
//!
//! ### [`Heap`](struct.Heap.html)
//!
//! A `Heap` is a single-threaded allocator: first-fit search, splitting of
//! oversized chunks, forward coalescing on release, and growth by exactly one
//! chunk when nothing fits. [`Heap::check_heap`] walks the whole heap and
//! verifies that its chunks cover it exactly.
//!
//! ### [`HeapGrower`](trait.HeapGrower.html)
//!
//! `HeapGrower` abstracts over the memory underneath, in the manner of `sbrk`.
//! [`ToyHeap`] is a fixed array that is handy for tests; with the `use_libc`
//! feature, `MmapHeap` reserves real virtual memory.
//!
//! ## Example
//!
//! ```
//! use implicit_alloc::{Heap, ToyHeap};
//!
//! let mut heap = Heap::new(ToyHeap::default());
//!
//! let p = heap.allocate(8).unwrap();
//! let q = heap.resize(Some(p), 100).unwrap().unwrap();
//! heap.release(q).unwrap();
//!
//! let stats = heap.check_heap(false);
//! assert_eq!(stats.allocated_count, 0);
//! ```

pub mod align;
pub mod chunk;
pub mod error;
pub mod grower;
pub mod heap;
pub mod stats;
pub mod walker;

pub use crate::align::{align, ALIGNMENT};
pub use crate::chunk::HEADER_SIZE;
pub use crate::error::{AllocError, GrowError};
#[cfg(feature = "use_libc")]
pub use crate::grower::MmapHeap;
pub use crate::grower::{HeapGrower, ToyHeap};
pub use crate::heap::Heap;
pub use crate::stats::HeapStats;
