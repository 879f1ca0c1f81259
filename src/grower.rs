//! The memory underneath a heap.
//!
//! ### [`HeapGrower`](trait.HeapGrower.html)
//!
//! `HeapGrower` is a simple trait interface meant to abstract over the calls
//! to the OS to expand the heap, like `sbrk`. Unlike `mmap`, growth is
//! contiguous: each new region starts where the last one ended, so the heap is
//! always the single range `heap_lo()..heap_hi()`.
//!
//! ### [`ToyHeap`](struct.ToyHeap.html)
//!
//! `ToyHeap` is a static array that can pretend to be a heap, and implements
//! `HeapGrower` for such a purpose. It is mainly useful for testing.
//!
//! ### [`MmapHeap`](struct.MmapHeap.html)
//!
//! With the `use_libc` feature, `MmapHeap` reserves a large range of virtual
//! memory up front and hands it out in order, the way `sbrk` moves the program
//! break.

use core::fmt;
use core::ptr::NonNull;

use crate::align::ALIGNMENT;
use crate::error::GrowError;

pub trait HeapGrower {
    type Err: fmt::Debug + fmt::Display;

    /// Grow the heap by exactly `size` bytes, and return a pointer to the
    /// start of the new bytes, which is the old `heap_hi()`.
    ///
    /// # Safety
    ///
    /// The returned memory must be available and untracked by any other rust
    /// code. Callers must pass a multiple of 16, so the heap stays aligned.
    ///
    /// On error the heap must be unchanged.
    unsafe fn grow_heap(&mut self, size: usize) -> Result<NonNull<u8>, Self::Err>;

    /// The first byte of the heap.
    fn heap_lo(&self) -> *const u8;

    /// One past the last byte of the heap.
    fn heap_hi(&self) -> *const u8;

    /// Total bytes in the heap.
    fn heap_size(&self) -> usize {
        self.heap_hi() as usize - self.heap_lo() as usize
    }
}

/// Bytes available in a [`ToyHeap`].
pub const TOY_HEAP_CAPACITY: usize = 256 * 1024;

#[repr(C, align(16))]
struct Arena([u8; TOY_HEAP_CAPACITY]);

/// An in-place array standing in for the process heap.
///
/// Pointers into a `ToyHeap` point into the value itself, so it must not be
/// moved once anything has been allocated from it.
pub struct ToyHeap {
    limit: usize,
    size: usize,
    heap: Arena,
}

impl Default for ToyHeap {
    fn default() -> Self {
        ToyHeap {
            limit: TOY_HEAP_CAPACITY,
            size: 0,
            heap: Arena([0; TOY_HEAP_CAPACITY]),
        }
    }
}

impl ToyHeap {
    /// A toy heap that refuses to grow past `limit` bytes, to simulate
    /// running out of memory.
    pub fn with_limit(limit: usize) -> Self {
        ToyHeap {
            limit: limit.min(TOY_HEAP_CAPACITY),
            ..ToyHeap::default()
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl HeapGrower for ToyHeap {
    type Err = GrowError;

    unsafe fn grow_heap(&mut self, size: usize) -> Result<NonNull<u8>, Self::Err> {
        debug_assert_eq!(size % ALIGNMENT, 0);
        let remaining = self.limit - self.size;
        if size > remaining {
            return Err(GrowError::Exhausted {
                requested: size,
                remaining,
            });
        }

        let ptr = self.heap.0.as_mut_ptr().add(self.size);
        self.size += size;
        Ok(NonNull::new_unchecked(ptr))
    }

    fn heap_lo(&self) -> *const u8 {
        self.heap.0.as_ptr()
    }

    fn heap_hi(&self) -> *const u8 {
        self.heap.0.as_ptr().wrapping_add(self.size)
    }

    fn heap_size(&self) -> usize {
        self.size
    }
}

/// A heap made of one contiguous `mmap` reservation.
///
/// Address space for `capacity` bytes is reserved when the heap is made, with
/// `MAP_NORESERVE`, so pages are only backed once they are touched. Growth
/// moves a break through the reservation.
#[cfg(feature = "use_libc")]
pub struct MmapHeap {
    base: NonNull<u8>,
    // Bytes reserved, rounded to whole pages
    reserved: usize,
    size: usize,
}

#[cfg(feature = "use_libc")]
impl MmapHeap {
    /// Reserve at least `capacity` bytes of address space.
    pub fn new(capacity: usize) -> Result<Self, GrowError> {
        let pagesize = sysconf::page::pagesize();
        let reserved = crate::align::round_up(capacity.max(1), pagesize).ok_or(
            GrowError::Exhausted {
                requested: capacity,
                remaining: 0,
            },
        )?;

        let ptr = unsafe {
            libc::mmap(
                // Address we want the memory at. We don't care, so null it is.
                core::ptr::null_mut(),
                reserved,
                libc::PROT_WRITE | libc::PROT_READ,
                // MAP_ANON: no file behind it. MAP_PRIVATE: not shared with
                // any other process. MAP_NORESERVE: don't charge swap for the
                // whole reservation up front.
                libc::MAP_ANON | libc::MAP_PRIVATE | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(GrowError::Map(errno::errno()));
        }
        let base = NonNull::new(ptr as *mut u8).ok_or(GrowError::Exhausted {
            requested: capacity,
            remaining: 0,
        })?;

        log::debug!("Reserved {} bytes at {:?} for the heap", reserved, base);
        Ok(MmapHeap {
            base,
            reserved,
            size: 0,
        })
    }

    /// Total bytes the heap may grow to.
    pub fn capacity(&self) -> usize {
        self.reserved
    }
}

#[cfg(feature = "use_libc")]
impl HeapGrower for MmapHeap {
    type Err = GrowError;

    unsafe fn grow_heap(&mut self, size: usize) -> Result<NonNull<u8>, Self::Err> {
        debug_assert_eq!(size % ALIGNMENT, 0);
        let remaining = self.reserved - self.size;
        if size > remaining {
            return Err(GrowError::Exhausted {
                requested: size,
                remaining,
            });
        }

        let ptr = self.base.as_ptr().add(self.size);
        self.size += size;
        Ok(NonNull::new_unchecked(ptr))
    }

    fn heap_lo(&self) -> *const u8 {
        self.base.as_ptr()
    }

    fn heap_hi(&self) -> *const u8 {
        self.base.as_ptr().wrapping_add(self.size)
    }

    fn heap_size(&self) -> usize {
        self.size
    }
}

#[cfg(feature = "use_libc")]
impl Drop for MmapHeap {
    fn drop(&mut self) {
        let res = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.reserved) };
        if res != 0 {
            log::warn!("munmap of heap at {:?} failed: {}", self.base, errno::errno());
        }
    }
}
