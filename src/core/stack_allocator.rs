use crate::error::PhysicsError;
use crate::Result;
use std::mem;
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// Alignment every allocation is rounded up to
pub const DEFAULT_ALIGNMENT: usize = 16;

/// A block of step-scratch memory handed out by a [`StackAllocator`].
///
/// The buffer owns its elements so it can be shared with worker threads like any
/// other slice. The allocator only does the bookkeeping, which is what enforces
/// that scratch memory is released in reverse allocation order.
#[derive(Debug)]
pub struct ScratchBuffer<T> {
    id: u64,
    data: Box<[T]>,
}

impl<T> ScratchBuffer<T> {
    /// Number of elements in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> Deref for ScratchBuffer<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for ScratchBuffer<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// A position in the allocator stack that can be freed back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMarker {
    depth: usize,
    top: usize,
}

#[derive(Debug, Clone, Copy)]
struct Allocation {
    id: u64,
    offset: usize,
}

/// Fixed capacity allocator for per-step scratch data, managed like a stack.
///
/// Memory is taken from the top and must be given back from the top. Freeing a
/// buffer that is not the most recent live allocation is a programmer error that
/// is caught by a debug assertion.
///
/// Only the byte budget and the release order are tracked here. Every
/// [`ScratchBuffer`] is a separate heap allocation, so memory is not reused
/// between steps.
#[derive(Debug)]
pub struct StackAllocator {
    capacity: usize,
    top: usize,
    high_water_mark: usize,
    live: Vec<Allocation>,
    next_id: u64,
}

impl StackAllocator {
    /// Creates an allocator that can hand out `capacity` bytes at once
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            top: 0,
            high_water_mark: 0,
            live: Vec::new(),
            next_id: 0,
        }
    }

    /// Allocates `len` default-initialized elements from the top of the stack
    pub fn allocate<T: Default>(&mut self, len: usize) -> Result<ScratchBuffer<T>> {
        let requested = align_up(len.saturating_mul(mem::size_of::<T>()), DEFAULT_ALIGNMENT);
        let remaining = self.remaining_capacity();
        if requested > remaining {
            warn!(requested, remaining, "step scratch allocator exhausted");
            return Err(PhysicsError::StackExhausted { requested, remaining });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.live.push(Allocation { id, offset: self.top });
        self.top += requested;
        self.high_water_mark = self.high_water_mark.max(self.top);

        let data = std::iter::repeat_with(T::default).take(len).collect();
        Ok(ScratchBuffer { id, data })
    }

    /// Frees a buffer off the top of the stack
    pub fn free<T>(&mut self, buffer: ScratchBuffer<T>) {
        debug_assert_eq!(
            self.live.last().map(|allocation| allocation.id),
            Some(buffer.id),
            "scratch memory must be freed in reverse allocation order"
        );

        // Release builds treat an out-of-order free as freeing everything above it too.
        if let Some(position) = self.live.iter().rposition(|allocation| allocation.id == buffer.id) {
            self.top = self.live[position].offset;
            self.live.truncate(position);
        }
    }

    /// Returns a position in the stack that [`free_to_marker`](Self::free_to_marker) can return to
    #[must_use]
    pub fn place_marker(&self) -> StackMarker {
        StackMarker {
            depth: self.live.len(),
            top: self.top,
        }
    }

    /// Frees every allocation made after `marker` was placed
    pub fn free_to_marker(&mut self, marker: StackMarker) {
        debug_assert!(marker.depth <= self.live.len());
        self.live.truncate(marker.depth);
        self.top = marker.top;
    }

    /// Number of bytes currently allocated
    #[inline]
    pub fn size(&self) -> usize {
        self.top
    }

    /// Total number of bytes this allocator can hand out
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes still available
    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.top
    }

    /// Returns true if nothing is allocated
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns true if no bytes are left
    #[inline]
    pub fn is_full(&self) -> bool {
        self.top == self.capacity
    }

    /// Largest number of bytes that were allocated at the same time
    #[inline]
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Number of live allocations
    #[inline]
    pub fn num_allocations(&self) -> usize {
        self.live.len()
    }
}

#[inline]
fn align_up(size: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    size.saturating_add(mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_aligned() {
        let mut allocator = StackAllocator::new(1024);
        let a = allocator.allocate::<u8>(3).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(allocator.size(), 16);

        let b = allocator.allocate::<u32>(5).unwrap();
        assert_eq!(allocator.size(), 48);

        allocator.free(b);
        allocator.free(a);
        assert!(allocator.is_empty());
        assert_eq!(allocator.size(), 0);
        assert_eq!(allocator.high_water_mark(), 48);
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut allocator = StackAllocator::new(32);
        let a = allocator.allocate::<u32>(8).unwrap();
        assert!(allocator.is_full());

        match allocator.allocate::<u32>(1) {
            Err(PhysicsError::StackExhausted { requested, remaining }) => {
                assert_eq!(requested, 16);
                assert_eq!(remaining, 0);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }

        allocator.free(a);
        assert_eq!(allocator.remaining_capacity(), 32);
    }

    #[test]
    fn markers_release_everything_above() {
        let mut allocator = StackAllocator::new(256);
        let keep = allocator.allocate::<u32>(4).unwrap();
        let marker = allocator.place_marker();
        let _first = allocator.allocate::<u32>(4).unwrap();
        let _second = allocator.allocate::<u64>(4).unwrap();
        assert_eq!(allocator.num_allocations(), 3);

        allocator.free_to_marker(marker);
        assert_eq!(allocator.num_allocations(), 1);
        assert_eq!(allocator.size(), 16);

        allocator.free(keep);
        assert!(allocator.is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "reverse allocation order")]
    fn out_of_order_free_is_caught() {
        let mut allocator = StackAllocator::new(256);
        let first = allocator.allocate::<u32>(4).unwrap();
        let _second = allocator.allocate::<u32>(4).unwrap();
        allocator.free(first);
    }
}
