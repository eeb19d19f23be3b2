//! Allocation accounting
//!
//! [`CountingAllocator`] forwards to the system allocator and counts every
//! allocation and the bytes requested. Binaries opt in with
//! `#[global_allocator]`; without it every snapshot reads zero and results
//! report `allocs_tracked: false`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ops::Sub;
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);

/// Counting wrapper around [`System`]
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record(layout.size());
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            record(new_size);
        }
        new_ptr
    }
}

#[inline]
fn record(size: usize) {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    ALLOCATED_BYTES.fetch_add(size as u64, Ordering::Relaxed);
}

/// Process-wide allocation totals at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocSnapshot {
    pub allocations: u64,
    pub bytes: u64,
}

impl Sub for AllocSnapshot {
    type Output = AllocSnapshot;

    fn sub(self, earlier: AllocSnapshot) -> AllocSnapshot {
        AllocSnapshot {
            allocations: self.allocations.saturating_sub(earlier.allocations),
            bytes: self.bytes.saturating_sub(earlier.bytes),
        }
    }
}

impl std::ops::AddAssign for AllocSnapshot {
    fn add_assign(&mut self, other: AllocSnapshot) {
        self.allocations += other.allocations;
        self.bytes += other.bytes;
    }
}

pub fn snapshot() -> AllocSnapshot {
    AllocSnapshot {
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        bytes: ALLOCATED_BYTES.load(Ordering::Relaxed),
    }
}

/// Whether [`CountingAllocator`] is the global allocator of this process
pub fn is_installed() -> bool {
    let before = snapshot();
    let sample = std::hint::black_box(Box::new(0u64));
    drop(sample);
    snapshot().allocations > before.allocations
}

#[cfg(test)]
#[global_allocator]
static TEST_ALLOCATOR: CountingAllocator = CountingAllocator;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_in_tests() {
        assert!(is_installed());
    }

    #[test]
    fn test_counts_allocations() {
        let before = snapshot();
        let v: Vec<u8> = std::hint::black_box(Vec::with_capacity(4096));
        let delta = snapshot() - before;
        drop(v);

        assert!(delta.allocations >= 1);
        assert!(delta.bytes >= 4096);
    }

    #[test]
    fn test_snapshot_sub_saturates() {
        let a = AllocSnapshot { allocations: 1, bytes: 10 };
        let b = AllocSnapshot { allocations: 5, bytes: 50 };
        assert_eq!(a - b, AllocSnapshot::default());

        let mut total = AllocSnapshot::default();
        total += b;
        total += a;
        assert_eq!(total, AllocSnapshot { allocations: 6, bytes: 60 });
    }
}
