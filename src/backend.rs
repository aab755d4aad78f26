use std::{alloc::Layout, mem, ptr};

use libc::{c_void, calloc, free, posix_memalign};

/// The plain allocate/free primitive a [`Tree`](crate::Tree) is layered over.
///
/// # Safety
///
/// `allocate` must return either null or a pointer to `layout.size()`
/// zero-filled bytes aligned to `layout.align()`, which stays valid until it is
/// handed back to `deallocate` with the same layout.
pub unsafe trait RawAlloc {
  unsafe fn allocate(
    &mut self,
    layout: Layout,
  ) -> *mut u8;

  unsafe fn deallocate(
    &mut self,
    address: *mut u8,
    layout: Layout,
  );
}

/// Alignment `malloc` and friends honour without asking.
const MALLOC_ALIGN: usize = 2 * mem::size_of::<usize>();

/// The C heap, through `libc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

unsafe impl RawAlloc for System {
  unsafe fn allocate(
    &mut self,
    layout: Layout,
  ) -> *mut u8 {
    unsafe {
      if layout.align() <= MALLOC_ALIGN {
        return calloc(1, layout.size()) as *mut u8;
      }

      let mut address: *mut c_void = ptr::null_mut();

      if posix_memalign(&mut address, layout.align(), layout.size()) != 0 {
        return ptr::null_mut();
      }

      ptr::write_bytes(address as *mut u8, 0, layout.size());

      address as *mut u8
    }
  }

  unsafe fn deallocate(
    &mut self,
    address: *mut u8,
    _layout: Layout,
  ) {
    unsafe { free(address as *mut c_void) }
  }
}

/// Running totals kept by [`Counting`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
  pub allocations: usize,
  pub deallocations: usize,
  pub failures: usize,
  pub live_bytes: usize,
  pub peak_bytes: usize,
}

impl AllocStats {
  pub fn live(&self) -> usize {
    self.allocations - self.deallocations
  }
}

/// Wraps another backend and counts what passes through it.
///
/// Can also be told to start failing after a number of successful
/// allocations, which is how out-of-memory paths get exercised.
#[derive(Debug, Default)]
pub struct Counting<A = System> {
  inner: A,
  stats: AllocStats,
  remaining: Option<usize>,
}

impl<A: RawAlloc> Counting<A> {
  pub fn new(inner: A) -> Self {
    Self {
      inner,
      stats: AllocStats::default(),
      remaining: None,
    }
  }

  pub fn stats(&self) -> AllocStats {
    self.stats
  }

  /// Lets `count` more allocations succeed, then reports out of memory.
  pub fn fail_after(
    &mut self,
    count: usize,
  ) {
    self.remaining = Some(count);
  }

  pub fn never_fail(&mut self) {
    self.remaining = None;
  }
}

unsafe impl<A: RawAlloc> RawAlloc for Counting<A> {
  unsafe fn allocate(
    &mut self,
    layout: Layout,
  ) -> *mut u8 {
    if let Some(remaining) = self.remaining.as_mut() {
      if *remaining == 0 {
        self.stats.failures += 1;
        return ptr::null_mut();
      }
      *remaining -= 1;
    }

    let address = unsafe { self.inner.allocate(layout) };

    if address.is_null() {
      self.stats.failures += 1;
      return address;
    }

    self.stats.allocations += 1;
    self.stats.live_bytes += layout.size();
    self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);

    address
  }

  unsafe fn deallocate(
    &mut self,
    address: *mut u8,
    layout: Layout,
  ) {
    self.stats.deallocations += 1;
    self.stats.live_bytes -= layout.size();

    unsafe { self.inner.deallocate(address, layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_system_returns_zeroed_memory() {
    let mut system = System;
    let layout = Layout::array::<u64>(32).unwrap();

    unsafe {
      let address = system.allocate(layout);
      assert!(!address.is_null());

      let words = address as *mut u64;
      for i in 0..32 {
        assert_eq!(*words.add(i), 0);
        *words.add(i) = i as u64;
      }

      system.deallocate(address, layout);
    }
  }

  #[test]
  fn test_system_honours_large_alignment() {
    let mut system = System;
    let layout = Layout::from_size_align(24, 256).unwrap();

    unsafe {
      let address = system.allocate(layout);

      assert!(!address.is_null());
      assert_eq!(address as usize % 256, 0);
      assert_eq!(*address.add(23), 0);

      system.deallocate(address, layout);
    }
  }

  #[test]
  fn test_counting_tracks_live_allocations() {
    let mut counting = Counting::new(System);
    let small = Layout::from_size_align(8, 8).unwrap();
    let large = Layout::from_size_align(64, 8).unwrap();

    unsafe {
      let first = counting.allocate(small);
      let second = counting.allocate(large);

      assert_eq!(counting.stats().live(), 2);
      assert_eq!(counting.stats().live_bytes, 72);

      counting.deallocate(first, small);

      assert_eq!(counting.stats().live(), 1);
      assert_eq!(counting.stats().live_bytes, 64);
      assert_eq!(counting.stats().peak_bytes, 72);

      counting.deallocate(second, large);
    }

    assert_eq!(counting.stats().live(), 0);
  }

  #[test]
  fn test_counting_fails_on_demand() {
    let mut counting = Counting::new(System);
    let layout = Layout::from_size_align(16, 8).unwrap();

    counting.fail_after(1);

    unsafe {
      let first = counting.allocate(layout);
      assert!(!first.is_null());

      assert!(counting.allocate(layout).is_null());
      assert_eq!(counting.stats().failures, 1);

      counting.never_fail();
      let third = counting.allocate(layout);
      assert!(!third.is_null());

      counting.deallocate(first, layout);
      counting.deallocate(third, layout);
    }

    assert_eq!(counting.stats().live(), 0);
  }
}
