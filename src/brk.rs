//! Break allocators: the backing stores a [`Heap`](crate::Heap) grows into.
//!
//! A break allocator owns one contiguous region that can only change at its
//! end, like the classic program break:
//!
//! ```text
//!   base                                current_break          capacity
//!   ├──────────────┬──────────────┬──────┤─────────────────────────┤
//!   │   block 1    │   block 2    │ ...  │      not yet mapped     │
//!   └──────────────┴──────────────┴──────┘                         │
//!                                        ──► grow(n)   ◄── shrink(n)
//! ```

use std::{
  alloc::{GlobalAlloc, Layout, System},
  io,
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};

use crate::{Block, BreakError};

/// A region that grows and shrinks only at its current end.
pub trait BreakAllocator {
  /// First address past the region.
  fn current_break(&self) -> *mut u8;

  /// Extends the region by `increment` bytes.
  ///
  /// Returns the start of the new bytes, aligned to [`Block::ALIGN`]; the
  /// new bytes end exactly at the new break.
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, BreakError>;

  /// Gives the last `decrement` bytes of the region back.
  fn shrink(
    &mut self,
    decrement: usize,
  ) -> Result<(), BreakError>;
}

/// The process program break, moved with `sbrk(2)`.
///
/// Nothing stops other code in the process from moving the break too. A
/// foreign `sbrk` that lands between reading the break and shrinking it
/// makes the heap release memory it does not own; that race is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgramBreak {
  _private: (),
}

impl ProgramBreak {
  pub const fn new() -> Self {
    Self { _private: () }
  }

  fn adjust(bytes: isize) -> Result<*mut u8, BreakError> {
    let previous = unsafe { sbrk(bytes as intptr_t) };

    if previous == usize::MAX as *mut c_void {
      return Err(BreakError::Refused {
        bytes: bytes.unsigned_abs(),
        errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
      });
    }

    Ok(previous.cast())
  }
}

impl BreakAllocator for ProgramBreak {
  fn current_break(&self) -> *mut u8 {
    unsafe { sbrk(0) }.cast()
  }

  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, BreakError> {
    // The initial break, or one moved by foreign code, may be unaligned.
    let padding = self.current_break().addr().wrapping_neg() % Block::ALIGN;

    let bytes = increment
      .checked_add(padding)
      .and_then(|bytes| isize::try_from(bytes).ok())
      .ok_or(BreakError::TooLarge { bytes: increment })?;

    let previous = Self::adjust(bytes)?;

    NonNull::new(previous.wrapping_add(padding)).ok_or(BreakError::Refused {
      bytes: increment,
      errno: 0,
    })
  }

  fn shrink(
    &mut self,
    decrement: usize,
  ) -> Result<(), BreakError> {
    let bytes = isize::try_from(decrement).map_err(|_| BreakError::TooLarge { bytes: decrement })?;
    Self::adjust(-bytes).map(|_| ())
  }
}

/// A fixed-capacity region reserved once from the system allocator, with a
/// private break that starts at its base.
///
/// Heaps over an arena never touch the process program break, which makes
/// them deterministic and independent of each other.
#[derive(Debug)]
pub struct Arena {
  base: NonNull<u8>,
  layout: Layout,
  capacity: usize,
  used: usize,
}

// The arena exclusively owns its reservation.
unsafe impl Send for Arena {}

impl Arena {
  pub fn with_capacity(capacity: usize) -> Result<Self, BreakError> {
    let layout = Layout::from_size_align(capacity.max(Block::ALIGN), Block::ALIGN)
      .map_err(|_| BreakError::Reserve { capacity })?;

    let base = NonNull::new(unsafe { System.alloc(layout) }).ok_or(BreakError::Reserve { capacity })?;

    Ok(Self {
      base,
      layout,
      capacity,
      used: 0,
    })
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes between the base and the current break.
  pub fn used(&self) -> usize {
    self.used
  }
}

impl BreakAllocator for Arena {
  fn current_break(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.used)
  }

  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, BreakError> {
    let available = self.capacity - self.used;
    if increment > available {
      return Err(BreakError::OutOfCapacity {
        requested: increment,
        available,
      });
    }

    let start = unsafe { self.base.add(self.used) };
    self.used += increment;

    Ok(start)
  }

  fn shrink(
    &mut self,
    decrement: usize,
  ) -> Result<(), BreakError> {
    if decrement > self.used {
      return Err(BreakError::Underflow {
        decrement,
        used: self.used,
      });
    }

    self.used -= decrement;
    Ok(())
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { System.dealloc(self.base.as_ptr(), self.layout) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_grow_and_shrink() {
    let mut arena = Arena::with_capacity(256).unwrap();
    let base = arena.base();

    assert_eq!(arena.current_break(), base);
    assert_eq!(base.addr() % Block::ALIGN, 0);

    let first = arena.grow(64).unwrap();
    assert_eq!(first.as_ptr(), base);
    assert_eq!(arena.current_break(), base.wrapping_add(64));

    let second = arena.grow(32).unwrap();
    assert_eq!(second.as_ptr(), base.wrapping_add(64));
    assert_eq!(arena.used(), 96);

    arena.shrink(32).unwrap();
    assert_eq!(arena.current_break(), base.wrapping_add(64));
    assert_eq!(arena.used(), 64);
  }

  #[test]
  fn test_arena_bounds() {
    let mut arena = Arena::with_capacity(128).unwrap();

    arena.grow(96).unwrap();
    assert_eq!(
      arena.grow(64),
      Err(BreakError::OutOfCapacity {
        requested: 64,
        available: 32,
      })
    );
    assert_eq!(arena.used(), 96);

    assert_eq!(
      arena.shrink(100),
      Err(BreakError::Underflow {
        decrement: 100,
        used: 96,
      })
    );
    assert_eq!(arena.used(), 96);
  }

  #[test]
  fn test_empty_arena() {
    let mut arena = Arena::with_capacity(0).unwrap();
    assert_eq!(arena.capacity(), 0);
    assert!(arena.grow(1).is_err());
  }

  #[test]
  fn test_arena_reserve_too_large() {
    assert_eq!(
      Arena::with_capacity(usize::MAX).err(),
      Some(BreakError::Reserve { capacity: usize::MAX })
    );
  }

  #[test]
  fn test_program_break_is_visible() {
    let brk = ProgramBreak::new();
    assert!(!brk.current_break().is_null());
  }

  #[test]
  fn test_program_break_rejects_huge_increment() {
    let mut brk = ProgramBreak::new();
    assert!(matches!(brk.grow(usize::MAX), Err(BreakError::TooLarge { .. })));
  }
}
