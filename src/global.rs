//! The process-wide heap over the program break, behind C-shaped entry
//! points that report failure with a null pointer.

use std::{
  io::{self, Write},
  ptr::{self, NonNull},
};

use crate::{Heap, ProgramBreak};

static HEAP: Heap<ProgramBreak> = Heap::new(ProgramBreak::new());

/// The process-wide heap.
pub fn heap() -> &'static Heap<ProgramBreak> {
  &HEAP
}

/// Allocates `size` bytes, or returns null.
pub fn malloc(size: usize) -> *mut u8 {
  HEAP.allocate(size).map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Allocates a zeroed array of `count` elements of `element_size` bytes, or
/// returns null.
pub fn calloc(
  count: usize,
  element_size: usize,
) -> *mut u8 {
  HEAP
    .zero_allocate(count, element_size)
    .map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Resizes `block` to `size` bytes. Returns null on failure, leaving `block`
/// valid.
///
/// # Safety
///
/// `block` must be null or a live pointer returned by this module.
pub unsafe fn realloc(
  block: *mut u8,
  size: usize,
) -> *mut u8 {
  unsafe { HEAP.resize(NonNull::new(block), size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Releases `block`. Null is ignored.
///
/// # Safety
///
/// `block` must be null or a live pointer returned by this module.
pub unsafe fn free(block: *mut u8) {
  unsafe { HEAP.release(NonNull::new(block)) }
}

/// Prints the process heap's record list to stdout.
pub fn print_mem_list() -> io::Result<()> {
  let snapshot = HEAP.snapshot();
  let mut stdout = io::stdout().lock();
  write!(stdout, "{snapshot}")?;
  stdout.flush()
}
