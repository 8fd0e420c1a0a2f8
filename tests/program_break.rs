//! Moves the real program break, so it lives in its own test binary.

use brkheap::{Block, BreakAllocator, Heap, ProgramBreak};

fn misalign_break() {
  let current = unsafe { libc::sbrk(0) }.addr();
  if current % Block::ALIGN == 0 {
    let previous = unsafe { libc::sbrk(1) };
    assert_ne!(previous.addr(), usize::MAX);
  }
  assert_ne!(unsafe { libc::sbrk(0) }.addr() % Block::ALIGN, 0);
}

#[test]
fn unaligned_break_is_padded() {
  let mut brk = ProgramBreak::new();

  misalign_break();
  let unaligned = brk.current_break();

  let start = brk.grow(64).unwrap();
  assert_eq!(start.as_ptr().addr() % Block::ALIGN, 0);
  assert_eq!(start.as_ptr().addr(), unaligned.addr().next_multiple_of(Block::ALIGN));
  assert_eq!(start.as_ptr().wrapping_add(64), brk.current_break());

  brk.shrink(64).unwrap();
  assert_eq!(brk.current_break(), start.as_ptr());

  // The same holds for a heap block appended at an unaligned break, and
  // releasing it brings the break back to the aligned start.
  let heap = Heap::new(ProgramBreak::new());
  misalign_break();
  let unaligned = heap.current_break();

  let payload = heap.allocate(24).unwrap();
  let header = payload.as_ptr().wrapping_sub(Block::SIZE);
  assert_eq!(header.addr(), unaligned.addr().next_multiple_of(Block::ALIGN));
  assert_eq!(header.wrapping_add(Block::extent_for(24).unwrap()), heap.current_break());

  unsafe { heap.release(Some(payload)) };
  assert!(heap.snapshot().is_empty());
  assert_eq!(heap.current_break(), header);
}
