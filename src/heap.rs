use std::{
  alloc::{GlobalAlloc, Layout},
  fmt,
  marker::PhantomData,
  ptr::{self, NonNull},
};

use spin::Mutex;

use crate::{AllocError, Arena, Block, BlockSummary, BreakAllocator, BreakError};

/// A first-fit heap over a [`BreakAllocator`].
///
/// Records form a singly linked list in creation order. Released blocks are
/// kept for reuse, except free blocks at the end of the list that end at the
/// current break, which are handed back to the break allocator. Every
/// operation runs under one spin lock, which never allocates, so the heap can
/// serve as the global allocator.
pub struct Heap<B> {
  state: Mutex<HeapState<B>>,
}

struct HeapState<B> {
  head: *mut Block,
  tail: *mut Block,
  brk: B,
}

// Records are only reached through the state, and the state only under the
// heap lock.
unsafe impl<B: Send> Send for HeapState<B> {}

impl<B> HeapState<B> {
  fn blocks(&self) -> Blocks<'_> {
    Blocks {
      current: self.head,
      _state: PhantomData,
    }
  }

  unsafe fn find_free_block(
    &self,
    size: usize,
    align: usize,
  ) -> Option<NonNull<Block>> {
    unsafe {
      let mut current: *mut Block = self.head;

      while !current.is_null() {
        let aligned = (current.addr() + Block::SIZE) % align == 0;
        if (*current).is_free && (*current).size >= size && aligned {
          return NonNull::new(current);
        }
        current = (*current).next;
      }

      None
    }
  }

  unsafe fn push(
    &mut self,
    block: NonNull<Block>,
  ) {
    let block = block.as_ptr();

    if self.head.is_null() {
      self.head = block;
    } else {
      unsafe { (*self.tail).next = block };
    }
    self.tail = block;
  }

  /// Unlinks the tail. The old tail itself is never dereferenced, so this is
  /// sound after its memory is gone.
  unsafe fn pop_tail(&mut self) {
    if self.head == self.tail {
      self.head = ptr::null_mut();
      self.tail = ptr::null_mut();
      return;
    }

    unsafe {
      let mut current: *mut Block = self.head;
      while (*current).next != self.tail {
        current = (*current).next;
      }
      (*current).next = ptr::null_mut();
      self.tail = current;
    }
  }
}

impl<B: BreakAllocator> HeapState<B> {
  /// Returns free blocks at the end of the list to the break allocator while
  /// they end exactly at the current break.
  unsafe fn trim(&mut self) {
    while let Some(tail) = NonNull::new(self.tail) {
      unsafe {
        if !tail.as_ref().is_free || Block::end(tail) != self.brk.current_break() {
          return;
        }

        let extent = tail.as_ref().extent();
        if let Err(error) = self.brk.shrink(extent) {
          warn!(extent, %error, "break shrink refused, keeping free tail block");
          return;
        }

        self.pop_tail();
        trace!(extent, address = ?tail, "returned tail block");
      }
    }
  }
}

/// Walks the records of a locked heap in list order.
struct Blocks<'a> {
  current: *mut Block,
  _state: PhantomData<&'a Block>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockSummary;

  fn next(&mut self) -> Option<BlockSummary> {
    let block = NonNull::new(self.current)?;
    let summary = unsafe { Block::summarize(block) };
    self.current = unsafe { block.as_ref().next };
    Some(summary)
  }
}

impl<B> Heap<B> {
  /// Creates an empty heap. Nothing is requested from `brk` until the first
  /// allocation.
  pub const fn new(brk: B) -> Self {
    Self {
      state: Mutex::new(HeapState {
        head: ptr::null_mut(),
        tail: ptr::null_mut(),
        brk,
      }),
    }
  }
}

impl Heap<Arena> {
  /// Creates a heap over a private arena of `capacity` bytes.
  pub fn with_arena(capacity: usize) -> Result<Self, BreakError> {
    Ok(Self::new(Arena::with_capacity(capacity)?))
  }
}

impl<B: BreakAllocator> Heap<B> {
  /// Allocates `size` bytes.
  ///
  /// The first free block that is large enough is reused as is, without
  /// splitting. Otherwise a new block is appended at the break.
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    self.allocate_aligned(size, Block::ALIGN)
  }

  /// Allocates `size` bytes at an address that is a multiple of `align`.
  ///
  /// Alignments up to [`Block::ALIGN`] are always met. For larger ones only
  /// suitably placed free blocks are reused, and new blocks are preceded by
  /// padding that stays part of the block until it goes back to the break.
  pub fn allocate_aligned(
    &self,
    size: usize,
    align: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if !align.is_power_of_two() {
      return Err(AllocError::Alignment { align });
    }
    if size == 0 {
      debug!("refusing zero-sized allocation");
      return Err(AllocError::ZeroSize);
    }

    let align = align.max(Block::ALIGN);
    let mut state = self.state.lock();

    if let Some(mut block) = unsafe { state.find_free_block(size, align) } {
      let payload = unsafe {
        block.as_mut().is_free = false;
        Block::payload(block)
      };
      trace!(size, address = ?payload, "reused free block");
      return Ok(payload);
    }

    let too_large = AllocError::Exhausted {
      requested: size,
      source: BreakError::TooLarge { bytes: size },
    };
    let lead = try_align!(state.brk.current_break().addr())
      .and_then(|start| Block::lead_for(start, align))
      .ok_or(too_large)?;
    let extent = Block::extent_for(size)
      .and_then(|extent| extent.checked_add(lead))
      .ok_or(too_large)?;

    let start = state.brk.grow(extent).map_err(|source| {
      warn!(size, extent, error = %source, "heap growth refused");
      AllocError::Exhausted {
        requested: size,
        source,
      }
    })?;

    let block = unsafe { start.add(lead) }.cast::<Block>();
    let payload = unsafe {
      block.as_ptr().write(Block::new(size, false, ptr::null_mut()).with_lead(lead));
      state.push(block);
      Block::payload(block)
    };

    trace!(size, extent, lead, address = ?payload, "appended block");
    Ok(payload)
  }

  /// Allocates a zero-filled array of `count` elements of `element_size`
  /// bytes each.
  pub fn zero_allocate(
    &self,
    count: usize,
    element_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if count == 0 || element_size == 0 {
      debug!(count, element_size, "refusing zero-sized array");
      return Err(AllocError::ZeroSize);
    }

    let size = count.checked_mul(element_size).ok_or_else(|| {
      warn!(count, element_size, "array size overflows");
      AllocError::Overflow { count, element_size }
    })?;

    let payload = self.allocate(size)?;
    unsafe { payload.as_ptr().write_bytes(0, size) };

    Ok(payload)
  }

  /// Resizes a block to hold at least `new_size` bytes.
  ///
  /// `None`, or a `new_size` of zero, behaves like [`Heap::allocate`]. A
  /// block that is already large enough is returned unchanged. Otherwise the
  /// contents move to a new block and the old one is released; if that
  /// allocation fails the old block is left untouched.
  ///
  /// # Safety
  ///
  /// `payload` must be `None` or a live pointer returned by this heap.
  pub unsafe fn resize(
    &self,
    payload: Option<NonNull<u8>>,
    new_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    unsafe { self.resize_aligned(payload, new_size, Block::ALIGN) }
  }

  /// [`Heap::resize`] that allocates any moved block with `align`.
  unsafe fn resize_aligned(
    &self,
    payload: Option<NonNull<u8>>,
    new_size: usize,
    align: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let Some(payload) = payload.filter(|_| new_size != 0) else {
      return self.allocate_aligned(new_size, align);
    };

    // Only the owner of a live block touches its size.
    let old_size = unsafe { (*Block::from_payload(payload).as_ptr()).size };

    if old_size >= new_size {
      debug!(old_size, new_size, address = ?payload, "resized in place");
      return Ok(payload);
    }

    let resized = self.allocate_aligned(new_size, align)?;

    unsafe {
      ptr::copy_nonoverlapping(payload.as_ptr(), resized.as_ptr(), old_size);
      self.release(Some(payload));
    }

    Ok(resized)
  }

  /// Releases a block.
  ///
  /// The block is marked free. If it is the tail and ends at the current
  /// break, it is returned to the break allocator instead, together with any
  /// free blocks that end up at the break behind it. Unlike a plain
  /// tail-shrink, releasing the tail `b` right after a free `a` returns both:
  /// this is what leaves the list empty after a block is moved by
  /// [`Heap::resize`] and then released.
  ///
  /// # Safety
  ///
  /// `payload` must be `None` or a live pointer returned by this heap. It is
  /// not validated, so releasing it twice or releasing a foreign pointer is
  /// undefined behavior.
  pub unsafe fn release(
    &self,
    payload: Option<NonNull<u8>>,
  ) {
    let Some(payload) = payload else {
      return;
    };

    let mut state = self.state.lock();

    unsafe {
      let block = Block::from_payload(payload);
      (*block.as_ptr()).is_free = true;
      trace!(address = ?payload, "marked block free");

      if block.as_ptr() == state.tail {
        state.trim();
      }
    }
  }

  /// Address one past the heap's region, as reported by its break allocator.
  pub fn current_break(&self) -> *mut u8 {
    self.state.lock().brk.current_break()
  }
}

impl<B> Heap<B> {
  /// Calls `f` for every record in list order.
  ///
  /// The heap stays locked for the whole walk, so `f` must not allocate from
  /// this heap.
  pub fn for_each_block(
    &self,
    f: impl FnMut(BlockSummary),
  ) {
    self.state.lock().blocks().for_each(f);
  }

  /// Collects the list head, tail and every record.
  pub fn snapshot(&self) -> HeapSnapshot {
    let state = self.state.lock();

    HeapSnapshot {
      head: state.head.addr(),
      tail: state.tail.addr(),
      blocks: state.blocks().collect(),
    }
  }
}

impl<B: fmt::Debug> fmt::Debug for Heap<B> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let state = self.state.lock();

    f.debug_struct("Heap")
      .field("head", &state.head)
      .field("tail", &state.tail)
      .field("brk", &state.brk)
      .finish()
  }
}

/// Point-in-time copy of a heap's record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSnapshot {
  pub head: usize,
  pub tail: usize,
  pub blocks: Vec<BlockSummary>,
}

impl HeapSnapshot {
  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  /// Finds the record that owns `payload`.
  pub fn block_of(
    &self,
    payload: NonNull<u8>,
  ) -> Option<&BlockSummary> {
    self.blocks.iter().find(|block| block.payload() == payload.as_ptr().addr())
  }
}

impl fmt::Display for HeapSnapshot {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "head = {:#x}, tail = {:#x}", self.head, self.tail)?;
    for block in &self.blocks {
      writeln!(f, "{block}")?;
    }
    Ok(())
  }
}

unsafe impl<B: BreakAllocator> GlobalAlloc for Heap<B> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    self
      .allocate_aligned(layout.size(), layout.align())
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    match self.allocate_aligned(layout.size(), layout.align()) {
      Ok(payload) => {
        unsafe { payload.as_ptr().write_bytes(0, layout.size()) };
        payload.as_ptr()
      }
      Err(_) => ptr::null_mut(),
    }
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.release(NonNull::new(ptr)) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    unsafe { self.resize_aligned(NonNull::new(ptr), new_size, layout.align()) }
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }
}
