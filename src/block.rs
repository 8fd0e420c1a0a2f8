use std::{fmt, mem, ptr::NonNull};

/// Record header placed immediately before every payload.
///
/// The layout is fixed: a payload always starts exactly [`Block::SIZE`]
/// bytes after its header, and headers are aligned to [`Block::ALIGN`].
/// Blocks created for a larger alignment are preceded by `lead` bytes of
/// padding that belong to the block.
#[repr(C, align(16))]
#[derive(Debug)]
pub struct Block {
  pub(crate) size: usize,
  pub(crate) lead: usize,
  pub(crate) is_free: bool,
  pub(crate) next: *mut Block,
}

impl Block {
  /// Size of the header in bytes, and the offset from header to payload.
  pub const SIZE: usize = mem::size_of::<Block>();

  /// Alignment of every header and every payload handed out.
  pub const ALIGN: usize = mem::align_of::<Block>();

  pub(crate) fn new(
    size: usize,
    is_free: bool,
    next: *mut Block,
  ) -> Self {
    Self {
      size,
      lead: 0,
      is_free,
      next,
    }
  }

  pub(crate) fn with_lead(
    self,
    lead: usize,
  ) -> Self {
    Self { lead, ..self }
  }

  /// Number of bytes a block with a `size`-byte payload occupies, or `None`
  /// if that does not fit in a `usize`.
  pub fn extent_for(size: usize) -> Option<usize> {
    try_align!(size)?.checked_add(Self::SIZE)
  }

  /// Padding needed between a `Block::ALIGN`-aligned `start` and a header
  /// whose payload is aligned to `align`, a power of two of at least
  /// `Block::ALIGN`.
  pub(crate) fn lead_for(
    start: usize,
    align: usize,
  ) -> Option<usize> {
    let payload = start.checked_add(Self::SIZE)?.checked_next_multiple_of(align)?;
    Some(payload - Self::SIZE - start)
  }

  /// Bytes occupied by this block: leading padding, header and payload.
  pub(crate) fn extent(&self) -> usize {
    self.lead + Self::SIZE + align!(self.size)
  }

  /// Recovers the header of a payload pointer.
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`Block::payload`].
  pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<Block> {
    unsafe { payload.sub(Self::SIZE) }.cast()
  }

  /// Payload pointer of a header.
  ///
  /// # Safety
  ///
  /// `block` must point to a header followed by its payload.
  pub(crate) unsafe fn payload(block: NonNull<Block>) -> NonNull<u8> {
    unsafe { block.cast::<u8>().add(Self::SIZE) }
  }

  /// First address past the block, i.e. where the next block would start.
  ///
  /// # Safety
  ///
  /// `block` must point to a valid header.
  pub(crate) unsafe fn end(block: NonNull<Block>) -> *mut u8 {
    unsafe {
      let size = block.as_ref().size;
      block.cast::<u8>().as_ptr().add(Self::SIZE + align!(size))
    }
  }

  /// # Safety
  ///
  /// `block` must point to a valid header.
  pub(crate) unsafe fn summarize(block: NonNull<Block>) -> BlockSummary {
    let header = unsafe { block.as_ref() };
    BlockSummary {
      address: block.as_ptr().addr(),
      size: header.size,
      is_free: header.is_free,
      next: header.next.addr(),
    }
  }
}

/// Read-only view of one record, as reported by the diagnostic dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSummary {
  /// Address of the header.
  pub address: usize,
  /// Payload size recorded when the block was created.
  pub size: usize,
  pub is_free: bool,
  /// Address of the next header in creation order, `0` for the tail.
  pub next: usize,
}

impl BlockSummary {
  /// Address of the payload that follows the header.
  pub fn payload(&self) -> usize {
    self.address + Block::SIZE
  }
}

impl fmt::Display for BlockSummary {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "addr = {:#x}, size = {}, is_free={}, next={:#x}",
      self.address, self.size, self.is_free as u8, self.next
    )
  }
}
