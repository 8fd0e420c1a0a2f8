/// Rounds `value` up to the block header alignment.
///
/// Every region the heap requests from its break allocator is a header
/// followed by an aligned payload, so the next header lands on an aligned
/// address as well.
///
/// # Examples
///
/// ```rust
/// use brkheap::{Block, align};
///
/// assert_eq!(Block::ALIGN, 16);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(17), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::Block::ALIGN - 1) & !($crate::Block::ALIGN - 1)
  };
}

/// Like [`align!`], but yields `None` instead of overflowing.
///
/// ```rust
/// use brkheap::try_align;
///
/// assert_eq!(try_align!(1usize), Some(16));
/// assert_eq!(try_align!(usize::MAX), None);
/// ```
#[macro_export]
macro_rules! try_align {
  ($value:expr) => {
    usize::checked_add($value, $crate::Block::ALIGN - 1).map(|v| v & !($crate::Block::ALIGN - 1))
  };
}
