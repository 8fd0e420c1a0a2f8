use thiserror::Error;

/// Why a heap operation returned no block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("zero-sized allocation request")]
  ZeroSize,
  #[error("allocation size overflows: {count} x {element_size}")]
  Overflow { count: usize, element_size: usize },
  #[error("alignment {align} is not a power of two")]
  Alignment { align: usize },
  #[error("heap exhausted while allocating {requested} bytes")]
  Exhausted {
    requested: usize,
    #[source]
    source: BreakError,
  },
}

/// Failure reported by a [`BreakAllocator`](crate::BreakAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BreakError {
  #[error("moving the program break by {bytes} bytes was refused (errno {errno})")]
  Refused { bytes: usize, errno: i32 },
  #[error("break adjustment of {bytes} bytes does not fit the address space")]
  TooLarge { bytes: usize },
  #[error("arena cannot grow by {requested} bytes, {available} left")]
  OutOfCapacity { requested: usize, available: usize },
  #[error("cannot shrink by {decrement} bytes, only {used} in use")]
  Underflow { decrement: usize, used: usize },
  #[error("cannot reserve an arena of {capacity} bytes")]
  Reserve { capacity: usize },
}

#[cfg(test)]
mod tests {
  use std::error::Error as _;

  use super::*;

  #[test]
  fn test_exhausted_keeps_source() {
    let err = AllocError::Exhausted {
      requested: 64,
      source: BreakError::OutOfCapacity {
        requested: 96,
        available: 10,
      },
    };

    assert_eq!(err.to_string(), "heap exhausted while allocating 64 bytes");
    let source = err.source().map(ToString::to_string);
    assert_eq!(source.as_deref(), Some("arena cannot grow by 96 bytes, 10 left"));
  }

  #[test]
  fn test_overflow_message() {
    let err = AllocError::Overflow {
      count: usize::MAX,
      element_size: 2,
    };
    assert!(err.to_string().starts_with("allocation size overflows"));
  }

  #[test]
  fn test_reserve_message() {
    let err = BreakError::Reserve { capacity: usize::MAX };
    assert_eq!(err.to_string(), format!("cannot reserve an arena of {} bytes", usize::MAX));
  }
}
