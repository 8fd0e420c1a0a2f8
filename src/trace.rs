//! Allocator event macros.
//!
//! Each callsite costs atomic loads even without a subscriber, and a
//! subscriber that allocates would re-enter the heap when it serves as the
//! global allocator, so events only compile in with the `trace-events` feature.

macro_rules! trace {
  ($($tt:tt)*) => {
    if cfg!(feature = "trace-events") {
      ::tracing::trace!($($tt)*);
    }
  };
}

macro_rules! debug {
  ($($tt:tt)*) => {
    if cfg!(feature = "trace-events") {
      ::tracing::debug!($($tt)*);
    }
  };
}

macro_rules! warn {
  ($($tt:tt)*) => {
    if cfg!(feature = "trace-events") {
      ::tracing::warn!($($tt)*);
    }
  };
}
