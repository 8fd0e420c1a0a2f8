//! # brkheap - A First-Fit Heap Allocator
//!
//! This crate provides a `malloc`-family allocator that manages one growable
//! region, by default the process program break moved with `sbrk(2)`.
//!
//! ## Overview
//!
//! Every payload is preceded by a fixed-size header. Headers form a singly
//! linked list in the order blocks were created:
//!
//! ```text
//!   head                                                   tail
//!    │                                                       │
//!    ▼                                                       ▼
//!   ┌────────┬──────────────┐  ┌────────┬──────┐  ┌────────┬──────────┐
//!   │ Block  │   payload    │─►│ Block  │ ...  │─►│ Block  │ payload  │
//!   │ size   │              │  │ free   │      │  │ next=0 │          │
//!   └────────┴──────────────┘  └────────┴──────┘  └────────┴──────────┘
//!                                                                     ▲
//!                                                               Program
//!                                                                Break
//! ```
//!
//! - **allocate** reuses the first free block that is large enough, without
//!   splitting it, or appends a new block at the break.
//! - **release** marks a block free; free blocks that end at the break are
//!   handed back to the operating system.
//! - **resize** keeps blocks that are already large enough and otherwise
//!   moves the contents to a new block.
//! - **zero_allocate** allocates an array and clears it.
//!
//! Adjacent free blocks are never merged, and there is a single list and a
//! single lock per heap.
//!
//! ## Crate Structure
//!
//! ```text
//!   brkheap
//!   ├── align      - Alignment macros (align!, try_align!)
//!   ├── block      - Block header and diagnostic summaries
//!   ├── brk        - BreakAllocator trait, ProgramBreak and Arena backends
//!   ├── error      - AllocError and BreakError
//!   ├── global     - Process-wide heap with malloc/calloc/realloc/free
//!   └── heap       - Heap implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkheap::Heap;
//!
//! let heap = Heap::with_arena(4096).unwrap();
//!
//! unsafe {
//!     let ptr = heap.allocate(8).unwrap().cast::<u64>();
//!     ptr.write(42);
//!     assert_eq!(ptr.read(), 42);
//!     heap.release(Some(ptr.cast()));
//! }
//!
//! assert!(heap.snapshot().is_empty());
//! ```
//!
//! ## Limitations
//!
//! - **Shared program break**: other code moving the break can race with
//!   the shrink path of [`ProgramBreak`].
//! - **No validation**: releasing a foreign pointer or releasing twice is
//!   undefined behavior.
//! - **Alignment**: payloads are aligned to [`Block::ALIGN`]. Larger
//!   alignments, from [`Heap::allocate_aligned`] or the
//!   [`GlobalAlloc`](std::alloc::GlobalAlloc) adapter, cost padding in front
//!   of the header.
//! - **Unix-only**: [`ProgramBreak`] requires `libc` and `sbrk`.

#[macro_use]
mod trace;

#[macro_use]
pub mod align;
mod block;
mod brk;
mod error;
pub mod global;
mod heap;

pub use block::{Block, BlockSummary};
pub use brk::{Arena, BreakAllocator, ProgramBreak};
pub use error::{AllocError, BreakError};
pub use heap::{Heap, HeapSnapshot};
