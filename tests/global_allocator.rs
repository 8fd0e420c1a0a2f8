//! Runs with a heap installed as the process allocator, so every allocation
//! here, std's own included, goes through it.

use std::{
  alloc::{self, Layout},
  slice,
  sync::mpsc,
  thread,
};

use brkheap::{Heap, ProgramBreak};

#[global_allocator]
static GLOBAL: Heap<ProgramBreak> = Heap::new(ProgramBreak::new());

const THREADS: usize = 32;
const ROUNDS: usize = 2000;

#[repr(align(128))]
struct Padded(u64);

fn contended_vectors() {
  let workers: Vec<_> = (0..THREADS)
    .map(|id| {
      thread::spawn(move || {
        let mut kept: Vec<Vec<u8>> = Vec::new();

        for round in 0..ROUNDS {
          let len = 1 + (id * 31 + round * 17) % 300;
          let tag = (id + round) as u8;
          let bytes = vec![tag; len];
          assert!(bytes.iter().all(|&byte| byte == tag));

          if round % 7 == 0 {
            kept.push(bytes);
          }
          if kept.len() > 16 {
            kept.remove(0);
          }
        }

        kept.iter().all(|bytes| bytes.iter().all(|&byte| byte == bytes[0]))
      })
    })
    .collect();

  for worker in workers {
    assert!(worker.join().unwrap());
  }
}

fn over_aligned_layouts() {
  for align in [32, 64, 128, 4096] {
    let layout = Layout::from_size_align(100, align).unwrap();

    unsafe {
      let block = alloc::alloc(layout);
      assert!(!block.is_null());
      assert_eq!(block.addr() % align, 0);
      block.write_bytes(0xA5, 100);

      let grown = alloc::realloc(block, layout, 1000);
      assert!(!grown.is_null());
      assert_eq!(grown.addr() % align, 0);
      assert!(slice::from_raw_parts(grown, 100).iter().all(|&byte| byte == 0xA5));
      alloc::dealloc(grown, Layout::from_size_align(1000, align).unwrap());

      let zeroed = alloc::alloc_zeroed(layout);
      assert!(!zeroed.is_null());
      assert_eq!(zeroed.addr() % align, 0);
      assert!(slice::from_raw_parts(zeroed, 100).iter().all(|&byte| byte == 0));
      alloc::dealloc(zeroed, layout);
    }
  }
}

fn channels_across_threads() {
  let (sender, receiver) = mpsc::channel::<Box<Padded>>();

  let producers: Vec<_> = (0..THREADS as u64)
    .map(|id| {
      let sender = sender.clone();
      thread::spawn(move || {
        for round in 0..100 {
          sender.send(Box::new(Padded(id * 1000 + round))).unwrap();
        }
      })
    })
    .collect();
  drop(sender);

  let mut received = 0;
  for padded in receiver {
    assert_eq!((&*padded as *const Padded).addr() % 128, 0);
    assert!(padded.0 % 1000 < 100);
    received += 1;
  }
  assert_eq!(received, THREADS * 100);

  for producer in producers {
    producer.join().unwrap();
  }
}

fn main() {
  contended_vectors();
  over_aligned_layouts();
  channels_across_threads();
  println!("global allocator: ok");
}
