use std::process::ExitCode;

use brkheap::global::{free, heap, malloc, print_mem_list, realloc};

/// Prints the current program break as the process heap sees it.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break = {:?}",
    label,
    std::process::id(),
    heap().current_break(),
  );
}

fn print_elements(
  label: &str,
  arr: *const i32,
  len: usize,
) {
  let values: Vec<String> = (0..len)
    .map(|i| unsafe { arr.add(i).read() }.to_string())
    .collect();
  println!("{label}: {}", values.join(" "));
}

fn main() -> ExitCode {
  print_program_break("start");

  // --------------------------------------------------------------------
  // 1) Allocate five ints and fill them with multiples of ten.
  // --------------------------------------------------------------------
  let arr = malloc(5 * size_of::<i32>()).cast::<i32>();
  if arr.is_null() {
    eprintln!("Memory allocation failed");
    return ExitCode::FAILURE;
  }

  for i in 0..5 {
    unsafe { arr.add(i).write(i as i32 * 10) };
  }
  print_elements("Array elements", arr, 5);

  // --------------------------------------------------------------------
  // 2) Grow to ten ints. The first five values move with the block.
  // --------------------------------------------------------------------
  let arr = unsafe { realloc(arr.cast(), 10 * size_of::<i32>()) }.cast::<i32>();
  if arr.is_null() {
    eprintln!("Memory reallocation failed");
    return ExitCode::FAILURE;
  }

  for i in 5..10 {
    unsafe { arr.add(i).write(i as i32 * 10) };
  }
  print_elements("Array elements after reallocation", arr, 10);
  print_program_break("after realloc");

  // --------------------------------------------------------------------
  // 3) Release the array and dump what is left of the record list.
  // --------------------------------------------------------------------
  unsafe { free(arr.cast()) };
  print_program_break("after free");

  if let Err(err) = print_mem_list() {
    eprintln!("failed to print heap: {err}");
    return ExitCode::FAILURE;
  }

  ExitCode::SUCCESS
}
