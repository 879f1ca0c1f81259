//! An example program that drives a heap with a random mix of allocations,
//! releases and resizes, and checks validity along the way.

use std::ptr::NonNull;

use implicit_alloc::{AllocError, Heap, HeapGrower, ToyHeap};

use rand::distributions::{Distribution, Uniform};
use rand::{Rng, RngCore, SeedableRng};

// Minimum number of allocations before we start releasing
const MIN_ALLOCATIONS: usize = 256;
// Total number of operations
const OPERATIONS: usize = 16 * 1024;
// Log_2 of the largest request
const LOG2_MAX_SIZE: usize = 10;

struct RandomObjects {
    allocated: Vec<(NonNull<u8>, usize)>,
    max_size: usize,
    failures: usize,
}

impl RandomObjects {
    fn new(log2_max_size: usize) -> Self {
        RandomObjects {
            allocated: Vec::new(),
            max_size: 1 << log2_max_size.clamp(4, 16),
            failures: 0,
        }
    }

    fn create<R: Rng>(&mut self, heap: &mut Heap<ToyHeap>, rng: &mut R) {
        let size = Uniform::new_inclusive(1, self.max_size).sample(rng);
        match heap.allocate(size) {
            Ok(ptr) => self.allocated.push((ptr, size)),
            Err(AllocError::OutOfMemory { .. }) => self.failures += 1,
            Err(err) => panic!("{}", err),
        }
    }

    fn resize<R: Rng>(&mut self, heap: &mut Heap<ToyHeap>, rng: &mut R) {
        if self.allocated.is_empty() {
            return;
        }
        let ix = Uniform::new(0, self.allocated.len()).sample(rng);
        let size = Uniform::new_inclusive(1, self.max_size).sample(rng);
        let (ptr, _) = self.allocated[ix];
        match heap.resize(Some(ptr), size) {
            Ok(Some(new_ptr)) => self.allocated[ix] = (new_ptr, size),
            Ok(None) => unreachable!("resizing to a nonzero size"),
            Err(AllocError::OutOfMemory { .. }) => self.failures += 1,
            Err(err) => panic!("{}", err),
        }
    }

    fn destroy<R: Rng>(&mut self, heap: &mut Heap<ToyHeap>, rng: &mut R) {
        if self.allocated.is_empty() {
            return;
        }
        let ix = Uniform::new(0, self.allocated.len()).sample(rng);
        let (ptr, _) = self.allocated.swap_remove(ix);
        heap.release(ptr).unwrap();
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.contains(&"--help".to_owned()) {
        println!(
            "USAGE: {} [OPERATIONS] [MIN_ALLOCATIONS] [LOG2_MAX_SIZE]",
            args[0]
        );
        return;
    }
    let mut operations: usize = args
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(OPERATIONS);
    let min_allocations: usize = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(MIN_ALLOCATIONS);
    if operations < min_allocations {
        operations = min_allocations;
    }
    let log2_max_size: usize = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(LOG2_MAX_SIZE);

    env_logger::init();
    println!("Running Stress Test.\n\nParameters:");
    println!("    {} total operations", operations);
    println!("    {} allocations before any releases", min_allocations);
    println!("    2^{} max request size", log2_max_size);

    let seed: u64 = rand::thread_rng().next_u64();
    log::info!("Using seed {}", seed);
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    // The loop below checks the heap after every step itself
    let mut heap = Heap::with_checking(ToyHeap::default(), false);
    let mut objects = RandomObjects::new(log2_max_size);

    for i in 1..=operations {
        if i <= min_allocations {
            objects.create(&mut heap, &mut rng);
        } else {
            match rng.gen_range(0..3) {
                0 => objects.create(&mut heap, &mut rng),
                1 => objects.resize(&mut heap, &mut rng),
                _ => objects.destroy(&mut heap, &mut rng),
            }
        }

        let stats = heap.check_heap(false);
        assert_eq!(stats.allocated_count, objects.allocated.len());
        if i % 1024 == 0 {
            println!("Step {} / {}", i, operations);
            let requested: usize = objects.allocated.iter().map(|&(_, size)| size).sum();
            println!(
                "    Live objects: {}, requested bytes: {}",
                objects.allocated.len(),
                requested
            );
            println!("    Heap: {} bytes, {}", heap.grower().heap_size(), stats);
            println!("    Failed requests so far: {}", objects.failures);
        }
    }

    while !objects.allocated.is_empty() {
        objects.destroy(&mut heap, &mut rng);
    }

    let stats = heap.check_heap(true);
    println!("\nFinished.");
    println!("    Stats:    {}", stats);
    assert_eq!(stats.allocated_count, 0);
}
