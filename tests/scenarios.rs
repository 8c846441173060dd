//! End-to-end scenarios: growth, boundary inserts, drain-to-empty, reuse
//! after clear, shared allocators, serialization and disposal.

use std::io::Cursor as IoCursor;
use std::rc::Rc;

use pooled_vec::{
    Error, HybridAllocator, MemoryStore, Options, PooledVec, PostcardSink, PostcardSource, Queue,
    SerializeError, SharedPool,
};

fn options() -> Options {
    Options::new().max_segment_capacity(16)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn scenario_sequential_append_grows_levels() {
    let mut vec = PooledVec::with_options(options());
    for i in 0..100_000 {
        vec.push(i);
    }
    assert_eq!(vec.len(), 100_000);
    assert_eq!(vec[50_000], 50_000);
    assert!(vec.depth() > 1);
    assert_eq!(vec.segment_count(), 6250);
    assert_eq!(vec.last(), Some(&99_999));
}

#[test]
fn scenario_top_branch_overflow_adds_a_level() {
    const BOUNDARY: usize = 1 << 20;
    let mut vec = PooledVec::with_options(options());
    let mut expected: Vec<u32> = Vec::new();
    for i in 0..(BOUNDARY + 40) as u32 {
        vec.push(i);
        expected.push(i);
    }
    // A level-one branch holds 65536 segments of 16; one more forces depth 3.
    assert_eq!(vec.depth(), 3);
    assert_eq!(vec.segment_count(), 65539);
    assert_eq!(vec[BOUNDARY], BOUNDARY as u32);

    for index in [BOUNDARY - 3, BOUNDARY, BOUNDARY + 5, 5] {
        vec.insert(index, u32::MAX).unwrap();
        expected.insert(index, u32::MAX);
    }
    for index in [BOUNDARY + 5, BOUNDARY, BOUNDARY - 3, 3] {
        assert_eq!(vec.remove_at(index), Ok(expected.remove(index)));
    }
    for _ in 0..60 {
        assert_eq!(vec.remove_at(0), Ok(expected.remove(0)));
    }
    assert_eq!(vec.len(), expected.len());
    assert!(vec.iter().eq(expected.iter()));
    let sizes: Vec<usize> = vec.segments().map(<[u32]>::len).collect();
    assert!(sizes[..sizes.len() - 1].iter().all(|&size| size == 16));

    vec.truncate(BOUNDARY - 10);
    expected.truncate(BOUNDARY - 10);
    vec.ensure(BOUNDARY + 17, 7);
    expected.resize(BOUNDARY + 17, 7);
    vec.push(8);
    expected.push(8);
    assert_eq!(vec.depth(), 3);
    assert_eq!(vec.len(), expected.len());
    assert!(vec.iter().eq(expected.iter()));
}

#[test]
fn scenario_insert_front_of_full_segment() {
    let mut vec = PooledVec::with_options(options());
    vec.extend(0..16);
    assert_eq!(vec.segment_count(), 1);
    let mut expected: Vec<i32> = (0..16).collect();

    vec.insert(0, -1).unwrap();
    expected.insert(0, -1);

    assert_eq!(vec.len(), expected.len());
    for (i, value) in expected.iter().enumerate() {
        assert_eq!(&vec[i], value);
    }
    assert_eq!(vec.segment_count(), 2);
    assert_eq!(vec.last(), Some(&15));
}

#[test]
fn scenario_remove_front_until_empty() {
    let mut vec = PooledVec::with_options(options());
    vec.extend(0..2000);
    assert!(vec.depth() > 1);
    for expected in 0..2000 {
        assert_eq!(vec.remove_at(0), Ok(expected));
    }
    assert!(vec.is_empty());
    assert_eq!(vec.depth(), 0);
    assert_eq!(vec.segment_count(), 0);

    vec.push(7);
    assert_eq!(vec.depth(), 1);
    assert_eq!(vec.as_slice(), Some(&[7][..]));
}

#[test]
fn scenario_clear_then_add_matches_fresh() {
    let mut reused = PooledVec::with_options(options());
    reused.extend(0..500);
    reused.clear();
    assert_eq!(reused.depth(), 0);

    let mut fresh = PooledVec::with_options(options());
    for i in 0..40 {
        reused.push(i);
        fresh.push(i);
    }
    assert_eq!(reused, fresh);
    assert_eq!(reused.depth(), fresh.depth());
    let reused_sizes: Vec<usize> = reused.segments().map(<[i32]>::len).collect();
    let fresh_sizes: Vec<usize> = fresh.segments().map(<[i32]>::len).collect();
    assert_eq!(reused_sizes, fresh_sizes);
}

#[test]
fn scenario_sorted_insert_at_search_point() {
    let mut vec = PooledVec::with_options(options());
    vec.extend((0..300).map(|x| x * 3));
    for probe in [-5, 0, 1, 150, 449, 900, 2000] {
        let at = match vec.binary_search(&probe) {
            Ok(found) => found,
            Err(at) => at,
        };
        vec.insert(at, probe).unwrap();
        assert!(vec.is_sorted());
    }
}

// ============================================================================
// ALLOCATORS
// ============================================================================

#[test]
fn shared_pool_serves_two_vectors() {
    let pool = Rc::new(SharedPool::<i32>::new());
    let mut first = PooledVec::with_options_in(options(), Rc::clone(&pool));
    first.extend(0..160);
    drop(first);
    let retained = pool.retained();
    assert!(retained >= 10);

    let mut second = PooledVec::with_options_in(options(), Rc::clone(&pool));
    second.extend(0..160);
    assert!(pool.retained() < retained);
    assert!(second.iter().copied().eq(0..160));
}

#[test]
fn borrowed_pool_is_an_allocator() {
    let pool = SharedPool::<u64>::new();
    {
        let mut vec = PooledVec::new_in(&pool);
        vec.extend(0..100u64);
        vec.clear();
    }
    assert!(pool.retained() > 0);
    pool.trim();
    assert_eq!(pool.retained(), 0);
}

#[test]
fn hybrid_pools_only_large_buffers() {
    let hybrid = Rc::new(HybridAllocator::<i32>::new());
    let options = Options::new().max_segment_capacity(1024);
    let mut vec = PooledVec::with_options_in(options, Rc::clone(&hybrid));
    vec.extend(0..1000);
    // 128, 256 and 512 were outgrown; everything up to 64 went back to the heap.
    assert_eq!(hybrid.pool().retained(), 3);
    drop(vec);
    assert_eq!(hybrid.pool().retained(), 4);
}

#[test]
fn pooled_buffers_keep_no_stale_elements() {
    let marker = Rc::new(());
    let pool = Rc::new(SharedPool::<Rc<()>>::new());
    let options = options().clear_on_return(false);
    let mut vec = PooledVec::with_options_in(options, Rc::clone(&pool));
    for _ in 0..40 {
        vec.push(Rc::clone(&marker));
    }
    vec.clear();
    // Lazily cleared: the pool still owns the clones.
    assert!(Rc::strong_count(&marker) > 1);

    let mut next = PooledVec::with_options_in(Options::new().max_segment_capacity(16), Rc::clone(&pool));
    next.ensure(48, Rc::new(()));
    assert!(next.iter().all(|item| !Rc::ptr_eq(item, &marker)));
    drop(next);
    drop(vec);
    pool.trim();
    assert_eq!(Rc::strong_count(&marker), 1);
}

// ============================================================================
// SERIALIZATION
// ============================================================================

#[test]
fn memory_store_round_trip_with_pool() {
    let mut vec = PooledVec::with_options(options());
    vec.extend((0..777).map(|i| format!("item-{i}")));
    vec.remove_at(100).unwrap();

    let mut store = MemoryStore::new();
    vec.serialize_into(&mut store).unwrap();
    assert_eq!(store.arrays().len(), vec.segment_count());

    let pool = Rc::new(SharedPool::<String>::new());
    let copy = PooledVec::deserialize_in(&mut store, Rc::clone(&pool)).unwrap();
    assert_eq!(copy, vec);
    assert_eq!(copy.version(), vec.version());
    assert_eq!(copy.max_segment_capacity(), 16);
}

#[test]
fn postcard_round_trip_through_reader() {
    let mut vec = PooledVec::with_options(options());
    vec.extend((0..300u64).map(|i| i * i));

    let mut sink = PostcardSink::new(Vec::new());
    vec.serialize_into(&mut sink).unwrap();
    let bytes = sink.into_inner();

    let mut source = PostcardSource::new(IoCursor::new(bytes));
    let copy: PooledVec<u64> = PooledVec::deserialize_from(&mut source).unwrap();
    assert_eq!(copy, vec);
}

#[test]
fn missing_array_fails_deserialization() {
    let mut vec = PooledVec::with_options(options());
    vec.extend(0..100u8);
    let mut store = MemoryStore::new();
    vec.serialize_into(&mut store).unwrap();
    store.arrays_mut().truncate(4);

    let err = PooledVec::<u8>::deserialize_from(&mut store).unwrap_err();
    assert!(matches!(err, SerializeError::MissingArray { index: 4 }));
    assert_eq!(err.to_string(), "segment array 4 is missing");
}

// ============================================================================
// ENUMERATION, ADAPTERS AND DISPOSAL
// ============================================================================

#[test]
fn cursor_fails_after_structural_change() {
    let mut vec = PooledVec::with_options(options());
    vec.extend(0..100);
    let mut cursor = vec.cursor();
    for expected in 0..50 {
        assert_eq!(cursor.advance(&vec), Ok(Some(&expected)));
    }
    vec.sort();
    assert_eq!(cursor.advance(&vec), Err(Error::Modified));
}

#[test]
fn queue_over_pooled_storage() {
    let mut queue = Queue::with_options(options());
    for round in 0..5 {
        queue.extend(round * 100..round * 100 + 100);
        for expected in round * 100..round * 100 + 100 {
            assert_eq!(queue.dequeue(), Ok(expected));
        }
        assert!(queue.is_empty());
    }
    assert_eq!(queue.dequeue(), Err(Error::Empty));
}

#[test]
fn dispose_is_idempotent_and_poisons() {
    let mut vec = PooledVec::with_options(options());
    vec.extend(0..100);
    vec.dispose();
    assert!(vec.is_disposed());
    assert!(vec.is_empty());
    assert_eq!(vec.version(), u16::MAX);
    vec.dispose();
    vec.clear();
    assert_eq!(vec.version(), u16::MAX);
}

#[test]
#[should_panic(expected = "PooledVec used after dispose")]
fn insert_after_dispose_panics() {
    let mut vec: PooledVec<i32> = PooledVec::new();
    vec.dispose();
    let _ = vec.insert(0, 1);
}
