use crossbeam_utils::Backoff;
use slotcell::{AtomicCell, CompareExchangeError};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn atomic_cell_is_send_sync() {
    assert_send_sync::<AtomicCell<u64>>();
    assert_send_sync::<AtomicCell<String>>();
    assert_send_sync::<AtomicCell<Option<Arc<str>>>>();
}

#[test]
fn get_returns_initial_value() {
    let cell = AtomicCell::new("A");
    assert_eq!(*cell.get(), "A");
}

#[test]
fn swap_from_current_value_succeeds() {
    let cell = AtomicCell::new("A");
    let a = cell.get();
    assert!(cell.compare_and_swap(&a, Arc::new("B")));
    assert_eq!(*cell.get(), "B");
}

#[test]
fn swap_from_other_value_fails_and_leaves_slot() {
    let cell = AtomicCell::new("A");
    let before = cell.get();
    assert!(!cell.compare_and_swap(&Arc::new("X"), Arc::new("B")));
    let after = cell.get();
    assert_eq!(*after, "A");
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn comparison_is_by_identity_not_content() {
    let cell = AtomicCell::new(String::from("A"));
    let lookalike = Arc::new(String::from("A"));
    assert_eq!(*cell.get(), *lookalike);
    assert!(!cell.compare_and_swap(&lookalike, Arc::new(String::from("B"))));
    assert_eq!(cell.get().as_str(), "A");
}

#[test]
fn failed_swap_is_repeatable_without_side_effects() {
    let cell = AtomicCell::new(1_u32);
    let original = cell.get();
    let stale = Arc::new(1_u32);
    for _ in 0..10 {
        assert!(!cell.compare_and_swap(&stale, Arc::new(99)));
    }
    assert!(Arc::ptr_eq(&cell.get(), &original));
}

#[test]
fn stale_expected_fails_after_successful_swap() {
    let cell = AtomicCell::new(0_u32);
    let v0 = cell.get();
    assert!(cell.compare_and_swap(&v0, Arc::new(1)));
    assert!(!cell.compare_and_swap(&v0, Arc::new(2)));
    assert_eq!(*cell.get(), 1);
}

#[test]
fn swapping_in_the_same_value_keeps_it_current() {
    let cell = AtomicCell::new(5_u32);
    let v = cell.get();
    assert!(cell.compare_and_swap(&v, Arc::clone(&v)));
    assert!(Arc::ptr_eq(&cell.get(), &v));
}

#[test]
fn compare_exchange_reports_witnessed_value() {
    let cell = AtomicCell::new(0_u32);
    let v0 = cell.get();
    let v1 = Arc::new(1_u32);
    assert!(cell.compare_and_swap(&v0, Arc::clone(&v1)));

    let CompareExchangeError {
        current,
        replacement,
    } = cell.compare_exchange(&v0, Arc::new(2)).unwrap_err();
    assert!(Arc::ptr_eq(&current, &v1));
    assert_eq!(*replacement, 2);
}

#[test]
fn compare_exchange_error_displays() {
    let cell = AtomicCell::new(0_u32);
    let err = cell.compare_exchange(&Arc::new(0), Arc::new(1)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "atomic cell no longer holds the expected value"
    );
    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_none());
}

#[test]
fn nullable_values_via_option() {
    let cell: AtomicCell<Option<String>> = AtomicCell::default();
    let empty = cell.get();
    assert!(empty.is_none());
    assert!(cell.compare_and_swap(&empty, Arc::new(Some(String::from("set")))));
    assert_eq!(cell.get().as_deref(), Some("set"));
}

#[test]
fn constructors_and_debug() {
    let shared = Arc::new(3_u8);
    let cell: AtomicCell<u8> = AtomicCell::from(Arc::clone(&shared));
    assert!(Arc::ptr_eq(&cell.get(), &shared));
    assert_eq!(format!("{cell:?}"), "AtomicCell { value: 3 }");

    let cell: AtomicCell<u8> = AtomicCell::from(4_u8);
    assert_eq!(*cell.into_inner(), 4);
}

#[test]
fn reader_keeps_value_after_it_is_swapped_out() {
    let cell = AtomicCell::new(vec![1, 2, 3]);
    let old = cell.get();
    assert!(cell.compare_and_swap(&old, Arc::new(vec![4])));
    drop(cell);
    assert_eq!(*old, [1, 2, 3]);
}

#[test]
fn race_on_same_expected_has_exactly_one_winner() {
    const THREADS: usize = 8;

    for _ in 0..50 {
        let cell = AtomicCell::new(usize::MAX);
        let start = cell.get();
        let barrier = Barrier::new(THREADS);

        let winners: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|id| {
                    let (cell, start, barrier) = (&cell, &start, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        cell.compare_and_swap(start, Arc::new(id)).then_some(id)
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().unwrap())
                .collect()
        });

        assert_eq!(winners.len(), 1);
        assert_eq!(*cell.get(), winners[0]);
    }
}

#[test]
fn caller_retry_loop_loses_no_updates() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 2_000;

    let cell = AtomicCell::new(0_usize);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..PER_THREAD {
                    let backoff = Backoff::new();
                    let mut seen = cell.get();
                    loop {
                        match cell.compare_exchange(&seen, Arc::new(*seen + 1)) {
                            Ok(()) => break,
                            Err(lost) => {
                                seen = lost.current;
                                backoff.spin();
                            }
                        }
                    }
                }
            });
        }
    });

    assert_eq!(*cell.get(), THREADS * PER_THREAD);
}

#[test]
fn readers_only_observe_published_values() {
    const WRITES: usize = 5_000;

    // Each published pair is (n, n * 2); a torn or recycled value would break it.
    let cell = AtomicCell::new((0_usize, 0_usize));

    thread::scope(|s| {
        s.spawn(|| {
            for n in 1..=WRITES {
                let seen = cell.get();
                assert!(cell.compare_and_swap(&seen, Arc::new((n, n * 2))));
            }
        });

        for _ in 0..3 {
            s.spawn(|| {
                let mut last = 0;
                loop {
                    let value = cell.get();
                    let (n, doubled) = *value;
                    assert_eq!(doubled, n * 2);
                    assert!(n >= last, "read went backwards: {n} after {last}");
                    last = n;
                    if n == WRITES {
                        break;
                    }
                }
            });
        }
    });
}

#[test]
fn append_only_chain_built_on_the_cell() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;

    let chain: AtomicCell<Vec<usize>> = AtomicCell::default();

    thread::scope(|s| {
        for t in 0..THREADS {
            let chain = &chain;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let entry = t * PER_THREAD + i;
                    let backoff = Backoff::new();
                    loop {
                        let seen = chain.get();
                        let mut next = (*seen).clone();
                        next.push(entry);
                        if chain.compare_and_swap(&seen, Arc::new(next)) {
                            break;
                        }
                        backoff.snooze();
                    }
                }
            });
        }
    });

    let entries = chain.get();
    assert_eq!(entries.len(), THREADS * PER_THREAD);
    let unique: HashSet<_> = entries.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);
}
