//! Object Monitor Integration Tests
//!
//! Drives the monitor surface generated code uses (acquire/release/wait/
//! notify over heap objects) from multiple threads, including a guarded
//! queue built on wait/notify.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use core_types::TypeId;
use object_monitor::{acquire, notify_all, notify_one, release, wait, HeapObject};
use parking_lot::Mutex;

/// Test: the uncontended fast path performs no heavyweight allocation.
#[test]
fn test_fast_path_zero_heavyweight_records() {
    let obj = HeapObject::new(TypeId::new(0));
    for _ in 0..10_000 {
        acquire(&obj);
        release(&obj).unwrap();
    }
    assert!(!obj.header().monitor().is_inflated());
}

/// Test: mutual exclusion holds whether promotion happens before or after
/// the second thread's first attempt.
#[test]
fn test_mutual_exclusion_across_promotion_orders() {
    for pre_inflate in [false, true] {
        let obj = HeapObject::new(TypeId::new(0));
        if pre_inflate {
            acquire(&obj);
            wait(&obj, Some(Duration::from_millis(1))).unwrap();
            release(&obj).unwrap();
            assert!(obj.header().monitor().is_inflated());
        }

        let in_section = AtomicU32::new(0);
        thread::scope(|s| {
            for _ in 0..2 {
                let obj = &obj;
                let in_section = &in_section;
                s.spawn(move || {
                    for _ in 0..500 {
                        acquire(obj);
                        assert_eq!(in_section.fetch_add(1, Ordering::SeqCst), 0);
                        in_section.fetch_sub(1, Ordering::SeqCst);
                        release(obj).unwrap();
                    }
                });
            }
        });
    }
}

/// Test: a bounded queue guarded by one object monitor, the shape
/// generated code produces for synchronized blocks with wait/notify.
#[test]
fn test_guarded_queue_with_wait_notify() {
    const ITEMS: usize = 200;

    let obj = HeapObject::new(TypeId::new(0));
    let queue: Mutex<VecDeque<usize>> = Mutex::new(VecDeque::new());
    let consumed = AtomicUsize::new(0);

    thread::scope(|s| {
        // Two consumers.
        for _ in 0..2 {
            let obj = &obj;
            let queue = &queue;
            let consumed = &consumed;
            s.spawn(move || loop {
                acquire(obj);
                let item = loop {
                    if let Some(item) = queue.lock().pop_front() {
                        break Some(item);
                    }
                    if consumed.load(Ordering::SeqCst) >= ITEMS {
                        break None;
                    }
                    // Timeout doubles as a lost-race re-check.
                    wait(obj, Some(Duration::from_millis(100))).unwrap();
                };
                release(obj).unwrap();
                match item {
                    Some(_) => {
                        consumed.fetch_add(1, Ordering::SeqCst);
                    }
                    None => return,
                }
            });
        }

        // One producer.
        let obj = &obj;
        let queue = &queue;
        s.spawn(move || {
            for item in 0..ITEMS {
                acquire(obj);
                queue.lock().push_back(item);
                notify_one(obj).unwrap();
                release(obj).unwrap();
            }
            // Flush any consumer still parked after the last item.
            acquire(obj);
            notify_all(obj).unwrap();
            release(obj).unwrap();
        });
    });

    assert_eq!(consumed.load(Ordering::SeqCst), ITEMS);
}

/// Test: timed wait expires on its own and leaves the caller owning the
/// monitor, indistinguishable from losing a race.
#[test]
fn test_wait_timeout_is_a_plain_wakeup() {
    let obj = HeapObject::new(TypeId::new(0));
    acquire(&obj);
    wait(&obj, Some(Duration::from_millis(5))).unwrap();
    assert!(obj.header().monitor().is_held_by_current_thread());
    release(&obj).unwrap();
}

/// Test: monitor misuse from a non-owner is rejected without disturbing
/// the owner.
#[test]
fn test_non_owner_operations_fail() {
    let obj = HeapObject::new(TypeId::new(0));
    acquire(&obj);
    thread::scope(|s| {
        let obj = &obj;
        s.spawn(move || {
            assert!(release(obj).is_err());
            assert!(notify_one(obj).is_err());
            assert!(notify_all(obj).is_err());
            assert!(wait(obj, None).is_err());
        });
    });
    // Owner is unaffected.
    assert!(obj.header().monitor().is_held_by_current_thread());
    release(&obj).unwrap();
}
