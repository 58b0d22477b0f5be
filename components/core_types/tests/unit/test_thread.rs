//! Unit tests for VM thread identity

use core_types::vm_thread;
use std::thread;

#[test]
fn test_every_thread_gets_a_distinct_token() {
    let mine = vm_thread::current();
    let handles: Vec<_> = (0..4).map(|_| thread::spawn(vm_thread::current)).collect();
    let mut tokens = vec![mine];
    for handle in handles {
        tokens.push(handle.join().expect("thread panicked"));
    }
    for (i, a) in tokens.iter().enumerate() {
        assert_ne!(a.get(), 0);
        for b in &tokens[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_cross_thread_interrupt() {
    let (tx, rx) = std::sync::mpsc::channel();
    let worker = thread::spawn(move || {
        tx.send(vm_thread::current()).expect("send token");
        // Spin until the interrupt arrives.
        while !vm_thread::is_interrupted() {
            thread::yield_now();
        }
        vm_thread::take_interrupt()
    });

    let token = rx.recv().expect("worker token");
    assert!(vm_thread::interrupt(token));
    assert!(worker.join().expect("worker panicked"));
}
