//! Two-tier monitor implementation.
//!
//! The monitor is a single atomic word for as long as it stays uncontended:
//! acquire is one compare-and-set, release is one compare-and-set, and no
//! memory is allocated. Contention, a recursion count at the cap, or any
//! use of the wait set promotes the monitor to a heavyweight record with a
//! real mutex and condition variables. Promotion is one-way.
//!
//! Word layout: `[owner:32][count:16][tag:2]`. A zeroed word is an unlocked
//! monitor, so freshly zeroed object headers need no further setup. `count`
//! is the number of re-entries beyond the first acquisition.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use core_types::{vm_thread, VmError};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Thin-lock re-entries tolerated before forced promotion to a heavyweight
/// record. Tunable; the packed count field has room for far larger values.
pub const THIN_RECURSION_CAP: u32 = 64;

const TAG_MASK: u64 = 0b11;
const TAG_THIN: u64 = 0b01;
const TAG_FAT: u64 = 0b10;
const UNLOCKED: u64 = 0;

const COUNT_SHIFT: u64 = 2;
const COUNT_MASK: u64 = 0xffff;
const OWNER_SHIFT: u64 = 18;

fn thin_word(owner: u32, count: u32) -> u64 {
    ((owner as u64) << OWNER_SHIFT) | (((count as u64) & COUNT_MASK) << COUNT_SHIFT) | TAG_THIN
}

fn thin_owner(word: u64) -> u32 {
    (word >> OWNER_SHIFT) as u32
}

fn thin_count(word: u64) -> u32 {
    ((word >> COUNT_SHIFT) & COUNT_MASK) as u32
}

/// State guarded by the heavyweight record's mutex.
#[derive(Default)]
struct FatState {
    /// Owning thread token, 0 when unowned.
    owner: u32,
    /// Re-entries beyond the first acquisition.
    recursion: u32,
    /// Threads currently parked in the wait set.
    waiters: u32,
    /// Notifications delivered but not yet consumed by a waiter.
    permits: u32,
}

/// Heavyweight monitor record: mutex, entry queue, wait set.
struct FatRecord {
    state: Mutex<FatState>,
    /// Signaled on release; threads blocked in acquire park here.
    entry: Condvar,
    /// Signaled by notify/notify_all; threads blocked in wait park here.
    wait_set: Condvar,
}

impl FatRecord {
    fn new() -> Self {
        FatRecord {
            state: Mutex::new(FatState::default()),
            entry: Condvar::new(),
            wait_set: Condvar::new(),
        }
    }

    /// Blocks until this thread owns the record.
    fn enter(&self, me: u32) {
        let mut state = self.state.lock();
        if state.owner == me {
            state.recursion += 1;
            return;
        }
        while state.owner != 0 {
            self.entry.wait(&mut state);
        }
        state.owner = me;
        state.recursion = 0;
    }

    fn exit(&self, me: u32) -> Result<(), VmError> {
        let mut state = self.state.lock();
        if state.owner != me {
            return Err(VmError::IllegalMonitorState(
                "release by a thread that does not own the monitor".to_string(),
            ));
        }
        if state.recursion > 0 {
            state.recursion -= 1;
        } else {
            state.owner = 0;
            self.entry.notify_one();
        }
        Ok(())
    }

    /// Releases the monitor, parks until notified, timed out, or
    /// interrupted, then re-acquires with the saved recursion count.
    fn wait(&self, me: u32, timeout: Option<Duration>) -> Result<(), VmError> {
        let mut state = self.state.lock();
        if state.owner != me {
            return Err(VmError::IllegalMonitorState(
                "wait by a thread that does not own the monitor".to_string(),
            ));
        }

        let saved_recursion = state.recursion;
        state.owner = 0;
        state.recursion = 0;
        state.waiters += 1;
        self.entry.notify_one();

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut interrupted = vm_thread::take_interrupt();
        while !interrupted && state.permits == 0 {
            match deadline {
                Some(deadline) => {
                    if self.wait_set.wait_until(&mut state, deadline).timed_out() {
                        // A timeout is indistinguishable from a lost race;
                        // the caller re-checks its condition.
                        break;
                    }
                }
                None => self.wait_set.wait(&mut state),
            }
            interrupted = vm_thread::take_interrupt();
        }
        if !interrupted && state.permits > 0 {
            state.permits -= 1;
        }
        state.waiters -= 1;

        while state.owner != 0 {
            self.entry.wait(&mut state);
        }
        state.owner = me;
        state.recursion = saved_recursion;

        if interrupted {
            Err(VmError::InterruptedWait)
        } else {
            Ok(())
        }
    }

    fn notify(&self, me: u32, all: bool) -> Result<(), VmError> {
        let mut state = self.state.lock();
        if state.owner != me {
            return Err(VmError::IllegalMonitorState(
                "notify by a thread that does not own the monitor".to_string(),
            ));
        }
        if all {
            state.permits = state.waiters;
            self.wait_set.notify_all();
        } else if state.waiters > state.permits {
            state.permits += 1;
            self.wait_set.notify_one();
        }
        Ok(())
    }

    fn owned_by(&self, me: u32) -> bool {
        self.state.lock().owner == me
    }
}

/// A two-tier object monitor.
///
/// Embedded in every object header, including type descriptors. See the
/// module docs for the representation.
pub struct Monitor {
    word: AtomicU64,
    record: OnceLock<FatRecord>,
}

impl Monitor {
    /// Creates an unlocked monitor.
    pub const fn new() -> Self {
        Monitor {
            word: AtomicU64::new(UNLOCKED),
            record: OnceLock::new(),
        }
    }

    /// Acquires the monitor, blocking if another thread owns it.
    /// Re-entrant: the owning thread may acquire again.
    pub fn acquire(&self) {
        let me = vm_thread::current().get();
        loop {
            let word = self.word.load(Ordering::Acquire);
            if word == UNLOCKED {
                if self
                    .word
                    .compare_exchange(
                        UNLOCKED,
                        thin_word(me, 0),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    return;
                }
            } else if word & TAG_MASK == TAG_THIN {
                if thin_owner(word) == me {
                    let count = thin_count(word);
                    if count + 1 >= THIN_RECURSION_CAP {
                        if self.promote_owned(me, count + 1) {
                            return;
                        }
                        // Lost the flip to a contender; the record now holds
                        // our old count, so retry and re-enter through it.
                    } else if self
                        .word
                        .compare_exchange(
                            word,
                            thin_word(me, count + 1),
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return;
                    }
                } else {
                    self.promote_contended();
                }
            } else {
                self.record().enter(me);
                return;
            }
        }
    }

    /// Releases one level of ownership.
    pub fn release(&self) -> Result<(), VmError> {
        let me = vm_thread::current().get();
        loop {
            let word = self.word.load(Ordering::Acquire);
            if word == UNLOCKED {
                return Err(VmError::IllegalMonitorState(
                    "release of an unlocked monitor".to_string(),
                ));
            }
            if word & TAG_MASK == TAG_THIN {
                if thin_owner(word) != me {
                    return Err(VmError::IllegalMonitorState(
                        "release by a thread that does not own the monitor".to_string(),
                    ));
                }
                let count = thin_count(word);
                let next = if count == 0 {
                    UNLOCKED
                } else {
                    thin_word(me, count - 1)
                };
                if self
                    .word
                    .compare_exchange(word, next, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Ok(());
                }
                // The CAS only fails if a contender promoted us; retry goes
                // through the record.
            } else {
                return self.record().exit(me);
            }
        }
    }

    /// Releases the monitor and parks the calling thread on the wait set
    /// until notified, `timeout` elapses, or the thread is interrupted.
    ///
    /// The monitor is re-acquired with the pre-wait recursion count before
    /// this returns. A timeout is reported as an ordinary return; callers
    /// re-check the condition they were waiting for.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), VmError> {
        let me = vm_thread::current().get();
        loop {
            let word = self.word.load(Ordering::Acquire);
            if word == UNLOCKED {
                return Err(VmError::IllegalMonitorState(
                    "wait on an unowned monitor".to_string(),
                ));
            }
            if word & TAG_MASK == TAG_THIN {
                if thin_owner(word) != me {
                    return Err(VmError::IllegalMonitorState(
                        "wait by a thread that does not own the monitor".to_string(),
                    ));
                }
                // The wait set lives on the record.
                self.promote_owned(me, thin_count(word));
                continue;
            }
            break;
        }
        self.record().wait(me, timeout)
    }

    /// Wakes one thread parked in this monitor's wait set.
    pub fn notify_one(&self) -> Result<(), VmError> {
        self.notify_impl(false)
    }

    /// Wakes every thread parked in this monitor's wait set.
    pub fn notify_all(&self) -> Result<(), VmError> {
        self.notify_impl(true)
    }

    fn notify_impl(&self, all: bool) -> Result<(), VmError> {
        let me = vm_thread::current().get();
        let word = self.word.load(Ordering::Acquire);
        if word == UNLOCKED {
            return Err(VmError::IllegalMonitorState(
                "notify on an unowned monitor".to_string(),
            ));
        }
        if word & TAG_MASK == TAG_THIN {
            if thin_owner(word) == me {
                // Still thin: the wait set cannot have members yet.
                return Ok(());
            }
            return Err(VmError::IllegalMonitorState(
                "notify by a thread that does not own the monitor".to_string(),
            ));
        }
        self.record().notify(me, all)
    }

    /// True once the monitor has been promoted to its heavyweight form.
    pub fn is_inflated(&self) -> bool {
        self.word.load(Ordering::Acquire) & TAG_MASK == TAG_FAT
    }

    /// True if the calling thread currently owns the monitor.
    pub fn is_held_by_current_thread(&self) -> bool {
        let me = vm_thread::current().get();
        let word = self.word.load(Ordering::Acquire);
        if word & TAG_MASK == TAG_THIN {
            thin_owner(word) == me
        } else if word & TAG_MASK == TAG_FAT {
            self.record().owned_by(me)
        } else {
            false
        }
    }

    fn record(&self) -> &FatRecord {
        // The fat tag is only ever published after the record is
        // initialized, so this never builds a second record post-promotion.
        self.record.get_or_init(FatRecord::new)
    }

    /// Flips thin→fat while the calling thread owns the thin lock,
    /// transferring ownership and `recursion` into the record. Returns
    /// false if a contender won the flip first.
    fn promote_owned(&self, me: u32, recursion: u32) -> bool {
        let record = self.record();
        let mut state = record.state.lock();
        let word = self.word.load(Ordering::Acquire);
        if word & TAG_MASK != TAG_THIN || thin_owner(word) != me {
            return false;
        }
        if self
            .word
            .compare_exchange(word, TAG_FAT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            state.owner = me;
            state.recursion = recursion;
            debug!(owner = me, recursion, "monitor inflated by owner");
            return true;
        }
        false
    }

    /// Flips thin→fat on behalf of the current thin owner. The record lock
    /// is held across the word CAS so no thread can observe the fat tag
    /// before the transferred state is in place.
    fn promote_contended(&self) {
        let record = self.record();
        let mut state = record.state.lock();
        let word = self.word.load(Ordering::Acquire);
        if word & TAG_MASK != TAG_THIN {
            return;
        }
        if self
            .word
            .compare_exchange(word, TAG_FAT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            state.owner = thin_owner(word);
            state.recursion = thin_count(word);
            debug!(owner = state.owner, "monitor inflated under contention");
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = self.word.load(Ordering::Relaxed);
        if word == UNLOCKED {
            write!(f, "Monitor(unlocked)")
        } else if word & TAG_MASK == TAG_THIN {
            write!(
                f,
                "Monitor(thin, owner={}, count={})",
                thin_owner(word),
                thin_count(word)
            )
        } else {
            write!(f, "Monitor(fat)")
        }
    }
}
