//! VM thread identity.
//!
//! Monitor lock words and initialization-owner fields need a compact,
//! process-unique thread identity that fits in 32 bits. Tokens are assigned
//! on first use and never reused for the process lifetime. Each VM thread
//! also carries an interrupt flag that other threads may set; blocked
//! monitor waits observe it between wait cycles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Process-unique identity of a VM thread. Never zero, so zero can mean
/// "no owner" in packed lock words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadToken(u32);

impl ThreadToken {
    /// Returns the raw non-zero token value.
    pub fn get(self) -> u32 {
        self.0
    }
}

static NEXT_TOKEN: AtomicU32 = AtomicU32::new(1);

fn interrupt_table() -> &'static Mutex<HashMap<u32, Arc<AtomicBool>>> {
    static TABLE: OnceLock<Mutex<HashMap<u32, Arc<AtomicBool>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_table() -> std::sync::MutexGuard<'static, HashMap<u32, Arc<AtomicBool>>> {
    // A panic while holding this short map lock leaves nothing half-updated.
    interrupt_table()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Registration {
    token: ThreadToken,
    flag: Arc<AtomicBool>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        lock_table().remove(&self.token.get());
    }
}

thread_local! {
    static CURRENT: Registration = {
        let token = ThreadToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
        let flag = Arc::new(AtomicBool::new(false));
        lock_table().insert(token.get(), flag.clone());
        Registration { token, flag }
    };
}

/// Returns the calling thread's token, assigning one on first use.
pub fn current() -> ThreadToken {
    CURRENT.with(|reg| reg.token)
}

/// Sets the interrupt flag of the thread identified by `token`.
///
/// Returns false if no live thread holds that token.
pub fn interrupt(token: ThreadToken) -> bool {
    match lock_table().get(&token.get()) {
        Some(flag) => {
            flag.store(true, Ordering::Release);
            true
        }
        None => false,
    }
}

/// Returns the calling thread's interrupt flag without clearing it.
pub fn is_interrupted() -> bool {
    CURRENT.with(|reg| reg.flag.load(Ordering::Acquire))
}

/// Clears and returns the calling thread's interrupt flag.
pub fn take_interrupt() -> bool {
    CURRENT.with(|reg| reg.flag.swap(false, Ordering::AcqRel))
}
