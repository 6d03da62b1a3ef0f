//! Poisoned-lock recovery shared by the cache store and the event queue.
//!
//! Cache contents are disposable, so a panic in another thread must not
//! condemn every later caller to a panic of its own. Recovery takes the
//! guard anyway and leaves a warning; the invalidation paths delete
//! whatever the panicking writer may have half-finished.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};

use tracing::warn;

fn note_recovery(target: &'static str, op: &'static str, lock_kind: &'static str) {
    warn!(
        op,
        target_module = target,
        lock_kind,
        "recovered a poisoned cache lock, entries may be stale"
    );
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        note_recovery(target, op, "rwlock.write");
        poisoned.into_inner()
    })
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        note_recovery(target, op, "mutex.lock");
        poisoned.into_inner()
    })
}
