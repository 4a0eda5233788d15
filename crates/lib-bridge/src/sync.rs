//! Lock helpers shared by the run slot, the host-call lock and the script host.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Helper trait to recover from poisoned locks.
///
/// A host function that panics inside a callback poisons whatever lock it
/// was called under. The guarded data is either `()` or a slot that is
/// overwritten on every use, so it is always safe to keep going.
pub(crate) trait RecoverLock<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> RecoverLock<T> for Mutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Mutex was poisoned, recovering data");
            poisoned.into_inner()
        })
    }
}

pub(crate) trait RecoverRwLock<T> {
    fn read_recover(&self) -> RwLockReadGuard<'_, T>;
    fn write_recover(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> RecoverRwLock<T> for RwLock<T> {
    fn read_recover(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap_or_else(|poisoned| {
            tracing::warn!("RwLock was poisoned, recovering data");
            poisoned.into_inner()
        })
    }

    fn write_recover(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap_or_else(|poisoned| {
            tracing::warn!("RwLock was poisoned, recovering data");
            poisoned.into_inner()
        })
    }
}
