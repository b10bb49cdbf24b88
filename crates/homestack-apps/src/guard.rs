//! Per-app concurrency guard
//!
//! Each app id owns an async mutex; a command holds it for its full
//! duration. A second command arriving while the first still runs is
//! rejected immediately instead of racing on the status column. The
//! database-level conditional transition remains as the second line of
//! defense.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use homestack_core::{Error, Result};

/// Registry of per-app locks
#[derive(Default)]
pub struct AppLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one lifecycle command
pub struct AppGuard {
    _guard: OwnedMutexGuard<()>,
}

impl AppLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for an app, rejecting if another command holds it
    pub fn try_acquire(&self, app_id: &str) -> Result<AppGuard> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(
                locks
                    .entry(app_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = lock
            .try_lock_owned()
            .map_err(|_| Error::AppBusy(app_id.to_string()))?;

        Ok(AppGuard { _guard: guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected() {
        let locks = AppLocks::new();
        let _held = locks.try_acquire("app-a").unwrap();

        assert!(matches!(
            locks.try_acquire("app-a"),
            Err(Error::AppBusy(_))
        ));
    }

    #[test]
    fn test_release_allows_reacquire() {
        let locks = AppLocks::new();
        drop(locks.try_acquire("app-a").unwrap());
        assert!(locks.try_acquire("app-a").is_ok());
    }

    #[test]
    fn test_independent_apps_do_not_contend() {
        let locks = AppLocks::new();
        let _a = locks.try_acquire("app-a").unwrap();
        assert!(locks.try_acquire("app-b").is_ok());
    }
}
