//! Settings hand-off between the controller and the acquisition loop.
//!
//! The controller replaces the whole [`SyncSettings`] snapshot and raises a
//! one-shot flag. The loop lowers the flag between cycles and loads whatever
//! snapshot is current, so two pushes before a drain collapse into the latest.
//! Derived snapshots go through read-copy-update, so concurrent derivations
//! never lose each other's writes. Only the controller writes; the loop reads.

use crate::lockfree::AtomicFlag;
use crate::settings::SyncSettings;
use arc_swap::ArcSwap;
use std::sync::Arc;

pub struct SyncChannel {
    current: ArcSwap<SyncSettings>,
    pending: AtomicFlag,
}

impl SyncChannel {
    pub fn new(initial: SyncSettings) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            pending: AtomicFlag::new(false),
        }
    }

    /// Replace the snapshot wholesale and signal the loop.
    pub fn push(&self, settings: SyncSettings) {
        self.current.store(Arc::new(settings));
        self.pending.set(true);
    }

    /// Derive a new snapshot from the current one and push it.
    ///
    /// `f` may run more than once when another writer races it.
    pub fn update(&self, mut f: impl FnMut(SyncSettings) -> SyncSettings) -> Arc<SyncSettings> {
        let next = self.stage(|settings| Ok::<_, std::convert::Infallible>(f(settings)));
        let next = match next {
            Ok(next) => next,
            Err(never) => match never {},
        };
        self.pending.set(true);
        next
    }

    /// Like [`update`](Self::update), leaving the snapshot untouched when `f` fails.
    pub fn try_update<E>(
        &self,
        f: impl FnMut(SyncSettings) -> Result<SyncSettings, E>,
    ) -> Result<Arc<SyncSettings>, E> {
        let next = self.stage(f)?;
        self.pending.set(true);
        Ok(next)
    }

    /// Derive and store a snapshot without signalling the loop. The caller
    /// hands the result to the loop itself.
    pub fn stage<E>(
        &self,
        mut f: impl FnMut(SyncSettings) -> Result<SyncSettings, E>,
    ) -> Result<Arc<SyncSettings>, E> {
        let mut outcome = None;
        self.current.rcu(|current| match f(SyncSettings::clone(current)) {
            Ok(next) => {
                let next = Arc::new(next);
                outcome = Some(Ok(Arc::clone(&next)));
                next
            }
            Err(e) => {
                outcome = Some(Err(e));
                Arc::clone(current)
            }
        });
        outcome.unwrap_or_else(|| Ok(self.current.load_full()))
    }

    /// Current snapshot, regardless of the pending flag.
    pub fn snapshot(&self) -> Arc<SyncSettings> {
        self.current.load_full()
    }

    /// Consume the pending signal, returning the latest snapshot if one was pushed.
    pub fn take_update(&self) -> Option<Arc<SyncSettings>> {
        if self.pending.take() {
            Some(self.current.load_full())
        } else {
            None
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.get()
    }

    pub fn pause(&self) {
        self.update(|settings| settings.paused(true));
    }

    pub fn resume(&self) {
        self.update(|settings| settings.paused(false));
    }

    /// Clear `main_loop`; the loop exits at its next cycle boundary.
    pub fn stop(&self) {
        self.update(SyncSettings::stopped);
    }
}

impl Default for SyncChannel {
    fn default() -> Self {
        Self::new(SyncSettings::default())
    }
}

impl std::fmt::Debug for SyncChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncChannel")
            .field("pending", &self.pending.get())
            .finish()
    }
}
