//! Buffer sources.
//!
//! Every source produces one [`SampleBuffer`] per [`poll`](BufferSource::poll),
//! or `None` when a cycle had no data (an auto-triggered capture that came back
//! empty). Three implementations are interchangeable behind the trait:
//!
//! - [`LiveDevice`]: one block capture per poll from a [`ScopeDriver`]
//! - [`PlaybackFile`]: recorded groups replayed in order, looping forever
//! - [`Simulator`]: synthetic pulses for running without hardware

mod live;
mod playback;
mod simulator;

pub use live::{CaptureMode, LiveDevice, ScopeDriver};
pub use playback::{parse_groups, PlaybackFile};
pub use simulator::Simulator;

use crate::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tandem_core::{SampleBuffer, SyncSettings};

pub trait BufferSource: Send {
    /// Produce the next buffer using the current settings snapshot.
    fn poll(&mut self, settings: &SyncSettings) -> Result<Option<SampleBuffer>>;

    fn kind(&self) -> SourceKind;

    /// Times the underlying data was reloaded after the first load.
    fn reloads(&self) -> u64 {
        0
    }

    /// Shutdown flag of the owning loop. Blocking sources give up their wait once it is set.
    fn set_cancel(&mut self, _cancel: Arc<AtomicBool>) {}

    fn close(&mut self) {}
}

impl<S: BufferSource + ?Sized> BufferSource for Box<S> {
    fn poll(&mut self, settings: &SyncSettings) -> Result<Option<SampleBuffer>> {
        (**self).poll(settings)
    }

    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn reloads(&self) -> u64 {
        (**self).reloads()
    }

    fn set_cancel(&mut self, cancel: Arc<AtomicBool>) {
        (**self).set_cancel(cancel)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Playback,
    Simulator,
}

impl SourceKind {
    /// A driver wins, then a playback file, then the simulator.
    pub fn select(has_driver: bool, settings: &SyncSettings) -> Self {
        if has_driver {
            SourceKind::Live
        } else if settings.playback_file.is_some() {
            SourceKind::Playback
        } else {
            SourceKind::Simulator
        }
    }
}
