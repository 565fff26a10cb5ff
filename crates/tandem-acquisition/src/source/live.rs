//! Block captures from a digitizer.

use super::{BufferSource, SourceKind};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tandem_core::{
    AdvancedTriggerSettings, Channel, DeviceSettings, Sample, SampleBuffer, SyncSettings,
    TimebaseSettings, TriggerMode, TriggerSettings,
};
use tracing::{debug, info, warn};

/// Interval between readiness checks of an armed capture.
const READY_POLL: Duration = Duration::from_micros(200);

/// Slack past the auto-trigger period before an armed capture is abandoned.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(1);

/// Vendor driver boundary. Calls report success with `true`.
pub trait ScopeDriver: Send {
    /// Apply channel ranges and timebase, arm the simple trigger when it is
    /// enabled, and allocate capture buffers.
    fn configure(&mut self, settings: &DeviceSettings) -> bool;

    /// Arm a single block capture.
    fn run_block(&mut self, timebase: &TimebaseSettings) -> bool;

    fn is_ready(&mut self) -> bool;

    /// Copy the last capture out, one vector per channel.
    fn read_buffers(&mut self) -> Option<Vec<Vec<Sample>>>;

    fn set_trigger(&mut self, trigger: &TriggerSettings) -> bool;

    /// Arm the two-channel trigger. Drivers without one report `false`.
    fn set_advanced_trigger(&mut self, _trigger: &AdvancedTriggerSettings) -> bool {
        false
    }

    fn close(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Block,
    Stream,
    Rapid,
}

pub struct LiveDevice<D: ScopeDriver> {
    driver: D,
    applied: Option<DeviceSettings>,
    trigger_channel: Channel,
    ready_timeout: Duration,
    cancel: Option<Arc<AtomicBool>>,
    configurations: u64,
    captures: u64,
}

impl<D: ScopeDriver> LiveDevice<D> {
    /// Only block captures are supported.
    pub fn new(driver: D, mode: CaptureMode) -> Result<Self> {
        if mode != CaptureMode::Block {
            return Err(Error::AcquisitionFailed(format!(
                "capture mode {:?} is not supported",
                mode
            )));
        }
        Ok(Self {
            driver,
            applied: None,
            trigger_channel: Channel::A,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            cancel: None,
            configurations: 0,
            captures: 0,
        })
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Push settings to the driver when they differ from the last applied set.
    fn ensure_configured(&mut self, settings: &SyncSettings) -> Result<()> {
        let device = settings.device_settings();
        if self.applied.as_ref() == Some(&device) {
            return Ok(());
        }

        if !self.driver.configure(&device) {
            self.applied = None;
            return Err(Error::AcquisitionFailed("device configuration rejected".to_string()));
        }
        if device.trigger_mode() == TriggerMode::Advanced
            && !self.driver.set_advanced_trigger(&device.advanced_trigger)
        {
            self.applied = None;
            return Err(Error::AcquisitionFailed("advanced trigger rejected".to_string()));
        }
        self.trigger_channel = device.trigger.channel;
        self.applied = Some(device);
        self.configurations += 1;
        debug!("Device configured ({} total)", self.configurations);
        Ok(())
    }

    /// Swap the trigger to the other detector after a capture.
    fn alternate_trigger(&mut self) -> Result<()> {
        let Some(requested) = self.applied.map(|applied| applied.trigger) else {
            return Ok(());
        };
        if !(requested.enabled && requested.alternate_channel) {
            return Ok(());
        }

        let next = self.trigger_channel.other();
        let trigger = TriggerSettings {
            channel: next,
            ..requested
        };
        if !self.driver.set_trigger(&trigger) {
            return Err(Error::AcquisitionFailed(format!(
                "failed to move trigger to channel {:?}",
                next
            )));
        }
        self.trigger_channel = next;
        Ok(())
    }

    /// How long an armed capture may stay unready. `None` while the armed
    /// trigger waits forever.
    fn ready_deadline(&self, device: &DeviceSettings) -> Option<Duration> {
        let auto_trigger_ms = match device.trigger_mode() {
            TriggerMode::Simple => device.trigger.auto_trigger_ms,
            TriggerMode::Advanced => device.advanced_trigger.auto_trigger_ms,
            TriggerMode::None => return Some(self.ready_timeout),
        };
        (auto_trigger_ms > 0)
            .then(|| Duration::from_millis(u64::from(auto_trigger_ms)) + self.ready_timeout)
    }

    /// Wait for the armed capture. `Ok(false)` when the loop is shutting down.
    fn wait_ready(&mut self, deadline: Option<Duration>) -> Result<bool> {
        let started = Instant::now();
        while !self.driver.is_ready() {
            if self.cancelled() {
                debug!("Capture wait interrupted by shutdown");
                return Ok(false);
            }
            if let Some(limit) = deadline {
                if started.elapsed() >= limit {
                    return Err(Error::AcquisitionFailed(format!(
                        "capture not ready after {:?}",
                        limit
                    )));
                }
            }
            thread::sleep(READY_POLL);
        }
        Ok(true)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|cancel| cancel.load(Ordering::SeqCst))
    }

    pub fn configurations(&self) -> u64 {
        self.configurations
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: ScopeDriver> BufferSource for LiveDevice<D> {
    fn poll(&mut self, settings: &SyncSettings) -> Result<Option<SampleBuffer>> {
        self.ensure_configured(settings)?;

        if !self.driver.run_block(&settings.timebase) {
            return Err(Error::AcquisitionFailed("run_block failed".to_string()));
        }
        let deadline = self.ready_deadline(&settings.device_settings());
        if !self.wait_ready(deadline)? {
            return Ok(None);
        }

        let Some(channels) = self.driver.read_buffers() else {
            return Err(Error::AcquisitionFailed("reading capture buffers failed".to_string()));
        };
        let captured_on = self.trigger_channel;
        self.alternate_trigger()?;

        if channels.iter().all(Vec::is_empty) {
            return Ok(None);
        }

        let buffer = SampleBuffer::from_channels(channels)
            .map_err(|e| Error::AcquisitionFailed(e.to_string()))?
            .with_trigger_channel(captured_on);
        self.captures += 1;
        Ok(Some(buffer))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }

    fn set_cancel(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = Some(cancel);
    }

    fn close(&mut self) {
        info!("Closing device after {} captures", self.captures);
        self.driver.close();
        self.applied = None;
    }
}

impl<D: ScopeDriver> Drop for LiveDevice<D> {
    fn drop(&mut self) {
        if self.applied.is_some() {
            warn!("Device dropped without close");
            self.driver.close();
        }
    }
}
