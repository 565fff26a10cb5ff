//! Per-trigger sample buffers.

use crate::settings::VoltageRange;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Raw ADC sample.
pub type Sample = i16;

/// Channels captured per trigger: two SCA (square) channels followed by two raw channels.
pub const CHANNEL_COUNT: usize = 4;

/// Detector side of the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Channel {
    #[default]
    A,
    B,
}

impl Channel {
    /// Index of the SCA square-pulse channel.
    #[inline]
    pub fn square_index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }

    /// Index of the unshaped raw channel used for pulse heights.
    #[inline]
    pub fn raw_index(self) -> usize {
        self.square_index() + 2
    }

    #[inline]
    pub fn other(self) -> Self {
        match self {
            Channel::A => Channel::B,
            Channel::B => Channel::A,
        }
    }
}

/// One acquisition cycle worth of samples.
///
/// All four channels share the same length (`pre_trigger + post_trigger`).
/// The buffer is moved out of the source and only borrowed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    channels: [Vec<Sample>; CHANNEL_COUNT],
    trigger_channel: Channel,
}

impl SampleBuffer {
    pub fn new(channels: [Vec<Sample>; CHANNEL_COUNT]) -> Result<Self> {
        let len = channels[0].len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != len)
        {
            return Err(Error::CorruptedBuffer(format!(
                "channel {} has {} samples, expected {}",
                index,
                channel.len(),
                len
            )));
        }

        Ok(Self {
            channels,
            trigger_channel: Channel::A,
        })
    }

    /// Build from a dynamically sized channel list, as read from a device or file.
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Result<Self> {
        let count = channels.len();
        let channels: [Vec<Sample>; CHANNEL_COUNT] = channels.try_into().map_err(|_| {
            Error::CorruptedBuffer(format!("expected {} channels, got {}", CHANNEL_COUNT, count))
        })?;
        Self::new(channels)
    }

    pub fn with_trigger_channel(mut self, channel: Channel) -> Self {
        self.trigger_channel = channel;
        self
    }

    /// Samples per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Boundary between the pre-trigger and post-trigger halves.
    #[inline]
    pub fn midpoint(&self) -> usize {
        self.len() / 2
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn square(&self, channel: Channel) -> &[Sample] {
        &self.channels[channel.square_index()]
    }

    #[inline]
    pub fn raw(&self, channel: Channel) -> &[Sample] {
        &self.channels[channel.raw_index()]
    }

    pub fn channels(&self) -> &[Vec<Sample>; CHANNEL_COUNT] {
        &self.channels
    }

    pub fn trigger_channel(&self) -> Channel {
        self.trigger_channel
    }

    pub fn into_channels(self) -> [Vec<Sample>; CHANNEL_COUNT] {
        self.channels
    }

    /// Every channel in millivolts for the given input ranges.
    pub fn to_millivolts(
        &self,
        ranges: &[VoltageRange; CHANNEL_COUNT],
    ) -> [Vec<f64>; CHANNEL_COUNT] {
        std::array::from_fn(|index| {
            self.channels[index]
                .iter()
                .map(|&sample| ranges[index].to_millivolts(i32::from(sample)))
                .collect()
        })
    }
}
