//! CPAL device discovery and playback.
//!
//! This module provides [`CpalDevice`] for discovering audio output devices and
//! playing an output node's ring buffer through one of them.
//!
//! # Example: List and Select a Device
//!
//! ```no_run
//! use klotz::{CpalDevice, Engine, EngineConfig};
//!
//! // List all available output devices
//! let devices = CpalDevice::list_outputs();
//! for (i, device) in devices.iter().enumerate() {
//!     println!("[{}] {} ({} ch)", i, device.name(), device.channels());
//! }
//!
//! let (engine, mut bridge) = Engine::new(EngineConfig::default());
//! let out = bridge.spawn("output").unwrap();
//! let reader = bridge.take_output(out).unwrap();
//!
//! // Play through a specific device
//! let stream = devices[0].play(reader).unwrap();
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use crate::batch::SAMPLE_RATE;
use crate::error::Error;
use crate::ring::RingReader;

/// A discovered audio output device.
///
/// Use [`CpalDevice::default_output`] to get the system default, or
/// [`CpalDevice::list_outputs`] to enumerate all available devices.
pub struct CpalDevice {
    device: cpal::Device,
    sample_format: SampleFormat,
    name: String,
    channels: u16,
}

impl CpalDevice {
    /// Get the system's default output device.
    pub fn default_output() -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoDevice)?;
        Self::from_device(device)
    }

    /// List all available audio output devices.
    ///
    /// Returns an empty list if no devices are found or if enumeration fails.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(|device| Self::from_device(device).ok()).collect())
            .unwrap_or_default()
    }

    fn from_device(device: cpal::Device) -> Result<Self, Error> {
        let config = device.default_output_config()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Ok(Self {
            sample_format: config.sample_format(),
            channels: config.channels(),
            name,
            device,
        })
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample rate streams are opened at. The graph runs at a fixed rate, so
    /// this is [`SAMPLE_RATE`] regardless of the device's preferred rate.
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Start playing `reader` on this device.
    ///
    /// The mono signal is copied to every hardware channel. Playback continues
    /// until the returned [`OutputStream`] is dropped.
    pub fn play(&self, reader: RingReader) -> Result<OutputStream, Error> {
        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };
        let counters = Underruns::default();
        let stop = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::sync_channel(1);

        // cpal streams are not Send on every platform, so the stream lives on its own thread.
        let device = self.device.clone();
        let format = self.sample_format;
        let thread_counters = counters.clone();
        let thread_stop = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("klotz-cpal".into())
            .spawn(move || {
                let stream = match build_stream(&device, format, &config, reader, thread_counters) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = started_tx.send(Err(e.into()));
                    return;
                }
                let _ = started_tx.send(Ok(()));

                // Keep thread alive - stream lives as long as this thread
                while !thread_stop.load(Ordering::Acquire) {
                    std::thread::park();
                }
            })?;

        started_rx.recv().map_err(|_| Error::EnginePanicked)??;
        tracing::debug!(device = %self.name, channels = self.channels, ?format, "playback started");

        Ok(OutputStream {
            counters,
            stop,
            thread: Some(thread),
        })
    }
}

/// Underrun bookkeeping shared with the audio callback.
#[derive(Clone, Default)]
struct Underruns {
    flag: Arc<AtomicBool>,
    frames: Arc<AtomicUsize>,
    played: Arc<AtomicUsize>,
}

impl Underruns {
    #[inline]
    fn record(&self, frames: usize, silent: usize) {
        if silent > 0 {
            self.flag.store(true, Ordering::Relaxed);
            self.frames.fetch_add(silent, Ordering::Relaxed);
        }
        self.played.fetch_add(frames, Ordering::Relaxed);
    }
}

/// A playing cpal stream. Dropping it stops playback.
pub struct OutputStream {
    counters: Underruns,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl OutputStream {
    /// Check and clear the underrun flag
    pub fn check_underrun(&self) -> bool {
        self.counters.flag.swap(false, Ordering::Relaxed)
    }

    /// Frames padded with silence since playback started.
    pub fn underrun_frames(&self) -> usize {
        self.counters.frames.load(Ordering::Relaxed)
    }

    /// Frames handed to the device since playback started.
    pub fn frames_played(&self) -> usize {
        self.counters.played.load(Ordering::Relaxed)
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    config: &cpal::StreamConfig,
    mut reader: RingReader,
    counters: Underruns,
) -> Result<cpal::Stream, Error> {
    let channels = config.channels.max(1) as usize;
    let on_error = |err: cpal::StreamError| tracing::error!(error = %err, "cpal stream error");

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _| {
                let silent = reader.fill_interleaved(data, channels);
                counters.record(data.len() / channels, silent);
            },
            on_error,
            None,
        )?,
        SampleFormat::I16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _| {
                let silent = reader.fill_interleaved_with(data, channels, |s| {
                    (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                });
                counters.record(data.len() / channels, silent);
            },
            on_error,
            None,
        )?,
        other => return Err(Error::UnsupportedFormat(format!("{:?}", other))),
    };
    Ok(stream)
}
