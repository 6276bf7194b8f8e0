//! Audio output using cpal
//!
//! Streams a [`SharedGraph`] to an output device. The device callback pulls
//! interleaved stereo from the graph, which also advances the graph clock,
//! and writes it in the device's channel layout and sample format.

use crate::error::{Error, Result};
use crate::live::software::SharedGraph;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Output device manager
pub struct DeviceOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
}

impl DeviceOutput {
    /// List available output device names
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device
    ///
    /// # Arguments
    /// - `device_name`: Device to open (None = default device); falls back to
    ///   the default device when the name is not found
    /// - `preferred_rate`: Sample rate to ask for when the device supports it
    pub fn open(device_name: Option<&str>, preferred_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let named = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().ok().as_deref() == Some(name)),
            None => None,
        };
        if let (Some(name), None) = (device_name, named.as_ref()) {
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let device = match named {
            Some(device) => device,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };
        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let (config, sample_format) = Self::best_config(&device, preferred_rate)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Prefer stereo f32 at `preferred_rate`, else the device default
    fn best_config(device: &Device, preferred_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported.find(|c| {
            c.channels() == 2
                && c.min_sample_rate().0 <= preferred_rate
                && c.max_sample_rate().0 >= preferred_rate
                && c.sample_format() == SampleFormat::F32
        });
        if let Some(config) = preferred {
            let format = config.sample_format();
            return Ok((
                config
                    .with_sample_rate(cpal::SampleRate(preferred_rate))
                    .config(),
                format,
            ));
        }

        let fallback = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let format = fallback.sample_format();
        Ok((fallback.config(), format))
    }

    /// Rate the device stream runs at; build the graph at this rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Whether the stream has reported an error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    /// Start streaming `graph`
    ///
    /// The graph must run at [`DeviceOutput::sample_rate`].
    pub fn start(&mut self, graph: SharedGraph) -> Result<()> {
        if graph.sample_rate() != self.sample_rate() {
            return Err(Error::AudioOutput(format!(
                "graph runs at {}Hz but the device at {}Hz",
                graph.sample_rate(),
                self.sample_rate()
            )));
        }

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(graph)?,
            SampleFormat::I16 => self.build_stream::<i16>(graph)?,
            SampleFormat::U16 => self.build_stream::<u16>(graph)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);
        info!("Audio stream started");
        Ok(())
    }

    fn build_stream<T>(&self, graph: SharedGraph) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);
        let mut scratch: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    scratch.resize(frames * 2, 0.0);
                    graph.render_into(&mut scratch);

                    for (frame, stereo) in data.chunks_mut(channels).zip(scratch.chunks(2)) {
                        for (ch, slot) in frame.iter_mut().enumerate() {
                            let sample = match ch {
                                0 => stereo[0],
                                1 => stereo[1],
                                _ => 0.0,
                            };
                            // Device formats cannot represent overs
                            *slot = T::from_sample(sample.clamp(-1.0, 1.0));
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Stop streaming
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("Audio stream stopped");
        }
    }
}
