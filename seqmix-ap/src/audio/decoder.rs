//! Audio decoder using symphonia
//!
//! Decodes in-memory encoded bytes (WAV/PCM, MP3, FLAC, AAC, Vorbis) into a
//! planar [`PcmAsset`] at the source's own sample rate. Rate conversion is a
//! separate step (see `resampler`).

use crate::audio::types::PcmAsset;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoder capability
///
/// Implementations turn raw encoded bytes into a PCM asset or fail with
/// `Error::Decode`. They are called from blocking worker threads, so they must
/// be shareable across threads.
pub trait Decoder: Send + Sync {
    /// Decode a complete encoded file
    ///
    /// # Arguments
    /// - `bytes`: Encoded file contents
    /// - `extension_hint`: File extension (without dot) to speed up probing
    fn decode(&self, bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<PcmAsset>;
}

/// Default decoder backed by symphonia's bundled codecs
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<PcmAsset> {
        debug!("Decoding {} bytes (hint: {:?})", bytes.len(), extension_hint);

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        // Get the default audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_rate = codec_params.sample_rate;
        let mut channels = codec_params.channels.map(|c| c.count() as u16);

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Stream reset requested, stopping decode");
                    break;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Error reading packet: {}", e)));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channels.get_or_insert(spec.channels.count() as u16);

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet: skip it and keep going
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decoder failed: {}", e)));
                }
            }
        }

        let sample_rate =
            sample_rate.ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let channels = channels.ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        debug!(
            "Decoded {} frames: sample_rate={}, channels={}",
            samples.len() / channels.max(1) as usize,
            sample_rate,
            channels
        );

        PcmAsset::from_interleaved(&samples, sample_rate, channels)
    }
}
