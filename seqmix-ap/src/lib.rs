//! # Seqmix Assembler & Player Library (seqmix-ap)
//!
//! Assembles a template's segments into one continuous program.
//!
//! **Purpose:** Resolve every segment to a decoded asset, lay the segments out
//! on a timeline with linear fade envelopes and looped background beds, render
//! the result into one stereo PCM buffer and serialize it as a 16-bit WAV file.
//! The live scheduler plays the same template in real time with
//! segment-to-segment crossfades and an optional survey pause.
//!
//! **Architecture:**
//! - `audio`: decode/fetch capabilities, PCM types, resampling, WAV encoding
//! - `mix`: asset resolver, timeline compositor, renderer, offline pipeline
//! - `live`: output-graph capability, graph implementations, session-versioned
//!   scheduler and its tokio driver

pub mod audio;
pub mod error;
pub mod live;
pub mod mix;

pub use error::{Error, Result};
pub use mix::pipeline::{merge_template, MergeOptions, DEFAULT_OUTPUT_NAME};
