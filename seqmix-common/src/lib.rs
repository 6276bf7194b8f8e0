//! # Seqmix Common Library
//!
//! Shared code for the seqmix assembler and player:
//! - Template model and load-time validation
//! - Upload bindings (placeholder key → source URL)
//! - Built-in template catalog
//! - Event types and EventBus
//! - Configuration loading
//! - Timestamp helpers

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod template;
pub mod time;
pub mod uploads;

pub use config::SeqmixConfig;
pub use error::{Error, Result};
pub use template::{Segment, Survey, Template};
pub use uploads::{UploadBinding, UploadSet};
