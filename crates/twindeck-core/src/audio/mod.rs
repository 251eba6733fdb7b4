//! Audio output backend
//!
//! A single stereo master output through CPAL. The stream callback owns the
//! [`MixEngine`](crate::engine::MixEngine) exclusively; the control thread
//! talks to it only through the [`RenderContext`](crate::engine::RenderContext).
//!
//! ```ignore
//! use twindeck_core::audio::{open_output, AudioConfig};
//! use twindeck_core::engine::RenderContext;
//!
//! let output = open_output(&AudioConfig::default())?;
//! let (ctx, engine) = RenderContext::new(output.sample_rate());
//! let handle = output.start(engine)?;
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MIN_BUFFER_SIZE};
pub use cpal_backend::{open_output, AudioHandle, OutputDevice};
pub use device::{find_output_device, output_device_names};
pub use error::{AudioError, AudioResult};
