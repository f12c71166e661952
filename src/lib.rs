//! Stream complex samples from a radio to disk without losing any, tagging each fixed-size
//! segment of the recording with a metadata header.
//!
//! Three threads make up a run: acquisition pulls blocks from the radio into an SPSC ring,
//! the writer drains the ring to the sample file, and the segmenter writes a header every
//! time the sample count crosses a segment boundary. [`pipeline::Pipeline`] owns the whole
//! lifecycle.

pub mod args;
pub mod capture;
pub mod config;
pub mod error;
pub mod exfil;
pub mod metadata;
pub mod monitoring;
pub mod output;
pub mod pipeline;
pub mod radio;
pub mod ring;
pub mod sample;
pub mod setup;
pub mod shutdown;

pub use error::{Error, Result};

/// Bytes per ring element
pub const ELEMENT_SIZE: usize = 4096;
/// Elements in the ring
pub const DEFAULT_CAPACITY: usize = 4096;
/// Samples per metadata segment
pub const DEFAULT_SEGMENT_SIZE: u64 = 1_000_000;
