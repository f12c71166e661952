//! Argument parsing for running from the command line

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::{
    config::CaptureConfig,
    error::Error,
    sample::{SampleType, WireFormat},
    setup::DeviceSettings,
    DEFAULT_CAPACITY, DEFAULT_SEGMENT_SIZE, ELEMENT_SIZE,
};

/// Record samples from a radio to a file, with optional per-segment metadata headers
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Device address args, e.g. "paced=false,tone=0.05"
    #[clap(long, default_value = "")]
    pub args: String,
    /// Name of the file to write binary samples to
    #[clap(long, default_value = "usrp_samples.dat")]
    pub file: PathBuf,
    /// Sample type: double, float, or short
    #[clap(long = "type", default_value = "short", value_parser = parse_sample_type)]
    pub sample_type: SampleType,
    /// Total number of samples to receive (0 streams until Ctrl-C)
    #[clap(long, default_value_t = 0)]
    pub nsamps: u64,
    /// Total number of seconds to receive (0 for no limit)
    #[clap(long, default_value_t = 0.0, value_parser = parse_seconds)]
    pub time: f64,
    /// Elements in the circular buffer
    #[clap(long, default_value_t = DEFAULT_CAPACITY)]
    pub cbcapacity: usize,
    /// Bytes per circular buffer element
    #[clap(long, default_value_t = ELEMENT_SIZE)]
    pub element_size: usize,
    /// Rate of incoming samples
    #[clap(long, default_value_t = 1e6)]
    pub rate: f64,
    /// RF center frequency in Hz
    #[clap(long, default_value_t = 0.0)]
    pub freq: f64,
    /// Gain for the RF chain
    #[clap(long)]
    pub gain: Option<f64>,
    /// Daughterboard antenna selection
    #[clap(long)]
    pub ant: Option<String>,
    /// Daughterboard subdevice specification
    #[clap(long)]
    pub subdev: Option<String>,
    /// Daughterboard IF filter bandwidth in Hz
    #[clap(long)]
    pub bw: Option<f64>,
    /// Reference source (internal, external, mimo)
    #[clap(long = "ref", default_value = "internal")]
    #[clap(value_parser = clap::builder::PossibleValuesParser::new(["internal", "external", "mimo"]))]
    pub clock_ref: String,
    /// Wire format (sc8 or sc16)
    #[clap(long, default_value = "sc16", value_parser = parse_wire_format)]
    pub wirefmt: WireFormat,
    /// Seconds of setup time
    #[clap(long, default_value_t = 1.0, value_parser = parse_seconds)]
    pub setup: f64,
    /// Seconds to wait for each block before giving up on the stream
    #[clap(long, default_value_t = 3.0, value_parser = parse_seconds)]
    pub timeout: f64,
    /// Segment size (samples) for metadata segmentation
    #[clap(long, default_value_t = DEFAULT_SEGMENT_SIZE)]
    pub segsize: u64,
    /// Periodically display short-term bandwidth and circular buffer fill
    #[clap(long)]
    pub progress: bool,
    /// Show average bandwidth on exit
    #[clap(long)]
    pub stats: bool,
    /// Track packet size and display breakdown on exit
    #[clap(long)]
    pub sizemap: bool,
    /// Run without writing to file
    #[clap(long)]
    pub null: bool,
    /// Don't abort on a bad packet
    #[clap(long = "continue")]
    pub continue_on_bad_packet: bool,
    /// Skip checking LO lock status
    #[clap(long)]
    pub skip_lo: bool,
    /// Tune with integer-N tuning
    #[clap(long)]
    pub int_n: bool,
    /// Write a metadata header for every segment
    #[clap(long)]
    pub metadata: bool,
    /// Put headers in the sample file instead of a detached <file>.hdr
    #[clap(long)]
    pub inline_header: bool,
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Args {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            file: self.file.clone(),
            sample_type: self.sample_type,
            wire_format: self.wirefmt,
            element_size: self.element_size,
            ring_capacity: self.cbcapacity,
            requested_samples: self.nsamps,
            requested_duration: Duration::from_secs_f64(self.time),
            segment_size: self.segsize,
            recv_timeout: Duration::from_secs_f64(self.timeout),
            metadata: self.metadata,
            detached_headers: !self.inline_header,
            continue_on_bad_packet: self.continue_on_bad_packet,
            size_map: self.sizemap,
            stats: self.stats,
            progress: self.progress,
            null_output: self.null,
        }
    }

    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            clock_ref: self.clock_ref.clone(),
            subdev: self.subdev.clone(),
            rate: self.rate,
            freq: self.freq,
            integer_n: self.int_n,
            gain: self.gain,
            bandwidth: self.bw,
            antenna: self.ant.clone(),
            setup_time: Duration::from_secs_f64(self.setup),
            skip_lock_check: self.skip_lo,
        }
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn parse_sample_type(s: &str) -> Result<SampleType, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

fn parse_wire_format(s: &str) -> Result<WireFormat, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if Duration::try_from_secs_f64(v).is_ok() => Ok(v),
        _ => Err(format!("{s} is not a valid number of seconds")),
    }
}
