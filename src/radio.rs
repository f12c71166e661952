//! Interfaces to the radio front-end, plus a simulated radio that satisfies them.
//!
//! The pipeline only ever talks to a [`StreamSource`]. Setup talks to a [`Device`].
//! Hardware bindings implement both; [`SimulatedRadio`] does so in-process.

use std::{
    collections::HashMap,
    f64::consts::TAU,
    thread,
    time::{Duration, Instant},
};

use byte_slice_cast::{AsByteSlice, ToByteSlice};
use chrono::{DateTime, Utc};
use num_complex::Complex;
use num_traits::FromPrimitive;
use tracing::debug;

use crate::{
    error::{Error, Result},
    sample::{SampleType, WireFormat},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamMode {
    Continuous,
    /// Deliver exactly this many samples, then stop
    Count(u64),
}

#[derive(Clone, Copy, Debug)]
pub struct StreamCommand {
    pub mode: StreamMode,
    /// `None` streams immediately
    pub start_time: Option<DateTime<Utc>>,
}

impl StreamCommand {
    /// `requested == 0` means stream until told otherwise
    pub fn for_request(requested: u64) -> Self {
        let mode = if requested == 0 {
            StreamMode::Continuous
        } else {
            StreamMode::Count(requested)
        };
        Self {
            mode,
            start_time: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RxStatus {
    Ok,
    Timeout,
    /// The front-end dropped samples before they reached us
    Overflow,
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RxPacket {
    pub samples: usize,
    pub status: RxStatus,
}

impl RxPacket {
    pub fn ok(samples: usize) -> Self {
        Self {
            samples,
            status: RxStatus::Ok,
        }
    }

    pub fn status(status: RxStatus) -> Self {
        Self { samples: 0, status }
    }
}

/// The streaming half of a radio
pub trait StreamSource {
    fn configure(&mut self, sample_type: SampleType, wire: WireFormat) -> Result<()>;
    fn start(&mut self, cmd: StreamCommand) -> Result<()>;
    /// Fill `buf` with up to `max_samples` samples, waiting at most `timeout`
    fn receive(&mut self, buf: &mut [u8], max_samples: usize, timeout: Duration) -> RxPacket;
}

/// The configuration half of a radio, only touched during setup
pub trait Device {
    fn description(&self) -> String;
    fn set_clock_source(&mut self, source: &str) -> Result<()>;
    fn clock_source(&self) -> String;
    fn set_subdev_spec(&mut self, spec: &str) -> Result<()>;
    fn set_rx_rate(&mut self, rate: f64) -> Result<()>;
    fn rx_rate(&self) -> f64;
    fn set_rx_freq(&mut self, freq: f64, integer_n: bool) -> Result<()>;
    fn rx_freq(&self) -> f64;
    fn set_rx_gain(&mut self, gain: f64) -> Result<()>;
    fn rx_gain(&self) -> f64;
    fn set_rx_bandwidth(&mut self, bw: f64) -> Result<()>;
    fn rx_bandwidth(&self) -> f64;
    fn set_rx_antenna(&mut self, antenna: &str) -> Result<()>;
    fn rx_antenna(&self) -> String;
    fn rx_sensor_names(&self) -> Vec<String>;
    fn rx_sensor(&self, name: &str) -> Result<bool>;
    fn mboard_sensor_names(&self) -> Vec<String>;
    fn mboard_sensor(&self, name: &str) -> Result<bool>;
    fn set_time_now(&mut self, time: DateTime<Utc>) -> Result<()>;
}

/// A tone generator that behaves like a radio. Options come from the device address string,
/// e.g. `paced=false,tone=0.05`.
pub struct SimulatedRadio {
    rate: f64,
    freq: f64,
    gain: f64,
    bandwidth: f64,
    antenna: String,
    clock: String,
    subdev: String,
    // Sleep to match the sample rate like real hardware would
    paced: bool,
    // Tone frequency as a fraction of the sample rate
    tone: f64,
    phase: f64,
    sample_type: SampleType,
    remaining: Option<u64>,
    streaming: bool,
    started: Option<Instant>,
    delivered: u64,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self {
            rate: 1e6,
            freq: 0.0,
            gain: 0.0,
            bandwidth: 0.0,
            antenna: "RX2".to_owned(),
            clock: "internal".to_owned(),
            subdev: String::new(),
            paced: true,
            tone: 0.01,
            phase: 0.0,
            sample_type: SampleType::Short,
            remaining: None,
            streaming: false,
            started: None,
            delivered: 0,
        }
    }
}

impl SimulatedRadio {
    pub fn open(args: &str) -> Result<Self> {
        let mut radio = Self::default();
        let opts: HashMap<&str, &str> = args
            .split(',')
            .filter(|kv| !kv.trim().is_empty())
            .map(|kv| {
                let mut it = kv.splitn(2, '=');
                (it.next().unwrap_or("").trim(), it.next().unwrap_or("").trim())
            })
            .collect();
        for (key, value) in opts {
            match key {
                "paced" => {
                    radio.paced = value
                        .parse()
                        .map_err(|_| Error::Device(format!("Bad value for paced: {value}")))?
                }
                "tone" => {
                    radio.tone = value
                        .parse()
                        .map_err(|_| Error::Device(format!("Bad value for tone: {value}")))?
                }
                _ => return Err(Error::Device(format!("Unknown device arg {key}"))),
            }
        }
        Ok(radio)
    }

    /// Unpaced radio, for tests and benchmarks
    pub fn unpaced() -> Self {
        Self {
            paced: false,
            ..Self::default()
        }
    }

    fn synthesize<T>(&mut self, out: &mut [u8], n: usize)
    where
        T: FromPrimitive + ToByteSlice + Copy + Default,
    {
        let scale = match self.sample_type {
            SampleType::Short => 0.7 * i16::MAX as f64,
            _ => 0.7,
        };
        let step = TAU * self.tone;
        let mut components = Vec::with_capacity(2 * n);
        for _ in 0..n {
            let z = Complex::from_polar(scale, self.phase);
            components.push(T::from_f64(z.re).unwrap_or_default());
            components.push(T::from_f64(z.im).unwrap_or_default());
            self.phase = (self.phase + step) % TAU;
        }
        let bytes = components.as_byte_slice();
        out[..bytes.len()].copy_from_slice(bytes);
    }

    fn pace(&self) {
        if let Some(started) = self.started {
            let due = Duration::from_secs_f64(self.delivered as f64 / self.rate);
            if let Some(ahead) = due.checked_sub(started.elapsed()) {
                thread::sleep(ahead);
            }
        }
    }
}

impl StreamSource for SimulatedRadio {
    fn configure(&mut self, sample_type: SampleType, wire: WireFormat) -> Result<()> {
        debug!(
            cpu = sample_type.cpu_format(),
            wire = wire.name(),
            "Configuring simulated stream"
        );
        self.sample_type = sample_type;
        Ok(())
    }

    fn start(&mut self, cmd: StreamCommand) -> Result<()> {
        self.remaining = match cmd.mode {
            StreamMode::Continuous => None,
            StreamMode::Count(n) => Some(n),
        };
        self.streaming = true;
        self.started = Some(Instant::now());
        self.delivered = 0;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], max_samples: usize, timeout: Duration) -> RxPacket {
        let fits = buf.len() / self.sample_type.size();
        let mut n = max_samples.min(fits) as u64;
        if let Some(remaining) = self.remaining {
            n = n.min(remaining);
        }
        if !self.streaming || n == 0 {
            // Nothing more is coming, so this is where real hardware would sit out the timeout
            if self.paced {
                thread::sleep(timeout);
            }
            return RxPacket::status(RxStatus::Timeout);
        }
        let n = n as usize;
        match self.sample_type {
            SampleType::Short => self.synthesize::<i16>(buf, n),
            SampleType::Float => self.synthesize::<f32>(buf, n),
            SampleType::Double => self.synthesize::<f64>(buf, n),
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= n as u64;
        }
        self.delivered += n as u64;
        if self.paced {
            self.pace();
        }
        RxPacket::ok(n)
    }
}

impl Device for SimulatedRadio {
    fn description(&self) -> String {
        format!("Simulated radio (tone at {} x rate)", self.tone)
    }

    fn set_clock_source(&mut self, source: &str) -> Result<()> {
        match source {
            "internal" | "external" | "mimo" => {
                self.clock = source.to_owned();
                Ok(())
            }
            _ => Err(Error::Device(format!("Unknown clock source {source}"))),
        }
    }

    fn clock_source(&self) -> String {
        self.clock.clone()
    }

    fn set_subdev_spec(&mut self, spec: &str) -> Result<()> {
        self.subdev = spec.to_owned();
        Ok(())
    }

    fn set_rx_rate(&mut self, rate: f64) -> Result<()> {
        if rate <= 0.0 {
            return Err(Error::Device(format!("Unsupported rate {rate}")));
        }
        self.rate = rate;
        Ok(())
    }

    fn rx_rate(&self) -> f64 {
        self.rate
    }

    fn set_rx_freq(&mut self, freq: f64, _integer_n: bool) -> Result<()> {
        self.freq = freq;
        Ok(())
    }

    fn rx_freq(&self) -> f64 {
        self.freq
    }

    fn set_rx_gain(&mut self, gain: f64) -> Result<()> {
        // Clamp into a plausible front-end range the way hardware coerces
        self.gain = gain.clamp(0.0, 76.0);
        Ok(())
    }

    fn rx_gain(&self) -> f64 {
        self.gain
    }

    fn set_rx_bandwidth(&mut self, bw: f64) -> Result<()> {
        self.bandwidth = bw;
        Ok(())
    }

    fn rx_bandwidth(&self) -> f64 {
        self.bandwidth
    }

    fn set_rx_antenna(&mut self, antenna: &str) -> Result<()> {
        self.antenna = antenna.to_owned();
        Ok(())
    }

    fn rx_antenna(&self) -> String {
        self.antenna.clone()
    }

    fn rx_sensor_names(&self) -> Vec<String> {
        vec!["lo_locked".to_owned()]
    }

    fn rx_sensor(&self, name: &str) -> Result<bool> {
        match name {
            "lo_locked" => Ok(true),
            _ => Err(Error::Device(format!("No rx sensor {name}"))),
        }
    }

    fn mboard_sensor_names(&self) -> Vec<String> {
        vec!["ref_locked".to_owned(), "mimo_locked".to_owned()]
    }

    fn mboard_sensor(&self, name: &str) -> Result<bool> {
        match name {
            "ref_locked" => Ok(self.clock == "external"),
            "mimo_locked" => Ok(self.clock == "mimo"),
            _ => Err(Error::Device(format!("No mboard sensor {name}"))),
        }
    }

    fn set_time_now(&mut self, _time: DateTime<Utc>) -> Result<()> {
        Ok(())
    }
}
