//! Device setup before streaming: clocking, tuning, gain, and waiting for locks

use std::{
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    metadata::AcquisitionParams,
    radio::Device,
};

const LOCK_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct DeviceSettings {
    /// internal, external, or mimo
    pub clock_ref: String,
    pub subdev: Option<String>,
    pub rate: f64,
    pub freq: f64,
    pub integer_n: bool,
    pub gain: Option<f64>,
    pub bandwidth: Option<f64>,
    pub antenna: Option<String>,
    /// Settle time after tuning, and how long to wait for each lock
    pub setup_time: Duration,
    pub skip_lock_check: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            clock_ref: "internal".to_owned(),
            subdev: None,
            rate: 1e6,
            freq: 0.0,
            integer_n: false,
            gain: None,
            bandwidth: None,
            antenna: None,
            setup_time: Duration::from_secs(1),
            skip_lock_check: false,
        }
    }
}

/// Apply the settings and read back what the device actually did
pub fn configure_device<D: Device + ?Sized>(
    dev: &mut D,
    settings: &DeviceSettings,
) -> Result<AcquisitionParams> {
    dev.set_clock_source(&settings.clock_ref)?;
    // The subdevice picks the channel mapping, so it goes before everything else
    if let Some(spec) = &settings.subdev {
        dev.set_subdev_spec(spec)?;
    }
    info!("Using Device: {}", dev.description());

    if settings.rate <= 0.0 {
        return Err(Error::Config("Please specify a valid sample rate".into()));
    }
    info!("Setting RX Rate: {:.6} Msps...", settings.rate / 1e6);
    dev.set_rx_rate(settings.rate)?;
    info!("Actual RX Rate: {:.6} Msps...", dev.rx_rate() / 1e6);

    info!("Setting RX Freq: {:.6} MHz...", settings.freq / 1e6);
    dev.set_rx_freq(settings.freq, settings.integer_n)?;
    info!("Actual RX Freq: {:.6} MHz...", dev.rx_freq() / 1e6);

    if let Some(gain) = settings.gain {
        info!("Setting RX Gain: {gain:.6} dB...");
        dev.set_rx_gain(gain)?;
        info!("Actual RX Gain: {:.6} dB...", dev.rx_gain());
    }

    if let Some(bw) = settings.bandwidth {
        info!("Setting RX Bandwidth: {:.6} MHz...", bw / 1e6);
        dev.set_rx_bandwidth(bw)?;
        info!("Actual RX Bandwidth: {:.6} MHz...", dev.rx_bandwidth() / 1e6);
    }

    if let Some(ant) = &settings.antenna {
        dev.set_rx_antenna(ant)?;
    }

    thread::sleep(settings.setup_time);

    if !settings.skip_lock_check {
        check_locked_sensor(
            &dev.rx_sensor_names(),
            "lo_locked",
            |name| dev.rx_sensor(name),
            settings.setup_time,
        )?;
        let mboard_sensor = match settings.clock_ref.as_str() {
            "mimo" => Some("mimo_locked"),
            "external" => Some("ref_locked"),
            _ => None,
        };
        if let Some(sensor) = mboard_sensor {
            check_locked_sensor(
                &dev.mboard_sensor_names(),
                sensor,
                |name| dev.mboard_sensor(name),
                settings.setup_time,
            )?;
        }
    }

    let now = Utc::now();
    info!("Current time: {}", now.timestamp());
    dev.set_time_now(now)?;

    Ok(AcquisitionParams {
        rate: dev.rx_rate(),
        freq: dev.rx_freq(),
        gain: dev.rx_gain(),
    })
}

/// Wait until `sensor` has reported locked continuously for `setup_time`.
///
/// Returns `Ok(false)` if the device doesn't have that sensor, and an error if it never
/// holds a lock long enough within `setup_time` of starting.
pub fn check_locked_sensor<F>(
    names: &[String],
    sensor: &str,
    mut get_sensor: F,
    setup_time: Duration,
) -> Result<bool>
where
    F: FnMut(&str) -> Result<bool>,
{
    if !names.iter().any(|n| n == sensor) {
        return Ok(false);
    }
    info!("Waiting for \"{sensor}\"");
    let start = Instant::now();
    let mut first_lock: Option<Instant> = None;
    loop {
        if let Some(locked_at) = first_lock {
            if locked_at.elapsed() > setup_time {
                info!("\"{sensor}\" locked");
                return Ok(true);
            }
        }
        if get_sensor(sensor)? {
            first_lock.get_or_insert_with(Instant::now);
            debug!("+");
        } else {
            first_lock = None;
            if start.elapsed() > setup_time {
                return Err(Error::SensorLock(sensor.to_owned()));
            }
            debug!("_");
        }
        thread::sleep(LOCK_POLL);
    }
}
