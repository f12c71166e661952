//! In this module, we implement all the monitoring logic for the capture.
//! This includes the once-a-second progress line, the histogram of block sizes the radio
//! actually handed us, and the summary printed on exit.

use std::{
    collections::BTreeMap,
    fmt,
    time::{Duration, Instant},
};

use tracing::info;

use crate::shutdown::CaptureContext;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Short-term rate and ring fill, reported about once a second
pub struct ProgressMeter {
    last_update: Instant,
    samples: u64,
    capacity: usize,
}

impl ProgressMeter {
    pub fn new(capacity: usize) -> Self {
        Self {
            last_update: Instant::now(),
            samples: 0,
            capacity,
        }
    }

    /// Account for a block, returning the rate (samples/s) whenever an interval has passed
    pub fn record(&mut self, samples: usize, now: Instant) -> Option<f64> {
        self.samples += samples as u64;
        let dt = now.saturating_duration_since(self.last_update);
        if dt <= PROGRESS_INTERVAL {
            return None;
        }
        let rate = self.samples as f64 / dt.as_secs_f64();
        self.samples = 0;
        self.last_update = now;
        Some(rate)
    }

    pub fn tick(&mut self, samples: usize, ctx: &CaptureContext) {
        if let Some(rate) = self.record(samples, Instant::now()) {
            info!(
                "{:.6} Msps | {} / {} elements",
                rate / 1e6,
                ctx.outstanding(),
                self.capacity
            );
        }
    }
}

/// How often each receive size (in samples) came back from the radio
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SizeMap(BTreeMap<usize, usize>);

impl SizeMap {
    pub fn record(&mut self, samples: usize) {
        *self.0.entry(samples).or_insert(0) += 1;
    }

    pub fn get(&self, samples: usize) -> usize {
        self.0.get(&samples).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &usize)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Why the acquisition loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The requested number of samples arrived
    Count,
    /// The requested duration elapsed
    Duration,
    /// The radio went quiet
    Timeout,
    /// Somebody set the stop flag
    Stopped,
    /// The writer fell behind and the ring filled up
    BufferFull,
}

#[derive(Clone, Debug)]
pub struct Summary {
    pub total_samples: u64,
    pub elapsed: Duration,
    pub end: EndReason,
    pub blocks_written: u64,
    pub short_writes: u64,
    pub headers: u64,
    pub size_map: Option<SizeMap>,
}

impl Summary {
    /// Samples per second over the whole run
    pub fn rate(&self) -> f64 {
        let t = self.elapsed.as_secs_f64();
        if t > 0.0 {
            self.total_samples as f64 / t
        } else {
            0.0
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Received {} samples in {:.6} seconds",
            self.total_samples,
            self.elapsed.as_secs_f64()
        )?;
        write!(f, "{:.6} Msps", self.rate() / 1e6)?;
        if let Some(map) = &self.size_map {
            write!(f, "\n\nPacket size map (samples: count)")?;
            for (size, count) in map.iter() {
                write!(f, "\n{size}:\t{count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_interval() {
        let mut meter = ProgressMeter::new(16);
        let start = meter.last_update;
        assert_eq!(meter.record(1000, start + Duration::from_millis(500)), None);
        let rate = meter
            .record(1000, start + Duration::from_secs(2))
            .unwrap();
        assert!((rate - 1000.0).abs() < 1e-9);
        // Counter resets after a report
        assert_eq!(meter.samples, 0);
    }

    #[test]
    fn test_size_map() {
        let mut map = SizeMap::default();
        for n in [1024, 1024, 476, 1024] {
            map.record(n);
        }
        assert_eq!(map.get(1024), 3);
        assert_eq!(map.get(476), 1);
        assert_eq!(map.get(7), 0);
        let keys: Vec<_> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![476, 1024]);
    }

    #[test]
    fn test_summary_display() {
        let mut map = SizeMap::default();
        map.record(1024);
        let summary = Summary {
            total_samples: 2_000_000,
            elapsed: Duration::from_secs(2),
            end: EndReason::Count,
            blocks_written: 0,
            short_writes: 0,
            headers: 0,
            size_map: Some(map),
        };
        assert_eq!(summary.rate(), 1e6);
        let text = summary.to_string();
        assert!(text.starts_with("Received 2000000 samples in 2.000000 seconds"));
        assert!(text.contains("1.000000 Msps"));
        assert!(text.ends_with("1024:\t1"));
    }
}
