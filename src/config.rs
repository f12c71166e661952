//! Per-run capture settings and the startup checks on them

use std::{path::PathBuf, time::Duration};

use crate::{
    capture::AcquireConfig,
    error::{Error, Result},
    metadata::{AcquisitionParams, SegmenterConfig},
    sample::{samples_per_element, SampleType, WireFormat},
    DEFAULT_CAPACITY, DEFAULT_SEGMENT_SIZE, ELEMENT_SIZE,
};

#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub file: PathBuf,
    pub sample_type: SampleType,
    pub wire_format: WireFormat,
    /// Bytes per ring element
    pub element_size: usize,
    /// Elements in the ring
    pub ring_capacity: usize,
    /// 0 streams until interrupted
    pub requested_samples: u64,
    /// Zero means no limit
    pub requested_duration: Duration,
    pub segment_size: u64,
    pub recv_timeout: Duration,
    pub metadata: bool,
    pub detached_headers: bool,
    pub continue_on_bad_packet: bool,
    pub size_map: bool,
    pub stats: bool,
    pub progress: bool,
    pub null_output: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("usrp_samples.dat"),
            sample_type: SampleType::Short,
            wire_format: WireFormat::Sc16,
            element_size: ELEMENT_SIZE,
            ring_capacity: DEFAULT_CAPACITY,
            requested_samples: 0,
            requested_duration: Duration::ZERO,
            segment_size: DEFAULT_SEGMENT_SIZE,
            recv_timeout: Duration::from_secs(3),
            metadata: false,
            detached_headers: true,
            continue_on_bad_packet: false,
            size_map: false,
            stats: false,
            progress: false,
            null_output: false,
        }
    }
}

impl CaptureConfig {
    /// Everything that can be wrong with a config before any thread exists
    pub fn validate(&self) -> Result<()> {
        samples_per_element(self.element_size, self.sample_type)?;
        if self.ring_capacity == 0 {
            return Err(Error::Config("ring capacity must be at least one element".into()));
        }
        if self.recv_timeout.is_zero() {
            return Err(Error::Config("receive timeout must be non-zero".into()));
        }
        if self.metadata && self.segment_size == 0 {
            return Err(Error::Config("segment size must be non-zero with metadata on".into()));
        }
        if self.metadata && !self.detached_headers && self.null_output {
            return Err(Error::Config(
                "inline headers need a data file, use detached headers with null output".into(),
            ));
        }
        Ok(())
    }

    /// Where detached headers go: the data path with `.hdr` appended
    pub fn header_path(&self) -> PathBuf {
        let mut path = self.file.clone().into_os_string();
        path.push(".hdr");
        PathBuf::from(path)
    }

    pub fn acquire_config(&self, rate: f64) -> AcquireConfig {
        AcquireConfig {
            element_size: self.element_size,
            sample_type: self.sample_type,
            requested_samples: self.requested_samples,
            requested_duration: (!self.requested_duration.is_zero())
                .then_some(self.requested_duration),
            segment_size: self.metadata.then_some(self.segment_size),
            recv_timeout: self.recv_timeout,
            continue_on_bad_packet: self.continue_on_bad_packet,
            size_map: self.size_map,
            progress: self.progress,
            rate,
        }
    }

    pub fn segmenter_config(
        &self,
        params: AcquisitionParams,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> SegmenterConfig {
        SegmenterConfig {
            segment_size: self.segment_size,
            sample_type: self.sample_type,
            params,
            started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        CaptureConfig::default().validate().unwrap();
    }

    #[test]
    fn test_element_size_must_hold_whole_samples() {
        for (element, sample_type) in [
            (4098, SampleType::Short),
            (4100, SampleType::Float),
            (4104, SampleType::Double),
        ] {
            let cfg = CaptureConfig {
                element_size: element,
                sample_type,
                ..Default::default()
            };
            assert!(matches!(cfg.validate(), Err(Error::ElementSize { .. })));
        }
    }

    #[test]
    fn test_rejects_bad_combinations() {
        let cfg = CaptureConfig {
            ring_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let cfg = CaptureConfig {
            metadata: true,
            segment_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let cfg = CaptureConfig {
            metadata: true,
            detached_headers: false,
            null_output: true,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_header_path() {
        let cfg = CaptureConfig {
            file: PathBuf::from("/tmp/capture.dat"),
            ..Default::default()
        };
        assert_eq!(cfg.header_path(), PathBuf::from("/tmp/capture.dat.hdr"));
    }

    #[test]
    fn test_acquire_config_unbounded() {
        let acq = CaptureConfig::default().acquire_config(1e6);
        assert_eq!(acq.requested_duration, None);
        assert_eq!(acq.segment_size, None);
    }
}
