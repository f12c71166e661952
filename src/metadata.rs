//! Per-segment metadata headers.
//!
//! Every `segment_size` samples the acquisition loop rings the segmenter, which wakes up,
//! works out which segments are now complete from the shared sample counter, and writes one
//! header per segment. Headers go either inline into the sample file (under the shared lock)
//! or to a detached `.hdr` file that nothing else touches.
//!
//! A header is one JSON object on its own line. Field order is fixed by the struct, and
//! `strt` holds the length of the encoded record itself. Headers are written once their
//! segment is complete, so in an inline file they trail the samples they describe; a
//! reader locates a segment's samples through `extras.item_num`, not the header position.

use std::io::{BufReader, Read, Write};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    error::Result, output::OutputTarget, sample::SampleType, shutdown::CaptureContext,
};

pub const METADATA_VERSION: u8 = 0;

/// Acquisition parameters as read back from the device after setup
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcquisitionParams {
    pub rate: f64,
    pub freq: f64,
    pub gain: f64,
}

/// One segment of the recording, created once and never changed
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentDescriptor {
    pub index: u64,
    pub first_sample: u64,
    pub samples: u64,
    pub params: AcquisitionParams,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SegmentExtras {
    pub rx_freq: f64,
    pub rx_gain: f64,
    /// Absolute index of the first sample in the segment
    pub item_num: u64,
}

/// The on-disk header record
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SegmentHeader {
    pub version: u8,
    pub rx_rate: f64,
    /// Whole seconds since the epoch, fractional seconds
    pub rx_time: (i64, f64),
    /// Bytes per item
    pub size: usize,
    #[serde(rename = "type")]
    pub item_type: u8,
    pub cplx: bool,
    /// Length of this header record in bytes
    pub strt: u64,
    /// Bytes of sample data in the segment
    pub bytes: u64,
    pub extras: SegmentExtras,
}

impl SegmentHeader {
    pub fn new(desc: &SegmentDescriptor, sample_type: SampleType) -> Self {
        let secs = desc.timestamp.timestamp();
        let frac = desc.timestamp.timestamp_subsec_nanos() as f64 * 1e-9;
        Self {
            version: METADATA_VERSION,
            rx_rate: desc.params.rate,
            rx_time: (secs, frac),
            size: sample_type.size(),
            item_type: sample_type.item_type(),
            cplx: true,
            strt: 0,
            bytes: desc.samples * sample_type.size() as u64,
            extras: SegmentExtras {
                rx_freq: desc.params.freq,
                rx_gain: desc.params.gain,
                item_num: desc.first_sample,
            },
        }
    }

    /// Serialize to a newline-terminated record with `strt` filled in
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut header = self.clone();
        header.strt = 0;
        // strt is part of the record, so iterate until its digit count stops changing
        loop {
            let mut bytes = serde_json::to_vec(&header)?;
            bytes.push(b'\n');
            if bytes.len() as u64 == header.strt {
                return Ok(bytes);
            }
            header.strt = bytes.len() as u64;
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Walk every header in a detached header file
pub fn read_headers<R: Read>(reader: R) -> impl Iterator<Item = Result<SegmentHeader>> {
    serde_json::Deserializer::from_reader(BufReader::new(reader))
        .into_iter::<SegmentHeader>()
        .map(|h| h.map_err(Into::into))
}

/// Everything the segmenter thread needs, fixed before it starts
#[derive(Clone, Debug)]
pub struct SegmenterConfig {
    pub segment_size: u64,
    pub sample_type: SampleType,
    pub params: AcquisitionParams,
    pub started_at: DateTime<Utc>,
}

impl SegmenterConfig {
    pub fn descriptor(&self, first_sample: u64, samples: u64) -> SegmentDescriptor {
        let offset_ns = (first_sample as f64 * 1e9 / self.params.rate).round();
        SegmentDescriptor {
            index: first_sample / self.segment_size,
            first_sample,
            samples,
            params: self.params,
            timestamp: self.started_at + Duration::nanoseconds(offset_ns as i64),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SegmenterReport {
    pub headers: u64,
    pub failed: u64,
    pub last: Option<SegmentDescriptor>,
}

/// Segmenter thread body. Returns once the run is sealed and the trailing partial segment,
/// if any, has been written.
pub fn write_segment_headers<W: Write>(
    mut target: OutputTarget<W>,
    ctx: &CaptureContext,
    config: &SegmenterConfig,
) -> Result<SegmenterReport> {
    let seg = config.segment_size;
    let mut report = SegmenterReport::default();
    // 1-based index of the next segment to close
    let mut next = 1u64;
    loop {
        let total = ctx.wait_for_samples(next * seg);
        // Several boundaries may have gone by since we last woke
        while total >= next * seg {
            let desc = config.descriptor((next - 1) * seg, seg);
            emit(&mut target, &desc, config.sample_type, &mut report)?;
            next += 1;
        }
        if ctx.is_sealed() {
            break;
        }
    }
    // Sealed, so the counter is final
    let total = ctx.total_samples();
    let covered = (next - 1) * seg;
    if total > covered {
        let desc = config.descriptor(covered, total - covered);
        emit(&mut target, &desc, config.sample_type, &mut report)?;
    }
    if let Err(e) = target.flush() {
        error!("Problem flushing metadata: {e}");
    }
    Ok(report)
}

fn emit<W: Write>(
    target: &mut OutputTarget<W>,
    desc: &SegmentDescriptor,
    sample_type: SampleType,
    report: &mut SegmenterReport,
) -> Result<()> {
    let record = SegmentHeader::new(desc, sample_type).encode()?;
    match target.write_all_record(&record) {
        Ok(()) => {
            debug!(
                segment = desc.index,
                first_sample = desc.first_sample,
                samples = desc.samples,
                "Wrote segment header"
            );
            report.headers += 1;
        }
        Err(e) => {
            error!("Problem writing header for segment {}: {e}", desc.index);
            report.failed += 1;
        }
    }
    report.last = Some(desc.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    fn config(segment_size: u64) -> SegmenterConfig {
        SegmenterConfig {
            segment_size,
            sample_type: SampleType::Short,
            params: AcquisitionParams {
                rate: 1e6,
                freq: 915e6,
                gain: 20.0,
            },
            started_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_encode_strt_is_record_length() {
        let cfg = config(1000);
        let desc = cfg.descriptor(2000, 1000);
        let bytes = SegmentHeader::new(&desc, SampleType::Short)
            .encode()
            .unwrap();
        assert_eq!(*bytes.last().unwrap(), b'\n');
        let header = SegmentHeader::decode(&bytes).unwrap();
        assert_eq!(header.strt, bytes.len() as u64);
        assert_eq!(header.bytes, 4000);
        assert_eq!(header.size, 4);
        assert_eq!(header.item_type, 1);
        assert!(header.cplx);
        assert_eq!(header.extras.item_num, 2000);
        assert_eq!(header.extras.rx_freq, 915e6);
        // 2000 samples at 1 Msps
        assert_eq!(header.rx_time.0, 1_704_067_200);
        assert!((header.rx_time.1 - 0.002).abs() < 1e-9);
    }

    #[test]
    fn test_field_order_is_stable() {
        let cfg = config(10);
        let bytes = SegmentHeader::new(&cfg.descriptor(0, 10), SampleType::Float)
            .encode()
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let keys = [
            "\"version\"",
            "\"rx_rate\"",
            "\"rx_time\"",
            "\"size\"",
            "\"type\"",
            "\"cplx\"",
            "\"strt\"",
            "\"bytes\"",
            "\"extras\"",
            "\"item_num\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_segments_and_partial_tail() {
        let ctx = Arc::new(CaptureContext::new());
        let file = OutputTarget::shared(Vec::new());
        let handle = {
            let ctx = ctx.clone();
            let target = OutputTarget::Shared(file.clone());
            thread::spawn(move || write_segment_headers(target, &ctx, &config(100)).unwrap())
        };
        // Jump across two boundaries in one go, then dribble in the rest
        ctx.add_samples(230);
        ctx.notify();
        ctx.add_samples(20);
        ctx.notify();
        ctx.seal();
        let report = handle.join().unwrap();
        assert_eq!(report.headers, 3);
        let bytes = file.lock().unwrap().clone();
        let headers: Vec<_> = read_headers(&bytes[..]).map(|h| h.unwrap()).collect();
        let offsets: Vec<_> = headers.iter().map(|h| h.extras.item_num).collect();
        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(headers[2].bytes, 50 * 4);
        let last = report.last.unwrap();
        assert_eq!(last.index, 2);
        assert_eq!(last.samples, 50);
    }

    #[test]
    fn test_exact_multiple_has_no_tail() {
        let ctx = CaptureContext::new();
        ctx.add_samples(300);
        ctx.seal();
        let mut sink = Vec::new();
        let report =
            write_segment_headers(OutputTarget::Owned(&mut sink), &ctx, &config(100)).unwrap();
        assert_eq!(report.headers, 3);
        assert_eq!(report.last.unwrap().first_sample, 200);
    }

    #[test]
    fn test_empty_run_writes_nothing() {
        let ctx = CaptureContext::new();
        ctx.seal();
        let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
        let report =
            write_segment_headers(OutputTarget::Shared(sink.clone()), &ctx, &config(100)).unwrap();
        assert_eq!(report.headers, 0);
        assert!(sink.lock().unwrap().is_empty());
    }
}
