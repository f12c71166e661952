//! This module contains all the capture logic

// The acquisition thread does one thing, as fast as possible: pull blocks from the radio and
// hand them to the writer through the ring. It never waits on the disk. If the ring is full
// we stop the whole run rather than quietly dropping data.

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::{
    error::{Error, Result},
    monitoring::{EndReason, ProgressMeter, SizeMap},
    radio::{RxStatus, StreamCommand, StreamSource},
    ring::RingProducer,
    sample::{samples_per_element, Block, SampleType},
    shutdown::CaptureContext,
};

/// Settings for the acquisition loop, fixed before it starts
#[derive(Clone, Debug)]
pub struct AcquireConfig {
    pub element_size: usize,
    pub sample_type: SampleType,
    /// 0 streams until stopped
    pub requested_samples: u64,
    pub requested_duration: Option<Duration>,
    /// Boundaries to signal the segmenter at, `None` with metadata off
    pub segment_size: Option<u64>,
    pub recv_timeout: Duration,
    pub continue_on_bad_packet: bool,
    pub size_map: bool,
    pub progress: bool,
    /// Only used to tell the user how fast their disk needs to be
    pub rate: f64,
}

#[derive(Clone, Debug)]
pub struct AcquisitionReport {
    pub total_samples: u64,
    pub elapsed: Duration,
    pub end: EndReason,
    pub size_map: Option<SizeMap>,
}

/// Run the acquisition loop on the calling thread until the requested count or duration is
/// reached, the radio times out, the ring fills, or the stop flag is set.
///
/// The producer is consumed, so the ring is closed as soon as this returns.
pub fn acquire<S: StreamSource + ?Sized>(
    source: &mut S,
    mut producer: RingProducer<Block>,
    ctx: &CaptureContext,
    config: &AcquireConfig,
) -> Result<AcquisitionReport> {
    let sample_size = config.sample_type.size();
    let samps_per_element = samples_per_element(config.element_size, config.sample_type)?;
    let requested = config.requested_samples;

    let mut size_map = config.size_map.then(SizeMap::default);
    let mut progress = config.progress.then(|| ProgressMeter::new(producer.capacity()));
    let mut overflow_message = true;
    let mut total = ctx.total_samples();
    // Next segment boundary, as a multiple of the segment size
    let mut next_boundary = 1u64;

    if let Err(e) = source.start(StreamCommand::for_request(requested)) {
        ctx.request_stop();
        return Err(e);
    }
    let start = Instant::now();

    let end = loop {
        if ctx.is_stopped() {
            break EndReason::Stopped;
        }
        if requested > 0 && total >= requested {
            break EndReason::Count;
        }
        if let Some(limit) = config.requested_duration {
            if start.elapsed() > limit {
                break EndReason::Duration;
            }
        }

        let want = if requested > 0 {
            samps_per_element.min((requested - total) as usize)
        } else {
            samps_per_element
        };
        let mut block = vec![0u8; config.element_size];
        let pak = source.receive(&mut block, want, config.recv_timeout);

        match pak.status {
            RxStatus::Ok => (),
            RxStatus::Timeout => {
                warn!("Timeout while streaming");
                break EndReason::Timeout;
            }
            RxStatus::Overflow => {
                if overflow_message {
                    overflow_message = false;
                    warn!(
                        "Got an overflow indication. Your write medium must sustain a rate of \
                         {:.6}MB/s. Dropped samples will not be written to the file. \
                         This message will not appear again.",
                        config.rate * sample_size as f64 / 1e6
                    );
                }
                continue;
            }
            RxStatus::Error(msg) => {
                if config.continue_on_bad_packet {
                    error!("Receiver error: {msg}");
                    continue;
                }
                ctx.request_stop();
                return Err(Error::Receiver(msg));
            }
        }

        if let Some(map) = size_map.as_mut() {
            map.record(pak.samples);
        }
        if pak.samples == 0 {
            continue;
        }
        if pak.samples != want {
            debug!("Only got {}/{} samples", pak.samples, want);
        }

        block.truncate(pak.samples * sample_size);
        if producer.try_push(block).is_err() {
            error!("Circular buffer is FULL!");
            ctx.request_stop();
            break EndReason::BufferFull;
        }
        ctx.block_enqueued();
        total = ctx.add_samples(pak.samples as u64);

        if let Some(seg) = config.segment_size {
            if total >= seg * next_boundary {
                // One wakeup is enough, the segmenter rereads the counter
                while total >= seg * next_boundary {
                    next_boundary += 1;
                }
                ctx.notify();
            }
        }

        if let Some(meter) = progress.as_mut() {
            meter.tick(pak.samples, ctx);
        }
    };

    ctx.request_stop();

    Ok(AcquisitionReport {
        total_samples: total,
        elapsed: start.elapsed(),
        end,
        size_map,
    })
}
