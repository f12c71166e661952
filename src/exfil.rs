//! This module is responsible for exfilling sample blocks to disk

use std::io::Write;

use tracing::{debug, error, warn};

use crate::{
    output::OutputTarget, ring::RingConsumer, sample::Block, shutdown::CaptureContext,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub blocks: u64,
    pub bytes: u64,
    pub short_writes: u64,
}

/// Writer thread body. Drains the ring in order, one write call per block, until the
/// acquisition side closes the ring and everything it queued has been written.
///
/// Write failures and short writes are reported and skipped, never fatal.
pub fn write_blocks<W: Write>(
    mut consumer: RingConsumer<Block>,
    mut target: OutputTarget<W>,
    ctx: &CaptureContext,
) -> WriterReport {
    let mut report = WriterReport::default();
    while let Some(block) = consumer.pop_blocking() {
        match target.write_record(&block) {
            Ok(n) => {
                report.bytes += n as u64;
                if n != block.len() {
                    warn!("Wrote {}/{} bytes", n, block.len());
                    report.short_writes += 1;
                }
            }
            Err(e) => {
                error!("Problem writing: {e}");
                report.short_writes += 1;
            }
        }
        report.blocks += 1;
        ctx.block_written();
    }
    if let Err(e) = target.flush() {
        error!("Problem flushing samples: {e}");
    }
    debug!(
        blocks = report.blocks,
        bytes = report.bytes,
        "Writer drained"
    );
    report
}

/// Null sink, for testing how fast the front half of the pipeline can go
pub fn consume_and_drop(mut consumer: RingConsumer<Block>, ctx: &CaptureContext) -> WriterReport {
    let mut report = WriterReport::default();
    while let Some(block) = consumer.pop_blocking() {
        report.blocks += 1;
        report.bytes += block.len() as u64;
        ctx.block_written();
    }
    report
}
