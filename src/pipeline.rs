//! Wires the ring, the writer, and the segmenter around the acquisition loop, and tears
//! everything down again once acquisition returns.

use std::{fs::File, sync::Arc, thread};

use chrono::Utc;
use tracing::info;

use crate::{
    capture::acquire,
    config::CaptureConfig,
    error::{Error, Result},
    exfil::{consume_and_drop, write_blocks},
    metadata::{write_segment_headers, AcquisitionParams},
    monitoring::Summary,
    output::OutputTarget,
    radio::StreamSource,
    ring::ring_buffer,
    sample::samples_per_element,
    shutdown::CaptureContext,
};

pub struct Pipeline {
    config: CaptureConfig,
    params: AcquisitionParams,
    ctx: Arc<CaptureContext>,
}

impl Pipeline {
    /// Checks the configuration up front, so a bad run fails before any thread is spawned
    pub fn new(
        config: CaptureConfig,
        params: AcquisitionParams,
        ctx: Arc<CaptureContext>,
    ) -> Result<Self> {
        config.validate()?;
        if params.rate <= 0.0 {
            return Err(Error::Config(format!("invalid sample rate {}", params.rate)));
        }
        Ok(Self {
            config,
            params,
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<CaptureContext> {
        &self.ctx
    }

    /// Record until acquisition ends, then stop, join, and close everything exactly once
    pub fn run<S: StreamSource + ?Sized>(self, source: &mut S) -> Result<Summary> {
        let cfg = &self.config;
        let samps_per_element = samples_per_element(cfg.element_size, cfg.sample_type)?;
        info!(
            "Elements are {} bytes, {} {} samples/element, {} elements in circular buffer",
            cfg.element_size, samps_per_element, cfg.sample_type, cfg.ring_capacity
        );
        source.configure(cfg.sample_type, cfg.wire_format)?;

        let data = if cfg.null_output {
            None
        } else {
            Some(File::create(&cfg.file)?)
        };
        let (data_target, header_target) = match (data, cfg.metadata, cfg.detached_headers) {
            (data, false, _) => (data.map(OutputTarget::Owned), None),
            (data, true, true) => {
                let hdr = File::create(cfg.header_path())?;
                (data.map(OutputTarget::Owned), Some(OutputTarget::Owned(hdr)))
            }
            (Some(file), true, false) => {
                let shared = OutputTarget::shared(file);
                (
                    Some(OutputTarget::Shared(shared.clone())),
                    Some(OutputTarget::Shared(shared)),
                )
            }
            (None, true, false) => {
                return Err(Error::Config("inline headers need a data file".into()))
            }
        };

        let (producer, consumer) = ring_buffer(cfg.ring_capacity);
        let segmenter_config = cfg.segmenter_config(self.params, Utc::now());

        let writer = {
            let ctx = self.ctx.clone();
            thread::Builder::new()
                .name("writer".into())
                .spawn(move || match data_target {
                    Some(target) => write_blocks(consumer, target, &ctx),
                    None => consume_and_drop(consumer, &ctx),
                })?
        };
        let segmenter = match header_target {
            Some(target) => {
                let ctx = self.ctx.clone();
                Some(
                    thread::Builder::new()
                        .name("metadata".into())
                        .spawn(move || write_segment_headers(target, &ctx, &segmenter_config))?,
                )
            }
            None => None,
        };

        let acquired = acquire(
            source,
            producer,
            &self.ctx,
            &cfg.acquire_config(self.params.rate),
        );

        // The producer is gone, so the writer finishes once the ring is empty. Sealing
        // lets the segmenter write the tail and exit.
        self.ctx.seal();
        let written = writer.join().map_err(|_| Error::ThreadPanic("writer"))?;
        let headers = match segmenter {
            Some(handle) => {
                handle
                    .join()
                    .map_err(|_| Error::ThreadPanic("metadata"))??
                    .headers
            }
            None => 0,
        };
        // Both threads have dropped their file handles by now

        let report = acquired?;
        let summary = Summary {
            total_samples: report.total_samples,
            elapsed: report.elapsed,
            end: report.end,
            blocks_written: written.blocks,
            short_writes: written.short_writes,
            headers,
            size_map: report.size_map,
        };
        if cfg.stats {
            info!("\n{summary}");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::SimulatedRadio;

    fn params() -> AcquisitionParams {
        AcquisitionParams {
            rate: 1e6,
            freq: 100e6,
            gain: 10.0,
        }
    }

    #[test]
    fn test_bad_config_fails_before_run() {
        let cfg = CaptureConfig {
            element_size: 4097,
            ..Default::default()
        };
        let ctx = Arc::new(CaptureContext::new());
        assert!(matches!(
            Pipeline::new(cfg, params(), ctx),
            Err(Error::ElementSize { .. })
        ));

        let bad_rate = AcquisitionParams {
            rate: 0.0,
            ..params()
        };
        let ctx = Arc::new(CaptureContext::new());
        assert!(matches!(
            Pipeline::new(CaptureConfig::default(), bad_rate, ctx),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_null_output_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CaptureConfig {
            file: dir.path().join("never.dat"),
            requested_samples: 10_000,
            null_output: true,
            ..Default::default()
        };
        let ctx = Arc::new(CaptureContext::new());
        let summary = Pipeline::new(cfg, params(), ctx.clone())
            .unwrap()
            .run(&mut SimulatedRadio::unpaced())
            .unwrap();
        assert_eq!(summary.total_samples, 10_000);
        assert_eq!(summary.blocks_written, 10);
        assert!(!dir.path().join("never.dat").exists());
        assert!(ctx.is_stopped());
    }
}
