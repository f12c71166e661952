use std::{process, sync::Arc};

use clap::Parser;
use iq_slurper::{
    args::{convert_filter, Args},
    pipeline::Pipeline,
    radio::SimulatedRadio,
    setup::configure_device,
    shutdown::CaptureContext,
    Result,
};
use tracing::{error, info};

fn run(args: Args) -> Result<()> {
    // Catch config problems before touching the device or spawning anything
    let config = args.capture_config();
    config.validate()?;

    if config.size_map {
        info!("Packet size tracking enabled");
    }

    info!("Creating the device with: {}...", args.args);
    let mut radio = SimulatedRadio::open(&args.args)?;
    let params = configure_device(&mut radio, &args.device_settings())?;

    // The handler only flips the flag, the pipeline does all the teardown
    let ctx = Arc::new(CaptureContext::new());
    {
        let ctx = ctx.clone();
        ctrlc::set_handler(move || {
            ctx.request_stop();
        })?;
    }
    if config.requested_samples == 0 {
        info!("Press Ctrl + C to stop streaming...");
    }

    let pipeline = Pipeline::new(config, params, ctx)?;
    let summary = pipeline.run(&mut radio)?;
    info!("Done! Stopped on {:?}", summary.end);
    Ok(())
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    if let Err(e) = run(args) {
        error!("{e}");
        process::exit(1);
    }
}
