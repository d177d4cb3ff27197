//! # Scan line capture
//!
//! Command line driver: connects to the first V4L2 camera, configures it, captures a reference
//! frame and then sweeps the trigger delay while accumulating the lit scan line rows.

use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};

use scanline_camstream::prelude::*;
use scanline_camstream::{DetectorParams, V4l2Bus};

#[derive(Parser, Debug)]
#[command(about = "Find the rows lit by a projected scan line")]
struct Args {
    /// Acquisition profile file, any format serde_any understands
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Directory holding the video device nodes
    #[arg(long, default_value = "/dev")]
    dev_dir: PathBuf,

    /// Number of frames to capture after the reference frame
    #[arg(long, default_value_t = 55)]
    frames: u64,

    /// Advance the trigger delay by one step after every frame
    #[arg(long)]
    sweep: bool,

    /// Brightness above which a pixel counts as lit
    #[arg(long, default_value_t = 90)]
    threshold: u8,

    /// Frames kept in the ring buffer
    #[arg(long, default_value_t = 10)]
    ring: usize,

    /// Retrievals at start whose failures are not counted as drops
    #[arg(long, default_value_t = 5)]
    warmup: u64,

    /// Also record this many frames as BMP files into --out
    #[arg(long, default_value_t = 0)]
    record: usize,

    /// Output directory for recorded frames
    #[arg(long, default_value = "Results")]
    out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut builder = SessionBuilder::new()
        .ring_capacity(args.ring)
        .warmup_frames(args.warmup)
        .detector_params(DetectorParams {
            threshold: args.threshold,
            ..DetectorParams::default()
        });
    if let Some(ref path) = args.profile {
        builder = builder.profile_from_file(path)?;
    }

    let mut session = builder.build(V4l2Bus::in_dir(&args.dev_dir))?;

    session.connect()?;
    session.configure()?;
    session.start()?;

    // Keep trying until a reference frame arrives
    let mut index = 0;
    while !session.capture_reference(index)? {
        index += 1;
    }

    for _ in 0..args.frames {
        index += 1;
        if session.capture_one(index)?.is_some() {
            if let Some(band) = session.detect(index)? {
                info!("Frame {}: rows {} to {}", index, band.top, band.bottom);
            }
        }

        if args.sweep {
            let delay = session.increment_trigger_delay()?;
            info!("Trigger delay now {:?}", delay);
        }
    }

    if args.record > 0 {
        std::fs::create_dir_all(&args.out)?;
        let saved = session.record_images(args.record, &args.out, &mut ImageFileSink)?;
        info!("Recorded {} frames into {:?}", saved.len(), args.out);
    }

    match session.detector().envelope() {
        Some(env) => println!("top line {}, bottom line {}", env.top, env.bottom),
        None => warn!("No illuminated rows found"),
    }

    let stats = session.stats();
    info!("Captured {} frames, dropped {}", stats.captured, stats.dropped);

    session.stop()?;

    Ok(())
}
