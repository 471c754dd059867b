use std::{cmp::Ordering, fs::File, path::PathBuf, time::SystemTime};

use anyhow::{Context, Result};
use clap::Parser;
use opencv::{imgcodecs, videoio};

use vision_2025::{
    config::CameraConfig,
    pipeline::DetectedObject,
    udp::UdpSender,
    vision::{ObjectType, OpenCvVision},
};

#[derive(Debug, Parser)]
#[clap(about)]
struct Args {
    /// Detector to activate on startup.
    #[clap(long, default_value = "apriltag", parse(try_from_str))]
    object_type: ObjectType,

    #[clap(long, default_value = "config.json", parse(from_os_str))]
    config: PathBuf,

    #[clap(long, default_value = "0")]
    camera_index: i32,

    /// Write the annotated frame to annotated.png every iteration.
    #[clap(long)]
    annotate: bool,

    #[clap(long, default_value = "roborio-492-frc.local:5800")]
    destination: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_file = File::open(&args.config).context("Failed to open camera config")?;
    let config: CameraConfig = serde_json::from_reader(config_file)?;

    let capture = videoio::VideoCapture::new(args.camera_index, videoio::CAP_ANY)
        .context("Failed to open camera")?;

    let mut vision = OpenCvVision::new(&config, capture)?;
    vision.set_object_type(args.object_type);
    vision.set_annotate_enabled(args.annotate);

    // This line will block until the hostname appears on the network.
    let sender = UdpSender::new(5800, &args.destination)?;

    loop {
        // Largest target first.
        let target = vision.best_target(
            |target| target.area > 0.,
            Some(|a: &DetectedObject, b: &DetectedObject| {
                b.area.partial_cmp(&a.area).unwrap_or(Ordering::Equal)
            }),
        )?;
        dbg!(&target);

        sender.send(&(
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)?
                .as_secs_f64(),
            &target,
        ))?;

        if args.annotate {
            if let Some(image) = vision.annotated_image() {
                imgcodecs::imwrite(
                    "annotated.png",
                    image,
                    &opencv::types::VectorOfi32::with_capacity(0),
                )?;
            }
        }

        std::thread::sleep(std::time::Duration::from_millis(200));
    }
}
