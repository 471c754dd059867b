use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use vision_2025::{field::FieldLayout, pose::RobotPose};

/// Dumps every tag pose in a field layout, converted to the robot code's
/// axis convention.
#[derive(Debug, Parser)]
#[clap(about)]
struct Args {
    #[clap(parse(from_os_str), default_value = "fields/2025-reefscape.json")]
    layout_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let layout = FieldLayout::load(&args.layout_path)?;
    let dims = layout.dimensions();

    println!(
        "field: {:.3} m x {:.3} m, {} tags",
        dims.length,
        dims.width,
        layout.tag_count()
    );

    for id in layout.tag_ids() {
        if let Some(pose) = layout.tag_pose(id).map(RobotPose::from_field_pose) {
            println!(
                "tag {:2}: x={:7.3} y={:7.3} z={:6.3} yaw={:7.3} pitch={:6.3} roll={:6.3}",
                id, pose.x, pose.y, pose.z, pose.yaw, pose.pitch, pose.roll
            );
        }
    }

    Ok(())
}
