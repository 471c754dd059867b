use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::field::FieldLayout;
use crate::led::LedIndicator;
use crate::pose::RobotPose;

/// Pipelines configured on the coprocessor, by network-table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineType {
    AprilTag,
    ColorBlob,
}

impl PipelineType {
    pub fn index(self) -> u32 {
        match self {
            PipelineType::AprilTag => 0,
            PipelineType::ColorBlob => 1,
        }
    }

    pub fn from_index(index: u32) -> Option<PipelineType> {
        match index {
            0 => Some(PipelineType::AprilTag),
            1 => Some(PipelineType::ColorBlob),
            _ => None,
        }
    }
}

/// Best target reported by the coprocessor for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotonDetection {
    pub fiducial_id: i32,
    pub area: f64,
    pub pose: RobotPose,
    pub timestamp: f64,
}

/// The coprocessor client itself is an external collaborator; this is the
/// surface the adapter consumes.
pub trait PhotonClient {
    fn latest_detection(&mut self) -> Result<Option<PhotonDetection>>;
    fn select_pipeline(&mut self, index: u32) -> Result<()>;
    fn selected_pipeline(&mut self) -> Result<u32>;
}

/// Wraps a coprocessor client with field-layout lookups, an LED side effect
/// on detection, and pipeline selection caching.
pub struct PhotonVisionRaw<C: PhotonClient> {
    client: C,
    led_indicator: Option<Box<dyn LedIndicator>>,
    field_layout: FieldLayout,
    curr_pipeline: PipelineType,
}

impl<C: PhotonClient> PhotonVisionRaw<C> {
    /// The process cannot run without tag geometry, so a layout that fails
    /// to load is a startup fault.
    pub fn new(
        client: C,
        layout_path: &Path,
        led_indicator: Option<Box<dyn LedIndicator>>,
    ) -> Result<Self> {
        let field_layout =
            FieldLayout::load(layout_path).context("Failed to load AprilTag field layout")?;

        Self::with_layout(client, field_layout, led_indicator)
    }

    pub fn with_layout(
        mut client: C,
        field_layout: FieldLayout,
        led_indicator: Option<Box<dyn LedIndicator>>,
    ) -> Result<Self> {
        client.select_pipeline(PipelineType::AprilTag.index())?;

        Ok(PhotonVisionRaw {
            client,
            led_indicator,
            field_layout,
            curr_pipeline: PipelineType::AprilTag,
        })
    }

    /// Returns the best detected object, signaling the LED indicator when
    /// one is present.
    pub fn detected_object(&mut self) -> Result<Option<PhotonDetection>> {
        let detection = self.client.latest_detection()?;

        if let Some(detection) = detection {
            // Only the LED side effect needs the active pipeline read back.
            if self.led_indicator.is_some() {
                let pipeline = self.pipeline()?;
                if let Some(led) = &mut self.led_indicator {
                    led.signal_detection(pipeline, &detection.pose);
                }
            }

            return Ok(Some(detection));
        }

        Ok(None)
    }

    /// Field location of the AprilTag with the given ID, in the robot
    /// code's axis convention.
    pub fn apriltag_pose(&self, id: i32) -> Option<RobotPose> {
        self.field_layout.tag_pose(id).map(RobotPose::from_field_pose)
    }

    pub fn field_layout(&self) -> &FieldLayout {
        &self.field_layout
    }

    /// Forwards to the coprocessor only when the selection actually changes.
    pub fn set_pipeline(&mut self, pipeline_type: PipelineType) -> Result<()> {
        if pipeline_type != self.curr_pipeline {
            self.curr_pipeline = pipeline_type;
            self.client.select_pipeline(pipeline_type.index())?;
        }

        Ok(())
    }

    /// Reads the active pipeline back from the coprocessor and refreshes
    /// the cached selection.
    pub fn pipeline(&mut self) -> Result<PipelineType> {
        let index = self.client.selected_pipeline()?;
        self.curr_pipeline = PipelineType::from_index(index)
            .with_context(|| format!("Coprocessor reported unknown pipeline index {}", index))?;

        Ok(self.curr_pipeline)
    }
}
