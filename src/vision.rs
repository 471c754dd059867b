use std::cmp::Ordering;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use opencv::{core::Mat, imgproc, prelude::*, videoio};

use crate::config::CameraConfig;
use crate::pipeline::{
    AprilTagPipeline, ColorBlobPipeline, DetectedObject, FilterContourParams, ObjectPipeline,
};

// YCrCb color space.
const COLOR_CONVERSION: i32 = imgproc::COLOR_BGR2YCrCb;
const RED_BLOB_COLOR_THRESHOLDS: [f64; 6] = [10., 180., 170., 240., 80., 120.];
const BLUE_BLOB_COLOR_THRESHOLDS: [f64; 6] = [0., 180., 80., 150., 150., 200.];

fn color_blob_filter_params() -> FilterContourParams {
    FilterContourParams::new()
        .min_area(10000.)
        .min_perimeter(200.)
        .width_range(100., 1000.)
        .height_range(100., 1000.)
        .solidity_range(0., 100.)
        .vertices_range(0., 1000.)
        .aspect_ratio_range(0., 1000.)
}

/// Which detector is active. `next` steps through the fixed rotation
/// AprilTag -> RedBlob -> BlueBlob -> None -> AprilTag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    AprilTag,
    RedBlob,
    BlueBlob,
    None,
}

impl ObjectType {
    pub fn next(self) -> ObjectType {
        match self {
            ObjectType::AprilTag => ObjectType::RedBlob,
            ObjectType::RedBlob => ObjectType::BlueBlob,
            ObjectType::BlueBlob => ObjectType::None,
            ObjectType::None => ObjectType::AprilTag,
        }
    }
}

impl FromStr for ObjectType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apriltag" => Ok(ObjectType::AprilTag),
            "redblob" => Ok(ObjectType::RedBlob),
            "blueblob" => Ok(ObjectType::BlueBlob),
            "none" => Ok(ObjectType::None),
            _ => Err(anyhow!("Unknown object type: {}", s)),
        }
    }
}

/// Selects between the three pre-built OpenCV pipelines and forwards frames
/// to whichever one is active.
pub struct OpenCvVision {
    capture: videoio::VideoCapture,
    apriltag_pipeline: AprilTagPipeline,
    red_blob_pipeline: ColorBlobPipeline,
    blue_blob_pipeline: ColorBlobPipeline,
    object_type: ObjectType,
}

impl OpenCvVision {
    pub fn new(config: &CameraConfig, capture: videoio::VideoCapture) -> Result<Self> {
        let apriltag_pipeline = AprilTagPipeline::new("aprilTagPipeline", config)?;
        let red_blob_pipeline = ColorBlobPipeline::new(
            "redBlobPipeline",
            COLOR_CONVERSION,
            RED_BLOB_COLOR_THRESHOLDS,
            color_blob_filter_params(),
        );
        let blue_blob_pipeline = ColorBlobPipeline::new(
            "blueBlobPipeline",
            COLOR_CONVERSION,
            BLUE_BLOB_COLOR_THRESHOLDS,
            color_blob_filter_params(),
        );

        Ok(OpenCvVision {
            capture,
            apriltag_pipeline,
            red_blob_pipeline,
            blue_blob_pipeline,
            object_type: ObjectType::None,
        })
    }

    fn active_pipeline(&mut self) -> Option<&mut dyn ObjectPipeline> {
        match self.object_type {
            ObjectType::AprilTag => Some(&mut self.apriltag_pipeline),
            ObjectType::RedBlob => Some(&mut self.red_blob_pipeline),
            ObjectType::BlueBlob => Some(&mut self.blue_blob_pipeline),
            ObjectType::None => None,
        }
    }

    pub fn set_object_type(&mut self, object_type: ObjectType) {
        self.object_type = object_type;
    }

    pub fn next_object_type(&mut self) {
        self.object_type = self.object_type.next();
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn set_annotate_enabled(&mut self, enabled: bool) {
        if let Some(pipeline) = self.active_pipeline() {
            pipeline.set_annotate_enabled(enabled);
        }
    }

    pub fn annotate_enabled(&mut self) -> bool {
        self.active_pipeline()
            .map(|pipeline| pipeline.annotate_enabled())
            .unwrap_or(false)
    }

    pub fn set_video_output(&mut self, intermediate_step: usize) {
        if let Some(pipeline) = self.active_pipeline() {
            pipeline.set_video_output(intermediate_step);
        }
    }

    pub fn output_image(&self) -> Option<&Mat> {
        match self.object_type {
            ObjectType::AprilTag => self.apriltag_pipeline.output_image(),
            ObjectType::RedBlob => self.red_blob_pipeline.output_image(),
            ObjectType::BlueBlob => self.blue_blob_pipeline.output_image(),
            ObjectType::None => None,
        }
    }

    pub fn annotated_image(&self) -> Option<&Mat> {
        match self.object_type {
            ObjectType::AprilTag => self.apriltag_pipeline.annotated_image(),
            ObjectType::RedBlob => self.red_blob_pipeline.annotated_image(),
            ObjectType::BlueBlob => self.blue_blob_pipeline.annotated_image(),
            ObjectType::None => None,
        }
    }

    /// Runs the active pipeline on a single frame. An absent frame or an
    /// inactive pipeline yields no targets, not an error.
    pub fn process(&mut self) -> Result<Vec<DetectedObject>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.rows() == 0 {
            return Ok(Vec::new());
        }

        self.process_image(&frame)
    }

    pub fn process_image(&mut self, image: &Mat) -> Result<Vec<DetectedObject>> {
        match self.active_pipeline() {
            Some(pipeline) => pipeline.process(image),
            None => Ok(Vec::new()),
        }
    }

    /// Returns the first detected target surviving `filter`, best-first
    /// according to `comparator` when one is given.
    pub fn best_target<F, C>(
        &mut self,
        filter: F,
        comparator: Option<C>,
    ) -> Result<Option<DetectedObject>>
    where
        F: Fn(&DetectedObject) -> bool,
        C: FnMut(&DetectedObject, &DetectedObject) -> Ordering,
    {
        let mut targets = self
            .process()?
            .into_iter()
            .filter(|target| filter(target))
            .collect::<Vec<_>>();

        if let Some(comparator) = comparator {
            targets.sort_by(comparator);
        }

        Ok(targets.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_rotation_is_fixed() {
        assert_eq!(ObjectType::AprilTag.next(), ObjectType::RedBlob);
        assert_eq!(ObjectType::RedBlob.next(), ObjectType::BlueBlob);
        assert_eq!(ObjectType::BlueBlob.next(), ObjectType::None);
        assert_eq!(ObjectType::None.next(), ObjectType::AprilTag);
    }

    #[test]
    fn object_type_rotation_is_a_total_cycle() {
        for start in [
            ObjectType::AprilTag,
            ObjectType::RedBlob,
            ObjectType::BlueBlob,
            ObjectType::None,
        ] {
            assert_eq!(start.next().next().next().next(), start);
        }
    }

    fn test_vision() -> OpenCvVision {
        let config = CameraConfig {
            image_width: 320,
            image_height: 240,
            fps: 30,
            cam_fx: 600.,
            cam_fy: 600.,
            cam_cx: 160.,
            cam_cy: 120.,
            distortion_coeffs: vec![0.; 5],
            apriltag_size: 6.5,
            target_z_offset: 0.,
            cam_z_offset: 0.,
        };

        OpenCvVision::new(&config, videoio::VideoCapture::default().unwrap()).unwrap()
    }

    #[test]
    fn none_selection_yields_no_targets_and_ignores_annotation() {
        let mut vision = test_vision();
        assert_eq!(vision.object_type(), ObjectType::None);

        vision.set_annotate_enabled(true);
        assert!(!vision.annotate_enabled());

        let targets = vision.process_image(&Mat::default()).unwrap();
        assert!(targets.is_empty());
        assert!(vision.output_image().is_none());
        assert!(vision.annotated_image().is_none());
    }

    #[test]
    fn absent_camera_frame_yields_no_targets() {
        // The capture is never opened, so reads produce no frame.
        let mut vision = test_vision();
        vision.set_object_type(ObjectType::AprilTag);

        let targets = vision.process().unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn object_type_parses_from_str() {
        assert_eq!("apriltag".parse::<ObjectType>().unwrap(), ObjectType::AprilTag);
        assert_eq!("RedBlob".parse::<ObjectType>().unwrap(), ObjectType::RedBlob);
        assert_eq!("blueblob".parse::<ObjectType>().unwrap(), ObjectType::BlueBlob);
        assert_eq!("none".parse::<ObjectType>().unwrap(), ObjectType::None);
        assert!("greenblob".parse::<ObjectType>().is_err());
    }
}
