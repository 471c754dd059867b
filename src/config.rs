use anyhow::Result;
use opencv::core::Mat;
use serde::{Deserialize, Serialize};

pub fn inches_to_meters(inches: f64) -> f64 {
    inches * 0.0254
}

/// Camera parameters loaded from `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub image_width: u32,
    pub image_height: u32,
    pub fps: u32,
    pub cam_fx: f64,
    pub cam_fy: f64,
    pub cam_cx: f64,
    pub cam_cy: f64,
    pub distortion_coeffs: Vec<f64>,
    /// AprilTag edge length, in inches.
    pub apriltag_size: f64,
    pub target_z_offset: f64,
    pub cam_z_offset: f64,
}

impl CameraConfig {
    pub fn intrinsic_matrix(&self) -> Result<Mat> {
        let matrix = Mat::from_slice_2d(&[
            &[self.cam_fx, 0., self.cam_cx],
            &[0., self.cam_fy, self.cam_cy],
            &[0., 0., 1.],
        ])?;

        Ok(matrix)
    }

    pub fn distortion_mat(&self) -> Result<Mat> {
        let coeffs = Mat::from_slice(&self.distortion_coeffs)?;

        Ok(coeffs)
    }
}
