use std::ops::RangeInclusive;

use anyhow::{Context, Result};
use opencv::{
    aruco::{self, DetectorParameters, Dictionary},
    calib3d::rodrigues,
    core::{self, Mat, Point, Point2f, Ptr, Rect, Scalar, Vec3d, Vector},
    imgproc,
    prelude::*,
    types::{VectorOfPoint, VectorOfVectorOfPoint},
};
use serde::{Deserialize, Serialize};

use crate::config::{inches_to_meters, CameraConfig};
use crate::pose::RobotPose;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<Rect> for Bounds {
    fn from(rect: Rect) -> Self {
        Bounds {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// One detection out of a pipeline. `id` is the fiducial ID for AprilTags
/// and -1 for color blobs; `pose` is only present when the pipeline
/// estimated one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObject {
    pub id: i32,
    pub rect: Bounds,
    pub area: f64,
    pub pose: Option<RobotPose>,
}

/// An image-processing pipeline selectable at runtime. `process` consumes
/// one frame and keeps its intermediate images around so one of them can be
/// published as the video output (1 is the input image, 0 disables output).
pub trait ObjectPipeline {
    fn name(&self) -> &str;
    fn process(&mut self, image: &Mat) -> Result<Vec<DetectedObject>>;
    fn set_annotate_enabled(&mut self, enabled: bool);
    fn annotate_enabled(&self) -> bool;
    fn set_video_output(&mut self, intermediate_step: usize);
    fn output_image(&self) -> Option<&Mat>;
    /// The annotated mat from the last processed frame, if annotation ran.
    fn annotated_image(&self) -> Option<&Mat>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourMetrics {
    pub area: f64,
    pub perimeter: f64,
    pub width: f64,
    pub height: f64,
    /// Percent of the convex hull area filled by the contour.
    pub solidity: f64,
    pub vertices: f64,
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterContourParams {
    min_area: f64,
    min_perimeter: f64,
    width: RangeInclusive<f64>,
    height: RangeInclusive<f64>,
    solidity: RangeInclusive<f64>,
    vertices: RangeInclusive<f64>,
    aspect_ratio: RangeInclusive<f64>,
}

impl FilterContourParams {
    pub fn new() -> Self {
        FilterContourParams {
            min_area: 0.,
            min_perimeter: 0.,
            width: 0.0..=f64::MAX,
            height: 0.0..=f64::MAX,
            solidity: 0.0..=100.0,
            vertices: 0.0..=f64::MAX,
            aspect_ratio: 0.0..=f64::MAX,
        }
    }

    pub fn min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    pub fn min_perimeter(mut self, min_perimeter: f64) -> Self {
        self.min_perimeter = min_perimeter;
        self
    }

    pub fn width_range(mut self, min: f64, max: f64) -> Self {
        self.width = min..=max;
        self
    }

    pub fn height_range(mut self, min: f64, max: f64) -> Self {
        self.height = min..=max;
        self
    }

    pub fn solidity_range(mut self, min: f64, max: f64) -> Self {
        self.solidity = min..=max;
        self
    }

    pub fn vertices_range(mut self, min: f64, max: f64) -> Self {
        self.vertices = min..=max;
        self
    }

    pub fn aspect_ratio_range(mut self, min: f64, max: f64) -> Self {
        self.aspect_ratio = min..=max;
        self
    }

    pub fn accepts(&self, metrics: &ContourMetrics) -> bool {
        metrics.area >= self.min_area
            && metrics.perimeter >= self.min_perimeter
            && self.width.contains(&metrics.width)
            && self.height.contains(&metrics.height)
            && self.solidity.contains(&metrics.solidity)
            && self.vertices.contains(&metrics.vertices)
            && self.aspect_ratio.contains(&metrics.aspect_ratio)
    }
}

impl Default for FilterContourParams {
    fn default() -> Self {
        FilterContourParams::new()
    }
}

fn contour_metrics(contour: &VectorOfPoint) -> Result<ContourMetrics> {
    let area = imgproc::contour_area(contour, false)?;
    let perimeter = imgproc::arc_length(contour, true)?;
    let rect = imgproc::bounding_rect(contour)?;

    let mut hull = VectorOfPoint::new();
    imgproc::convex_hull(contour, &mut hull, true, true)?;
    let hull_area = imgproc::contour_area(&hull, false)?;

    let solidity = if hull_area > 0. {
        100. * area / hull_area
    } else {
        0.
    };

    let mut poly = VectorOfPoint::new();
    imgproc::approx_poly_dp(contour, &mut poly, 0.01 * perimeter, true)?;

    Ok(ContourMetrics {
        area,
        perimeter,
        width: rect.width as f64,
        height: rect.height as f64,
        solidity,
        vertices: poly.len() as f64,
        aspect_ratio: rect.width as f64 / rect.height as f64,
    })
}

/// Color-thresholding blob detector. Thresholds are
/// `{low1, high1, low2, high2, low3, high3}` in the converted color space.
pub struct ColorBlobPipeline {
    name: String,
    color_conversion: i32,
    color_thresholds: [f64; 6],
    filter_params: FilterContourParams,
    annotate: bool,
    video_output_step: usize,
    intermediates: Vec<Mat>,
}

impl ColorBlobPipeline {
    pub fn new(
        name: &str,
        color_conversion: i32,
        color_thresholds: [f64; 6],
        filter_params: FilterContourParams,
    ) -> Self {
        ColorBlobPipeline {
            name: name.to_string(),
            color_conversion,
            color_thresholds,
            filter_params,
            annotate: false,
            video_output_step: 1,
            intermediates: Vec::new(),
        }
    }

    fn threshold_image(&self, image: &Mat) -> Result<(Mat, Mat)> {
        let t = &self.color_thresholds;

        let mut converted = Mat::default();
        imgproc::cvt_color(image, &mut converted, self.color_conversion, 0)
            .context("Color conversion failed")?;

        let mut thresholded = Mat::default();
        core::in_range(
            &converted,
            &Mat::from_slice(&[t[0], t[2], t[4]])?,
            &Mat::from_slice(&[t[1], t[3], t[5]])?,
            &mut thresholded,
        )
        .context("Color thresholding failed")?;

        Ok((converted, thresholded))
    }

    fn find_blobs(&self, thresholded: &Mat) -> Result<Vec<DetectedObject>> {
        let mut contours = VectorOfVectorOfPoint::new();
        imgproc::find_contours(
            thresholded,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .context("Contour extraction failed")?;

        let mut objects = Vec::new();

        for contour in contours.iter() {
            let metrics = contour_metrics(&contour)?;

            if !self.filter_params.accepts(&metrics) {
                continue;
            }

            objects.push(DetectedObject {
                id: -1,
                rect: imgproc::bounding_rect(&contour)?.into(),
                area: metrics.area,
                pose: None,
            });
        }

        Ok(objects)
    }
}

impl ObjectPipeline for ColorBlobPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, image: &Mat) -> Result<Vec<DetectedObject>> {
        let (converted, thresholded) = self.threshold_image(image)?;
        let objects = self.find_blobs(&thresholded)?;

        self.intermediates = vec![image.clone(), converted, thresholded];

        if self.annotate {
            let mut annotated = image.clone();

            for object in &objects {
                let rect = Rect::new(
                    object.rect.x,
                    object.rect.y,
                    object.rect.width,
                    object.rect.height,
                );
                imgproc::rectangle(
                    &mut annotated,
                    rect,
                    Scalar::new(0., 255., 0., 0.),
                    2,
                    imgproc::LINE_8,
                    0,
                )?;
            }

            self.intermediates.push(annotated);
        }

        Ok(objects)
    }

    fn set_annotate_enabled(&mut self, enabled: bool) {
        self.annotate = enabled;
    }

    fn annotate_enabled(&self) -> bool {
        self.annotate
    }

    fn set_video_output(&mut self, intermediate_step: usize) {
        self.video_output_step = intermediate_step;
    }

    fn output_image(&self) -> Option<&Mat> {
        if self.video_output_step == 0 {
            return None;
        }

        self.intermediates.get(self.video_output_step - 1)
    }

    fn annotated_image(&self) -> Option<&Mat> {
        // Intermediates are [input, converted, thresholded, annotated].
        self.intermediates.get(3)
    }
}

/// AprilTag detector over the aruco module's tag16h5 dictionary, with
/// single-marker pose estimation from the camera intrinsics.
pub struct AprilTagPipeline {
    name: String,
    dictionary: Ptr<Dictionary>,
    detector_params: Ptr<DetectorParameters>,
    tag_size_meters: f64,
    intrinsic_matrix: Mat,
    distortion_coeffs: Mat,
    annotate: bool,
    video_output_step: usize,
    intermediates: Vec<Mat>,
}

impl AprilTagPipeline {
    pub fn new(name: &str, config: &CameraConfig) -> Result<Self> {
        let dictionary = aruco::get_predefined_dictionary(
            aruco::PREDEFINED_DICTIONARY_NAME::DICT_APRILTAG_16h5,
        )?;
        let detector_params = DetectorParameters::create()?;

        Ok(AprilTagPipeline {
            name: name.to_string(),
            dictionary,
            detector_params,
            tag_size_meters: inches_to_meters(config.apriltag_size),
            intrinsic_matrix: config.intrinsic_matrix()?,
            distortion_coeffs: config.distortion_mat()?,
            annotate: false,
            video_output_step: 1,
            intermediates: Vec::new(),
        })
    }

    fn pose_from_vectors(rvec: &Vec3d, tvec: &Vec3d) -> Result<RobotPose> {
        let mut rmat = Mat::default();
        let mut jacobian = Mat::default();
        rodrigues(
            &Mat::from_slice(&[rvec[0], rvec[1], rvec[2]])?,
            &mut rmat,
            &mut jacobian,
        )?;

        let r00 = *rmat.at_2d::<f64>(0, 0)?;
        let r10 = *rmat.at_2d::<f64>(1, 0)?;
        let r20 = *rmat.at_2d::<f64>(2, 0)?;
        let r21 = *rmat.at_2d::<f64>(2, 1)?;
        let r22 = *rmat.at_2d::<f64>(2, 2)?;

        let roll = r10.atan2(r00);
        let pitch = -r20.atan2((r21.powi(2) + r22.powi(2)).sqrt());
        let yaw = r21.atan2(r22);

        Ok(RobotPose {
            x: tvec[0],
            y: tvec[1],
            z: tvec[2],
            yaw,
            pitch,
            roll,
        })
    }
}

impl ObjectPipeline for AprilTagPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, image: &Mat) -> Result<Vec<DetectedObject>> {
        let mut corners = Vector::<Vector<Point2f>>::new();
        let mut ids = Vector::<i32>::new();
        let mut rejected_img_points = core::no_array();

        aruco::detect_markers(
            image,
            &self.dictionary,
            &mut corners,
            &mut ids,
            &self.detector_params,
            &mut rejected_img_points,
            &self.intrinsic_matrix,
            &self.distortion_coeffs,
        )
        .context("AprilTag detection failed")?;

        let mut rvecs = Vector::<Vec3d>::new();
        let mut tvecs = Vector::<Vec3d>::new();

        if !ids.is_empty() {
            aruco::estimate_pose_single_markers(
                &corners,
                self.tag_size_meters as f32,
                &self.intrinsic_matrix,
                &self.distortion_coeffs,
                &mut rvecs,
                &mut tvecs,
                &mut core::no_array(),
            )
            .context("AprilTag pose estimation failed")?;
        }

        let mut objects = Vec::new();

        for idx in 0..ids.len() {
            let corner = corners.get(idx)?;
            let rect = imgproc::bounding_rect(&corner)?;

            let pose = Self::pose_from_vectors(&rvecs.get(idx)?, &tvecs.get(idx)?)?;

            objects.push(DetectedObject {
                id: ids.get(idx)?,
                rect: rect.into(),
                area: (rect.width * rect.height) as f64,
                pose: Some(pose),
            });
        }

        self.intermediates = vec![image.clone()];

        if self.annotate {
            let mut annotated = image.clone();
            aruco::draw_detected_markers(
                &mut annotated,
                &corners,
                &ids,
                Scalar::new(255., 0., 0., 0.),
            )?;
            self.intermediates.push(annotated);
        }

        Ok(objects)
    }

    fn set_annotate_enabled(&mut self, enabled: bool) {
        self.annotate = enabled;
    }

    fn annotate_enabled(&self) -> bool {
        self.annotate
    }

    fn set_video_output(&mut self, intermediate_step: usize) {
        self.video_output_step = intermediate_step;
    }

    fn output_image(&self) -> Option<&Mat> {
        if self.video_output_step == 0 {
            return None;
        }

        self.intermediates.get(self.video_output_step - 1)
    }

    fn annotated_image(&self) -> Option<&Mat> {
        // Intermediates are [input, annotated].
        self.intermediates.get(1)
    }
}
