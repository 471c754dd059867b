use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Pose in the field-layout convention: x along the long axis of the field,
/// y to the left, z up, rotation as a unit quaternion.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPose {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl FieldPose {
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        FieldPose {
            translation,
            rotation,
        }
    }

    pub fn from_quaternion_parts(x: f64, y: f64, z: f64, w: f64, qx: f64, qy: f64, qz: f64) -> Self {
        FieldPose {
            translation: Vector3::new(x, y, z),
            rotation: UnitQuaternion::from_quaternion(Quaternion::new(w, qx, qy, qz)),
        }
    }

    pub fn from_robot_pose(pose: &RobotPose) -> Self {
        FieldPose {
            translation: Vector3::new(pose.y, -pose.x, pose.z),
            rotation: UnitQuaternion::from_euler_angles(pose.roll, pose.pitch, -pose.yaw),
        }
    }
}

/// Pose in the robot code's convention: x to the right, y forward, z up,
/// angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl RobotPose {
    /// Converts from the field-layout axes: the field's x becomes the robot's
    /// y, the field's y becomes the robot's -x, and yaw flips sign.
    pub fn from_field_pose(pose: &FieldPose) -> Self {
        let (roll, pitch, yaw) = pose.rotation.euler_angles();

        RobotPose {
            x: -pose.translation.y,
            y: pose.translation.x,
            z: pose.translation.z,
            yaw: -yaw,
            pitch,
            roll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::f64::consts::FRAC_PI_2;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn robot_pose_permutes_field_axes() {
        // Quarter turn about the field's z axis.
        let rotation = UnitQuaternion::from_euler_angles(0., 0., FRAC_PI_2);
        let field = FieldPose::new(Vector3::new(1., 2., 3.), rotation);

        let robot = RobotPose::from_field_pose(&field);

        assert_close(robot.x, -2.);
        assert_close(robot.y, 1.);
        assert_close(robot.z, 3.);
        assert_close(robot.yaw, -FRAC_PI_2);
        assert_close(robot.pitch, 0.);
        assert_close(robot.roll, 0.);
    }

    #[test]
    fn axis_permutation_is_reversible() {
        let rotation = UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3);
        let field = FieldPose::new(Vector3::new(4.2, -5.1, 0.6), rotation);

        let round_trip = FieldPose::from_robot_pose(&RobotPose::from_field_pose(&field));

        assert_close(round_trip.translation.x, field.translation.x);
        assert_close(round_trip.translation.y, field.translation.y);
        assert_close(round_trip.translation.z, field.translation.z);

        let (roll, pitch, yaw) = field.rotation.euler_angles();
        let (rt_roll, rt_pitch, rt_yaw) = round_trip.rotation.euler_angles();
        assert_close(rt_roll, roll);
        assert_close(rt_pitch, pitch);
        assert_close(rt_yaw, yaw);
    }
}
