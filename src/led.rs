use crate::photon::PipelineType;
use crate::pose::RobotPose;

/// Driver-feedback LED strip. Signaled whenever the coprocessor reports a
/// detection, with the pipeline that produced it and the detection pose.
pub trait LedIndicator {
    fn signal_detection(&mut self, pipeline: PipelineType, pose: &RobotPose);
}
