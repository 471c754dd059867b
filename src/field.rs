use std::{collections::HashMap, fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::pose::FieldPose;

// WPILib field layout JSON format.

#[derive(Deserialize)]
struct LayoutFile {
    tags: Vec<LayoutTag>,
    field: FieldDimensions,
}

#[derive(Deserialize)]
struct LayoutTag {
    #[serde(rename = "ID")]
    id: i32,
    pose: LayoutPose,
}

#[derive(Deserialize)]
struct LayoutPose {
    translation: LayoutTranslation,
    rotation: LayoutRotation,
}

#[derive(Deserialize)]
struct LayoutTranslation {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Deserialize)]
struct LayoutRotation {
    quaternion: LayoutQuaternion,
}

#[derive(Deserialize)]
struct LayoutQuaternion {
    #[serde(rename = "W")]
    w: f64,
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
    #[serde(rename = "Z")]
    z: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FieldDimensions {
    pub length: f64,
    pub width: f64,
}

/// Immutable tag ID -> field pose table, loaded once at startup.
pub struct FieldLayout {
    tag_poses: HashMap<i32, FieldPose>,
    dimensions: FieldDimensions,
}

impl FieldLayout {
    pub fn load(path: &Path) -> Result<FieldLayout> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open field layout {}", path.display()))?;

        FieldLayout::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<FieldLayout> {
        let layout: LayoutFile =
            serde_json::from_reader(reader).context("Failed to parse field layout JSON")?;

        let tag_poses = layout
            .tags
            .into_iter()
            .map(|tag| {
                let t = tag.pose.translation;
                let q = tag.pose.rotation.quaternion;

                (
                    tag.id,
                    FieldPose::from_quaternion_parts(t.x, t.y, t.z, q.w, q.x, q.y, q.z),
                )
            })
            .collect();

        Ok(FieldLayout {
            tag_poses,
            dimensions: layout.field,
        })
    }

    pub fn tag_pose(&self, id: i32) -> Option<&FieldPose> {
        self.tag_poses.get(&id)
    }

    pub fn tag_ids(&self) -> Vec<i32> {
        let mut ids = self.tag_poses.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub fn tag_count(&self) -> usize {
        self.tag_poses.len()
    }

    pub fn dimensions(&self) -> FieldDimensions {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT_JSON: &str = r#"{
        "tags": [
            {
                "ID": 1,
                "pose": {
                    "translation": {"x": 15.079, "y": 0.246, "z": 1.356},
                    "rotation": {"quaternion": {"W": 0.5, "X": 0.0, "Y": 0.0, "Z": 0.866}}
                }
            },
            {
                "ID": 2,
                "pose": {
                    "translation": {"x": 16.185, "y": 0.884, "z": 1.356},
                    "rotation": {"quaternion": {"W": 1.0, "X": 0.0, "Y": 0.0, "Z": 0.0}}
                }
            }
        ],
        "field": {"length": 16.541, "width": 8.211}
    }"#;

    #[test]
    fn parses_wpilib_layout_format() {
        let layout = FieldLayout::from_reader(LAYOUT_JSON.as_bytes()).unwrap();

        assert_eq!(layout.tag_count(), 2);
        assert_eq!(layout.tag_ids(), vec![1, 2]);

        let pose = layout.tag_pose(1).unwrap();
        assert!((pose.translation.x - 15.079).abs() < 1e-9);
        assert!((pose.translation.y - 0.246).abs() < 1e-9);
        assert!((pose.translation.z - 1.356).abs() < 1e-9);

        let dims = layout.dimensions();
        assert!((dims.length - 16.541).abs() < 1e-9);
        assert!((dims.width - 8.211).abs() < 1e-9);
    }

    #[test]
    fn absent_tag_is_none() {
        let layout = FieldLayout::from_reader(LAYOUT_JSON.as_bytes()).unwrap();

        assert!(layout.tag_pose(99).is_none());
    }

    #[test]
    fn malformed_layout_is_an_error() {
        assert!(FieldLayout::from_reader("{}".as_bytes()).is_err());
    }
}
