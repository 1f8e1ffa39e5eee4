//! Built-in layouts
//!
//! Offsets are only valid for the target build they were taken from; ship a
//! layout file when they move.

use super::Layout;
use crate::error::Result;
use crate::value::ScalarKind;

/// Memory layout constants for the camera structure
pub mod camera {
    pub const ZOOM: u64 = 0x114;
    pub const MIN_ZOOM: u64 = 0x118;
    pub const MAX_ZOOM: u64 = 0x11C;
    pub const FIELD_OF_VIEW: u64 = 0x12C;
    /// Vector2 of yaw/pitch in radians
    pub const ANGLE: u64 = 0x130;
    pub const Y_MAX: u64 = 0x148;
    pub const Y_MIN: u64 = 0x14C;
    pub const PAN: u64 = 0x150;
    pub const ROTATION: u64 = 0x160;
}

/// Names accepted by [`lookup`]
pub const NAMES: &[&str] = &["camera"];

/// Camera layout
pub fn camera() -> Result<Layout> {
    Layout::builder("camera")
        .scalar("Zoom", camera::ZOOM, ScalarKind::F32)
        .scalar("MinZoom", camera::MIN_ZOOM, ScalarKind::F32)
        .scalar("MaxZoom", camera::MAX_ZOOM, ScalarKind::F32)
        .scalar("FieldOfView", camera::FIELD_OF_VIEW, ScalarKind::F32)
        .scalar("Angle", camera::ANGLE, ScalarKind::Vector2)
        .scalar("YMin", camera::Y_MIN, ScalarKind::F32)
        .scalar("YMax", camera::Y_MAX, ScalarKind::F32)
        .scalar("Pan", camera::PAN, ScalarKind::Vector2)
        .scalar("Rotation", camera::ROTATION, ScalarKind::F32)
        .build()
}

/// Look up a built-in layout by name
pub fn lookup(name: &str) -> Option<Result<Layout>> {
    match name {
        "camera" => Some(camera()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_layout_is_valid() {
        let layout = camera().unwrap();
        assert_eq!(layout.len(), 9);
        assert_eq!(layout.field("Zoom").unwrap().offset, 0x114);
        assert_eq!(layout.field("Angle").unwrap().size(), 8);
        assert_eq!(layout.span(), Some(0x114..0x164));
    }

    #[test]
    fn test_camera_declaration_order() {
        let layout = camera().unwrap();
        let names: Vec<&str> = layout.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names[0], "Zoom");
        assert_eq!(names[5], "YMin");
        assert_eq!(names[6], "YMax");
    }

    #[test]
    fn test_lookup() {
        for name in NAMES {
            assert!(lookup(name).unwrap().is_ok());
        }
        assert!(lookup("actor").is_none());
    }
}
