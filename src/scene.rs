//! Per-frame scene motion: the two rotating solids and the drag-driven camera

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Radians added to each solid rotation axis per frame.
pub const SPIN_STEP: f32 = 0.001;

/// World units the camera moves per pixel of drag.
pub const DRAG_SCALE: f32 = 0.01;

/// Rotation state of the octahedron (all three axes) and the ring (y only).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolidMotion {
    pub octahedron: Vec3,
    pub ring_y: f32,
}

impl SolidMotion {
    pub fn advance(&mut self) {
        self.octahedron += Vec3::splat(SPIN_STEP);
        self.ring_y += SPIN_STEP;
    }

    pub fn octahedron_model(&self) -> Mat4 {
        let r = self.octahedron;
        Mat4::from_quat(Quat::from_euler(EulerRot::XYZ, r.x, r.y, r.z))
    }

    pub fn ring_model(&self) -> Mat4 {
        Mat4::from_rotation_y(self.ring_y)
    }
}

/// Pointer movement since the previous drag event, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragDelta {
    pub dx: f32,
    pub dy: f32,
}

/// Perspective camera that always looks at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRig {
    pub position: Vec3,
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.8),
            fov_y_deg: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraRig {
    /// Screen-space drag: right moves the camera right, down moves it down.
    pub fn apply_drag(&mut self, delta: DragDelta) {
        self.position.x += delta.dx * DRAG_SCALE;
        self.position.y -= delta.dy * DRAG_SCALE;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_deg.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}
