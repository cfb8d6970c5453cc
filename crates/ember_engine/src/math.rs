//! Math type aliases and small helpers used throughout the renderer
//!
//! Thin layer over `nalgebra`; the renderer only needs matrix composition for
//! per-instance MVP upload and a couple of camera helpers for applications.

pub use nalgebra::{Matrix4, Unit, Vector2, Vector3, Vector4};

/// 2D vector of f32
pub type Vec2 = Vector2<f32>;

/// 3D vector of f32
pub type Vec3 = Vector3<f32>;

/// 4D vector of f32
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix of f32
pub type Mat4 = Matrix4<f32>;

/// Extension trait for `Mat4` with renderer-oriented constructors
pub trait Mat4Ext {
    /// Right-handed perspective projection with a Vulkan-style [0, 1] depth range
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed view matrix looking from `eye` toward `target`
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let mut proj = Mat4::new_perspective(aspect, fov_y, near, far);
        // nalgebra builds GL-style clip space; Vulkan's Y axis points down and
        // depth runs [0, 1].
        proj[(1, 1)] *= -1.0;
        proj
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&eye.into(), &target.into(), &up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_flips_y() {
        let gl = Mat4::new_perspective(4.0 / 3.0, 1.0, 0.1, 100.0);
        let vk = Mat4::perspective(1.0, 4.0 / 3.0, 0.1, 100.0);
        assert_relative_eq!(vk[(1, 1)], -gl[(1, 1)], epsilon = 1e-6);
        assert_relative_eq!(vk[(0, 0)], gl[(0, 0)], epsilon = 1e-6);
    }

    #[test]
    fn test_look_at_maps_eye_to_origin() {
        let eye = Vec3::new(2.0, 3.0, 4.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());
        let mapped = view.transform_point(&eye.into());
        assert_relative_eq!(mapped.coords.norm(), 0.0, epsilon = 1e-5);
    }
}
