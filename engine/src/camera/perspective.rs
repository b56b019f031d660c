//! Perspective Camera Module
//!
//! Holds the camera transform and lens parameters and derives the view and
//! projection matrices from them. Matrices are only recomputed on request:
//! `update_view` once per frame (or after the transform changes) and
//! `update_projection` when the frustum changes.
//!
//! ## Conventions
//!
//! - Right-handed, Y up, camera looks down -Z in view space
//! - OpenGL clip space (NDC depth -1..1)
//! - Rotation is stored in degrees: `rotate.x` is pitch, `rotate.y` is yaw
//! - `fov` is the full vertical field of view in degrees

use glam::{Mat4, Vec3};

use crate::error::{ClusterError, Result};

/// World-space placement of the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,
    /// Euler rotation in degrees (x = pitch, y = yaw, z = roll)
    pub rotate: Vec3,
    /// Scale (unused by the camera, kept for parity with object transforms)
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotate: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Lens parameters the cluster grid depends on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionParams {
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Width / height
    pub aspect: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
}

impl ProjectionParams {
    /// Reject lens values that would produce a degenerate frustum.
    pub fn validate(&self) -> Result<()> {
        let finite = self.fov.is_finite()
            && self.aspect.is_finite()
            && self.near.is_finite()
            && self.far.is_finite();
        if !finite {
            return Err(ClusterError::InvalidProjection(format!(
                "non-finite projection parameters: {:?}",
                self
            )));
        }
        if self.near <= 0.0 || self.far <= self.near {
            return Err(ClusterError::InvalidProjection(format!(
                "expected 0 < near < far, got near={} far={}",
                self.near, self.far
            )));
        }
        if self.fov <= 0.0 || self.fov >= 180.0 || self.aspect <= 0.0 {
            return Err(ClusterError::InvalidProjection(format!(
                "expected 0 < fov < 180 and aspect > 0, got fov={} aspect={}",
                self.fov, self.aspect
            )));
        }
        Ok(())
    }

    /// View → clip transform for these lens values.
    #[inline]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect, self.near, self.far)
    }
}

/// Perspective camera with cached view/projection matrices.
#[derive(Clone, Debug)]
pub struct Camera {
    pub transform: Transform,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Width / height
    pub aspect: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Normalized look direction, refreshed by `update_view`
    pub front: Vec3,
    view: Mat4,
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            transform: Transform::default(),
            fov: 60.0,
            aspect: 16.0 / 10.0,
            near: 0.1,
            far: 1000.0,
            front: Vec3::NEG_Z,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        // Yaw of -90° looks down -Z, so the default view is the identity.
        camera.transform.rotate.y = -90.0;
        camera.update_view();
        camera.update_projection();
        camera
    }
}

impl Camera {
    /// Create a camera and compute both matrices.
    pub fn new(position: Vec3, rotate: Vec3, fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            transform: Transform {
                position,
                rotate,
                scale: Vec3::ONE,
            },
            fov,
            aspect,
            near,
            far,
            front: Vec3::NEG_Z,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view();
        camera.update_projection();
        camera
    }

    /// Recompute `front` and the view matrix from the transform.
    pub fn update_view(&mut self) {
        let pitch = self.transform.rotate.x.to_radians();
        let yaw = self.transform.rotate.y.to_radians();

        let direction = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        );
        self.front = direction.normalize_or(Vec3::NEG_Z);

        let position = self.transform.position;
        self.view = Mat4::look_at_rh(position, position + self.front, Vec3::Y);
    }

    /// Recompute the projection matrix from the lens parameters.
    pub fn update_projection(&mut self) {
        self.projection = self.projection_params().projection_matrix();
    }

    /// World → view transform.
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// View → clip transform.
    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Clip → view transform.
    #[inline]
    pub fn inverse_projection(&self) -> Mat4 {
        self.projection.inverse()
    }

    /// The camera eye expressed in view space.
    ///
    /// Mathematically the origin; computed through the view matrix so the
    /// cluster rays start wherever the current view places the eye.
    #[inline]
    pub fn view_space_origin(&self) -> Vec3 {
        self.view.transform_point3(self.transform.position)
    }

    /// Current lens parameters.
    #[inline]
    pub fn projection_params(&self) -> ProjectionParams {
        ProjectionParams {
            fov: self.fov,
            aspect: self.aspect,
            near: self.near,
            far: self.far,
        }
    }

    /// World-space point to view space.
    #[inline]
    pub fn world_to_view(&self, point: Vec3) -> Vec3 {
        self.view.transform_point3(point)
    }
}
