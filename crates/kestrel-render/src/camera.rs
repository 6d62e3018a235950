//! 2D camera and the `WindowBlock` shader uniform.
//!
//! # Example
//!
//! ```ignore
//! use kestrel_render::{Camera2D, WindowBlock};
//! use glam::Vec2;
//!
//! // World (0, 0) sits at the bottom-left corner of an 800x600 viewport.
//! let mut camera = Camera2D::new(800.0, 600.0);
//! camera.set_zoom(2.0);
//!
//! let uniform = WindowBlock::from_camera(&mut camera);
//! let world = camera.screen_to_world(Vec2::new(400.0, 300.0));
//! ```

use glam::{Mat4, Vec2, Vec3, Vec4};

/// World-space z values inside this range stay within the clip volume.
const Z_RANGE: f32 = 1000.0;

/// An orthographic 2D camera.
///
/// World coordinates are in pixels with y growing upward. The default
/// position places the world origin at the bottom-left corner of the
/// viewport. Sprites keep a z coordinate for explicit layering, but the
/// camera projects everything in `-1000.0..=1000.0` without depth
/// testing.
pub struct Camera2D {
    /// World position at the center of the viewport
    position: Vec2,
    /// Magnification factor, must be positive
    zoom: f32,
    /// Camera roll in degrees, counter-clockwise
    rotation: f32,
    /// Viewport size in pixels
    viewport_size: Vec2,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    dirty: bool,
}

impl Camera2D {
    /// Create a camera for a viewport, centered so that world `(0, 0)`
    /// is the bottom-left corner of the screen.
    pub fn new(width: f32, height: f32) -> Self {
        let viewport = Vec2::new(width, height);
        let mut camera = Self {
            position: viewport / 2.0,
            zoom: 1.0,
            rotation: 0.0,
            viewport_size: viewport,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            dirty: true,
        };
        camera.refresh();
        camera
    }

    /// Set the world position at the center of the viewport.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.dirty = true;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Set the magnification factor. Values above 1.0 zoom in.
    pub fn set_zoom(&mut self, zoom: f32) {
        debug_assert!(zoom > 0.0);
        self.zoom = zoom;
        self.dirty = true;
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the camera roll in degrees, counter-clockwise.
    pub fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees;
        self.dirty = true;
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Update the viewport size, usually after a window resize.
    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport_size = size;
        self.dirty = true;
    }

    pub fn viewport_size(&self) -> Vec2 {
        self.viewport_size
    }

    /// The view matrix, recomputed first if the camera moved.
    pub fn view_matrix(&mut self) -> Mat4 {
        self.refresh();
        self.view_matrix
    }

    /// The projection matrix, recomputed first if the viewport changed.
    pub fn projection_matrix(&mut self) -> Mat4 {
        self.refresh();
        self.projection_matrix
    }

    /// The combined view-projection matrix.
    pub fn view_projection_matrix(&mut self) -> Mat4 {
        self.refresh();
        self.projection_matrix * self.view_matrix
    }

    /// Convert screen coordinates (pixels, y down) to world coordinates.
    pub fn screen_to_world(&mut self, screen_pos: Vec2) -> Vec2 {
        let ndc_x = (screen_pos.x / self.viewport_size.x) * 2.0 - 1.0;
        let ndc_y = 1.0 - (screen_pos.y / self.viewport_size.y) * 2.0; // Flip Y
        let ndc = Vec4::new(ndc_x, ndc_y, 0.0, 1.0);

        let world = self.view_projection_matrix().inverse() * ndc;
        Vec2::new(world.x / world.w, world.y / world.w)
    }

    /// Convert world coordinates to screen coordinates (pixels, y down).
    pub fn world_to_screen(&mut self, world_pos: Vec2) -> Vec2 {
        let clip = self.view_projection_matrix() * Vec4::new(world_pos.x, world_pos.y, 0.0, 1.0);
        let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);

        Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport_size.x,
            (1.0 - ndc.y) * 0.5 * self.viewport_size.y, // Flip Y
        )
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        let half = self.viewport_size / 2.0;
        self.projection_matrix =
            Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, -Z_RANGE, Z_RANGE);

        // World to view: recenter on the camera, undo its roll, then zoom.
        self.view_matrix = Mat4::from_scale(Vec3::new(self.zoom, self.zoom, 1.0))
            * Mat4::from_rotation_z(-self.rotation.to_radians())
            * Mat4::from_translation(Vec3::new(-self.position.x, -self.position.y, 0.0));
        self.dirty = false;
    }
}

/// Camera uniform for the sprite and light shaders.
///
/// Matches the WGSL declaration used across this crate:
///
/// ```wgsl
/// struct WindowBlock {
///     projection: mat4x4<f32>,
///     view: mat4x4<f32>,
/// }
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WindowBlock {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

static_assertions::assert_eq_size!(WindowBlock, [u8; 128]);

impl WindowBlock {
    /// Capture the camera matrices for upload.
    pub fn from_camera(camera: &mut Camera2D) -> Self {
        camera.refresh();
        Self {
            projection: camera.projection_matrix.to_cols_array_2d(),
            view: camera.view_matrix.to_cols_array_2d(),
        }
    }
}

impl Default for WindowBlock {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }
}
