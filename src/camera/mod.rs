//! Free-flying viewer camera
//!
//! The camera looks along `(cos p sin y, sin p, -cos p cos y)`. This view
//! convention negates z relative to the pointer direction; it is only used
//! for rendering and for view-direction detection, never for ray casting.

use nalgebra::{Point3, Vector3};

use crate::config::CameraConfig;
use crate::constants::PITCH_LIMIT_DEG;
use crate::time::wrap_degrees;

/// Field of view limits for zoom, in degrees
pub const FOV_MIN: f64 = 10.0;
pub const FOV_MAX: f64 = 120.0;

/// Factor applied to speed and sensitivity while the slow modifier is held
const SLOW_FACTOR: f64 = 0.3;

/// Objects further than this are never considered in view
const DEFAULT_VIEW_DISTANCE: f64 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f64>,
    yaw: f64,
    pitch: f64,
    fov: f64,
    speed_base: f64,
    sensitivity_base: f64,
    speed: f64,
    sensitivity: f64,
    deadzone: f64,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Self {
        let [x, y, z] = config.position;
        Self {
            position: Point3::new(x, y, z),
            yaw: wrap_degrees(config.yaw),
            pitch: config.pitch.clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG),
            fov: config.fov.clamp(FOV_MIN, FOV_MAX),
            speed_base: config.speed,
            sensitivity_base: config.sensitivity,
            speed: config.speed,
            sensitivity: config.sensitivity,
            deadzone: config.deadzone,
        }
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn fov(&self) -> f64 {
        self.fov
    }

    /// Current movement step, reduced while the slow modifier is held
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Unit view direction
    pub fn direction(&self) -> Vector3<f64> {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        Vector3::new(
            pitch.cos() * yaw.sin(),
            pitch.sin(),
            -pitch.cos() * yaw.cos(),
        )
    }

    /// Point one unit ahead, the look-at target for the renderer
    pub fn look_at(&self) -> Point3<f64> {
        self.position + self.direction()
    }

    /// Apply a mouse delta in screen units
    ///
    /// Components inside the deadzone are dropped individually. Moving the
    /// mouse right turns the view right, moving it up raises the view.
    pub fn rotate(&mut self, dx: f64, dy: f64) {
        let dx = if dx.abs() < self.deadzone { 0.0 } else { dx };
        let dy = if dy.abs() < self.deadzone { 0.0 } else { dy };
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        self.yaw = wrap_degrees(self.yaw + dx * self.sensitivity);
        self.pitch = (self.pitch + dy * self.sensitivity).clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    }

    /// Move along the horizontal projection of the view direction
    pub fn move_forward(&mut self, amount: f64) {
        let yaw = self.yaw.to_radians();
        self.position.x += yaw.sin() * amount;
        self.position.z -= yaw.cos() * amount;
    }

    pub fn move_backward(&mut self, amount: f64) {
        self.move_forward(-amount);
    }

    /// Strafe to the right of the view direction
    pub fn move_right(&mut self, amount: f64) {
        let yaw = self.yaw.to_radians();
        self.position.x += yaw.cos() * amount;
        self.position.z += yaw.sin() * amount;
    }

    pub fn move_left(&mut self, amount: f64) {
        self.move_right(-amount);
    }

    pub fn move_up(&mut self, amount: f64) {
        self.position.y += amount;
    }

    pub fn move_down(&mut self, amount: f64) {
        self.position.y -= amount;
    }

    /// Change the field of view, clamped to [`FOV_MIN`, `FOV_MAX`]
    pub fn adjust_zoom(&mut self, delta: f64) {
        self.fov = (self.fov + delta).clamp(FOV_MIN, FOV_MAX);
    }

    /// Scale speed and sensitivity down while `slow` is set
    pub fn set_slow(&mut self, slow: bool) {
        let factor = if slow { SLOW_FACTOR } else { 1.0 };
        self.speed = self.speed_base * factor;
        self.sensitivity = self.sensitivity_base * factor;
    }

    /// Whether `point` lies inside the view cone of the current field of view
    pub fn is_in_view(&self, point: &Point3<f64>) -> bool {
        self.is_in_view_within(point, self.fov, DEFAULT_VIEW_DISTANCE)
    }

    /// View cone test with an explicit field of view and maximum distance
    pub fn is_in_view_within(&self, point: &Point3<f64>, fov_degrees: f64, max_distance: f64) -> bool {
        let offset = point - self.position;
        let distance = offset.norm();
        if distance > max_distance {
            return false;
        }
        if distance == 0.0 {
            return true;
        }
        let cos_half_fov = (fov_degrees / 2.0).to_radians().cos();
        self.direction().dot(&offset) / distance >= cos_half_fov
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}
