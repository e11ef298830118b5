//! Damped orbit / zoom / pan controls.
//!
//! Input only moves the *goal* orientation. `advance` moves the current
//! orientation a `damping_factor` fraction of the way to the goal and writes
//! the result into the camera, so it has to run once per rendered frame.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use super::PerspectiveCamera;
use crate::state::settings::ControlSettings;

/// Zoom factor per wheel notch at `zoom_speed == 1`
const ZOOM_BASE: f32 = 0.95;
/// Keeps `look_at` away from the poles
const POLE_EPSILON: f32 = 1e-6;
/// Remaining distance below which damping snaps to the goal
const SNAP_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { button: PointerButton, position: Vec2 },
    PointerMove { position: Vec2 },
    PointerUp,
    /// Wheel notches; positive zooms in
    Wheel { delta: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Pan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlState {
    Idle,
    Dragging { mode: DragMode, last: Vec2 },
}

/// Spherical coordinates around the pivot; polar angle measured from +Y
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub polar: f32,
    pub azimuth: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius,
                polar: 0.0,
                azimuth: 0.0,
            };
        }
        Self {
            radius,
            polar: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            azimuth: offset.x.atan2(offset.z),
        }
    }

    pub fn to_offset(&self) -> Vec3 {
        let polar = self.polar.clamp(POLE_EPSILON, PI - POLE_EPSILON);
        let s = polar.sin() * self.radius;
        Vec3::new(
            s * self.azimuth.sin(),
            polar.cos() * self.radius,
            s * self.azimuth.cos(),
        )
    }
}

pub struct OrbitController {
    settings: ControlSettings,
    state: ControlState,
    current: Spherical,
    goal: Spherical,
    pivot: Vec3,
    goal_pivot: Vec3,
    home: (Spherical, Vec3),
    fov: f32,
    viewport_height: f32,
}

impl OrbitController {
    /// Controller starting from the camera's current pose
    pub fn new(
        settings: ControlSettings,
        camera: &PerspectiveCamera,
        viewport_height: f32,
    ) -> Self {
        let settings = settings.sanitized();
        let mut start = Spherical::from_offset(camera.position - camera.target);
        start.radius = start.radius.clamp(settings.min_distance, settings.max_distance);
        start.polar = start.polar.clamp(0.0, settings.max_polar_angle);

        Self {
            settings,
            state: ControlState::Idle,
            current: start,
            goal: start,
            pivot: camera.target,
            goal_pivot: camera.target,
            home: (start, camera.target),
            fov: camera.fov,
            viewport_height: viewport_height.max(1.0),
        }
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Orientation the camera currently has
    pub fn current(&self) -> Spherical {
        self.current
    }

    /// Orientation the camera is moving toward
    pub fn goal(&self) -> Spherical {
        self.goal
    }

    pub fn pivot(&self) -> Vec3 {
        self.pivot
    }

    /// Camera position once damping has settled
    pub fn goal_position(&self) -> Vec3 {
        self.goal_pivot + self.goal.to_offset()
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.goal && self.pivot == self.goal_pivot
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(1.0);
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match (self.state, event) {
            (_, InputEvent::Wheel { delta }) => self.zoom(delta),
            (ControlState::Idle, InputEvent::PointerDown { button, position }) => {
                let mode = match button {
                    PointerButton::Primary => DragMode::Rotate,
                    PointerButton::Secondary | PointerButton::Middle
                        if self.settings.enable_pan =>
                    {
                        DragMode::Pan
                    }
                    _ => return,
                };
                self.state = ControlState::Dragging {
                    mode,
                    last: position,
                };
            }
            (ControlState::Dragging { mode, last }, InputEvent::PointerMove { position }) => {
                let delta = position - last;
                match mode {
                    DragMode::Rotate => self.rotate(delta),
                    DragMode::Pan => self.pan(delta),
                }
                self.state = ControlState::Dragging {
                    mode,
                    last: position,
                };
            }
            (ControlState::Dragging { .. }, InputEvent::PointerUp) => {
                self.state = ControlState::Idle;
            }
            _ => {}
        }
    }

    /// Return to the starting pose (damped)
    pub fn reset(&mut self) {
        self.state = ControlState::Idle;
        self.goal = self.home.0;
        self.goal_pivot = self.home.1;
    }

    /// Step toward the goal and write the pose into `camera`
    pub fn advance(&mut self, camera: &mut PerspectiveCamera) {
        let d = self.settings.damping_factor;

        self.current.radius = approach(self.current.radius, self.goal.radius, d);
        self.current.polar = approach(self.current.polar, self.goal.polar, d);
        self.current.azimuth = approach(self.current.azimuth, self.goal.azimuth, d);
        self.pivot = if self.pivot.distance(self.goal_pivot) < SNAP_EPSILON {
            self.goal_pivot
        } else {
            self.pivot.lerp(self.goal_pivot, d)
        };

        camera.target = self.pivot;
        camera.position = self.pivot + self.current.to_offset();
    }

    fn rotate(&mut self, delta: Vec2) {
        let speed = TAU / self.viewport_height * self.settings.rotate_speed;
        self.goal.azimuth -= delta.x * speed;
        self.goal.polar =
            (self.goal.polar - delta.y * speed).clamp(0.0, self.settings.max_polar_angle);
    }

    fn zoom(&mut self, delta: f32) {
        let factor = ZOOM_BASE.powf(delta * self.settings.zoom_speed);
        self.goal.radius = (self.goal.radius * factor)
            .clamp(self.settings.min_distance, self.settings.max_distance);
    }

    fn pan(&mut self, delta: Vec2) {
        let offset = self.goal.to_offset();
        let forward = (-offset).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();

        // World units per pixel at the pivot's depth
        let scale = 2.0 * self.goal.radius * (self.fov * 0.5).tan() / self.viewport_height
            * self.settings.pan_speed;
        self.goal_pivot += (-right * delta.x + up * delta.y) * scale;
    }
}

fn approach(current: f32, goal: f32, damping: f32) -> f32 {
    let remaining = goal - current;
    if remaining.abs() < SNAP_EPSILON {
        goal
    } else {
        current + remaining * damping
    }
}
