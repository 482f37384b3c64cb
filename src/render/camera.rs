use crate::scene::command::CameraUpdate;
use crate::scene::serialization::CameraSnapshot;
use glam::Vec3;

const MIN_RADIUS: f32 = 0.05;
const BETA_EPSILON: f32 = 1e-3;

/// Orbit camera: `alpha` is the azimuth around +Y, `beta` the polar angle
/// from +Y, `radius` the distance to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcRotateCamera {
    pub alpha: f32,
    pub beta: f32,
    pub radius: f32,
    pub target: Vec3,
}

impl Default for ArcRotateCamera {
    fn default() -> Self {
        Self::new(-std::f32::consts::FRAC_PI_2, 1.0, 10.0, Vec3::ZERO)
    }
}

impl ArcRotateCamera {
    pub fn new(alpha: f32, beta: f32, radius: f32, target: Vec3) -> Self {
        let mut camera = Self {
            alpha,
            beta,
            radius,
            target,
        };
        camera.clamp();
        camera
    }

    /// Frame an axis-aligned box while keeping the current angles.
    pub fn frame_bounds(&mut self, center: Vec3, extent: Vec3) {
        let radius = extent.max_element();
        self.radius = if radius > 0.0 { radius * 3.0 } else { 3.0 };
        self.target = center;
    }

    pub fn apply(&mut self, update: &CameraUpdate) {
        if let Some(alpha) = update.alpha {
            self.alpha = alpha;
        }
        if let Some(beta) = update.beta {
            self.beta = beta;
        }
        if let Some(radius) = update.radius {
            self.radius = radius;
        }
        if let Some(target) = update.target {
            self.target = target;
        }
        self.clamp();
    }

    pub fn orbit(&mut self, alpha_delta: f32, beta_delta: f32) {
        self.alpha += alpha_delta;
        self.beta += beta_delta;
        self.clamp();
    }

    pub fn zoom(&mut self, delta: f32) {
        self.radius += delta;
        self.clamp();
    }

    pub fn position(&self) -> Vec3 {
        let sin_beta = self.beta.sin();
        self.target
            + Vec3::new(
                self.radius * self.alpha.cos() * sin_beta,
                self.radius * self.beta.cos(),
                self.radius * self.alpha.sin() * sin_beta,
            )
    }

    /// (forward, right, up), all unit length.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.position()).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        (forward, right, up)
    }

    pub fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot {
            kind: "arcRotate".to_string(),
            alpha: self.alpha,
            beta: self.beta,
            radius: self.radius,
        }
    }

    fn clamp(&mut self) {
        if self.alpha.is_finite() {
            const TWO_PI: f32 = std::f32::consts::PI * 2.0;
            self.alpha = (self.alpha + std::f32::consts::PI).rem_euclid(TWO_PI)
                - std::f32::consts::PI;
        } else {
            self.alpha = 0.0;
        }
        if !self.beta.is_finite() {
            self.beta = std::f32::consts::FRAC_PI_2;
        }
        self.beta = self
            .beta
            .clamp(BETA_EPSILON, std::f32::consts::PI - BETA_EPSILON);
        if !self.radius.is_finite() {
            self.radius = 10.0;
        }
        self.radius = self.radius.max(MIN_RADIUS);
    }
}

#[cfg(test)]
mod tests {
    use super::ArcRotateCamera;
    use crate::scene::command::CameraUpdate;
    use glam::Vec3;

    #[test]
    fn frame_bounds_preserves_orientation() {
        let mut camera = ArcRotateCamera::new(1.1, 0.7, 4.0, Vec3::ZERO);
        camera.frame_bounds(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(2.0));
        assert!((camera.alpha - 1.1).abs() < 1e-6);
        assert!((camera.beta - 0.7).abs() < 1e-6);
        assert_eq!(camera.radius, 6.0);
        assert_eq!(camera.target, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let mut camera = ArcRotateCamera::default();
        let before = camera;
        camera.apply(&CameraUpdate {
            radius: Some(25.0),
            ..CameraUpdate::default()
        });
        assert_eq!(camera.radius, 25.0);
        assert_eq!(camera.alpha, before.alpha);
        assert_eq!(camera.beta, before.beta);
    }

    #[test]
    fn orbit_keeps_finite_state() {
        let mut camera = ArcRotateCamera::default();
        camera.orbit(100.0, -50.0);
        camera.zoom(-1000.0);
        assert!(camera.alpha.is_finite());
        assert!(camera.beta > 0.0 && camera.beta < std::f32::consts::PI);
        assert!(camera.radius > 0.0);
        assert!(camera.position().is_finite());
    }

    #[test]
    fn position_sits_at_radius_from_target() {
        let camera = ArcRotateCamera::new(0.3, 1.2, 8.0, Vec3::new(1.0, 0.0, -1.0));
        let distance = camera.position().distance(camera.target);
        assert!((distance - 8.0).abs() < 1e-4);
        let (forward, right, up) = camera.basis();
        assert!(forward.dot(right).abs() < 1e-5);
        assert!(forward.dot(up).abs() < 1e-5);
    }

    #[test]
    fn snapshot_is_arc_rotate() {
        let snapshot = ArcRotateCamera::default().snapshot();
        assert_eq!(snapshot.kind, "arcRotate");
        assert_eq!(snapshot.radius, 10.0);
    }
}
