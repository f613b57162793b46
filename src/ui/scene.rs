//! Scene graph for the decorative background
//!
//! A [`Scene`] owns the camera, the light rig and the animated bodies. It
//! knows how to advance itself to a point in time; drawing is left to
//! [`crate::ui::renderer::SceneRenderer`].

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::domain::core::Viewport;
use crate::domain::geometry::Mesh;
use crate::domain::motion::{BodySpec, LightSpec, MaterialSpec};
use crate::ui::resources::{Geometry, Material, ResourceLedger};

/// Perspective camera looking at the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl PerspectiveCamera {
    pub const FOV_Y_DEGREES: f32 = 75.0;
    pub const NEAR: f32 = 0.1;
    pub const FAR: f32 = 1000.0;
    pub const DISTANCE: f32 = 15.0;
    /// World-space z of the near clipping plane
    pub const NEAR_PLANE_Z: f32 = Self::DISTANCE - Self::NEAR;

    pub fn new(viewport: Viewport) -> Self {
        Self {
            fov_y_degrees: Self::FOV_Y_DEGREES,
            aspect: viewport.aspect(),
            near: Self::NEAR,
            far: Self::FAR,
            position: Vec3::new(0.0, 0.0, Self::DISTANCE),
        }
    }

    pub fn set_aspect(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }
}

/// Live state of one light in the rig
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub spec: LightSpec,
    pub intensity: f32,
    pub position: Vec3,
}

impl Light {
    fn new(spec: LightSpec) -> Self {
        Self {
            spec,
            intensity: spec.base_intensity,
            position: spec.base_position,
        }
    }

    fn advance(&mut self, seconds: f32) {
        self.intensity = self.spec.intensity_at(seconds);
        self.position = self.spec.position_at(seconds);
    }
}

#[derive(Debug)]
struct BodyResources {
    geometry: Geometry,
    material: Material,
}

/// One animated decorative body
#[derive(Debug)]
pub struct Body {
    pub spec: BodySpec,
    pub position: Vec3,
    /// Euler angles in radians, applied in XYZ order
    pub rotation: Vec3,
    resources: Option<BodyResources>,
}

impl Body {
    fn new(spec: BodySpec, ledger: &ResourceLedger) -> Self {
        let resources = BodyResources {
            geometry: Geometry::allocate(ledger, spec.shape.build_mesh()),
            material: Material::allocate(ledger, spec.material),
        };
        Self {
            spec,
            position: spec.base_position,
            rotation: Vec3::ZERO,
            resources: Some(resources),
        }
    }

    /// One animation tick: rotate by the fixed step, then place the body
    /// on its oscillation path for `seconds` since mount
    fn advance(&mut self, seconds: f32) {
        self.rotation += self.spec.rotation_step;
        self.position = self.spec.position_at(seconds);
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.resources.as_ref().map(|r| r.geometry.mesh())
    }

    pub fn material(&self) -> Option<&MaterialSpec> {
        self.resources.as_ref().map(|r| r.material.spec())
    }

    #[cfg(test)]
    pub fn is_disposed(&self) -> bool {
        self.resources.is_none()
    }

    pub fn model_matrix(&self) -> Mat4 {
        let orientation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_rotation_translation(orientation, self.position)
    }

    /// Releases geometry and material, returning how many were released
    fn dispose(&mut self, ledger: &ResourceLedger) -> usize {
        let Some(resources) = self.resources.take() else {
            return 0;
        };

        let mut released = 0;
        match resources.geometry.dispose(ledger) {
            Ok(()) => released += 1,
            Err(e) => log::warn!("Geometry of {}: {}", self.spec.name, e),
        }
        match resources.material.dispose(ledger) {
            Ok(()) => released += 1,
            Err(e) => log::warn!("Material of {}: {}", self.spec.name, e),
        }
        released
    }
}

/// Camera, lights and bodies of one background instance
#[derive(Debug)]
pub struct Scene {
    camera: PerspectiveCamera,
    lights: Vec<Light>,
    bodies: Vec<Body>,
    ledger: ResourceLedger,
}

impl Scene {
    /// Builds the scene, allocating one geometry and one material per body
    pub fn build(
        viewport: Viewport,
        bodies: &[BodySpec],
        lights: &[LightSpec],
        ledger: &ResourceLedger,
    ) -> Self {
        let bodies: Vec<Body> = bodies.iter().map(|spec| Body::new(*spec, ledger)).collect();
        log::debug!(
            "Built scene with {} bodies ({} triangles) and {} lights",
            bodies.len(),
            bodies
                .iter()
                .filter_map(Body::mesh)
                .map(Mesh::triangle_count)
                .sum::<usize>(),
            lights.len()
        );

        Self {
            camera: PerspectiveCamera::new(viewport),
            lights: lights.iter().copied().map(Light::new).collect(),
            bodies,
            ledger: ledger.clone(),
        }
    }

    /// Advances bodies and lights by one tick at `seconds` since mount
    pub fn advance(&mut self, seconds: f32) {
        for body in &mut self.bodies {
            body.advance(seconds);
        }
        for light in &mut self.lights {
            light.advance(seconds);
        }
    }

    /// Follows a viewport change; animation state is untouched
    pub fn resize(&mut self, viewport: Viewport) {
        self.camera.set_aspect(viewport);
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Releases every body's resources; calling it again releases nothing
    pub fn dispose(&mut self) -> usize {
        let ledger = &self.ledger;
        self.bodies.iter_mut().map(|body| body.dispose(ledger)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::motion::{default_bodies, default_lights};
    use crate::ui::resources::ResourceKind;

    fn build() -> (Scene, ResourceLedger) {
        let ledger = ResourceLedger::new();
        let scene = Scene::build(
            Viewport::new(1280, 720),
            &default_bodies(),
            &default_lights(),
            &ledger,
        );
        (scene, ledger)
    }

    #[test]
    fn build_allocates_one_geometry_and_material_per_body() {
        let (scene, ledger) = build();
        assert_eq!(scene.bodies().len(), 8);
        assert_eq!(ledger.live_of(ResourceKind::Geometry), 8);
        assert_eq!(ledger.live_of(ResourceKind::Material), 8);
        assert!(scene.bodies().iter().all(|b| b.mesh().is_some()));
    }

    #[test]
    fn camera_matches_viewport() {
        let (scene, _) = build();
        let camera = scene.camera();
        assert_eq!(camera.fov_y_degrees, 75.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 15.0));
        assert!((camera.aspect - 1280.0 / 720.0).abs() < 1e-6);
    }

    #[test]
    fn advance_accumulates_rotation_per_tick() {
        let (mut scene, _) = build();
        let step = scene.bodies()[0].spec.rotation_step;

        scene.advance(0.0);
        scene.advance(0.5);
        scene.advance(0.5);

        let body = &scene.bodies()[0];
        assert!((body.rotation - step * 3.0).length() < 1e-5);
        assert!((body.position - body.spec.position_at(0.5)).length() < 1e-5);
    }

    #[test]
    fn lights_follow_their_curves() {
        let (mut scene, _) = build();
        scene.advance(2.0);
        for light in scene.lights() {
            assert!((light.intensity - light.spec.intensity_at(2.0)).abs() < 1e-5);
            assert!((light.position - light.spec.position_at(2.0)).length() < 1e-5);
        }
    }

    #[test]
    fn resize_only_changes_aspect() {
        let (mut scene, _) = build();
        scene.advance(1.0);
        let before: Vec<(Vec3, Vec3)> = scene
            .bodies()
            .iter()
            .map(|b| (b.position, b.rotation))
            .collect();

        scene.resize(Viewport::new(600, 800));

        let after: Vec<(Vec3, Vec3)> = scene
            .bodies()
            .iter()
            .map(|b| (b.position, b.rotation))
            .collect();
        assert_eq!(before, after);
        assert!((scene.camera().aspect - 0.75).abs() < 1e-6);
    }

    #[test]
    fn dispose_releases_everything_once() {
        let (mut scene, ledger) = build();
        assert_eq!(scene.dispose(), 16);
        assert_eq!(ledger.live_count(), 0);

        assert_eq!(scene.dispose(), 0);
        assert_eq!(ledger.released_count(), 16);
        assert!(scene.bodies().iter().all(Body::is_disposed));
    }
}
