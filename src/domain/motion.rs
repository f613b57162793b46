//! Motion tables for the decorative background
//!
//! Every body and light is described by data rather than code: a base
//! value plus one sinusoidal oscillator per animated axis. The per-frame
//! update is a single loop over these tables.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

use crate::domain::geometry::ShapeKind;

/// Sinusoidal offset `amplitude * sin(frequency * t + phase)`
///
/// The result is continuous in `t` and bounded by `amplitude`, which is
/// what keeps every body inside a known box around its base position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    pub amplitude: f32,
    /// Angular frequency in radians per second
    pub frequency: f32,
    pub phase: f32,
}

impl Oscillator {
    pub const STILL: Oscillator = Oscillator {
        amplitude: 0.0,
        frequency: 0.0,
        phase: 0.0,
    };

    pub const fn sine(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
            phase: 0.0,
        }
    }

    /// Cosine is a sine shifted by a quarter turn
    pub const fn cosine(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
            phase: FRAC_PI_2,
        }
    }

    /// Offset at `seconds` of elapsed time
    pub fn offset(&self, seconds: f32) -> f32 {
        self.amplitude * (self.frequency * seconds + self.phase).sin()
    }
}

/// One oscillator per axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMotion {
    pub x: Oscillator,
    pub y: Oscillator,
    pub z: Oscillator,
}

impl AxisMotion {
    pub fn offset(&self, seconds: f32) -> Vec3 {
        Vec3::new(
            self.x.offset(seconds),
            self.y.offset(seconds),
            self.z.offset(seconds),
        )
    }

    /// Largest offset reachable on each axis
    pub fn amplitude(&self) -> Vec3 {
        Vec3::new(
            self.x.amplitude.abs(),
            self.y.amplitude.abs(),
            self.z.amplitude.abs(),
        )
    }
}

/// Surface finish of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSpec {
    /// Base colour as 0xRRGGBB
    pub color: u32,
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
    /// Draw triangle edges only
    pub wireframe: bool,
    pub line_width: f32,
}

impl MaterialSpec {
    /// Polished, slightly translucent silver
    pub const SILVER: MaterialSpec = MaterialSpec {
        color: 0xc0c0c0,
        metalness: 0.9,
        roughness: 0.1,
        opacity: 0.85,
        wireframe: false,
        line_width: 1.0,
    };

    /// Light silver lattice
    pub const SILVER_WIREFRAME: MaterialSpec = MaterialSpec {
        color: 0xe5e5e5,
        metalness: 0.8,
        roughness: 0.2,
        opacity: 0.7,
        wireframe: true,
        line_width: 3.0,
    };

    /// Base colour as linear 0..1 channels
    pub fn rgb(&self) -> Vec3 {
        rgb_from_hex(self.color)
    }
}

/// Converts 0xRRGGBB to 0..1 channels
pub fn rgb_from_hex(color: u32) -> Vec3 {
    Vec3::new(
        ((color >> 16) & 0xff) as f32 / 255.0,
        ((color >> 8) & 0xff) as f32 / 255.0,
        (color & 0xff) as f32 / 255.0,
    )
}

/// Configuration record for one decorative body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    pub name: &'static str,
    pub shape: ShapeKind,
    pub material: MaterialSpec,
    /// Rest position the motion oscillates around
    pub base_position: Vec3,
    /// Radians added to each Euler angle on every frame
    pub rotation_step: Vec3,
    pub motion: AxisMotion,
}

impl BodySpec {
    /// Position after `seconds` of elapsed time
    pub fn position_at(&self, seconds: f32) -> Vec3 {
        self.base_position + self.motion.offset(seconds)
    }

    /// Largest z any vertex of this body can reach
    pub fn nearest_reach(&self) -> f32 {
        self.base_position.z + self.motion.amplitude().z + self.shape.bounding_radius()
    }
}

/// Kind of light source in the rig
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Shines from `position` towards the origin
    Directional,
    /// Cone of half-angle `angle` from `position` towards the origin
    Spot { angle: f32 },
}

/// Configuration record for one light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpec {
    pub name: &'static str,
    pub kind: LightKind,
    /// Colour as 0xRRGGBB
    pub color: u32,
    pub base_intensity: f32,
    pub intensity_motion: Oscillator,
    pub base_position: Vec3,
    pub position_motion: AxisMotion,
}

impl LightSpec {
    pub fn intensity_at(&self, seconds: f32) -> f32 {
        self.base_intensity + self.intensity_motion.offset(seconds)
    }

    pub fn position_at(&self, seconds: f32) -> Vec3 {
        self.base_position + self.position_motion.offset(seconds)
    }
}

const fn axes(x: Oscillator, y: Oscillator, z: Oscillator) -> AxisMotion {
    AxisMotion { x, y, z }
}

const STILL_AXES: AxisMotion = axes(Oscillator::STILL, Oscillator::STILL, Oscillator::STILL);

/// The eight decorative bodies of the background
///
/// Segment counts are kept low enough for a software rasterizer at 60fps.
pub fn default_bodies() -> Vec<BodySpec> {
    use Oscillator as O;

    vec![
        BodySpec {
            name: "torus-knot",
            shape: ShapeKind::TorusKnot {
                radius: 8.0,
                tube: 3.0,
                tubular_segments: 96,
                radial_segments: 12,
                p: 2,
                q: 3,
            },
            material: MaterialSpec::SILVER,
            base_position: Vec3::new(-15.0, 8.0, -35.0),
            rotation_step: Vec3::new(0.02, 0.025, 0.015),
            motion: axes(O::cosine(6.0, 0.6), O::sine(4.0, 0.8), O::sine(8.0, 0.3)),
        },
        BodySpec {
            name: "icosahedron",
            shape: ShapeKind::Icosahedron {
                radius: 10.0,
                detail: 2,
            },
            material: MaterialSpec::SILVER_WIREFRAME,
            base_position: Vec3::new(20.0, -10.0, -25.0),
            rotation_step: Vec3::new(0.018, 0.022, 0.012),
            motion: axes(O::sine(4.0, 0.4), O::cosine(5.0, 1.2), O::sine(10.0, 0.7)),
        },
        BodySpec {
            name: "dodecahedron",
            shape: ShapeKind::Dodecahedron {
                radius: 12.0,
                detail: 1,
            },
            material: MaterialSpec::SILVER,
            base_position: Vec3::new(-25.0, -15.0, -40.0),
            rotation_step: Vec3::new(0.015, 0.028, 0.008),
            motion: axes(O::sine(8.0, 0.5), O::cosine(6.0, 0.9), O::sine(12.0, 0.2)),
        },
        BodySpec {
            name: "octahedron",
            shape: ShapeKind::Octahedron {
                radius: 9.0,
                detail: 2,
            },
            material: MaterialSpec::SILVER_WIREFRAME,
            base_position: Vec3::new(0.0, 20.0, -50.0),
            rotation_step: Vec3::new(0.012, 0.02, 0.025),
            motion: axes(O::sine(10.0, 0.8), O::cosine(8.0, 0.6), O::sine(15.0, 1.1)),
        },
        BodySpec {
            name: "tetrahedron",
            shape: ShapeKind::Tetrahedron {
                radius: 11.0,
                detail: 2,
            },
            material: MaterialSpec::SILVER,
            base_position: Vec3::new(30.0, 12.0, -30.0),
            rotation_step: Vec3::new(0.025, 0.015, 0.018),
            motion: axes(O::cosine(5.0, 0.4), O::sine(7.0, 1.3), O::sine(9.0, 0.6)),
        },
        BodySpec {
            name: "torus",
            shape: ShapeKind::Torus {
                radius: 15.0,
                tube: 4.0,
                radial_segments: 12,
                tubular_segments: 48,
            },
            material: MaterialSpec::SILVER_WIREFRAME,
            base_position: Vec3::new(-10.0, -25.0, -60.0),
            rotation_step: Vec3::new(0.008, 0.035, 0.012),
            motion: axes(O::sine(12.0, 0.3), O::cosine(6.0, 0.8), O::sine(20.0, 0.5)),
        },
        BodySpec {
            name: "sphere",
            shape: ShapeKind::Sphere {
                radius: 8.0,
                width_segments: 24,
                height_segments: 16,
            },
            material: MaterialSpec::SILVER,
            base_position: Vec3::new(25.0, 0.0, -45.0),
            rotation_step: Vec3::new(0.02, 0.03, 0.0),
            motion: axes(O::cosine(6.0, 0.7), O::sine(8.0, 0.9), O::sine(10.0, 0.4)),
        },
        BodySpec {
            name: "ring",
            shape: ShapeKind::Ring {
                inner_radius: 6.0,
                outer_radius: 14.0,
                theta_segments: 32,
                phi_segments: 2,
            },
            material: MaterialSpec::SILVER_WIREFRAME,
            base_position: Vec3::new(-30.0, 5.0, -35.0),
            rotation_step: Vec3::new(0.028, 0.0, 0.022),
            motion: axes(O::sine(8.0, 0.6), O::cosine(10.0, 1.1), O::sine(15.0, 0.3)),
        },
    ]
}

/// Ambient, two directional lights and a spot light
pub fn default_lights() -> Vec<LightSpec> {
    vec![
        LightSpec {
            name: "ambient",
            kind: LightKind::Ambient,
            color: 0xffffff,
            base_intensity: 0.6,
            intensity_motion: Oscillator::STILL,
            base_position: Vec3::ZERO,
            position_motion: STILL_AXES,
        },
        LightSpec {
            name: "key",
            kind: LightKind::Directional,
            color: 0xffffff,
            base_intensity: 1.5,
            intensity_motion: Oscillator::sine(0.5, 2.5),
            base_position: Vec3::new(20.0, 20.0, 15.0),
            position_motion: axes(
                Oscillator::cosine(10.0, 0.5),
                Oscillator::sine(5.0, 0.3),
                Oscillator::STILL,
            ),
        },
        LightSpec {
            name: "fill",
            kind: LightKind::Directional,
            color: 0xc0c0c0,
            base_intensity: 1.2,
            intensity_motion: Oscillator::cosine(0.4, 1.8),
            base_position: Vec3::new(-20.0, -15.0, 10.0),
            position_motion: STILL_AXES,
        },
        LightSpec {
            name: "spot",
            kind: LightKind::Spot {
                angle: std::f32::consts::FRAC_PI_4,
            },
            color: 0xffffff,
            base_intensity: 2.0,
            intensity_motion: Oscillator::sine(0.8, 3.0),
            base_position: Vec3::new(0.0, 30.0, 0.0),
            position_motion: STILL_AXES,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillator_is_bounded_and_continuous() {
        let osc = Oscillator::cosine(6.0, 0.6);
        let mut previous = osc.offset(0.0);
        assert!((previous - 6.0).abs() < 1e-5);

        for step in 1..2_000 {
            let t = step as f32 * 0.01;
            let value = osc.offset(t);
            assert!(value.abs() <= 6.0 + 1e-5);
            // 10ms of motion can never jump more than amplitude * frequency * dt.
            assert!((value - previous).abs() <= 6.0 * 0.6 * 0.01 + 1e-4);
            previous = value;
        }
    }

    #[test]
    fn still_oscillator_never_moves() {
        assert_eq!(Oscillator::STILL.offset(0.0), 0.0);
        assert_eq!(Oscillator::STILL.offset(1234.5), 0.0);
    }

    #[test]
    fn table_has_eight_distinct_bodies() {
        let bodies = default_bodies();
        assert_eq!(bodies.len(), 8);

        let mut names: Vec<_> = bodies.iter().map(|b| b.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 8);

        // No two bodies spin in lockstep.
        for (i, a) in bodies.iter().enumerate() {
            for b in &bodies[i + 1..] {
                assert_ne!(a.rotation_step, b.rotation_step, "{} / {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn bodies_never_reach_the_camera() {
        let camera_z = 15.0;
        let near = 0.1;
        for body in default_bodies() {
            assert!(
                body.nearest_reach() < camera_z - near,
                "{} reaches z = {}",
                body.name,
                body.nearest_reach()
            );
        }
    }

    #[test]
    fn light_rig_has_four_sources() {
        let lights = default_lights();
        assert_eq!(lights.len(), 4);
        assert!(lights.iter().any(|l| l.kind == LightKind::Ambient));
        assert_eq!(
            lights
                .iter()
                .filter(|l| l.kind == LightKind::Directional)
                .count(),
            2
        );
        assert!(lights.iter().any(|l| matches!(l.kind, LightKind::Spot { .. })));
    }

    #[test]
    fn light_intensity_oscillates_around_base() {
        let key = default_lights()
            .into_iter()
            .find(|l| l.name == "key")
            .unwrap();
        for step in 0..100 {
            let intensity = key.intensity_at(step as f32 * 0.1);
            assert!((1.0..=2.0).contains(&intensity));
        }
    }

    #[test]
    fn hex_colors_convert_to_unit_channels() {
        let rgb = rgb_from_hex(0xff8000);
        assert_eq!(rgb.x, 1.0);
        assert!((rgb.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(rgb.z, 0.0);
    }
}
