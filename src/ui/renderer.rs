//! Software rendering of the background scene
//!
//! Projects every body's triangles through the camera, shades them with
//! flat per-face lighting and paints them back to front onto a transparent
//! tiny-skia pixmap. Layout calculation is separate from rasterization so
//! the geometric part can be tested without pixels.

use std::path::Path;

use glam::Vec3;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::domain::core::Viewport;
use crate::domain::motion::{LightKind, MaterialSpec, rgb_from_hex};
use crate::ui::resources::{ResourceId, ResourceKind, ResourceLedger};
use crate::ui::scene::{Light, Scene};

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Failed to create {width}x{height} pixmap for rendering")]
    PixmapCreationFailed { width: u32, height: u32 },

    #[error("Renderer has been disposed")]
    Disposed,

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

/// One projected, lit triangle ready to paint
#[derive(Debug, Clone)]
pub struct ShadedTriangle {
    /// Screen-space vertices in pixels
    pub points: [(f32, f32); 3],
    /// View-space z of the centroid; more negative is further away
    pub depth: f32,
    pub color: Color,
    pub wireframe: bool,
    pub line_width: f32,
}

/// Pre-calculated geometry of one frame, sorted far to near
#[derive(Debug, Clone)]
pub struct FrameLayout {
    pub triangles: Vec<ShadedTriangle>,
}

impl FrameLayout {
    /// Projects and shades every live body of `scene`
    pub fn from_scene(scene: &Scene, viewport: Viewport) -> Self {
        let camera = scene.camera();
        let view = camera.view_matrix();
        let view_projection = camera.projection_matrix() * view;
        let width = viewport.width as f32;
        let height = viewport.height as f32;

        let mut triangles = Vec::new();
        for body in scene.bodies() {
            let (Some(mesh), Some(material)) = (body.mesh(), body.material()) else {
                continue;
            };
            let model = body.model_matrix();

            for face in &mesh.indices {
                let world = mesh.triangle(*face).map(|p| model.transform_point3(p));

                let mut points = [(0.0, 0.0); 3];
                let mut visible = true;
                for (point, vertex) in points.iter_mut().zip(world) {
                    let clip = view_projection * vertex.extend(1.0);
                    if clip.w < camera.near {
                        visible = false;
                        break;
                    }
                    let ndc = clip.truncate() / clip.w;
                    *point = ((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height);
                }
                if !visible {
                    continue;
                }

                let centroid = (world[0] + world[1] + world[2]) / 3.0;
                let mut normal = (world[1] - world[0])
                    .cross(world[2] - world[0])
                    .normalize_or_zero();
                // Faces are lit from whichever side the camera sees.
                if normal.dot(camera.position - centroid) < 0.0 {
                    normal = -normal;
                }

                let rgb = shade(normal, centroid, material, scene.lights(), camera.position);
                triangles.push(ShadedTriangle {
                    points,
                    depth: view.transform_point3(centroid).z,
                    color: to_color(rgb, material.opacity),
                    wireframe: material.wireframe,
                    line_width: material.line_width,
                });
            }
        }

        triangles.sort_by(|a, b| a.depth.total_cmp(&b.depth));

        Self { triangles }
    }
}

/// Flat metal-like shading of one face
///
/// # Arguments
/// * `normal` - Unit face normal pointing towards the viewer
/// * `point` - World-space point on the face
/// * `material` - Surface description
/// * `lights` - Current light rig
/// * `eye` - Camera position
///
/// # Returns
/// Linear RGB in 0..1
pub fn shade(
    normal: Vec3,
    point: Vec3,
    material: &MaterialSpec,
    lights: &[Light],
    eye: Vec3,
) -> Vec3 {
    let view_dir = (eye - point).normalize_or_zero();
    let shininess = 2.0 + (1.0 - material.roughness) * 62.0;

    let mut ambient = Vec3::ZERO;
    let mut diffuse = Vec3::ZERO;
    let mut specular = Vec3::ZERO;
    let mut add_light = |to_light: Vec3, radiance: Vec3| {
        let n_dot_l = normal.dot(to_light).max(0.0);
        diffuse += radiance * n_dot_l;
        if n_dot_l > 0.0 {
            let half = (to_light + view_dir).normalize_or_zero();
            specular += radiance * normal.dot(half).max(0.0).powf(shininess) * material.metalness;
        }
    };

    for light in lights {
        let radiance = rgb_from_hex(light.spec.color) * light.intensity;
        match light.spec.kind {
            LightKind::Ambient => ambient += radiance,
            LightKind::Directional => add_light(light.position.normalize_or_zero(), radiance),
            LightKind::Spot { angle } => {
                let to_light = (light.position - point).normalize_or_zero();
                let axis = (-light.position).normalize_or_zero();
                let cos_outer = angle.cos();
                let cos_theta = (-to_light).dot(axis);
                if cos_theta >= cos_outer {
                    let falloff = ((cos_theta - cos_outer) / (1.0 - cos_outer)).clamp(0.0, 1.0);
                    add_light(to_light, radiance * falloff);
                }
            }
        }
    }

    let base = material.rgb();
    let lit = base * (ambient + diffuse) * (1.0 - material.metalness * 0.5);
    (lit + specular).clamp(Vec3::ZERO, Vec3::ONE)
}

fn to_color(rgb: Vec3, opacity: f32) -> Color {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::from_rgba8(
        channel(rgb.x),
        channel(rgb.y),
        channel(rgb.z),
        channel(opacity),
    )
}

/// Renderer owning the frame buffer of one background instance
#[derive(Debug)]
pub struct SceneRenderer {
    pixmap: Option<Pixmap>,
    viewport: Viewport,
    antialias: bool,
    ledger: ResourceLedger,
    target: Option<ResourceId>,
}

impl SceneRenderer {
    /// Create a renderer with a transparent frame buffer of `viewport` size
    pub fn new(
        viewport: Viewport,
        antialias: bool,
        ledger: &ResourceLedger,
    ) -> Result<Self, RendererError> {
        let pixmap = create_pixmap(viewport)?;
        Ok(Self {
            pixmap: Some(pixmap),
            viewport,
            antialias,
            ledger: ledger.clone(),
            target: Some(ledger.allocate(ResourceKind::RenderTarget)),
        })
    }

    #[cfg(test)]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_disposed(&self) -> bool {
        self.target.is_none()
    }

    /// Reallocates the frame buffer when the size changes
    pub fn set_size(&mut self, viewport: Viewport) -> Result<(), RendererError> {
        if self.is_disposed() {
            return Err(RendererError::Disposed);
        }
        if viewport == self.viewport && self.pixmap.is_some() {
            return Ok(());
        }
        self.pixmap = Some(create_pixmap(viewport)?);
        self.viewport = viewport;
        Ok(())
    }

    /// Render `scene` into the frame buffer
    pub fn render(&mut self, scene: &Scene) -> Result<&Pixmap, RendererError> {
        if self.is_disposed() {
            return Err(RendererError::Disposed);
        }
        let layout = FrameLayout::from_scene(scene, self.viewport);
        let antialias = self.antialias;
        let pixmap = self.pixmap.as_mut().ok_or(RendererError::Disposed)?;

        pixmap.fill(Color::TRANSPARENT);
        render_triangles(pixmap, &layout.triangles, antialias);
        Ok(pixmap)
    }

    /// Last rendered frame
    pub fn frame(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Write the last rendered frame as PNG
    pub fn save_png(&self, path: &Path) -> Result<(), RendererError> {
        let pixmap = self.frame().ok_or(RendererError::Disposed)?;
        pixmap
            .save_png(path)
            .map_err(|e| RendererError::Encode(e.to_string()))
    }

    /// Releases the frame buffer; returns false when already released
    pub fn dispose(&mut self) -> bool {
        self.pixmap = None;
        let Some(target) = self.target.take() else {
            return false;
        };
        if let Err(e) = self.ledger.release(target) {
            log::warn!("Render target: {}", e);
        }
        true
    }
}

fn create_pixmap(viewport: Viewport) -> Result<Pixmap, RendererError> {
    Pixmap::new(viewport.width, viewport.height).ok_or(RendererError::PixmapCreationFailed {
        width: viewport.width,
        height: viewport.height,
    })
}

fn render_triangles(pixmap: &mut Pixmap, triangles: &[ShadedTriangle], antialias: bool) {
    for triangle in triangles {
        let [a, b, c] = triangle.points;
        let mut path_builder = PathBuilder::new();
        path_builder.move_to(a.0, a.1);
        path_builder.line_to(b.0, b.1);
        path_builder.line_to(c.0, c.1);
        path_builder.close();

        let Some(path) = path_builder.finish() else {
            continue;
        };

        let mut paint = Paint::default();
        paint.set_color(triangle.color);
        paint.anti_alias = antialias;

        if triangle.wireframe {
            let stroke = Stroke {
                width: triangle.line_width,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        } else {
            pixmap.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }
}
