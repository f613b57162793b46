//! Procedural meshes for the decorative bodies
//!
//! Every shape is generated as a flat triangle list in object space.
//! Face normals are derived at render time, so meshes carry positions and
//! indices only.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

/// Shape of a decorative body together with its construction parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    TorusKnot {
        radius: f32,
        tube: f32,
        tubular_segments: u32,
        radial_segments: u32,
        p: u32,
        q: u32,
    },
    Icosahedron { radius: f32, detail: u32 },
    Dodecahedron { radius: f32, detail: u32 },
    Octahedron { radius: f32, detail: u32 },
    Tetrahedron { radius: f32, detail: u32 },
    Torus {
        radius: f32,
        tube: f32,
        radial_segments: u32,
        tubular_segments: u32,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Ring {
        inner_radius: f32,
        outer_radius: f32,
        theta_segments: u32,
        phi_segments: u32,
    },
}

impl ShapeKind {
    /// Radius of a sphere around the origin that encloses the whole shape
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            // Knot curve peaks at 1.5 * radius, the tube adds on top.
            ShapeKind::TorusKnot { radius, tube, .. } => radius * 1.5 + tube,
            ShapeKind::Icosahedron { radius, .. }
            | ShapeKind::Dodecahedron { radius, .. }
            | ShapeKind::Octahedron { radius, .. }
            | ShapeKind::Tetrahedron { radius, .. }
            | ShapeKind::Sphere { radius, .. } => radius,
            ShapeKind::Torus { radius, tube, .. } => radius + tube,
            ShapeKind::Ring { outer_radius, .. } => outer_radius,
        }
    }

    /// Builds the triangle mesh for this shape
    pub fn build_mesh(&self) -> Mesh {
        match *self {
            ShapeKind::TorusKnot {
                radius,
                tube,
                tubular_segments,
                radial_segments,
                p,
                q,
            } => torus_knot(radius, tube, tubular_segments, radial_segments, p, q),
            ShapeKind::Icosahedron { radius, detail } => {
                polyhedron(&ICOSAHEDRON_VERTICES, &ICOSAHEDRON_FACES, radius, detail)
            }
            ShapeKind::Dodecahedron { radius, detail } => {
                polyhedron(&dodecahedron_vertices(), &DODECAHEDRON_FACES, radius, detail)
            }
            ShapeKind::Octahedron { radius, detail } => {
                polyhedron(&OCTAHEDRON_VERTICES, &OCTAHEDRON_FACES, radius, detail)
            }
            ShapeKind::Tetrahedron { radius, detail } => {
                polyhedron(&TETRAHEDRON_VERTICES, &TETRAHEDRON_FACES, radius, detail)
            }
            ShapeKind::Torus {
                radius,
                tube,
                radial_segments,
                tubular_segments,
            } => torus(radius, tube, radial_segments, tubular_segments),
            ShapeKind::Sphere {
                radius,
                width_segments,
                height_segments,
            } => sphere(radius, width_segments, height_segments),
            ShapeKind::Ring {
                inner_radius,
                outer_radius,
                theta_segments,
                phi_segments,
            } => ring(inner_radius, outer_radius, theta_segments, phi_segments),
        }
    }
}

/// Indexed triangle mesh in object space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Object-space corners of one triangle
    pub fn triangle(&self, face: [u32; 3]) -> [Vec3; 3] {
        [
            self.positions[face[0] as usize],
            self.positions[face[1] as usize],
            self.positions[face[2] as usize],
        ]
    }
}

const ICOSAHEDRON_T: f32 = 1.618_034;

const ICOSAHEDRON_VERTICES: [Vec3; 12] = [
    Vec3::new(-1.0, ICOSAHEDRON_T, 0.0),
    Vec3::new(1.0, ICOSAHEDRON_T, 0.0),
    Vec3::new(-1.0, -ICOSAHEDRON_T, 0.0),
    Vec3::new(1.0, -ICOSAHEDRON_T, 0.0),
    Vec3::new(0.0, -1.0, ICOSAHEDRON_T),
    Vec3::new(0.0, 1.0, ICOSAHEDRON_T),
    Vec3::new(0.0, -1.0, -ICOSAHEDRON_T),
    Vec3::new(0.0, 1.0, -ICOSAHEDRON_T),
    Vec3::new(ICOSAHEDRON_T, 0.0, -1.0),
    Vec3::new(ICOSAHEDRON_T, 0.0, 1.0),
    Vec3::new(-ICOSAHEDRON_T, 0.0, -1.0),
    Vec3::new(-ICOSAHEDRON_T, 0.0, 1.0),
];

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn dodecahedron_vertices() -> [Vec3; 20] {
    let t = ICOSAHEDRON_T;
    let r = 1.0 / t;
    [
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(0.0, -r, -t),
        Vec3::new(0.0, -r, t),
        Vec3::new(0.0, r, -t),
        Vec3::new(0.0, r, t),
        Vec3::new(-r, -t, 0.0),
        Vec3::new(-r, t, 0.0),
        Vec3::new(r, -t, 0.0),
        Vec3::new(r, t, 0.0),
        Vec3::new(-t, 0.0, -r),
        Vec3::new(t, 0.0, -r),
        Vec3::new(-t, 0.0, r),
        Vec3::new(t, 0.0, r),
    ]
}

// Twelve pentagons, three triangles each.
const DODECAHEDRON_FACES: [[usize; 3]; 36] = [
    [3, 11, 7],
    [3, 7, 15],
    [3, 15, 13],
    [7, 19, 17],
    [7, 17, 6],
    [7, 6, 15],
    [17, 4, 8],
    [17, 8, 10],
    [17, 10, 6],
    [8, 0, 16],
    [8, 16, 2],
    [8, 2, 10],
    [0, 12, 1],
    [0, 1, 18],
    [0, 18, 16],
    [6, 10, 2],
    [6, 2, 13],
    [6, 13, 15],
    [2, 16, 18],
    [2, 18, 3],
    [2, 3, 13],
    [18, 1, 9],
    [18, 9, 11],
    [18, 11, 3],
    [4, 14, 12],
    [4, 12, 0],
    [4, 0, 8],
    [11, 9, 5],
    [11, 5, 19],
    [11, 19, 7],
    [19, 5, 14],
    [19, 14, 4],
    [19, 4, 17],
    [1, 12, 14],
    [1, 14, 5],
    [1, 5, 9],
];

const OCTAHEDRON_VERTICES: [Vec3; 6] = [
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(-1.0, 0.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(0.0, -1.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(0.0, 0.0, -1.0),
];

const OCTAHEDRON_FACES: [[usize; 3]; 8] = [
    [0, 2, 4],
    [0, 4, 3],
    [0, 3, 5],
    [0, 5, 2],
    [1, 2, 5],
    [1, 5, 3],
    [1, 3, 4],
    [1, 4, 2],
];

const TETRAHEDRON_VERTICES: [Vec3; 4] = [
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
];

const TETRAHEDRON_FACES: [[usize; 3]; 4] = [[2, 1, 0], [0, 3, 2], [1, 3, 0], [2, 3, 1]];

/// Subdivides every base face `detail` times and projects the result onto
/// a sphere of `radius`
fn polyhedron(vertices: &[Vec3], faces: &[[usize; 3]], radius: f32, detail: u32) -> Mesh {
    let mut mesh = Mesh::default();
    let cols = detail as usize + 1;

    for face in faces {
        let a = vertices[face[0]];
        let b = vertices[face[1]];
        let c = vertices[face[2]];

        // rows[i][j]: j-th point on the i-th line between edge a-c and b-c
        let mut rows: Vec<Vec<Vec3>> = Vec::with_capacity(cols + 1);
        for i in 0..=cols {
            let t = i as f32 / cols as f32;
            let aj = a.lerp(c, t);
            let bj = b.lerp(c, t);
            let count = cols - i;
            let row = (0..=count)
                .map(|j| {
                    if count == 0 {
                        aj
                    } else {
                        aj.lerp(bj, j as f32 / count as f32)
                    }
                })
                .collect();
            rows.push(row);
        }

        for i in 0..cols {
            for j in 0..(2 * (cols - i) - 1) {
                let k = j / 2;
                let corners = if j % 2 == 0 {
                    [rows[i][k + 1], rows[i + 1][k], rows[i][k]]
                } else {
                    [rows[i][k + 1], rows[i + 1][k + 1], rows[i + 1][k]]
                };
                let base = mesh.positions.len() as u32;
                mesh.positions
                    .extend(corners.iter().map(|v| v.normalize() * radius));
                mesh.indices.push([base, base + 1, base + 2]);
            }
        }
    }

    mesh
}

fn torus_knot(
    radius: f32,
    tube: f32,
    tubular_segments: u32,
    radial_segments: u32,
    p: u32,
    q: u32,
) -> Mesh {
    let tubular = tubular_segments.max(3);
    let radial = radial_segments.max(3);
    let (p, q) = (p.max(1) as f32, q as f32);

    let curve = |u: f32| {
        let quo_p = q / p * u;
        let cs = quo_p.cos();
        Vec3::new(
            radius * (2.0 + cs) * 0.5 * u.cos(),
            radius * (2.0 + cs) * 0.5 * u.sin(),
            radius * quo_p.sin() * 0.5,
        )
    };

    let mut mesh = Mesh::default();
    for i in 0..=tubular {
        let u = i as f32 / tubular as f32 * p * TAU;
        let p1 = curve(u);
        let p2 = curve(u + 0.01);

        // Frenet-like frame around the curve
        let tangent = p2 - p1;
        let binormal = tangent.cross(p2 + p1).normalize_or_zero();
        let normal = binormal.cross(tangent).normalize_or_zero();

        for j in 0..=radial {
            let v = j as f32 / radial as f32 * TAU;
            let cx = -tube * v.cos();
            let cy = tube * v.sin();
            mesh.positions.push(p1 + normal * cx + binormal * cy);
        }
    }

    for j in 1..=tubular {
        for i in 1..=radial {
            let a = (radial + 1) * (j - 1) + (i - 1);
            let b = (radial + 1) * j + (i - 1);
            let c = (radial + 1) * j + i;
            let d = (radial + 1) * (j - 1) + i;
            mesh.indices.push([a, b, d]);
            mesh.indices.push([b, c, d]);
        }
    }
    mesh
}

fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Mesh {
    let radial = radial_segments.max(3);
    let tubular = tubular_segments.max(3);

    let mut mesh = Mesh::default();
    for j in 0..=radial {
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * TAU;
            let v = j as f32 / radial as f32 * TAU;
            mesh.positions.push(Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            ));
        }
    }

    for j in 1..=radial {
        for i in 1..=tubular {
            let a = (tubular + 1) * j + i - 1;
            let b = (tubular + 1) * (j - 1) + i - 1;
            let c = (tubular + 1) * (j - 1) + i;
            let d = (tubular + 1) * j + i;
            mesh.indices.push([a, b, d]);
            mesh.indices.push([b, c, d]);
        }
    }
    mesh
}

fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Mesh {
    let width = width_segments.max(3);
    let height = height_segments.max(2);

    let mut mesh = Mesh::default();
    for iy in 0..=height {
        let v = iy as f32 / height as f32;
        for ix in 0..=width {
            let u = ix as f32 / width as f32;
            mesh.positions.push(Vec3::new(
                -radius * (u * TAU).cos() * (v * PI).sin(),
                radius * (v * PI).cos(),
                radius * (u * TAU).sin() * (v * PI).sin(),
            ));
        }
    }

    let index = |ix: u32, iy: u32| iy * (width + 1) + ix;
    for iy in 0..height {
        for ix in 0..width {
            let a = index(ix + 1, iy);
            let b = index(ix, iy);
            let c = index(ix, iy + 1);
            let d = index(ix + 1, iy + 1);
            // Poles collapse one of the two triangles to a point.
            if iy != 0 {
                mesh.indices.push([a, b, d]);
            }
            if iy != height - 1 {
                mesh.indices.push([b, c, d]);
            }
        }
    }
    mesh
}

fn ring(inner_radius: f32, outer_radius: f32, theta_segments: u32, phi_segments: u32) -> Mesh {
    let theta = theta_segments.max(3);
    let phi = phi_segments.max(1);
    let step = (outer_radius - inner_radius) / phi as f32;

    let mut mesh = Mesh::default();
    for j in 0..=phi {
        let r = inner_radius + j as f32 * step;
        for i in 0..=theta {
            let segment = i as f32 / theta as f32 * TAU;
            mesh.positions
                .push(Vec3::new(r * segment.cos(), r * segment.sin(), 0.0));
        }
    }

    for j in 0..phi {
        let offset = j * (theta + 1);
        for i in 0..theta {
            let a = offset + i;
            let b = offset + theta + 1 + i;
            let c = offset + theta + 2 + i;
            let d = offset + i + 1;
            mesh.indices.push([a, b, d]);
            mesh.indices.push([b, c, d]);
        }
    }
    mesh
}
