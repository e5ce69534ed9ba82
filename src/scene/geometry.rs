//! Face geometry and triangulation.
//!
//! Faces are planar polygons. [`Face::mesh`] plays the role of the host's
//! polygon-mesh facility: it triangulates the outer loop and reports
//! per-point positions, normals and UVs for one side of the face.

use super::Texture;
use crate::types::Side;
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// Tolerance used when comparing UV mapping coefficients.
pub const UV_TOLERANCE: f64 = 1e-6;

/// An affine projection from face-local points to texture coordinates.
///
/// `u = u[0]*x + u[1]*y + u[2]*z + u[3]`, likewise for `v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvMapping {
    pub u: [f64; 4],
    pub v: [f64; 4],
}

impl UvMapping {
    pub fn new(u: [f64; 4], v: [f64; 4]) -> Self {
        Self { u, v }
    }

    /// The default planar projection for a face with the given normal:
    /// points are projected onto the plane axes of the normal and divided
    /// by the texture repeat size.
    pub fn planar(normal: DVec3, width: f64, height: f64) -> Self {
        let (x_axis, y_axis) = plane_axes(normal);
        let (width, height) = (non_zero(width), non_zero(height));
        Self {
            u: [x_axis.x / width, x_axis.y / width, x_axis.z / width, 0.0],
            v: [y_axis.x / height, y_axis.y / height, y_axis.z / height, 0.0],
        }
    }

    /// A planar projection rotated in texture space by `angle` radians.
    pub fn rotated(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let mut u = [0.0; 4];
        let mut v = [0.0; 4];
        for i in 0..4 {
            u[i] = cos * self.u[i] - sin * self.v[i];
            v[i] = sin * self.u[i] + cos * self.v[i];
        }
        Self { u, v }
    }

    pub fn uv_at(&self, point: DVec3) -> [f64; 2] {
        let apply = |c: &[f64; 4]| c[0] * point.x + c[1] * point.y + c[2] * point.z + c[3];
        [apply(&self.u), apply(&self.v)]
    }

    pub fn approx_eq(&self, other: &UvMapping, tolerance: f64) -> bool {
        self.u
            .iter()
            .chain(self.v.iter())
            .zip(other.u.iter().chain(other.v.iter()))
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// Coefficients rounded to the comparison tolerance, usable as a hash key.
    pub fn quantized(&self) -> [i64; 8] {
        let mut out = [0i64; 8];
        for (slot, c) in out.iter_mut().zip(self.u.iter().chain(self.v.iter())) {
            *slot = (c / UV_TOLERANCE).round() as i64;
        }
        out
    }
}

/// Texture sizes of zero count as one unit.
pub(crate) fn non_zero(size: f64) -> f64 {
    if size.abs() < f64::EPSILON {
        1.0
    } else {
        size
    }
}

/// Arbitrary-axis algorithm: two unit vectors spanning the plane with the
/// given normal, forming a right-handed frame with it.
pub fn plane_axes(normal: DVec3) -> (DVec3, DVec3) {
    let n = normal.normalize_or_zero();
    if n == DVec3::ZERO {
        return (DVec3::X, DVec3::Y);
    }
    let x = if n.x.abs() < 1.0 / 64.0 && n.y.abs() < 1.0 / 64.0 {
        DVec3::Y.cross(n)
    } else {
        DVec3::Z.cross(n)
    }
    .normalize();
    let y = n.cross(x).normalize();
    (x, y)
}

/// A planar polygon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Face {
    /// Outer loop, counter-clockwise when seen from the front.
    pub vertices: Vec<DVec3>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub back_material: Option<String>,
    /// Explicit texture placement on the front side.
    #[serde(default)]
    pub front_uv: Option<UvMapping>,
    /// Explicit texture placement on the back side.
    #[serde(default)]
    pub back_uv: Option<UvMapping>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub layer: Option<String>,
}

impl Face {
    pub fn new(vertices: Vec<DVec3>) -> Self {
        Self {
            vertices,
            ..Default::default()
        }
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_back_material(mut self, material: impl Into<String>) -> Self {
        self.back_material = Some(material.into());
        self
    }

    pub fn with_front_uv(mut self, mapping: UvMapping) -> Self {
        self.front_uv = Some(mapping);
        self
    }

    /// Material name bound to the given side.
    pub fn material_on(&self, side: Side) -> Option<&str> {
        match side {
            Side::Front => self.material.as_deref(),
            Side::Back => self.back_material.as_deref(),
        }
    }

    /// Explicit UV mapping bound to the given side.
    pub fn uv_mapping(&self, side: Side) -> Option<&UvMapping> {
        match side {
            Side::Front => self.front_uv.as_ref(),
            Side::Back => self.back_uv.as_ref(),
        }
    }

    /// Unit normal of the front side (Newell's method).
    pub fn normal(&self) -> DVec3 {
        let mut n = DVec3::ZERO;
        let count = self.vertices.len();
        for i in 0..count {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % count];
            n.x += (a.y - b.y) * (a.z + b.z);
            n.y += (a.z - b.z) * (a.x + b.x);
            n.z += (a.x - b.x) * (a.y + b.y);
        }
        n.normalize_or_zero()
    }

    /// The texture projection the face would get on `side` with no special
    /// placement: the explicit mapping if present, otherwise the default
    /// planar projection for a texture of the given size.
    pub fn natural_mapping(&self, side: Side, texture: Option<&Texture>) -> UvMapping {
        if let Some(mapping) = self.uv_mapping(side) {
            return *mapping;
        }
        match texture {
            Some(t) => UvMapping::planar(self.normal(), t.width, t.height),
            None => UvMapping::planar(self.normal(), 1.0, 1.0),
        }
    }

    /// Triangulate the face.
    ///
    /// UVs are reported for `side`. `own_texture` is the texture of the
    /// material bound directly to that side, if any; without it, default
    /// UVs are in model units and must be normalized by the caller.
    /// Triangle winding follows the outer loop regardless of `side`.
    pub fn mesh(&self, side: Side, own_texture: Option<&Texture>) -> PolygonMesh {
        let normal = self.normal();
        let mapping = self.natural_mapping(side, own_texture);

        let mut mesh = PolygonMesh::new();
        for &point in &self.vertices {
            mesh.add_point(point, normal, mapping.uv_at(point));
        }
        if normal != DVec3::ZERO {
            for tri in triangulate(&self.vertices, normal) {
                mesh.add_polygon(tri);
            }
        }
        mesh
    }
}

/// Triangles of a polygon mesh with per-point attributes.
#[derive(Debug, Clone, Default)]
pub struct PolygonMesh {
    pub points: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    pub uvs: Vec<[f64; 2]>,
    /// Zero-based point indices, three per triangle.
    pub polygons: Vec<[u32; 3]>,
}

impl PolygonMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a point and return its index.
    pub fn add_point(&mut self, position: DVec3, normal: DVec3, uv: [f64; 2]) -> u32 {
        let index = self.points.len() as u32;
        self.points.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        index
    }

    pub fn add_polygon(&mut self, indices: [u32; 3]) {
        self.polygons.push(indices);
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Ear-clipping triangulation of a simple polygon lying in the plane
/// with the given normal. Output triangles keep the loop's orientation.
fn triangulate(vertices: &[DVec3], normal: DVec3) -> Vec<[u32; 3]> {
    if vertices.len() < 3 {
        return Vec::new();
    }

    let (x_axis, y_axis) = plane_axes(normal);
    let projected: Vec<DVec2> = vertices
        .iter()
        .map(|p| DVec2::new(p.dot(x_axis), p.dot(y_axis)))
        .collect();

    let mut remaining: Vec<u32> = (0..vertices.len() as u32).collect();
    let mut triangles = Vec::with_capacity(vertices.len() - 2);

    while remaining.len() > 3 {
        let n = remaining.len();
        let ear = (0..n).find(|&k| {
            let (a, b, c) = (remaining[k], remaining[(k + 1) % n], remaining[(k + 2) % n]);
            is_ear(&projected, &remaining, a, b, c)
        });

        // Degenerate input: clip the first corner anyway to guarantee progress
        let k = ear.unwrap_or(0);
        let (a, b, c) = (remaining[k], remaining[(k + 1) % n], remaining[(k + 2) % n]);
        triangles.push([a, b, c]);
        remaining.remove((k + 1) % n);
    }
    triangles.push([remaining[0], remaining[1], remaining[2]]);

    triangles
}

fn is_ear(points: &[DVec2], remaining: &[u32], a: u32, b: u32, c: u32) -> bool {
    let (pa, pb, pc) = (points[a as usize], points[b as usize], points[c as usize]);
    if cross(pb - pa, pc - pb) <= 1e-12 {
        return false;
    }
    remaining
        .iter()
        .filter(|&&i| i != a && i != b && i != c)
        .all(|&i| !point_in_triangle(points[i as usize], pa, pb, pc))
}

fn cross(a: DVec2, b: DVec2) -> f64 {
    a.x * b.y - a.y * b.x
}

fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    let d1 = cross(b - a, p - a);
    let d2 = cross(c - b, p - b);
    let d3 = cross(a - c, p - c);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Face {
        Face::new(vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn test_square_triangulation() {
        let mesh = unit_square().mesh(Side::Front, None);
        assert_eq!(mesh.point_count(), 4);
        assert_eq!(mesh.polygons, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(mesh.normals.iter().all(|n| *n == DVec3::Z));
    }

    #[test]
    fn test_back_side_keeps_winding() {
        let face = unit_square();
        assert_eq!(
            face.mesh(Side::Front, None).polygons,
            face.mesh(Side::Back, None).polygons
        );
    }

    #[test]
    fn test_concave_polygon() {
        // L-shape, six corners, four triangles
        let face = Face::new(vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(2.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::new(0.0, 2.0, 0.0),
        ]);
        let mesh = face.mesh(Side::Front, None);
        assert_eq!(mesh.polygon_count(), 4);

        // Every triangle is counter-clockwise about +Z and the total area matches
        let mut area = 0.0;
        for [a, b, c] in &mesh.polygons {
            let (pa, pb, pc) = (
                mesh.points[*a as usize],
                mesh.points[*b as usize],
                mesh.points[*c as usize],
            );
            let n = (pb - pa).cross(pc - pa);
            assert!(n.z > 0.0);
            area += n.z * 0.5;
        }
        assert!((area - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_face_has_no_triangles() {
        let face = Face::new(vec![DVec3::ZERO, DVec3::X]);
        assert!(face.mesh(Side::Front, None).is_empty());
    }

    #[test]
    fn test_default_uvs_use_texture_size() {
        let face = unit_square();
        let texture = Texture::new("wood.jpg", 2.0, 4.0);
        let mesh = face.mesh(Side::Front, Some(&texture));
        let [u, v] = mesh.uvs[2];
        assert!((u - 0.5).abs() < 1e-12);
        assert!((v - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_plane_axes_are_right_handed() {
        for n in [DVec3::Z, DVec3::X, DVec3::new(1.0, 1.0, 1.0).normalize(), -DVec3::Y] {
            let (x, y) = plane_axes(n);
            assert!((x.cross(y) - n).length() < 1e-9);
        }
    }

    #[test]
    fn test_rotated_mapping_differs() {
        let base = UvMapping::planar(DVec3::Z, 1.0, 1.0);
        let rotated = base.rotated(std::f64::consts::FRAC_PI_4);
        assert!(!base.approx_eq(&rotated, UV_TOLERANCE));
        assert!(base.approx_eq(&base.rotated(0.0), UV_TOLERANCE));
        assert_ne!(base.quantized(), rotated.quantized());
    }
}
