//! Mesh serialization.
//!
//! Turns one material bucket into a `Default Model` object: a triangular
//! mesh with vertex, normal and index lists, the material block, and the
//! UV map channel. Index offsets depend on the running point count, so the
//! faces are triangulated first and the lists written in one pass each.

use super::material::{write_material, MaterialSource};
use super::xml::{escape, fixed};
use crate::collect::{MaterialBucket, ResolvedFace, TextureRegistry};
use crate::error::Result;
use crate::scene::geometry::non_zero;
use crate::scene::{PolygonMesh, Scene};
use crate::types::Side;
use std::io::Write;

/// Faces between progress messages.
const PROGRESS_INTERVAL: usize = 500;

/// Settings that affect mesh output.
#[derive(Debug, Clone, Copy)]
pub struct MeshSettings {
    /// Model units to metres.
    pub scale: f64,
    pub clay: bool,
    /// Write UVs for untextured buckets too.
    pub default_uvs: bool,
}

/// Counts for the export summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub points: usize,
    pub triangles: usize,
}

struct PreparedFace<'a, 's> {
    resolved: &'a ResolvedFace<'s>,
    mesh: PolygonMesh,
    mirrored: bool,
}

/// Write one bucket as a model object. Empty buckets write nothing.
pub fn write_bucket<W: Write>(
    out: &mut W,
    bucket: &MaterialBucket<'_>,
    registry: &TextureRegistry<'_>,
    scene: &Scene,
    settings: &MeshSettings,
) -> Result<MeshStats> {
    if bucket.faces.is_empty() {
        return Ok(MeshStats::default());
    }

    let name = bucket.name();
    let has_texture = bucket.key.is_textured();
    let write_uvs = (has_texture && !settings.clay) || (!has_texture && settings.default_uvs);
    let total = bucket.faces.len();

    let mut prepared = Vec::with_capacity(total);
    for (i, resolved) in bucket.faces.iter().enumerate() {
        if i % PROGRESS_INTERVAL == 0 {
            log::debug!("Converting faces to meshes: {} [{}/{}]", name, i, total);
        }
        // Untextured buckets exporting default UVs always use the front side
        let uv_side = if has_texture { resolved.side } else { Side::Front };
        let own_texture = resolved
            .face
            .material_on(uv_side)
            .and_then(|n| scene.material(n))
            .and_then(|m| m.material.texture.as_ref());
        prepared.push(PreparedFace {
            resolved,
            mesh: resolved.face.mesh(uv_side, own_texture),
            mirrored: resolved.transform.is_mirrored(),
        });
    }

    let stats = MeshStats {
        points: prepared.iter().map(|p| p.mesh.point_count()).sum(),
        triangles: prepared.iter().map(|p| p.mesh.polygon_count()).sum(),
    };
    let escaped = escape(&name);

    writeln!(out, "<Object Identifier=\"./Models/{}\" Label=\"Default Model\" Name=\"{}\" Type=\"Model\">", escaped, escaped)?;
    writeln!(out, "\t<Object Identifier=\"Triangular Mesh\" Label=\"Triangular Mesh\" Name=\"\" Type=\"Surface\">")?;

    writeln!(out, "\t<Parameter Name=\"Vertex List\" Type=\"Point3D List\" Value=\"{}\">", stats.points)?;
    for face in &prepared {
        let transform = &face.resolved.transform;
        for &point in &face.mesh.points {
            let p = transform.transform_point(point) * settings.scale;
            writeln!(out, "\t<P xyz=\"{} {} {}\"/>", fixed(p.x, 4), fixed(p.y, 4), fixed(p.z, 4))?;
        }
    }
    writeln!(out, "\t</Parameter>")?;

    writeln!(out, "\t<Parameter Name=\"Normal List\" Type=\"Point3D List\" Value=\"{}\">", stats.points)?;
    for face in &prepared {
        let transform = &face.resolved.transform;
        for &normal in &face.mesh.normals {
            let mut n = transform.transform_normal(normal);
            if face.resolved.side == Side::Back {
                n = -n;
            }
            writeln!(out, "\t<P xyz=\"{} {} {}\"/>", fixed(n.x, 8), fixed(n.y, 8), fixed(n.z, 8))?;
        }
    }
    writeln!(out, "\t</Parameter>")?;

    writeln!(out, "\t<Parameter Name=\"Index List\" Type=\"Triangle Index List\" Value=\"{}\">", stats.triangles)?;
    let mut start_index = 0u32;
    for face in &prepared {
        for &triangle in &face.mesh.polygons {
            let [i, j, k] = triangle_indices(triangle, start_index, face.mirrored, face.resolved.side);
            writeln!(out, "\t<F ijk=\"{} {} {}\"/>", i, j, k)?;
        }
        start_index += face.mesh.point_count() as u32;
    }
    writeln!(out, "\t</Parameter>")?;
    writeln!(out, "\t<Parameter Name=\"Smooth\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "\t<Parameter Name=\"AA Tolerance\" Type=\"Real\" Value=\"15\"/>")?;
    writeln!(out, "\t</Object>")?;

    let source = MaterialSource::for_bucket(bucket, registry);
    write_material(out, &source, scene, settings.clay)?;

    if write_uvs {
        // Faces inheriting a texture tile relative to the texture's size
        let inherited_size = source
            .texture
            .and_then(|record| record.texture())
            .map(|t| (non_zero(t.width), non_zero(t.height)));

        writeln!(out, "\t<Parameter Name=\"Map Channel\" Type=\"Point2D List\" Value=\"{}\">", stats.points)?;
        for face in &prepared {
            let (width, height) = match inherited_size {
                Some(size) if face.resolved.inherited => size,
                _ => (1.0, 1.0),
            };
            for (point, native) in face.mesh.points.iter().zip(&face.mesh.uvs) {
                let [u, v] = match &face.resolved.remap {
                    Some(remap) => remap.uv_at(*point),
                    None => *native,
                };
                let (u, v) = (u / width, v / height);
                writeln!(out, "\t<P xy=\"{} {}\"/>", fixed(u, 4), fixed(-v + 1.0, 4))?;
            }
        }
        writeln!(out, "\t</Parameter>")?;
    } else {
        writeln!(out, "\t<Parameter Name=\"Map Channel\" Type=\"Point2D List\" Value=\"0\">")?;
        writeln!(out, "\t</Parameter>")?;
    }

    match source.material.and_then(|m| m.material.attributes.kt_map.as_deref()) {
        Some(kt_map) => writeln!(out, "{}", kt_map)?,
        None => {
            writeln!(out, "\t<Parameter Name=\"Frame\" Type=\"Transform\" Value=\"1 0 0 0 0 1 0 0 0 0 1 0\"/>")?;
            writeln!(out, "\t<Parameter Name=\"Visible\" Type=\"Boolean\" Value=\"1\"/>")?;
            writeln!(out, "\t<Parameter Name=\"Shadow Caster\" Type=\"Boolean\" Value=\"1\"/>")?;
            writeln!(out, "\t<Parameter Name=\"Shadow Receiver\" Type=\"Boolean\" Value=\"1\"/>")?;
            writeln!(out, "\t<Parameter Name=\"Caustics Transmitter\" Type=\"Boolean\" Value=\"1\"/>")?;
            writeln!(out, "\t<Parameter Name=\"Caustics Receiver\" Type=\"Boolean\" Value=\"1\"/>")?;
        }
    }
    writeln!(out, "</Object>")?;

    Ok(stats)
}

/// Output index order of one triangle: offset by the points already
/// written, reversed under a mirroring transform, first two swapped when
/// the material is on the back side.
pub fn triangle_indices(triangle: [u32; 3], start_index: u32, mirrored: bool, side: Side) -> [u32; 3] {
    let mut t = triangle.map(|i| i + start_index);
    if mirrored {
        t.reverse();
    }
    match side {
        Side::Front => t,
        Side::Back => [t[1], t[0], t[2]],
    }
}
