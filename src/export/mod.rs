//! Kerkythea XML scene export.
//!
//! [`Exporter`] drives one export run: kernel settings, sky, meshes
//! (flat or instanced), cameras, lights and sun, then the texture files.

pub mod camera;
pub mod lights;
pub mod material;
pub mod mesh;
pub mod settings;
pub mod textures;
pub mod xml;

use crate::collect::geometry::scene_bounds;
use crate::collect::lights::find_lights;
use crate::collect::{ExportContext, MaterialBuckets, TextureRegistry};
use crate::error::{ExportError, Result};
use crate::scene::Scene;
use crate::types::Transform;
use mesh::{MeshSettings, MeshStats};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use xml::{escape, fixed};

/// Inches to metres.
pub const DEFAULT_SCALE: f64 = 0.0254;

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub export_meshes: bool,
    pub export_lights: bool,
    /// Replace every material by a flat white diffuse. Also skips textures.
    pub clay: bool,
    /// Give faces whose UV projection differs from their material's
    /// default their own texture variant.
    pub check_distortion: bool,
    /// Write UVs for untextured faces.
    pub default_uvs: bool,
    /// Export each component definition once, with a placement list.
    pub instanced: bool,
    pub copy_textures: bool,
    /// Model units to metres.
    pub scale: f64,
    /// Texture folder prefix; the folder is `<prefix><model name>`.
    pub textures_prefix: String,
    /// Saved kernel settings replacing the default ray tracer setup.
    pub render_settings: Option<PathBuf>,
    /// Frame being rendered, for animated lights.
    pub animation: Option<AnimationFrame>,
    /// Directory of IES photometric files, as seen by the renderer.
    pub ies_directory: String,
    /// `WIDTHxHEIGHT` replacing the current view's viewport size.
    pub resolution: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_meshes: true,
            export_lights: true,
            clay: false,
            check_distortion: false,
            default_uvs: false,
            instanced: false,
            copy_textures: true,
            scale: DEFAULT_SCALE,
            textures_prefix: "TX_".to_string(),
            render_settings: None,
            animation: None,
            ies_directory: "ies".to_string(),
            resolution: None,
        }
    }
}

impl ExportOptions {
    /// Export in instanced mode.
    pub fn instanced(mut self) -> Self {
        self.instanced = true;
        self
    }

    /// Export with the clay material.
    pub fn clay(mut self) -> Self {
        self.clay = true;
        self
    }

    /// Time in seconds of the animation frame, if animating.
    pub fn animation_time(&self) -> Option<f64> {
        self.animation.map(|a| a.time())
    }

    fn mesh_settings(&self) -> MeshSettings {
        MeshSettings {
            scale: self.scale,
            clay: self.clay,
            default_uvs: self.default_uvs,
        }
    }
}

/// A frame of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationFrame {
    pub frame: u32,
    pub fps: f64,
}

impl AnimationFrame {
    pub fn time(&self) -> f64 {
        if self.fps > 0.0 {
            f64::from(self.frame) / self.fps
        } else {
            0.0
        }
    }
}

/// Summary of an export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub model_name: String,
    pub cameras: usize,
    pub point_lights: usize,
    pub spot_lights: usize,
    pub faces: usize,
    pub triangles: usize,
    pub textures: usize,
    pub sun_enabled: bool,
    pub elapsed: Duration,
    /// Problems that did not stop the export.
    pub warnings: Vec<ExportError>,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} textures and model exported in {:.1}s. Triangles = {}",
            self.model_name,
            self.textures,
            self.elapsed.as_secs_f64(),
            self.triangles
        )?;
        writeln!(f, "Cameras exported: {}", self.cameras)?;
        writeln!(
            f,
            "Sun & Physical Sky exported and turned {}",
            if self.sun_enabled { "ON" } else { "OFF" }
        )?;
        write!(
            f,
            "Lights exported: Pointlights: {}   Spotlights: {}",
            self.point_lights, self.spot_lights
        )?;
        for warning in &self.warnings {
            write!(f, "\nWarning: {}", warning)?;
        }
        Ok(())
    }
}

/// Writes scenes as Kerkythea XML.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    /// Create an exporter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export to a file, then write the textures next to it.
    ///
    /// The model name is the file name up to its first `.`. Paths the
    /// renderer cannot read (non-ASCII) are rejected before the file is
    /// created. The document is flushed even when the export fails part
    /// way through.
    pub fn export_to_path(&self, scene: &Scene, path: impl AsRef<Path>) -> Result<ExportReport> {
        let path = path.as_ref();
        let model_name = model_name_for(path)?;
        let start = Instant::now();
        log::info!("Exporting {} to {}", model_name, path.display());

        let mut out = BufWriter::new(File::create(path)?);
        let written = self.write_document(scene, &mut out, &model_name);
        let flushed = out.flush();
        let (mut report, registry) = written?;
        flushed?;

        if self.options.copy_textures && !self.options.clay && !registry.is_empty() {
            let out_dir = path.parent().unwrap_or_else(|| Path::new("."));
            let written = textures::write_textures(registry.records(), out_dir);
            report.textures = written.written;
            report.warnings.extend(written.failures);
        }

        report.elapsed = start.elapsed();
        log::info!("Export of {} finished in {:.1}s", model_name, report.elapsed.as_secs_f64());
        Ok(report)
    }

    /// Export the scene document to a writer. Textures are not written.
    pub fn export_to_writer<W: Write>(&self, scene: &Scene, out: &mut W, model_name: &str) -> Result<ExportReport> {
        let start = Instant::now();
        let (mut report, _) = self.write_document(scene, out, model_name)?;
        out.flush()?;
        report.elapsed = start.elapsed();
        Ok(report)
    }

    fn write_document<'s, W: Write>(
        &self,
        scene: &'s Scene,
        out: &mut W,
        model_name: &str,
    ) -> Result<(ExportReport, TextureRegistry<'s>)> {
        let options = &self.options;
        let folder = format!("{}{}", options.textures_prefix, model_name);
        let mut ctx = ExportContext::new(scene, options.check_distortion, folder);
        let mut report = ExportReport {
            model_name: model_name.to_string(),
            ..Default::default()
        };

        match &options.render_settings {
            Some(settings_file) => {
                if let Err(e) = settings::write_custom_header(out, model_name, settings_file) {
                    log::warn!(
                        "Render settings {} not used: {}",
                        settings_file.display(),
                        e
                    );
                    report.warnings.push(e);
                    settings::write_header(out, model_name)?;
                }
            }
            None => settings::write_header(out, model_name)?,
        }

        let lights = find_lights(scene);
        report.sun_enabled = lights::sun_enabled(&lights, &scene.shadow_info);
        settings::write_sky(out, &scene.shadow_info, report.sun_enabled)?;

        if options.export_meshes {
            let stats = if options.instanced {
                self.write_instanced(out, &mut ctx)?
            } else {
                let buckets = ctx.collect_faces(&scene.entities, None, true);
                self.write_buckets(out, &buckets, &ctx)?
            };
            report.faces = ctx.face_count;
            report.triangles = stats.triangles;
        }

        report.cameras = camera::write_cameras(out, scene, options.resolution.as_deref(), options.scale)?;

        if options.export_lights {
            log::info!("Exporting lights");
            let counts = lights::write_lights(
                out,
                &lights,
                options.animation_time(),
                options.scale,
                &options.ies_directory,
            )?;
            report.point_lights = counts.point;
            report.spot_lights = counts.spot;
        }

        let bounds = scene_bounds(scene);
        lights::write_sun(out, &scene.shadow_info, bounds.as_ref(), report.sun_enabled, options.scale)?;
        settings::write_finish(out)?;

        Ok((report, ctx.textures))
    }

    fn write_buckets<W: Write>(
        &self,
        out: &mut W,
        buckets: &MaterialBuckets<'_>,
        ctx: &ExportContext<'_>,
    ) -> Result<MeshStats> {
        let settings = self.options.mesh_settings();
        let mut total = MeshStats::default();
        for bucket in buckets.in_export_order() {
            let stats = mesh::write_bucket(out, bucket, &ctx.textures, ctx.scene, &settings)?;
            total.points += stats.points;
            total.triangles += stats.triangles;
        }
        Ok(total)
    }

    /// One model per component aggregate, a placement package per
    /// aggregate, then the faces outside any component.
    fn write_instanced<W: Write>(&self, out: &mut W, ctx: &mut ExportContext<'_>) -> Result<MeshStats> {
        log::info!("Collecting components");
        let aggregates = ctx.collect_components();
        let mut total = MeshStats::default();

        for aggregate in aggregates.iter() {
            let name = aggregate.key.to_string();
            let escaped = escape(&name);
            writeln!(out, "<Object Identifier=\"./Instances/Model/{}\" Label=\"Default Model\" Name=\"{}\" Type=\"Model\">", escaped, escaped)?;
            let buckets = ctx.collect_faces(&aggregate.definition.entities, aggregate.material, false);
            let stats = self.write_buckets(out, &buckets, ctx)?;
            total.points += stats.points;
            total.triangles += stats.triangles;
            writeln!(out, "</Object>")?;
        }

        log::info!("Writing components");
        for aggregate in aggregates.iter() {
            let name = aggregate.key.to_string();
            let escaped = escape(&name);
            writeln!(out, "<Object Identifier=\"./Models/{}\" Label=\"Model Package\" Name=\"{}\" Type=\"Model\">", escaped, escaped)?;
            writeln!(out, "<Parameter Name=\"Alias\" Type=\"String\" Value=\"{}\"/>", escaped)?;
            writeln!(out, "<Parameter Name=\"Position\" Type=\"Transform List\" Value=\"{}\">", aggregate.transforms.len())?;
            for transform in &aggregate.transforms {
                writeln!(out, "<T r=\"{}\"/>", placement_matrix(transform, self.options.scale))?;
            }
            writeln!(out, "</Parameter>")?;
            writeln!(out, "</Object>")?;
        }

        let scene = ctx.scene;
        let buckets = ctx.collect_faces(&scene.entities, None, false);
        let stats = self.write_buckets(out, &buckets, ctx)?;
        total.points += stats.points;
        total.triangles += stats.triangles;
        Ok(total)
    }
}

/// Placement of one instance: three rows of rotation/scale plus the
/// translation in metres.
pub fn placement_matrix(transform: &Transform, scale: f64) -> String {
    let (x, y, z) = (transform.x_axis(), transform.y_axis(), transform.z_axis());
    let pos = transform.origin() * scale;
    let rows = [
        [x.x, y.x, z.x, pos.x],
        [x.y, y.y, z.y, pos.y],
        [x.z, y.z, z.z, pos.z],
    ];
    rows.iter()
        .flatten()
        .map(|v| fixed(*v, 6))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Model name for an output path: the file name up to its first `.`.
pub fn model_name_for(path: &Path) -> Result<String> {
    let display = path.to_string_lossy();
    if !display.is_ascii() {
        return Err(ExportError::UnsupportedInput(format!(
            "non-ASCII characters in output path {}",
            display
        )));
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ExportError::UnsupportedInput(format!("no file name in {}", display)))?;
    let model_name = file_name.split('.').next().unwrap_or_default();
    if model_name.is_empty() {
        return Err(ExportError::UnsupportedInput(format!("empty model name in {}", display)));
    }
    Ok(model_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::test_scenes::{three_panels, unit_square};
    use crate::scene::{Material, Texture};
    use crate::types::Color;

    fn export(scene: &Scene, options: ExportOptions) -> (String, ExportReport) {
        let mut out = Vec::new();
        let report = Exporter::with_options(options)
            .export_to_writer(scene, &mut out, "model")
            .unwrap();
        (String::from_utf8(out).unwrap(), report)
    }

    fn index_lines(xml: &str) -> Vec<&str> {
        xml.lines().filter(|l| l.trim_start().starts_with("<F ijk=")).map(str::trim).collect()
    }

    #[test]
    fn test_document_order() {
        let mut scene = Scene::new("square");
        scene.add_entity(unit_square());
        let (xml, report) = export(&scene, ExportOptions::default());

        let order = [
            "<Root Label=\"Default Kernel\"",
            "./Scenes/model",
            "Default Global Settings",
            "./Models/Front Face",
            "./Cameras/## Current View ##",
            "./Lights/Sun",
            "./Cameras/Active",
        ];
        let positions: Vec<usize> = order.iter().map(|s| xml.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(xml.ends_with("</Object>\n</Root>\n"));

        assert_eq!(report.cameras, 1);
        assert_eq!(report.faces, 1);
        assert_eq!(report.triangles, 2);
        assert!(report.sun_enabled);
    }

    #[test]
    fn test_three_panels_flat() {
        let scene = three_panels();
        let (xml, report) = export(&scene, ExportOptions::default());
        assert_eq!(xml.matches("<Object Identifier=\"./Models/").count(), 1);
        assert!(!xml.contains("Model Package"));
        assert_eq!(report.faces, 3);
        assert_eq!(
            index_lines(&xml),
            [
                "<F ijk=\"0 1 2\"/>",
                "<F ijk=\"0 2 3\"/>",
                "<F ijk=\"4 5 6\"/>",
                "<F ijk=\"4 6 7\"/>",
                "<F ijk=\"10 9 8\"/>",
                "<F ijk=\"11 10 8\"/>",
            ]
        );
    }

    #[test]
    fn test_three_panels_instanced() {
        let scene = three_panels();
        let (xml, report) = export(&scene, ExportOptions::default().instanced());

        assert_eq!(xml.matches("<Object Identifier=\"./Instances/Model/Panel\"").count(), 1);
        assert_eq!(xml.matches("Label=\"Model Package\"").count(), 1);
        assert!(xml.contains("<Parameter Name=\"Alias\" Type=\"String\" Value=\"Panel\"/>"));
        assert!(xml.contains("<Parameter Name=\"Position\" Type=\"Transform List\" Value=\"3\">"));
        assert_eq!(xml.matches("<T r=").count(), 3);
        assert!(xml.contains(
            "<T r=\"-1.000000 0.000000 0.000000 0.000000 0.000000 1.000000 0.000000 0.000000 0.000000 0.000000 1.000000 0.000000\"/>"
        ));
        // Geometry is written once, inside the definition
        assert_eq!(index_lines(&xml), ["<F ijk=\"0 1 2\"/>", "<F ijk=\"0 2 3\"/>"]);
        assert_eq!(report.triangles, 2);
    }

    #[test]
    fn test_instanced_material_suffix() {
        let mut scene = three_panels();
        scene.add_material("Red", Material::colored(Color::new(255, 0, 0)));
        scene.add_entity(crate::scene::ComponentInstance::new("Panel").with_material("Red"));
        let (xml, _) = export(&scene, ExportOptions::default().instanced());
        assert!(xml.contains("<Object Identifier=\"./Instances/Model/Panel_mat:Red\""));
        // The inherited material names the definition's bucket
        assert!(xml.contains("<Object Identifier=\"./Models/Red\" Label=\"Default Model\""));
    }

    #[test]
    fn test_meshes_and_lights_can_be_disabled() {
        let mut scene = three_panels();
        scene.add_definition("su2kt_pointlight", Default::default());
        scene.add_entity(crate::scene::ComponentInstance::new("su2kt_pointlight"));
        let options = ExportOptions {
            export_meshes: false,
            export_lights: false,
            ..Default::default()
        };
        let (xml, report) = export(&scene, options);
        assert!(!xml.contains("Triangular Mesh"));
        assert!(!xml.contains("./Lights/Pointlight"));
        assert!(xml.contains("./Lights/Sun"));
        assert!(!report.sun_enabled);
        assert_eq!(report.point_lights, 0);
    }

    #[test]
    fn test_unreadable_render_settings_fall_back() {
        let mut scene = Scene::new("square");
        scene.add_entity(unit_square());
        let options = ExportOptions {
            render_settings: Some(PathBuf::from("/nonexistent/settings.xml")),
            ..Default::default()
        };
        let (xml, report) = export(&scene, options);
        assert!(xml.contains("Standard Ray Tracer"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_placement_matrix() {
        let t = Transform::from_translation(glam::DVec3::new(100.0, 0.0, -10.0));
        assert_eq!(
            placement_matrix(&t, 0.0254),
            "1.000000 0.000000 0.000000 2.540000 0.000000 1.000000 0.000000 0.000000 0.000000 0.000000 1.000000 -0.254000"
        );
    }

    #[test]
    fn test_model_name() {
        assert_eq!(model_name_for(Path::new("/tmp/house.v2.xml")).unwrap(), "house");
        assert!(matches!(
            model_name_for(Path::new("/tmp/maison_été.xml")),
            Err(ExportError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_non_ascii_path_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("café.xml");
        let result = Exporter::new().export_to_path(&Scene::new("x"), &path);
        assert!(matches!(result, Err(ExportError::UnsupportedInput(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_export_to_path_writes_textures() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("oak.jpg");
        std::fs::write(&source, b"jpeg bytes").unwrap();

        let mut texture = Texture::new("oak.jpg", 1.0, 1.0);
        texture.source = Some(source);
        let mut scene = Scene::new("room");
        scene.add_material("Oak", Material::textured(texture));
        scene.add_entity(unit_square().with_material("Oak"));

        let path = dir.path().join("room.xml");
        let report = Exporter::new().export_to_path(&scene, &path).unwrap();
        assert_eq!(report.model_name, "room");
        assert_eq!(report.textures, 1);
        assert!(report.warnings.is_empty());

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("TX_room/Oak.jpg"));
        assert!(dir.path().join("TX_room/Oak.jpg").exists());

        let clay = Exporter::with_options(ExportOptions::default().clay());
        let path = dir.path().join("clay.xml");
        let report = clay.export_to_path(&scene, &path).unwrap();
        assert_eq!(report.textures, 0);
        assert!(!dir.path().join("TX_clay").exists());
    }
}
