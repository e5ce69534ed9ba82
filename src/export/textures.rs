//! Deferred texture writer.
//!
//! Runs after the scene document is closed. Each registry record becomes
//! one file under the texture folder next to the scene file.

use crate::collect::TextureRecord;
use crate::error::{ExportError, Result};
use image::ImageEncoder;
use std::path::{Path, PathBuf};

/// Outcome of writing the registry's textures.
#[derive(Debug, Default)]
pub struct TextureWriteReport {
    pub written: usize,
    /// One entry per texture that could not be written.
    pub failures: Vec<ExportError>,
}

/// Write every record's bitmap below `out_dir`. Individual failures are
/// collected rather than aborting the remaining textures.
pub fn write_textures(records: &[TextureRecord<'_>], out_dir: &Path) -> TextureWriteReport {
    let mut report = TextureWriteReport::default();

    for record in records {
        let target = out_dir.join(&record.file_name);
        match write_texture(record, &target) {
            Ok(()) => {
                log::debug!("Wrote texture {}", target.display());
                report.written += 1;
            }
            Err(e) => {
                log::warn!("Texture {} not written: {}", record.key, e);
                report.failures.push(ExportError::TextureWrite {
                    path: target,
                    message: e.to_string(),
                });
            }
        }
    }

    log::info!("Exported {} textures", report.written);
    report
}

fn write_texture(record: &TextureRecord<'_>, target: &Path) -> Result<()> {
    let source = record
        .texture()
        .and_then(|t| t.source.as_ref())
        .ok_or_else(|| ExportError::TextureWrite {
            path: PathBuf::from(&record.file_name),
            message: format!("material {} has no texture source file", record.material.name),
        })?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if needs_png_conversion(target) {
        let bytes = std::fs::read(source)?;
        let png = reencode_png(&bytes)?;
        std::fs::write(target, png)?;
    } else {
        std::fs::copy(source, target)?;
    }
    Ok(())
}

/// Legacy formats are exported under a `.png` name.
fn needs_png_conversion(target: &Path) -> bool {
    target
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// Decode any supported bitmap and encode it as RGBA8 PNG.
pub fn reencode_png(data: &[u8]) -> Result<Vec<u8>> {
    let rgba = image::load_from_memory(data)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut bytes));
    encoder.write_image(rgba.as_raw(), width, height, image::ExtendedColorType::Rgba8)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::test_scenes::unit_square;
    use crate::collect::ExportContext;
    use crate::scene::{Material, Scene, Texture};
    use image::{ImageFormat, Rgb, RgbImage};

    fn textured_scene(name: &str, source: PathBuf) -> Scene {
        let mut texture = Texture::new(name, 1.0, 1.0);
        texture.source = Some(source);
        let mut scene = Scene::new("model");
        scene.add_material("Brick", Material::textured(texture));
        scene.add_entity(unit_square().with_material("Brick"));
        scene
    }

    fn export_textures(scene: &Scene, out_dir: &Path) -> TextureWriteReport {
        let mut ctx = ExportContext::new(scene, false, "TX_model");
        ctx.collect_faces(&scene.entities, None, true);
        write_textures(ctx.textures.records(), out_dir)
    }

    #[test]
    fn test_bmp_is_reencoded_as_rgba_png() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("brick.bmp");
        RgbImage::from_pixel(2, 2, Rgb([200, 10, 10]))
            .save_with_format(&source, ImageFormat::Bmp)
            .unwrap();

        let scene = textured_scene("brick.bmp", source);
        let out_dir = dir.path().join("out");
        let report = export_textures(&scene, &out_dir);
        assert_eq!(report.written, 1);
        assert!(report.failures.is_empty());

        let written = image::open(out_dir.join("TX_model/Brick.png")).unwrap();
        assert_eq!(written.color(), image::ColorType::Rgba8);
        assert_eq!(written.to_rgba8().get_pixel(1, 1).0, [200, 10, 10, 255]);
    }

    #[test]
    fn test_other_formats_are_copied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("brick.jpg");
        std::fs::write(&source, b"not really a jpeg").unwrap();

        let scene = textured_scene("brick.jpg", source);
        let report = export_textures(&scene, dir.path());
        assert_eq!(report.written, 1);
        let copied = std::fs::read(dir.path().join("TX_model/Brick.jpg")).unwrap();
        assert_eq!(copied, b"not really a jpeg");
    }

    #[test]
    fn test_missing_source_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let scene = textured_scene("brick.jpg", dir.path().join("missing.jpg"));
        let report = export_textures(&scene, dir.path());
        assert_eq!(report.written, 0);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], ExportError::TextureWrite { .. }));
    }
}
