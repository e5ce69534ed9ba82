//! Material blocks written inside each exported model.

use super::xml::{escape, real, rgb};
use crate::collect::{BucketKey, Emitter, MaterialBucket, ShadingModel, TextureRecord, TextureRegistry};
use crate::error::Result;
use crate::scene::{MaterialRef, Scene};
use crate::types::Color;
use std::io::Write;

/// Default UV projection parameters for bitmap textures.
pub const DEFAULT_PROJECTION: &str = "<Parameter Name=\"Projection\" Type=\"String\" Value=\"UV\"/>\n\
<Parameter Name=\"Offset X\" Type=\"Real\" Value=\"0\"/>\n\
<Parameter Name=\"Offset Y\" Type=\"Real\" Value=\"0\"/>\n\
<Parameter Name=\"Scale X\" Type=\"Real\" Value=\"1\"/>\n\
<Parameter Name=\"Scale Y\" Type=\"Real\" Value=\"1\"/>\n\
<Parameter Name=\"Rotation\" Type=\"Real\" Value=\"0\"/>\n";

/// What a bucket's material is made of.
pub struct MaterialSource<'a, 's> {
    /// Scene material the bucket stands for (the texture's source
    /// material for textured buckets), `None` for the default.
    pub material: Option<MaterialRef<'s>>,
    /// Texture record of a textured bucket.
    pub texture: Option<&'a TextureRecord<'s>>,
}

impl<'a, 's> MaterialSource<'a, 's> {
    pub fn for_bucket(bucket: &MaterialBucket<'s>, registry: &'a TextureRegistry<'s>) -> Self {
        let texture = match &bucket.key {
            BucketKey::Textured(key) => registry.get(key),
            _ => None,
        };
        if let (BucketKey::Textured(key), None) = (&bucket.key, texture) {
            log::warn!("No texture record for '{}', exporting untextured", key);
        }
        Self {
            material: texture.map(|t| t.material).or(bucket.material),
            texture,
        }
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}

/// Write the material block for a bucket.
pub fn write_material<W: Write>(
    out: &mut W,
    source: &MaterialSource<'_, '_>,
    scene: &Scene,
    clay: bool,
) -> Result<()> {
    match ShadingModel::select(source.material, clay) {
        ShadingModel::Library => {
            let kt_mat = source
                .material
                .and_then(|m| m.material.attributes.kt_mat.as_deref())
                .unwrap_or_default();
            writeln!(out, "{}", kt_mat)?;
            let textured = source.material.is_some_and(|m| m.material.has_texture());
            if textured && !kt_mat.contains("Parameter Name=\"Filename\"") {
                if let Some(record) = source.texture {
                    write_bump(out, record)?;
                }
            }
        }
        ShadingModel::ThinGlass => write_thin_glass(out, source)?,
        ShadingModel::Whitted => write_whitted(out, source, scene)?,
        ShadingModel::Clay => write_clay(out)?,
    }
    Ok(())
}

fn write_whitted<W: Write>(out: &mut W, source: &MaterialSource<'_, '_>, scene: &Scene) -> Result<()> {
    writeln!(out, "<Object Identifier=\"Whitted Material\" Label=\"Whitted Material\" Name=\"\" Type=\"Material\">")?;

    if let Some(record) = source.texture {
        writeln!(out, "\t<Object Identifier=\"./Diffuse/Weighted Texture\" Label=\"Weighted Texture\" Name=\"\" Type=\"Texture\">")?;
        writeln!(out, "\t\t<Object Identifier=\"Bitmap Texture\" Label=\"Bitmap Texture\" Name=\"\" Type=\"Texture\">")?;
        writeln!(out, "\t\t<Parameter Name=\"Filename\" Type=\"String\" Value=\"{}\"/>", escape(&record.file_name))?;
        writeln!(out, "\t\t<Parameter Name=\"Projection\" Type=\"String\" Value=\"UV\"/>")?;
        writeln!(out, "\t\t</Object>")?;
        writeln!(out, "\t<Parameter Name=\"Bitmap Texture:Weight\" Type=\"Real\" Value=\"1\"/>")?;
        writeln!(out, "</Object>")?;
    } else {
        let color = match source.material {
            Some(m) if !m.material.has_texture() => {
                if starts_with_ignore_case(m.name, "EMITFAKE") {
                    Color::WHITE
                } else {
                    hsb_round_trip(m.material.color)
                }
            }
            _ => hsb_round_trip(scene.rendering_options.face_front_color),
        };
        writeln!(out, "\t<Object Identifier=\"./Diffuse/Constant Texture\" Label=\"Constant Texture\" Name=\"\" Type=\"Texture\">")?;
        writeln!(out, "\t\t<Parameter Name=\"Color\" Type=\"RGB\" Value=\"{}\"/>", rgb(color.unit()))?;
        writeln!(out, "</Object>")?;
    }

    if let Some(m) = source.material.filter(|m| m.material.use_alpha) {
        let transmitted = 1.0 - m.material.alpha;
        writeln!(out, "<Object Identifier=\"./Refraction/Constant Texture\" Label=\"Constant Texture\" Name=\"\" Type=\"Texture\">")?;
        writeln!(out, "\t<Parameter Name=\"Color\" Type=\"RGB\" Value=\"{}\"/>", rgb([transmitted; 3]))?;
        writeln!(out, "</Object>")?;
    }

    if source.is_textured() {
        writeln!(out, "\t<Parameter Name=\"Smooth\" Type=\"Boolean\" Value=\"1\"/>")?;
        writeln!(out, "\t<Parameter Name=\"Inverted\" Type=\"Boolean\" Value=\"0\"/>")?;
    }

    writeln!(out, "\t<Parameter Name=\"Shininess\" Type=\"Real\" Value=\"128\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Transmitted Shininess\" Type=\"Real\" Value=\"128\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Index of Refraction\" Type=\"Real\" Value=\"1\"/>")?;
    write_sampling_params(out)?;
    writeln!(out, "\t</Object>")?;

    if let Some(record) = source.texture {
        write_clip_map(out, record)?;
    }

    if let Some(m) = source.material {
        for emitter in Emitter::from_name(m.name) {
            write_emitter(out, &emitter, m.material.color)?;
        }
    }
    Ok(())
}

fn write_sampling_params<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "\t<Parameter Name=\"Specular Sampling\" Type=\"Boolean\" Value=\"0\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Transmitted Sampling\" Type=\"Boolean\" Value=\"0\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Specular Attenuation\" Type=\"String\" Value=\"Fresnel\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Transmitted Attenuation\" Type=\"String\" Value=\"Fresnel\"/>")?;
    Ok(())
}

fn write_thin_glass<W: Write>(out: &mut W, source: &MaterialSource<'_, '_>) -> Result<()> {
    writeln!(out, "<Object Identifier=\"Thin Glass Material\" Label=\"Thin Glass Material\" Name=\"\" Type=\"Material\">")?;
    match source.texture {
        None => {
            let (color, alpha) = source
                .material
                .map_or((Color::WHITE, 1.0), |m| (m.material.color, m.material.alpha));
            let [h, s, v] = color.to_hsb();
            let tinted = Color::from_hsb(h, s * alpha, v);
            writeln!(out, "\t<Object Identifier=\"./Reflectance/Constant Texture\" Label=\"Constant Texture\" Name=\"\" Type=\"Texture\">")?;
            writeln!(out, "\t<Parameter Name=\"Color\" Type=\"RGB\" Value=\"{}\"/>", rgb(tinted.unit()))?;
        }
        Some(record) => {
            writeln!(out, "\t<Object Identifier=\"./Reflectance/Bitmap Texture\" Label=\"Bitmap Texture\" Name=\"\" Type=\"Texture\">")?;
            writeln!(out, "\t<Parameter Name=\"Filename\" Type=\"String\" Value=\"{}\"/>", escape(&record.file_name))?;
            write!(out, "{}", DEFAULT_PROJECTION)?;
            writeln!(out, "\t<Parameter Name=\"Smooth\" Type=\"Boolean\" Value=\"1\"/>")?;
            writeln!(out, "\t<Parameter Name=\"Inverted\" Type=\"Boolean\" Value=\"0\"/>")?;
        }
    }
    writeln!(out, "\t</Object>")?;
    writeln!(out, "\t<Parameter Name=\"Index of Refraction\" Type=\"Real\" Value=\"1.52\"/>")?;
    if let Some(record) = source.texture {
        write_clip_map(out, record)?;
    }
    writeln!(out, "</Object>")?;
    Ok(())
}

/// Flat material used for every face when exporting a clay render.
pub fn write_clay<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "<Object Identifier=\"Whitted Material\" Label=\"Whitted Material\" Name=\"Clay\" Type=\"Material\">")?;
    writeln!(out, "\t<Object Identifier=\"./Ambient/Null Texture\" Label=\"Null Texture\" Name=\"\" Type=\"Texture\">")?;
    writeln!(out, "\t</Object>")?;
    writeln!(out, "\t<Object Identifier=\"./Diffuse/Constant Texture\" Label=\"Constant Texture\" Name=\"\" Type=\"Texture\">")?;
    writeln!(out, "\t<Parameter Name=\"Color\" Type=\"RGB\" Value=\"0.85 0.85 0.76\"/>")?;
    writeln!(out, "\t</Object>")?;
    writeln!(out, "\t<Parameter Name=\"Shininess\" Type=\"Real\" Value=\"128\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Transmitted Shininess\" Type=\"Real\" Value=\"128\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Index of Refraction\" Type=\"Real\" Value=\"3\"/>")?;
    write_sampling_params(out)?;
    writeln!(out, "</Object>")?;
    Ok(())
}

fn write_bump<W: Write>(out: &mut W, record: &TextureRecord<'_>) -> Result<()> {
    writeln!(out, "<Object Identifier=\"Bump Mapping\" Label=\"Bump Mapping\" Name=\"\" Type=\"Intersection Modifier\">")?;
    writeln!(out, "<Object Identifier=\"./Texture/Weighted Texture\" Label=\"Weighted Texture\" Name=\"\" Type=\"Texture\">")?;
    writeln!(out, "<Object Identifier=\"Bitmap Texture\" Label=\"Bitmap Texture\" Name=\"\" Type=\"Texture\">")?;
    writeln!(out, "<Parameter Name=\"Filename\" Type=\"String\" Value=\"{}\"/>", escape(&record.file_name))?;
    write!(out, "{}", DEFAULT_PROJECTION)?;
    writeln!(out, "<Parameter Name=\"Smooth\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "<Parameter Name=\"Inverted\" Type=\"Boolean\" Value=\"0\"/>")?;
    writeln!(out, "</Object>")?;
    writeln!(out, "<Parameter Name=\"Bitmap Texture:Weight\" Type=\"Real\" Value=\"1\"/>")?;
    writeln!(out, "</Object>")?;
    writeln!(out, "<Parameter Name=\"Strength\" Type=\"Real\" Value=\"5\"/>")?;
    writeln!(out, "</Object>")?;
    Ok(())
}

/// Alpha clipping for bitmaps that can carry transparency (PNG, TIF).
fn write_clip_map<W: Write>(out: &mut W, record: &TextureRecord<'_>) -> Result<()> {
    let ext = record
        .file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if ext != "PNG" && ext != "TIF" {
        return Ok(());
    }
    writeln!(out, "<Object Identifier=\"Alpha Mapping\" Label=\"Alpha Mapping\" Name=\"\" Type=\"Acceptance Modifier\">")?;
    writeln!(out, "\t<Object Identifier=\"./Texture/Bitmap Texture\" Label=\"Bitmap Texture\" Name=\"\" Type=\"Texture\">")?;
    writeln!(out, "\t<Parameter Name=\"Filename\" Type=\"String\" Value=\"{}\"/>", escape(&record.file_name))?;
    write!(out, "{}", DEFAULT_PROJECTION)?;
    writeln!(out, "\t<Parameter Name=\"Smooth\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Inverted\" Type=\"Boolean\" Value=\"0\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Alpha Channel\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "\t</Object>")?;
    writeln!(out, "<Parameter Name=\"Threshold\" Type=\"Real\" Value=\"0.5\"/>")?;
    writeln!(out, "</Object>")?;
    Ok(())
}

fn write_emitter<W: Write>(out: &mut W, emitter: &Emitter, color: Color) -> Result<()> {
    writeln!(out, "<Object Identifier=\"Diffuse Light\" Label=\"Diffuse Light\" Name=\"\" Type=\"Emittance\">")?;
    writeln!(out, "\t<Object Identifier=\"./Radiance/Constant Texture\" Label=\"Constant Texture\" Name=\"\" Type=\"Texture\">")?;
    writeln!(out, "\t<Parameter Name=\"Color\" Type=\"RGB\" Value=\"{}\"/>", rgb(color.unit()))?;
    writeln!(out, "\t</Object>")?;
    writeln!(out, "\t<Parameter Name=\"Attenuation\" Type=\"String\" Value=\"Inverse Square\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Emitter\" Type=\"Boolean\" Value=\"{}\"/>", u8::from(emitter.emits))?;
    writeln!(out, "\t<Parameter Name=\"Front Side\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Back Side\" Type=\"Boolean\" Value=\"0\"/>")?;
    writeln!(out, "<Parameter Name=\"Power\" Type=\"Real\" Value=\"{}\"/>", real(emitter.power))?;
    writeln!(out, "<Parameter Name=\"Efficiency\" Type=\"Real\" Value=\"1\"/>")?;
    writeln!(out, "<Parameter Name=\"Unit\" Type=\"String\" Value=\"Watts/sr/m2\"/>")?;
    writeln!(out, "</Object>")?;
    Ok(())
}

fn hsb_round_trip(color: Color) -> Color {
    let [h, s, v] = color.to_hsb();
    Color::from_hsb(h, s, v)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::ExportContext;
    use crate::collect::test_scenes::unit_square;
    use crate::scene::{Material, MaterialAttributes, Texture};

    fn render(scene: &Scene, clay: bool) -> String {
        let mut ctx = ExportContext::new(scene, false, "TX_m");
        let buckets = ctx.collect_faces(&scene.entities, None, true);
        let bucket = buckets.in_export_order().next().unwrap();
        let source = MaterialSource::for_bucket(bucket, &ctx.textures);
        let mut out = Vec::new();
        write_material(&mut out, &source, scene, clay).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn single(name: &str, material: Material) -> Scene {
        let mut scene = Scene::new("m");
        scene.add_material(name, material);
        scene.add_entity(unit_square().with_material(name));
        scene
    }

    #[test]
    fn test_constant_color() {
        let xml = render(&single("Red", Material::colored(Color::new(255, 0, 0))), false);
        assert!(xml.starts_with("<Object Identifier=\"Whitted Material\""));
        assert!(xml.contains("Value=\"1.0 0.0 0.0\""));
        assert!(!xml.contains("Refraction"));
        assert!(!xml.contains("Diffuse Light"));
    }

    #[test]
    fn test_default_material_uses_face_front_color() {
        let mut scene = Scene::new("m");
        scene.rendering_options.face_front_color = Color::new(0, 0, 255);
        scene.add_entity(unit_square());
        let xml = render(&scene, false);
        assert!(xml.contains("Value=\"0.0 0.0 1.0\""));
    }

    #[test]
    fn test_bitmap_with_clip_map() {
        let xml = render(&single("Leaf", Material::textured(Texture::new("leaf.png", 1.0, 1.0))), false);
        assert!(xml.contains("Value=\"TX_m/Leaf.png\""));
        assert!(xml.contains("Weighted Texture"));
        assert!(xml.contains("Alpha Mapping"));

        let xml = render(&single("Oak", Material::textured(Texture::new("oak.jpg", 1.0, 1.0))), false);
        assert!(!xml.contains("Alpha Mapping"));
    }

    #[test]
    fn test_refraction_from_alpha() {
        let mut glass = Material::colored(Color::new(200, 200, 255));
        glass.use_alpha = true;
        glass.alpha = 0.25;
        let xml = render(&single("Glassy", glass), false);
        assert!(xml.contains("./Refraction/Constant Texture"));
        assert!(xml.contains("Value=\"0.75 0.75 0.75\""));
    }

    #[test]
    fn test_thin_glass() {
        let xml = render(&single("TG_Window", Material::colored(Color::new(100, 150, 200))), false);
        assert!(xml.starts_with("<Object Identifier=\"Thin Glass Material\""));
        assert!(xml.contains("Value=\"1.52\""));
    }

    #[test]
    fn test_clay_overrides_everything() {
        let xml = render(&single("TG_Window", Material::default()), true);
        assert!(xml.contains("Name=\"Clay\""));
        assert!(xml.contains("0.85 0.85 0.76"));
    }

    #[test]
    fn test_emitters() {
        let xml = render(&single("Lamp Emit[8]", Material::colored(Color::new(255, 255, 0))), false);
        assert!(xml.contains("Diffuse Light"));
        assert!(xml.contains("<Parameter Name=\"Power\" Type=\"Real\" Value=\"8.0\"/>"));
        assert!(xml.contains("<Parameter Name=\"Emitter\" Type=\"Boolean\" Value=\"1\"/>"));

        let xml = render(&single("EmitFake", Material::colored(Color::new(10, 10, 10))), false);
        assert!(xml.contains("Value=\"1.0 1.0 1.0\""));
        assert!(xml.contains("<Parameter Name=\"Emitter\" Type=\"Boolean\" Value=\"0\"/>"));
    }

    #[test]
    fn test_library_material_with_bump() {
        let mut material = Material::textured(Texture::new("stone.jpg", 1.0, 1.0));
        material.attributes = MaterialAttributes {
            kt_mat: Some("<Object Identifier=\"Stone\"/>".to_string()),
            ..Default::default()
        };
        let xml = render(&single("Stone", material), false);
        assert!(xml.starts_with("<Object Identifier=\"Stone\"/>\n"));
        assert!(xml.contains("Bump Mapping"));
        assert!(xml.contains("TX_m/Stone.jpg"));
    }
}
