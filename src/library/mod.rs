//! Kerkythea material libraries.
//!
//! A library is an XML file of model objects, each carrying one material.
//! Materials are copied into scene materials verbatim: the material object
//! becomes the material block written for every face using it, and the
//! parameters after the model's map channel become the mesh tail.

pub mod loader;

use crate::error::{ExportError, Result};
use crate::export::material::DEFAULT_PROJECTION;
use crate::scene::{Material, Scene, Texture};
use crate::types::Color;
use std::path::{Path, PathBuf};

/// Texture size given to library bitmaps when the scene material has none.
const DEFAULT_TEXTURE_SIZE: f64 = 60.0;

/// Lowest opacity a library material is given.
const MIN_ALPHA: f64 = 0.2;

/// All loaded library files, searched in load order.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    pub files: Vec<LibraryFile>,
}

/// One library XML file.
#[derive(Debug, Clone)]
pub struct LibraryFile {
    /// Path or archive entry name.
    pub name: String,
    /// Folder the library's bitmaps are looked up in.
    pub directory: String,
    pub contents: String,
}

impl LibraryFile {
    pub fn new(name: impl Into<String>, directory: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            contents: contents.into(),
        }
    }
}

/// Bitmap roles inside a library material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Diffuse,
    Bump,
    Specular,
    Reflection,
    Refraction,
    Luminance,
}

impl TextureKind {
    /// Role announced by an object line, if any.
    fn from_line(line: &str) -> Option<TextureKind> {
        const ROLES: [(&str, TextureKind); 6] = [
            ("Object Identifier=\"./Diffuse", TextureKind::Diffuse),
            ("Object Identifier=\"Bump Mapping", TextureKind::Bump),
            ("Object Identifier=\"./Specular", TextureKind::Specular),
            ("Object Identifier=\"./Reflection", TextureKind::Reflection),
            ("Object Identifier=\"./Refraction", TextureKind::Refraction),
            ("Object Identifier=\"./Radiance", TextureKind::Luminance),
        ];
        ROLES
            .iter()
            .find(|(marker, _)| line.contains(marker))
            .map(|(_, kind)| *kind)
    }

    pub fn code(&self) -> &'static str {
        match self {
            TextureKind::Diffuse => "DIFF",
            TextureKind::Bump => "BUMP",
            TextureKind::Specular => "SPEC",
            TextureKind::Reflection => "REFL",
            TextureKind::Refraction => "REFR",
            TextureKind::Luminance => "LUMI",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryTexture {
    /// Bitmap path inside the library's folder.
    pub path: String,
    pub kind: Option<TextureKind>,
}

/// A material extracted from a library.
#[derive(Debug, Clone)]
pub struct LibraryMaterial {
    pub name: String,
    /// Library file it came from.
    pub library: String,
    /// Material object, with projections reset to plain UV.
    pub body: String,
    /// Model parameters following the map channel.
    pub map: String,
    /// Average colour of the diffuse, refraction, ambient, reflection and
    /// reflectance constants.
    pub color: Option<Color>,
    /// Strongest reflection channel, 0-255.
    pub alpha: Option<u8>,
    pub textures: Vec<LibraryTexture>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every library in a directory tree or ZIP archive.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn add_file(&mut self, file: LibraryFile) {
        self.files.push(file);
    }

    /// Names of all materials, in library order.
    pub fn names(&self) -> Vec<String> {
        self.files
            .iter()
            .flat_map(|file| file.contents.lines())
            .filter(|line| line.contains("Type=\"Material\""))
            .filter_map(|line| xml_value("Name", line))
            .map(str::to_string)
            .collect()
    }

    /// Extract a material by name from the first library defining it.
    pub fn find(&self, name: &str) -> Result<LibraryMaterial> {
        for file in &self.files {
            if let Some(material) = extract(file, name)? {
                return Ok(material);
            }
        }
        Err(ExportError::MaterialNotFound(name.to_string()))
    }

    /// Copy a library material onto the scene material `scene_material`,
    /// creating a plain material of that name first if needed.
    pub fn attach_to_scene(&self, scene: &mut Scene, scene_material: &str, library_material: &str) -> Result<()> {
        let found = self.find(library_material)?;
        let material = scene
            .materials
            .entry(scene_material.to_string())
            .or_default();
        found.attach(material);
        log::info!("Attached library material {} to {}", library_material, scene_material);
        Ok(())
    }
}

impl LibraryMaterial {
    /// Store this material on a scene material: the verbatim blocks, its
    /// colour, opacity and main bitmap.
    pub fn attach(&self, material: &mut Material) {
        material.attributes.kt_mat = Some(self.body.clone());
        material.attributes.kt_map = Some(self.map.clone());
        material.attributes.kt_name = Some(self.name.clone());

        let main = self
            .textures
            .iter()
            .find(|t| t.kind == Some(TextureKind::Diffuse))
            .or_else(|| self.textures.first());
        material.texture = main.map(|t| {
            let size = material
                .texture
                .as_ref()
                .map_or(DEFAULT_TEXTURE_SIZE, |existing| existing.height);
            let mut texture = Texture::new(file_name(&t.path), size, size);
            texture.source = Some(PathBuf::from(&t.path));
            texture
        });

        if let Some(color) = self.color {
            material.color = color;
        }

        match self.alpha {
            Some(a) => {
                material.alpha = (1.0 - f64::from(a) / 255.0).max(MIN_ALPHA);
                material.use_alpha = material.alpha < 1.0;
            }
            None if material.texture.is_none() => {
                material.alpha = 1.0;
                material.use_alpha = false;
            }
            None => {}
        }
    }
}

fn is_material_line(line: &str, name: &str) -> bool {
    let named = line.contains(&format!("Name=\"{}\"", name)) && line.contains("Type=\"Material\"");
    named || (name == "Sky Portal" && line.contains("Object Identifier=\"Sky Portal Light\""))
}

/// Extract `name` from one library file. `Ok(None)` when the file does
/// not define it.
fn extract(file: &LibraryFile, name: &str) -> Result<Option<LibraryMaterial>> {
    let mut lines = file.contents.lines();
    let Some(first) = lines.by_ref().find(|line| is_material_line(line, name)) else {
        return Ok(None);
    };

    let mut body = vec![first.to_string()];
    let mut map = Vec::new();
    let mut in_map = false;
    // The material object and the model around it
    let mut depth = 2;
    let mut objects: Vec<String> = Vec::new();
    let mut color = ChannelMix::default();
    let mut textures = Vec::new();
    let mut kind = None;

    while depth != 0 {
        let mut line = lines.next().ok_or_else(|| unterminated(file, name))?.to_string();
        let trimmed = line.trim_start();

        if trimmed.starts_with("<Object") {
            depth += 1;
            objects.push(xml_value("Identifier", &line).unwrap_or_default().to_string());
        }
        if trimmed.starts_with("</Object>") {
            depth -= 1;
            objects.pop();
        }

        if kind.is_none() {
            kind = TextureKind::from_line(&line);
        }

        if let Some(object) = objects.last() {
            let mixes_alpha = object.contains("Reflection") || object.contains("Reflectance");
            let mixes_color = mixes_alpha
                || object.contains("Diffuse")
                || object.contains("Refraction")
                || object.contains("Ambient");
            if mixes_color {
                if let Some(channels) = rgb_parameter(&line) {
                    color.mix_color(&channels);
                    if mixes_alpha {
                        color.mix_alpha(&channels);
                    }
                }
            }
        }

        if line.contains("Parameter Name=\"Filename\"") {
            let (rewritten, path) = relocate_filename(&line, &file.directory);
            textures.push(LibraryTexture {
                path,
                kind: kind.take(),
            });
            line = rewritten;
        }

        if line.contains("Parameter Name=\"Projection\" Type=\"String\"") {
            // Projection and its five parameters
            for _ in 0..5 {
                lines.next();
            }
            body.push(DEFAULT_PROJECTION.trim_end().to_string());
            line = lines.next().ok_or_else(|| unterminated(file, name))?.to_string();
        }

        if line.contains("Parameter Name=\"Map Channel\"") {
            lines.next();
            in_map = true;
        } else if depth != 0 {
            if in_map {
                map.push(line);
            } else {
                body.push(line);
            }
        }
    }

    log::debug!("Extracted material {} from {}", name, file.name);
    Ok(Some(LibraryMaterial {
        name: name.to_string(),
        library: file.name.clone(),
        body: body.join("\n"),
        map: map.join("\n"),
        color: color.color(),
        alpha: color.alpha(),
        textures,
    }))
}

fn unterminated(file: &LibraryFile, name: &str) -> ExportError {
    ExportError::MaterialLibrary(format!("material {} in {} is not terminated", name, file.name))
}

/// Running average of material colour channels, in 0-255.
#[derive(Debug, Default)]
struct ChannelMix {
    color: Option<[i32; 3]>,
    alpha: Option<i32>,
}

impl ChannelMix {
    fn mix_color(&mut self, channels: &[i32; 3]) {
        self.color = Some(match self.color {
            Some(current) => [0, 1, 2].map(|i| (current[i] + channels[i]) / 2),
            None => *channels,
        });
    }

    fn mix_alpha(&mut self, channels: &[i32; 3]) {
        let strongest = channels.iter().copied().max().unwrap_or(0);
        self.alpha = Some(match self.alpha {
            Some(current) => (current + strongest) / 2,
            None => strongest,
        });
    }

    fn color(&self) -> Option<Color> {
        self.color.map(|[r, g, b]| Color::new(to_channel(r), to_channel(g), to_channel(b)))
    }

    fn alpha(&self) -> Option<u8> {
        self.alpha.map(to_channel)
    }
}

fn to_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Channels of a `Color` RGB parameter line, scaled to 0-255.
fn rgb_parameter(line: &str) -> Option<[i32; 3]> {
    if xml_value("Name", line) != Some("Color") || xml_value("Type", line) != Some("RGB") {
        return None;
    }
    let mut values = xml_value("Value", line)?
        .split_whitespace()
        .map(|v| (v.parse::<f64>().unwrap_or(0.0) * 255.0) as i32);
    Some([values.next()?, values.next()?, values.next()?])
}

/// Point a `Filename` parameter at the library folder. Returns the new
/// line and the bitmap path.
fn relocate_filename(line: &str, directory: &str) -> (String, String) {
    let mut parts: Vec<String> = line.split('"').map(str::to_string).collect();
    let Some(slot) = parts.len().checked_sub(2) else {
        return (line.to_string(), String::new());
    };
    let base = file_name(&parts[slot]).to_string();
    let path = if directory.is_empty() {
        base
    } else {
        format!("{}/{}", directory, base)
    };
    parts[slot] = path.clone();
    (parts.join("\""), path)
}

/// Last component of a path written with either separator.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Value of the first `key="..."` attribute on a line.
fn xml_value<'a>(key: &str, line: &'a str) -> Option<&'a str> {
    let start = line.find(key)?;
    let open = start + line[start..].find('"')? + 1;
    let close = open + line[open..].find('"')?;
    Some(&line[open..close])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_LIBRARY: &str = r#"<Root Label="Default Kernel" Name="" Type="Kernel">
<Object Identifier="./Models/Oak" Label="Default Model" Name="Oak" Type="Model">
<Object Identifier="Triangular Mesh" Label="Triangular Mesh" Name="" Type="Surface">
</Object>
<Object Identifier="Whitted Material" Label="Whitted Material" Name="Oak" Type="Material">
<Object Identifier="./Diffuse/Bitmap Texture" Label="Bitmap Texture" Name="" Type="Texture">
<Parameter Name="Filename" Type="String" Value="C:\Textures\oak.jpg"/>
<Parameter Name="Projection" Type="String" Value="Planar"/>
<Parameter Name="Offset X" Type="Real" Value="0.5"/>
<Parameter Name="Offset Y" Type="Real" Value="0.5"/>
<Parameter Name="Scale X" Type="Real" Value="2"/>
<Parameter Name="Scale Y" Type="Real" Value="2"/>
<Parameter Name="Rotation" Type="Real" Value="45"/>
<Parameter Name="Smooth" Type="Boolean" Value="1"/>
</Object>
<Object Identifier="./Reflection/Constant Texture" Label="Constant Texture" Name="" Type="Texture">
<Parameter Name="Color" Type="RGB" Value="0.2 0.4 0.2"/>
</Object>
<Parameter Name="Shininess" Type="Real" Value="128"/>
</Object>
<Parameter Name="Map Channel" Type="Point2D List" Value="0">
</Parameter>
<Parameter Name="Frame" Type="Transform" Value="1 0 0 0 0 1 0 0 0 0 1 0"/>
<Parameter Name="Visible" Type="Boolean" Value="1"/>
</Object>
<Object Identifier="./Models/Frosted" Label="Default Model" Name="Frosted" Type="Model">
<Object Identifier="Thin Glass Material" Label="Thin Glass Material" Name="Frosted" Type="Material">
<Object Identifier="./Reflectance/Constant Texture" Label="Constant Texture" Name="" Type="Texture">
<Parameter Name="Color" Type="RGB" Value="0.8 0.9 1"/>
</Object>
</Object>
<Parameter Name="Map Channel" Type="Point2D List" Value="0">
</Parameter>
<Parameter Name="Frame" Type="Transform" Value="1 0 0 0 0 1 0 0 0 0 1 0"/>
</Object>
</Root>
"#;

    fn library() -> MaterialLibrary {
        let mut library = MaterialLibrary::new();
        library.add_file(LibraryFile::new("woods.xml", "/libs/Woods", SAMPLE_LIBRARY));
        library
    }

    #[test]
    fn test_names() {
        assert_eq!(library().names(), vec!["Oak", "Frosted"]);
    }

    #[test]
    fn test_extract_bitmap_material() {
        let oak = library().find("Oak").unwrap();
        assert!(oak.body.starts_with("<Object Identifier=\"Whitted Material\""));
        assert!(oak.body.ends_with("<Parameter Name=\"Shininess\" Type=\"Real\" Value=\"128\"/>\n</Object>"));
        assert!(oak.body.contains("Value=\"/libs/Woods/oak.jpg\"/>"));
        assert!(oak.body.contains(DEFAULT_PROJECTION.trim_end()));
        assert!(!oak.body.contains("Planar"));
        assert!(!oak.body.contains("Value=\"45\""));
        assert!(oak.body.contains("<Parameter Name=\"Smooth\" Type=\"Boolean\" Value=\"1\"/>"));
        assert!(!oak.body.contains("Map Channel"));
        assert_eq!(
            oak.map,
            "<Parameter Name=\"Frame\" Type=\"Transform\" Value=\"1 0 0 0 0 1 0 0 0 0 1 0\"/>\n<Parameter Name=\"Visible\" Type=\"Boolean\" Value=\"1\"/>"
        );
        assert_eq!(
            oak.textures,
            vec![LibraryTexture {
                path: "/libs/Woods/oak.jpg".to_string(),
                kind: Some(TextureKind::Diffuse),
            }]
        );
        assert_eq!(oak.color, Some(Color::new(51, 102, 51)));
        assert_eq!(oak.alpha, Some(102));
    }

    #[test]
    fn test_extract_constant_material() {
        let frosted = library().find("Frosted").unwrap();
        assert!(frosted.textures.is_empty());
        assert_eq!(frosted.color, Some(Color::new(204, 229, 255)));
        assert_eq!(frosted.alpha, Some(255));
        assert_eq!(TextureKind::Bump.code(), "BUMP");
    }

    #[test]
    fn test_missing_material() {
        assert!(matches!(
            library().find("Marble"),
            Err(ExportError::MaterialNotFound(name)) if name == "Marble"
        ));
    }

    #[test]
    fn test_attach() {
        let library = library();
        let mut material = Material::colored(Color::new(1, 2, 3));
        library.find("Oak").unwrap().attach(&mut material);
        assert_eq!(material.attributes.kt_name.as_deref(), Some("Oak"));
        assert!(material.attributes.kt_mat.is_some());
        assert_eq!(material.color, Color::new(51, 102, 51));
        assert!((material.alpha - 0.6).abs() < 1e-9);
        assert!(material.use_alpha);
        let texture = material.texture.as_ref().unwrap();
        assert_eq!(texture.filename, "oak.jpg");
        assert_eq!(texture.height, DEFAULT_TEXTURE_SIZE);
        assert_eq!(texture.source, Some(PathBuf::from("/libs/Woods/oak.jpg")));

        let mut glass = Material::default();
        library.find("Frosted").unwrap().attach(&mut glass);
        assert_eq!(glass.alpha, MIN_ALPHA);
        assert!(glass.texture.is_none());
    }

    #[test]
    fn test_attach_to_scene_creates_material() {
        let mut scene = Scene::new("lib");
        library().attach_to_scene(&mut scene, "Floor", "Oak").unwrap();
        let floor = scene.material("Floor").unwrap();
        assert!(floor.material.has_texture());
        assert!(matches!(
            library().attach_to_scene(&mut scene, "Wall", "Marble"),
            Err(ExportError::MaterialNotFound(_))
        ));
        assert!(scene.material("Wall").is_none());
    }

    #[test]
    fn test_xml_value() {
        let line = r#"<Parameter Name="Color" Type="RGB" Value="1 0 0"/>"#;
        assert_eq!(xml_value("Name", line), Some("Color"));
        assert_eq!(xml_value("Value", line), Some("1 0 0"));
        assert_eq!(xml_value("Missing", line), None);
    }
}
