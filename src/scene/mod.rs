//! In-memory scene graph consumed by the exporter.
//!
//! This is the exporter's view of the host modelling tool: a tree of
//! groups, component instances and faces, plus the shared component
//! definitions, materials, cameras and sun settings. Scenes are usually
//! deserialized from JSON with [`loader::load_from_path`], but can also be
//! assembled programmatically.

pub mod attributes;
pub mod geometry;
pub mod loader;

pub use attributes::{AnimationKeys, LightConfig, LightStatus, MaterialAttributes};
pub use geometry::{Face, PolygonMesh, UvMapping};

use crate::types::{Color, Transform};
use chrono::{DateTime, NaiveDate, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A complete scene to export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Model name, used for the scene object and the texture folder.
    pub name: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// Materials by display name.
    #[serde(default)]
    pub materials: HashMap<String, Material>,
    /// Component definitions by name.
    #[serde(default)]
    pub definitions: HashMap<String, Definition>,
    /// Top-level entities.
    #[serde(default)]
    pub entities: Vec<Node>,
    #[serde(default)]
    pub view: View,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub shadow_info: ShadowInfo,
    #[serde(default)]
    pub rendering_options: RenderingOptions,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_material(&mut self, name: impl Into<String>, material: Material) {
        self.materials.insert(name.into(), material);
    }

    pub fn add_definition(&mut self, name: impl Into<String>, definition: Definition) {
        self.definitions.insert(name.into(), definition);
    }

    pub fn add_entity(&mut self, node: impl Into<Node>) {
        self.entities.push(node.into());
    }

    /// Look up a material, returning it together with its interned name.
    pub fn material(&self, name: &str) -> Option<MaterialRef<'_>> {
        self.materials
            .get_key_value(name)
            .map(|(name, material)| MaterialRef { name, material })
    }

    /// Look up a component definition, returning it together with its name.
    pub fn definition(&self, name: &str) -> Option<(&str, &Definition)> {
        self.definitions
            .get_key_value(name)
            .map(|(name, definition)| (name.as_str(), definition))
    }

    /// Whether entities on the given layer are shown. Unknown layers are visible.
    pub fn layer_visible(&self, layer: Option<&str>) -> bool {
        match layer {
            Some(name) => self
                .layers
                .iter()
                .find(|l| l.name == name)
                .map_or(true, |l| l.visible),
            None => true,
        }
    }
}

/// A named layer (tag) controlling visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}

/// A node in the scene graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Group(Group),
    Instance(ComponentInstance),
    Face(Face),
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Node::Group(group)
    }
}

impl From<ComponentInstance> for Node {
    fn from(instance: ComponentInstance) -> Self {
        Node::Instance(instance)
    }
}

impl From<Face> for Node {
    fn from(face: Face) -> Self {
        Node::Face(face)
    }
}

/// An anonymous container with its own transform and entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub entities: Vec<Node>,
}

impl Group {
    pub fn new(entities: Vec<Node>) -> Self {
        Self {
            entities,
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }
}

/// A placement of a shared [`Definition`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentInstance {
    /// Name of the referenced definition.
    pub definition: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub layer: Option<String>,
    /// Light settings, only meaningful on light carrier components.
    #[serde(default)]
    pub light: Option<LightConfig>,
}

impl ComponentInstance {
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_light(mut self, light: LightConfig) -> Self {
        self.light = Some(light);
        self
    }
}

/// Shared geometry referenced by component instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub entities: Vec<Node>,
    /// Billboard behaviour: the component always faces the camera.
    #[serde(default)]
    pub always_face_camera: bool,
    /// Name of a high-detail definition this one stands in for.
    #[serde(default)]
    pub high_poly: Option<String>,
}

impl Definition {
    pub fn new(entities: Vec<Node>) -> Self {
        Self {
            entities,
            ..Default::default()
        }
    }
}

/// A surface material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub use_alpha: bool,
    #[serde(default)]
    pub texture: Option<Texture>,
    #[serde(default)]
    pub attributes: MaterialAttributes,
}

fn default_alpha() -> f64 {
    1.0
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            alpha: 1.0,
            use_alpha: false,
            texture: None,
            attributes: MaterialAttributes::default(),
        }
    }
}

impl Material {
    pub fn colored(color: Color) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    pub fn textured(texture: Texture) -> Self {
        Self {
            texture: Some(texture),
            ..Default::default()
        }
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }
}

/// A material paired with its display name.
#[derive(Debug, Clone, Copy)]
pub struct MaterialRef<'a> {
    pub name: &'a str,
    pub material: &'a Material,
}

impl<'a> MaterialRef<'a> {
    /// Display name with the characters `<>[]` removed, as used for
    /// exported object names and texture files.
    pub fn clean_name(&self) -> String {
        clean_material_name(self.name)
    }
}

/// Strip `<`, `>`, `[` and `]` from a material display name.
pub fn clean_material_name(name: &str) -> String {
    name.chars().filter(|c| !matches!(c, '<' | '>' | '[' | ']')).collect()
}

/// A bitmap bound to a material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Texture {
    /// Original file name, used to pick the exported extension.
    pub filename: String,
    /// Size of one image repeat in model units.
    #[serde(default = "default_texture_size")]
    pub width: f64,
    #[serde(default = "default_texture_size")]
    pub height: f64,
    /// Where to read the bitmap from when writing texture files.
    #[serde(default)]
    pub source: Option<PathBuf>,
}

fn default_texture_size() -> f64 {
    1.0
}

impl Texture {
    pub fn new(filename: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            filename: filename.into(),
            width,
            height,
            source: None,
        }
    }
}

/// A camera as reported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub eye: DVec3,
    /// Right vector.
    pub x_axis: DVec3,
    /// Up vector.
    pub y_axis: DVec3,
    /// Viewing direction.
    pub z_axis: DVec3,
    #[serde(default = "default_true")]
    pub perspective: bool,
    /// Focal length in millimetres (perspective cameras).
    #[serde(default = "default_focal_length")]
    pub focal_length: f64,
    /// View height in model units (parallel cameras).
    #[serde(default)]
    pub height: f64,
}

fn default_focal_length() -> f64 {
    50.0
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: DVec3::new(-500.0, -500.0, 300.0),
            x_axis: DVec3::X,
            y_axis: DVec3::Z,
            z_axis: DVec3::Y,
            perspective: true,
            focal_length: default_focal_length(),
            height: 0.0,
        }
    }
}

/// The active view and its viewport size in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    #[serde(default)]
    pub camera: Camera,
    #[serde(default = "default_view_width")]
    pub width: u32,
    #[serde(default = "default_view_height")]
    pub height: u32,
}

fn default_view_width() -> u32 {
    800
}

fn default_view_height() -> u32 {
    600
}

impl Default for View {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            width: default_view_width(),
            height: default_view_height(),
        }
    }
}

/// A saved scene page; only pages that store a camera produce one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub name: String,
    #[serde(default)]
    pub camera: Option<Camera>,
}

/// Sun and geographic location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowInfo {
    /// Angle of north from the model's Y axis, in degrees.
    #[serde(default)]
    pub north_angle: f64,
    #[serde(default = "default_sun_direction")]
    pub sun_direction: DVec3,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Time zone offset in hours.
    #[serde(default)]
    pub tz_offset: f64,
    #[serde(default = "default_shadow_time")]
    pub shadow_time: DateTime<Utc>,
    #[serde(default)]
    pub display_shadows: bool,
}

fn default_sun_direction() -> DVec3 {
    DVec3::new(0.0, -0.5, 0.866)
}

fn default_shadow_time() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2002, 11, 8)
        .and_then(|date| date.and_hms_opt(13, 30, 0))
        .map(|time| time.and_utc())
        .unwrap_or_default()
}

impl Default for ShadowInfo {
    fn default() -> Self {
        Self {
            north_angle: 0.0,
            sun_direction: default_sun_direction(),
            latitude: 0.0,
            longitude: 0.0,
            tz_offset: 0.0,
            shadow_time: default_shadow_time(),
            display_shadows: false,
        }
    }
}

/// Display settings that influence untextured output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderingOptions {
    /// Colour of faces without a material.
    #[serde(default)]
    pub face_front_color: Color,
}
