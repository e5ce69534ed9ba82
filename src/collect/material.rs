//! Per-face material resolution and material naming conventions.

use super::texture::{TextureKey, TextureRegistry, UvRemap};
use crate::scene::{clean_material_name, Face, MaterialRef};
use crate::types::Side;

/// Name of the default material used by faces with nothing to inherit.
pub const FRONT_FACE: &str = "Front Face";

/// Display-name prefix selecting the thin glass shading model.
pub const THIN_GLASS_PREFIX: &str = "TG_";

/// Identity of a material bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    /// Untextured default for faces without any material.
    FrontFace,
    /// An untextured scene material, by display name.
    Plain(String),
    /// A texture record of the registry.
    Textured(TextureKey),
}

impl BucketKey {
    /// Name used for the exported model object.
    pub fn display_name(&self) -> String {
        match self {
            BucketKey::FrontFace => FRONT_FACE.to_string(),
            BucketKey::Plain(name) => clean_material_name(name),
            BucketKey::Textured(key) => key.name(),
        }
    }

    pub fn is_textured(&self) -> bool {
        matches!(self, BucketKey::Textured(_))
    }
}

/// The outcome of resolving one face.
#[derive(Debug, Clone)]
pub struct ResolvedMaterial<'s> {
    pub key: BucketKey,
    /// The scene material, `None` for the default.
    pub material: Option<MaterialRef<'s>>,
    /// Side the material is bound to.
    pub side: Side,
    pub remap: Option<UvRemap>,
    /// The face has no material of its own on `side`.
    pub inherited: bool,
}

/// Resolve the material of a face: its front material, else its back
/// material, else the nearest ancestor's, else the default. Textured
/// results go through the registry, which may pick a variant.
pub fn resolve_face<'s>(
    face: &Face,
    own: Option<MaterialRef<'s>>,
    back: Option<MaterialRef<'s>>,
    parent: Option<MaterialRef<'s>>,
    registry: &mut TextureRegistry<'s>,
) -> ResolvedMaterial<'s> {
    let (material, side, inherited) = match (own, back) {
        (Some(m), _) => (Some(m), Side::Front, false),
        (None, Some(m)) => (Some(m), Side::Back, false),
        (None, None) => (parent, Side::Front, true),
    };

    let Some(material) = material else {
        return ResolvedMaterial {
            key: BucketKey::FrontFace,
            material: None,
            side,
            remap: None,
            inherited,
        };
    };

    if material.material.has_texture() {
        let (key, remap) = registry.register_face(material, face, side);
        ResolvedMaterial {
            key: BucketKey::Textured(key),
            material: Some(material),
            side,
            remap,
            inherited,
        }
    } else {
        ResolvedMaterial {
            key: BucketKey::Plain(material.name.to_string()),
            material: Some(material),
            side,
            remap: None,
            inherited,
        }
    }
}

/// How a bucket's material is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingModel {
    /// Verbatim material block copied from a library.
    Library,
    ThinGlass,
    Whitted,
    Clay,
}

impl ShadingModel {
    pub fn select(material: Option<MaterialRef<'_>>, clay: bool) -> Self {
        if clay {
            return ShadingModel::Clay;
        }
        match material {
            Some(m) if m.material.attributes.kt_mat.is_some() => ShadingModel::Library,
            Some(m) if m.name.starts_with(THIN_GLASS_PREFIX) => ShadingModel::ThinGlass,
            _ => ShadingModel::Whitted,
        }
    }
}

/// A diffuse light attached to a material by its name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emitter {
    pub power: f64,
    /// False for `EmitFake` materials, which glow without casting light.
    pub emits: bool,
}

impl Emitter {
    /// Emitters encoded in a material name: an `EmitFake` token and/or an
    /// `Emit[<power>]` token, matched case-insensitively.
    pub fn from_name(name: &str) -> Vec<Emitter> {
        let upper = name.to_ascii_uppercase();
        let mut emitters = Vec::new();
        if upper.contains("EMITFAKE") {
            emitters.push(Emitter {
                power: 1.0,
                emits: false,
            });
        }
        if upper.contains("EMIT[") {
            let power = name
                .split('[')
                .nth(1)
                .and_then(|rest| rest.split(']').next())
                .map_or(0.0, leading_float);
            emitters.push(Emitter { power, emits: true });
        }
        emitters
    }
}

/// Parse the longest numeric prefix of `s`, 0 when there is none.
fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    (1..=end)
        .rev()
        .find_map(|len| s[..len].parse::<f64>().ok())
        .unwrap_or(0.0)
}
