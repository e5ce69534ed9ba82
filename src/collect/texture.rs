//! Texture deduplication registry.
//!
//! Every textured material binding seen during collection is registered
//! here. Bindings that project the bitmap the same way share one record;
//! a binding whose projection differs from the material's default
//! ("distorted") gets a numbered variant with its own UV remap, so one
//! bitmap is never shared by faces that need different UV assumptions.

use crate::scene::{Face, MaterialRef, Texture, UvMapping};
use crate::scene::geometry::UV_TOLERANCE;
use crate::types::Side;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identity of an exported texture: base material name plus variant index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureKey {
    /// Material display name with `<>[]` removed.
    pub base: String,
    /// 0 for the base record, then 1, 2, ... for distorted variants.
    pub variant: u32,
}

impl TextureKey {
    pub fn base(name: impl Into<String>) -> Self {
        Self {
            base: name.into(),
            variant: 0,
        }
    }

    /// Exported name: the base name with the variant counter appended.
    pub fn name(&self) -> String {
        if self.variant == 0 {
            self.base.clone()
        } else {
            format!("{}{}", self.base, self.variant)
        }
    }
}

impl fmt::Display for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// How a binding projects its bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureHandle {
    /// The material's default planar projection.
    Base,
    /// A face-specific projection, quantized to the comparison tolerance.
    Projected([i64; 8]),
}

/// Face-specific UV mapping used instead of the triangulator's UVs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRemap {
    pub mapping: UvMapping,
}

impl UvRemap {
    pub fn uv_at(&self, local_point: glam::DVec3) -> [f64; 2] {
        self.mapping.uv_at(local_point)
    }
}

/// One texture to write and reference from materials.
#[derive(Debug, Clone)]
pub struct TextureRecord<'s> {
    pub key: TextureKey,
    /// The material the bitmap comes from.
    pub material: MaterialRef<'s>,
    /// Side of the exemplar binding.
    pub side: Side,
    pub handle: TextureHandle,
    /// Output path relative to the scene file, e.g. `TX_model/Wood.jpg`.
    pub file_name: String,
}

impl<'s> TextureRecord<'s> {
    pub fn texture(&self) -> Option<&'s Texture> {
        self.material.material.texture.as_ref()
    }
}

/// Registry of texture records for one export run. Records are only ever
/// added, in first-seen order.
#[derive(Debug)]
pub struct TextureRegistry<'s> {
    check_distortion: bool,
    folder: String,
    records: Vec<TextureRecord<'s>>,
    index: HashMap<TextureKey, usize>,
    /// Last variant number handed out per base name.
    counters: HashMap<String, u32>,
    /// Exported names in use: scene material names and every record.
    taken: HashSet<String>,
    /// Bindings seen so far, whether or not they produced a record.
    loaded: HashSet<(String, TextureHandle)>,
}

impl<'s> TextureRegistry<'s> {
    /// `folder` is the texture directory name, e.g. `TX_model`.
    pub fn new(check_distortion: bool, folder: impl Into<String>) -> Self {
        Self {
            check_distortion,
            folder: folder.into(),
            records: Vec::new(),
            index: HashMap::new(),
            counters: HashMap::new(),
            taken: HashSet::new(),
            loaded: HashSet::new(),
        }
    }

    /// Keep variants from being named like existing materials.
    pub fn reserve_names<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.taken.extend(names);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TextureRecord<'s>] {
        &self.records
    }

    pub fn get(&self, key: &TextureKey) -> Option<&TextureRecord<'s>> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// Register a textured material applied to a group or component.
    /// Creates the base record on first sight.
    pub fn register_entity(&mut self, material: MaterialRef<'s>) {
        let base = material.clean_name();
        if self.loaded.insert((base.clone(), TextureHandle::Base)) {
            let key = TextureKey::base(base);
            if !self.index.contains_key(&key) {
                self.insert(key, material, Side::Front, TextureHandle::Base);
            }
        }
    }

    /// Register a textured material bound to one side of a face.
    ///
    /// Returns the key of the record the face's UVs belong to and, when
    /// the face cannot use the triangulator's UVs, the remap to use.
    pub fn register_face(
        &mut self,
        material: MaterialRef<'s>,
        face: &Face,
        side: Side,
    ) -> (TextureKey, Option<UvRemap>) {
        let base = material.clean_name();

        if !self.check_distortion {
            let key = TextureKey::base(base);
            self.loaded.insert((key.base.clone(), TextureHandle::Base));
            if !self.index.contains_key(&key) {
                self.insert(key.clone(), material, side, TextureHandle::Base);
            }
            return (key, None);
        }

        let texture = material.material.texture.as_ref();
        let distorted = distorted_mapping(face, side, texture);
        let handle = match &distorted {
            Some(mapping) => TextureHandle::Projected(mapping.quantized()),
            None => TextureHandle::Base,
        };
        let remap = distorted.map(|mapping| UvRemap { mapping });

        if !self.loaded.insert((base.clone(), handle)) {
            // Binding seen before: reuse whichever record was made for it
            let key = self
                .records
                .iter()
                .find(|r| r.key.base == base && r.handle == handle)
                .map(|r| r.key.clone())
                .unwrap_or_else(|| TextureKey::base(base));
            return (key, remap);
        }

        let base_key = TextureKey::base(base.clone());
        if !self.index.contains_key(&base_key) {
            self.insert(base_key.clone(), material, side, handle);
            return (base_key, remap);
        }

        // New projection of a known material: allocate a variant whose
        // name no material or record already uses
        let counter = self.counters.entry(base.clone()).or_insert(0);
        let key = loop {
            *counter += 1;
            let candidate = TextureKey {
                base: base.clone(),
                variant: *counter,
            };
            if !self.taken.contains(&candidate.name()) {
                break candidate;
            }
        };
        self.insert(key.clone(), material, side, handle);
        let remap = UvRemap {
            mapping: face.natural_mapping(side, texture),
        };
        (key, Some(remap))
    }

    fn insert(&mut self, key: TextureKey, material: MaterialRef<'s>, side: Side, handle: TextureHandle) {
        let file_name = match material.material.texture.as_ref() {
            Some(texture) => texture_file_name(&self.folder, &key.name(), &texture.filename),
            None => format!("{}/{}", self.folder, key.name()),
        };
        log::debug!("Registered texture {} -> {}", key, file_name);
        self.taken.insert(key.name());
        self.index.insert(key.clone(), self.records.len());
        self.records.push(TextureRecord {
            key,
            material,
            side,
            handle,
            file_name,
        });
    }
}

/// The face's explicit mapping on `side`, if it differs from the default
/// planar projection of the texture.
fn distorted_mapping(face: &Face, side: Side, texture: Option<&Texture>) -> Option<UvMapping> {
    let explicit = face.uv_mapping(side)?;
    let (width, height) = texture.map_or((1.0, 1.0), |t| (t.width, t.height));
    let default = UvMapping::planar(face.normal(), width, height);
    if explicit.approx_eq(&default, UV_TOLERANCE) {
        None
    } else {
        Some(*explicit)
    }
}

/// Exported file extension for a source bitmap name.
///
/// BMP, GIF and PNG sources are written as PNG; `tiff` becomes `.tif`;
/// names without a three-letter extension default to `.jpg`.
pub fn texture_extension(filename: &str) -> String {
    let chars: Vec<char> = filename.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    let upper = tail.to_ascii_uppercase();

    if matches!(upper.as_str(), ".BMP" | ".GIF" | ".PNG") {
        ".png".to_string()
    } else if upper == "TIFF" {
        ".tif".to_string()
    } else if !tail.starts_with('.') {
        ".jpg".to_string()
    } else {
        tail
    }
}

/// `<folder>/<name><ext>`.
pub fn texture_file_name(folder: &str, name: &str, source_filename: &str) -> String {
    format!("{}/{}{}", folder, name, texture_extension(source_filename))
}
