//! Scene traversal and collection.
//!
//! [`SceneWalker`] is a single-pass iterator over visible scene nodes that
//! carries the composed transform, the inherited material and the
//! face-camera lock. The collectors in this module consume it:
//!
//! - [`geometry`] buckets faces by resolved material
//! - [`instance`] aggregates component placements for instanced export
//! - [`lights`] finds light carrier components
//!
//! Per-run mutable state lives in [`ExportContext`]; a fresh context is
//! built for each export.

pub mod geometry;
pub mod instance;
pub mod lights;
pub mod material;
pub mod texture;

pub use geometry::{MaterialBucket, MaterialBuckets, ResolvedFace};
pub use instance::{AggregateKey, ComponentAggregates};
pub use lights::{LightKind, LightPlacement};
pub use material::{BucketKey, Emitter, ResolvedMaterial, ShadingModel};
pub use texture::{TextureHandle, TextureKey, TextureRecord, TextureRegistry, UvRemap};

use crate::scene::{clean_material_name, ComponentInstance, Definition, Face, Group, MaterialRef, Node, Scene};
use crate::types::Transform;
use std::slice;

/// Definition name token marking a point light carrier.
pub const POINT_LIGHT_TOKEN: &str = "_pointlight";
/// Definition name token marking a spot light carrier.
pub const SPOT_LIGHT_TOKEN: &str = "_spotlight";

/// Whether components of this definition stand for a light rather than
/// geometry.
pub fn is_light_carrier(definition_name: &str) -> bool {
    definition_name.contains(POINT_LIGHT_TOKEN) || definition_name.contains(SPOT_LIGHT_TOKEN)
}

/// How a [`SceneWalker`] treats component instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Descend into component definitions. When false, instances are
    /// skipped entirely (their geometry is exported as aggregates).
    pub descend_instances: bool,
    /// Descend into the high-detail definition a proxy stands in for.
    pub follow_high_poly: bool,
}

/// One visible node reached by the walker.
#[derive(Debug, Clone)]
pub enum Visit<'s> {
    Face(FaceVisit<'s>),
    Group(GroupVisit<'s>),
    Instance(InstanceVisit<'s>),
    LightCarrier(CarrierVisit<'s>),
}

#[derive(Debug, Clone)]
pub struct FaceVisit<'s> {
    pub face: &'s Face,
    /// Composed transform of the face's container.
    pub transform: Transform,
    /// Nearest ancestor material.
    pub parent_material: Option<MaterialRef<'s>>,
    /// Some ancestor component always faces the camera.
    pub face_camera: bool,
}

#[derive(Debug, Clone)]
pub struct GroupVisit<'s> {
    pub group: &'s Group,
    /// Composed transform including the group's own.
    pub transform: Transform,
    /// The group's own material, if set.
    pub own_material: Option<MaterialRef<'s>>,
    /// Material inherited by the group's children.
    pub material: Option<MaterialRef<'s>>,
}

#[derive(Debug, Clone)]
pub struct InstanceVisit<'s> {
    pub instance: &'s ComponentInstance,
    /// Name of the definition descended into (after proxy redirection).
    pub definition_name: &'s str,
    pub definition: &'s Definition,
    pub transform: Transform,
    pub own_material: Option<MaterialRef<'s>>,
    pub material: Option<MaterialRef<'s>>,
}

#[derive(Debug, Clone)]
pub struct CarrierVisit<'s> {
    pub instance: &'s ComponentInstance,
    pub definition_name: &'s str,
    /// Composed transform including the carrier's own.
    pub transform: Transform,
}

struct Frame<'s> {
    nodes: slice::Iter<'s, Node>,
    /// Definition whose entities `nodes` walks, `None` at the root and
    /// inside groups.
    definition: Option<&'s str>,
    transform: Transform,
    material: Option<MaterialRef<'s>>,
    face_camera: bool,
}

/// Depth-first iterator over the visible nodes below a list of entities.
///
/// Uses an explicit stack, so deep hierarchies do not grow the call stack.
/// Hidden nodes and nodes on hidden layers are skipped with their subtree.
/// Light carriers are reported but never descended into.
pub struct SceneWalker<'s> {
    scene: &'s Scene,
    options: WalkOptions,
    stack: Vec<Frame<'s>>,
}

impl<'s> SceneWalker<'s> {
    pub fn new(scene: &'s Scene, entities: &'s [Node], options: WalkOptions) -> Self {
        Self::with_root(scene, entities, Transform::IDENTITY, None, options)
    }

    /// Start from the given transform and inherited material.
    pub fn with_root(
        scene: &'s Scene,
        entities: &'s [Node],
        transform: Transform,
        material: Option<MaterialRef<'s>>,
        options: WalkOptions,
    ) -> Self {
        Self {
            scene,
            options,
            stack: vec![Frame {
                nodes: entities.iter(),
                definition: None,
                transform,
                material,
                face_camera: false,
            }],
        }
    }

    fn visible(&self, hidden: bool, layer: Option<&str>) -> bool {
        !hidden && self.scene.layer_visible(layer)
    }

    fn material(&self, name: Option<&str>) -> Option<MaterialRef<'s>> {
        name.and_then(|n| self.scene.material(n))
    }

    /// Whether the walk is already inside `definition`.
    fn is_active(&self, definition: &str) -> bool {
        self.stack.iter().any(|frame| frame.definition == Some(definition))
    }
}

impl<'s> Iterator for SceneWalker<'s> {
    type Item = Visit<'s>;

    fn next(&mut self) -> Option<Visit<'s>> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(node) = frame.nodes.next() else {
                self.stack.pop();
                continue;
            };
            let transform = frame.transform;
            let material = frame.material;
            let face_camera = frame.face_camera;

            match node {
                Node::Face(face) => {
                    if !self.visible(face.hidden, face.layer.as_deref()) {
                        continue;
                    }
                    return Some(Visit::Face(FaceVisit {
                        face,
                        transform,
                        parent_material: material,
                        face_camera,
                    }));
                }
                Node::Group(group) => {
                    if !self.visible(group.hidden, group.layer.as_deref()) {
                        continue;
                    }
                    let own_material = self.material(group.material.as_deref());
                    let inherited = own_material.or(material);
                    let composed = transform.then(&group.transform);
                    self.stack.push(Frame {
                        nodes: group.entities.iter(),
                        definition: None,
                        transform: composed,
                        material: inherited,
                        face_camera,
                    });
                    return Some(Visit::Group(GroupVisit {
                        group,
                        transform: composed,
                        own_material,
                        material: inherited,
                    }));
                }
                Node::Instance(instance) => {
                    if !self.visible(instance.hidden, instance.layer.as_deref()) {
                        continue;
                    }
                    let Some((mut name, mut definition)) =
                        self.scene.definition(&instance.definition)
                    else {
                        log::warn!("Skipping instance of unknown definition '{}'", instance.definition);
                        continue;
                    };
                    let composed = transform.then(&instance.transform);

                    if is_light_carrier(name) {
                        return Some(Visit::LightCarrier(CarrierVisit {
                            instance,
                            definition_name: name,
                            transform: composed,
                        }));
                    }
                    if !self.options.descend_instances {
                        continue;
                    }

                    if self.options.follow_high_poly {
                        if let Some(target) = definition
                            .high_poly
                            .as_deref()
                            .and_then(|n| self.scene.definition(n))
                        {
                            (name, definition) = target;
                        }
                    }

                    if self.is_active(name) {
                        log::warn!("Skipping instance of '{}' nested inside itself", name);
                        continue;
                    }

                    let own_material = self.material(instance.material.as_deref());
                    let inherited = own_material.or(material);
                    // Once locked, the whole subtree keeps facing the camera
                    self.stack.push(Frame {
                        nodes: definition.entities.iter(),
                        definition: Some(name),
                        transform: composed,
                        material: inherited,
                        face_camera: face_camera || definition.always_face_camera,
                    });
                    return Some(Visit::Instance(InstanceVisit {
                        instance,
                        definition_name: name,
                        definition,
                        transform: composed,
                        own_material,
                        material: inherited,
                    }));
                }
            }
        }
    }
}

/// Mutable state of one export run.
pub struct ExportContext<'s> {
    pub scene: &'s Scene,
    pub textures: TextureRegistry<'s>,
    /// Faces collected into buckets so far.
    pub face_count: usize,
}

impl<'s> ExportContext<'s> {
    pub fn new(scene: &'s Scene, check_distortion: bool, texture_folder: impl Into<String>) -> Self {
        let mut textures = TextureRegistry::new(check_distortion, texture_folder);
        textures.reserve_names(scene.materials.keys().map(|name| clean_material_name(name)));
        Self {
            scene,
            textures,
            face_count: 0,
        }
    }
}
