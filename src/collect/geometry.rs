//! Face collection into per-material buckets.

use super::material::{resolve_face, BucketKey};
use super::texture::UvRemap;
use super::{ExportContext, SceneWalker, Visit, WalkOptions};
use crate::scene::{Face, MaterialRef, Node, Scene};
use crate::types::{BoundingBox, Side, Transform};
use std::collections::HashMap;

/// A face paired with everything needed to serialize it.
#[derive(Debug, Clone)]
pub struct ResolvedFace<'s> {
    pub face: &'s Face,
    pub transform: Transform,
    /// Side the bucket's material is bound to.
    pub side: Side,
    pub remap: Option<UvRemap>,
    /// No material of its own on `side`; UVs are normalized by the
    /// inherited texture's size.
    pub inherited: bool,
}

/// All faces sharing one resolved material.
#[derive(Debug, Clone)]
pub struct MaterialBucket<'s> {
    pub key: BucketKey,
    /// The scene material behind the key, `None` for the default.
    pub material: Option<MaterialRef<'s>>,
    /// Faces of components that always face the camera.
    pub face_camera: bool,
    pub faces: Vec<ResolvedFace<'s>>,
}

impl<'s> MaterialBucket<'s> {
    /// Exported model name; face-camera buckets get an `FM_` prefix.
    pub fn name(&self) -> String {
        if self.face_camera {
            format!("FM_{}", self.key.display_name())
        } else {
            self.key.display_name()
        }
    }
}

/// Buckets in first-seen order.
#[derive(Debug, Default)]
pub struct MaterialBuckets<'s> {
    buckets: Vec<MaterialBucket<'s>>,
    index: HashMap<(BucketKey, bool), usize>,
}

impl<'s> MaterialBuckets<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        key: BucketKey,
        material: Option<MaterialRef<'s>>,
        face_camera: bool,
        face: ResolvedFace<'s>,
    ) {
        let slot = match self.index.get(&(key.clone(), face_camera)) {
            Some(&i) => i,
            None => {
                let i = self.buckets.len();
                self.index.insert((key.clone(), face_camera), i);
                self.buckets.push(MaterialBucket {
                    key,
                    material,
                    face_camera,
                    faces: Vec::new(),
                });
                i
            }
        };
        self.buckets[slot].faces.push(face);
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.buckets.iter().map(|b| b.faces.len()).sum()
    }

    /// Regular buckets first, then face-camera buckets, each in
    /// first-seen order.
    pub fn in_export_order(&self) -> impl Iterator<Item = &MaterialBucket<'s>> {
        let regular = self.buckets.iter().filter(|b| !b.face_camera);
        let locked = self.buckets.iter().filter(|b| b.face_camera);
        regular.chain(locked)
    }

    pub fn get(&self, key: &BucketKey, face_camera: bool) -> Option<&MaterialBucket<'s>> {
        self.index
            .get(&(key.clone(), face_camera))
            .map(|&i| &self.buckets[i])
    }
}

impl<'s> ExportContext<'s> {
    /// Collect the visible faces below `entities` into buckets.
    ///
    /// `parent_material` is inherited by top-level faces. With
    /// `descend_instances` false, component instances are left out (their
    /// geometry is exported as aggregates). Textured group and component
    /// materials are registered on the way down.
    pub fn collect_faces(
        &mut self,
        entities: &'s [Node],
        parent_material: Option<MaterialRef<'s>>,
        descend_instances: bool,
    ) -> MaterialBuckets<'s> {
        let scene = self.scene;
        let options = WalkOptions {
            descend_instances,
            follow_high_poly: false,
        };
        let walker = SceneWalker::with_root(scene, entities, Transform::IDENTITY, parent_material, options);

        let mut buckets = MaterialBuckets::new();
        for visit in walker {
            match visit {
                Visit::Group(g) => self.register_container(g.own_material),
                Visit::Instance(i) => self.register_container(i.own_material),
                Visit::LightCarrier(_) => {}
                Visit::Face(visit) => {
                    let face = visit.face;
                    let own = face.material.as_deref().and_then(|n| scene.material(n));
                    let back = face.back_material.as_deref().and_then(|n| scene.material(n));
                    let resolved =
                        resolve_face(face, own, back, visit.parent_material, &mut self.textures);

                    buckets.push(
                        resolved.key,
                        resolved.material,
                        visit.face_camera,
                        ResolvedFace {
                            face,
                            transform: visit.transform,
                            side: resolved.side,
                            remap: resolved.remap,
                            inherited: resolved.inherited,
                        },
                    );
                    self.face_count += 1;
                }
            }
        }

        log::debug!(
            "Collected {} faces into {} buckets",
            buckets.face_count(),
            buckets.len()
        );
        buckets
    }

    fn register_container(&mut self, own_material: Option<MaterialRef<'s>>) {
        if let Some(material) = own_material.filter(|m| m.material.has_texture()) {
            self.textures.register_entity(material);
        }
    }
}

/// Bounds of all visible geometry in model units, components included.
pub fn scene_bounds(scene: &Scene) -> Option<BoundingBox> {
    let options = WalkOptions {
        descend_instances: true,
        follow_high_poly: false,
    };
    let points = SceneWalker::new(scene, &scene.entities, options)
        .filter_map(|visit| match visit {
            Visit::Face(f) => Some(f),
            _ => None,
        })
        .flat_map(|f| {
            let (face, transform) = (f.face, f.transform);
            face.vertices
                .iter()
                .map(move |&v| transform.transform_point(v))
        });
    BoundingBox::from_points(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::test_scenes::{three_panels, unit_square};
    use crate::scene::{ComponentInstance, Definition, Group, Material, Texture};
    use crate::types::Color;
    use glam::DVec3;

    #[test]
    fn test_buckets_keep_first_seen_order() {
        let mut scene = Scene::new("order");
        scene.add_material("B", Material::colored(Color::new(0, 0, 255)));
        scene.add_material("A", Material::colored(Color::new(255, 0, 0)));
        scene.add_entity(unit_square().with_material("B"));
        scene.add_entity(unit_square().with_material("A"));
        scene.add_entity(unit_square().with_material("B"));
        scene.add_entity(unit_square());

        let mut ctx = ExportContext::new(&scene, false, "TX_order");
        let buckets = ctx.collect_faces(&scene.entities, None, true);
        let names: Vec<String> = buckets.in_export_order().map(|b| b.name()).collect();
        assert_eq!(names, vec!["B", "A", "Front Face"]);
        assert_eq!(buckets.get(&BucketKey::Plain("B".into()), false).unwrap().faces.len(), 2);
        assert_eq!(ctx.face_count, 4);
    }

    #[test]
    fn test_face_camera_buckets_come_last() {
        let mut scene = Scene::new("fm");
        let mut sprite = Definition::new(vec![unit_square().into()]);
        sprite.always_face_camera = true;
        scene.add_definition("Sprite", sprite);
        scene.add_entity(ComponentInstance::new("Sprite"));
        scene.add_entity(unit_square());

        let mut ctx = ExportContext::new(&scene, false, "TX_fm");
        let buckets = ctx.collect_faces(&scene.entities, None, true);
        let names: Vec<String> = buckets.in_export_order().map(|b| b.name()).collect();
        assert_eq!(names, vec!["Front Face", "FM_Front Face"]);
    }

    #[test]
    fn test_back_material_side() {
        let mut scene = Scene::new("back");
        scene.add_material("Red", Material::colored(Color::new(255, 0, 0)));
        scene.add_entity(unit_square().with_back_material("Red"));

        let mut ctx = ExportContext::new(&scene, false, "TX_back");
        let buckets = ctx.collect_faces(&scene.entities, None, true);
        let bucket = buckets.in_export_order().next().unwrap();
        assert_eq!(bucket.faces[0].side, Side::Back);
        assert!(!bucket.faces[0].inherited);
    }

    #[test]
    fn test_textured_group_material_registers_texture() {
        let mut scene = Scene::new("tex");
        scene.add_material("Wood", Material::textured(Texture::new("oak.jpg", 2.0, 2.0)));
        scene.add_entity(Group::new(vec![unit_square().into()]).with_material("Wood"));

        let mut ctx = ExportContext::new(&scene, true, "TX_tex");
        let buckets = ctx.collect_faces(&scene.entities, None, true);
        assert_eq!(ctx.textures.len(), 1);
        let bucket = buckets.in_export_order().next().unwrap();
        assert_eq!(bucket.name(), "Wood");
        assert!(bucket.faces[0].inherited);
    }

    #[test]
    fn test_scene_bounds() {
        let scene = three_panels();
        let bounds = scene_bounds(&scene).unwrap();
        assert_eq!(bounds.min, DVec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bounds.max, DVec3::new(1.0, 1.0, 0.0));
        assert!(scene_bounds(&Scene::new("empty")).is_none());
    }
}
