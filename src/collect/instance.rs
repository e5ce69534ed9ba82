//! Component aggregation for instanced export.
//!
//! Each distinct (definition, inherited material) pair becomes one mesh
//! definition plus a list of placements.

use super::{ExportContext, SceneWalker, Visit, WalkOptions};
use crate::scene::{Definition, MaterialRef};
use crate::types::Transform;
use std::collections::HashMap;
use std::fmt;

/// Separator between definition and material in aggregate names.
pub const MATERIAL_SEPARATOR: &str = "_mat:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    /// Definition name, after proxy redirection.
    pub definition: String,
    /// Material inherited by the placement.
    pub material: Option<String>,
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.material {
            Some(material) => write!(f, "{}{}{}", self.definition, MATERIAL_SEPARATOR, material),
            None => f.write_str(&self.definition),
        }
    }
}

/// One exported component: a shared mesh and its placements.
#[derive(Debug, Clone)]
pub struct Aggregate<'s> {
    pub key: AggregateKey,
    pub definition: &'s Definition,
    pub material: Option<MaterialRef<'s>>,
    /// Composed placement transforms in traversal order.
    pub transforms: Vec<Transform>,
}

/// Aggregates in first-seen order.
#[derive(Debug, Default)]
pub struct ComponentAggregates<'s> {
    aggregates: Vec<Aggregate<'s>>,
    index: HashMap<AggregateKey, usize>,
}

impl<'s> ComponentAggregates<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        key: AggregateKey,
        definition: &'s Definition,
        material: Option<MaterialRef<'s>>,
        transform: Transform,
    ) {
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.aggregates.len();
                self.index.insert(key.clone(), i);
                self.aggregates.push(Aggregate {
                    key,
                    definition,
                    material,
                    transforms: Vec::new(),
                });
                i
            }
        };
        self.aggregates[slot].transforms.push(transform);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aggregate<'s>> {
        self.aggregates.iter()
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    pub fn placement_count(&self) -> usize {
        self.aggregates.iter().map(|a| a.transforms.len()).sum()
    }
}

impl<'s> ExportContext<'s> {
    /// Aggregate every visible component instance, nested ones included.
    pub fn collect_components(&mut self) -> ComponentAggregates<'s> {
        let scene = self.scene;
        let options = WalkOptions {
            descend_instances: true,
            follow_high_poly: true,
        };

        let mut aggregates = ComponentAggregates::new();
        for visit in SceneWalker::new(scene, &scene.entities, options) {
            let Visit::Instance(visit) = visit else {
                continue;
            };
            if let Some(material) = visit.material.filter(|m| m.material.has_texture()) {
                self.textures.register_entity(material);
            }
            let key = AggregateKey {
                definition: visit.definition_name.to_string(),
                material: visit.material.map(|m| m.name.to_string()),
            };
            aggregates.add(key, visit.definition, visit.material, visit.transform);
        }

        log::info!(
            "Collected {} components with {} placements",
            aggregates.len(),
            aggregates.placement_count()
        );
        aggregates
    }
}
