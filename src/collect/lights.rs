//! Light carrier discovery.

use super::{SceneWalker, Visit, WalkOptions, POINT_LIGHT_TOKEN, SPOT_LIGHT_TOKEN};
use crate::scene::{ComponentInstance, LightConfig, Scene};
use crate::types::{Color, Transform};

/// Name token required on light carrier definitions.
pub const CARRIER_TOKEN: &str = "su2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Spot,
}

impl LightKind {
    /// Kind of light a definition name stands for, if any.
    pub fn from_definition_name(name: &str) -> Option<LightKind> {
        if !name.contains(CARRIER_TOKEN) {
            return None;
        }
        if name.contains(SPOT_LIGHT_TOKEN) {
            Some(LightKind::Spot)
        } else if name.contains(POINT_LIGHT_TOKEN) {
            Some(LightKind::Point)
        } else {
            None
        }
    }
}

/// A light carrier component placed in the scene.
#[derive(Debug, Clone)]
pub struct LightPlacement<'s> {
    pub kind: LightKind,
    pub instance: &'s ComponentInstance,
    pub definition_name: &'s str,
    /// Composed transform of the carrier.
    pub transform: Transform,
    /// Colour of the carrier's own material, white when unpainted.
    pub color: Color,
}

impl<'s> LightPlacement<'s> {
    pub fn config(&self) -> LightConfig {
        self.instance.light.clone().unwrap_or_default()
    }
}

/// Find every visible light carrier, in traversal order.
pub fn find_lights(scene: &Scene) -> Vec<LightPlacement<'_>> {
    let options = WalkOptions {
        descend_instances: true,
        follow_high_poly: false,
    };
    SceneWalker::new(scene, &scene.entities, options)
        .filter_map(|visit| {
            let Visit::LightCarrier(carrier) = visit else {
                return None;
            };
            let kind = LightKind::from_definition_name(carrier.definition_name)?;
            let color = carrier
                .instance
                .material
                .as_deref()
                .and_then(|name| scene.material(name))
                .map_or(Color::WHITE, |m| m.material.color);
            Some(LightPlacement {
                kind,
                instance: carrier.instance,
                definition_name: carrier.definition_name,
                transform: carrier.transform,
                color,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ComponentInstance, Definition, Group, Material};
    use glam::DVec3;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(LightKind::from_definition_name("su2kt_pointlight"), Some(LightKind::Point));
        assert_eq!(LightKind::from_definition_name("su2kt_spotlight#1"), Some(LightKind::Spot));
        assert_eq!(LightKind::from_definition_name("my_pointlight"), None);
        assert_eq!(LightKind::from_definition_name("su2kt_lamp"), None);
    }

    #[test]
    fn test_find_nested_lights() {
        let mut scene = Scene::new("lights");
        scene.add_material("Warm", Material::colored(Color::new(255, 200, 100)));
        scene.add_definition("su2kt_pointlight", Definition::default());
        scene.add_definition("su2kt_spotlight", Definition::default());
        scene.add_entity(
            Group::new(vec![ComponentInstance::new("su2kt_pointlight")
                .with_material("Warm")
                .into()])
            .with_transform(Transform::from_translation(DVec3::new(0.0, 0.0, 100.0))),
        );
        scene.add_entity(ComponentInstance::new("su2kt_spotlight"));

        let lights = find_lights(&scene);
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].kind, LightKind::Point);
        assert_eq!(lights[0].transform.origin(), DVec3::new(0.0, 0.0, 100.0));
        assert_eq!(lights[0].color, Color::new(255, 200, 100));
        assert_eq!(lights[1].kind, LightKind::Spot);
        assert_eq!(lights[1].color, Color::WHITE);
    }
}
