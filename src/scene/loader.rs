//! Scene loading from JSON files and bytes.

use super::{Node, Scene};
use crate::error::{ExportError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Load a scene description from a JSON file.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Scene> {
    let data = std::fs::read(path.as_ref())?;
    load_from_bytes(&data)
}

/// Load a scene description from JSON bytes and check its references.
pub fn load_from_bytes(data: &[u8]) -> Result<Scene> {
    let scene: Scene = serde_json::from_slice(data)?;
    validate(&scene)?;
    Ok(scene)
}

/// Check that every definition, material and layer reference resolves,
/// that every face has at least three vertices and that no definition
/// contains itself.
pub fn validate(scene: &Scene) -> Result<()> {
    for node in &scene.entities {
        validate_node(scene, node)?;
    }
    for (name, definition) in &scene.definitions {
        if let Some(high_poly) = &definition.high_poly {
            if !scene.definitions.contains_key(high_poly) {
                return Err(ExportError::InvalidScene(format!(
                    "definition '{}' redirects to unknown definition '{}'",
                    name, high_poly
                )));
            }
        }
        for node in &definition.entities {
            validate_node(scene, node)?;
        }
    }
    check_cycles(scene)
}

/// Reject definitions that contain themselves, directly, through other
/// definitions, or through a high-detail redirect.
fn check_cycles(scene: &Scene) -> Result<()> {
    let mut names: Vec<&str> = scene.definitions.keys().map(String::as_str).collect();
    names.sort_unstable();

    let mut finished = HashSet::new();
    for name in names {
        visit_definition(scene, name, &mut Vec::new(), &mut finished)?;
    }
    Ok(())
}

fn visit_definition<'s>(
    scene: &'s Scene,
    name: &'s str,
    path: &mut Vec<&'s str>,
    finished: &mut HashSet<&'s str>,
) -> Result<()> {
    if finished.contains(name) {
        return Ok(());
    }
    if path.contains(&name) {
        return Err(ExportError::InvalidScene(format!(
            "definition '{}' contains itself ({} -> {})",
            name,
            path.join(" -> "),
            name
        )));
    }
    let Some(definition) = scene.definitions.get(name) else {
        return Ok(());
    };

    let mut children = Vec::new();
    definition_references(&definition.entities, &mut children);
    children.extend(definition.high_poly.as_deref());

    path.push(name);
    for child in children {
        visit_definition(scene, child, path, finished)?;
    }
    path.pop();
    finished.insert(name);
    Ok(())
}

/// Definitions instanced anywhere below `nodes`, groups included.
fn definition_references<'s>(nodes: &'s [Node], out: &mut Vec<&'s str>) {
    for node in nodes {
        match node {
            Node::Group(group) => definition_references(&group.entities, out),
            Node::Instance(instance) => out.push(&instance.definition),
            Node::Face(_) => {}
        }
    }
}

fn validate_node(scene: &Scene, node: &Node) -> Result<()> {
    match node {
        Node::Group(group) => {
            check_material(scene, group.material.as_deref())?;
            for child in &group.entities {
                validate_node(scene, child)?;
            }
        }
        Node::Instance(instance) => {
            if !scene.definitions.contains_key(&instance.definition) {
                return Err(ExportError::InvalidScene(format!(
                    "unknown definition '{}'",
                    instance.definition
                )));
            }
            check_material(scene, instance.material.as_deref())?;
        }
        Node::Face(face) => {
            if face.vertices.len() < 3 {
                return Err(ExportError::InvalidScene(format!(
                    "face with {} vertices",
                    face.vertices.len()
                )));
            }
            check_material(scene, face.material.as_deref())?;
            check_material(scene, face.back_material.as_deref())?;
        }
    }
    Ok(())
}

fn check_material(scene: &Scene, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) if !scene.materials.contains_key(name) => Err(ExportError::InvalidScene(
            format!("unknown material '{}'", name),
        )),
        _ => Ok(()),
    }
}
