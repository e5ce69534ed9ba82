//! # KT Exporter
//!
//! A Rust library for converting 3D scene graphs into Kerkythea XML scene
//! descriptions.
//!
//! ## Overview
//!
//! A [`Scene`] is a tree of groups, component instances and faces with its
//! materials, cameras and sun settings. The exporter walks the tree,
//! groups faces by material, and writes one XML document containing the
//! kernel settings, sky, meshes, cameras and lights. Bitmap textures are
//! written next to the document afterwards.
//!
//! ## Quick Start
//!
//! ```ignore
//! use kt_exporter::{load_scene, Exporter, ExportOptions};
//!
//! // Load a scene description
//! let scene = load_scene("path/to/scene.json")?;
//!
//! // Export with each component definition written once
//! let exporter = Exporter::with_options(ExportOptions::default().instanced());
//! let report = exporter.export_to_path(&scene, "out/room.xml")?;
//! println!("{}", report);
//! ```
//!
//! ## Material Libraries
//!
//! Materials from Kerkythea libraries can replace scene materials before
//! export:
//!
//! ```ignore
//! use kt_exporter::MaterialLibrary;
//!
//! let library = MaterialLibrary::load("path/to/materials.zip")?;
//! library.attach_to_scene(&mut scene, "Floor", "Oak")?;
//! ```

pub mod error;
pub mod types;
pub mod scene;
pub mod collect;
pub mod export;
pub mod library;

// Re-export main types for convenience
pub use error::{ExportError, Result};
pub use types::{BoundingBox, Color, Side, Transform};
pub use scene::{Camera, ComponentInstance, Definition, Face, Group, Material, Node, Scene, Texture};
pub use export::{AnimationFrame, ExportOptions, ExportReport, Exporter};
pub use library::{LibraryMaterial, MaterialLibrary};

/// Load a scene description from a JSON file.
pub fn load_scene<P: AsRef<std::path::Path>>(path: P) -> Result<Scene> {
    scene::loader::load_from_path(path)
}

/// Load a scene description from JSON bytes.
pub fn load_scene_from_bytes(data: &[u8]) -> Result<Scene> {
    scene::loader::load_from_bytes(data)
}

/// Export a scene with default options.
pub fn export_scene<P: AsRef<std::path::Path>>(scene: &Scene, path: P) -> Result<ExportReport> {
    Exporter::new().export_to_path(scene, path)
}
