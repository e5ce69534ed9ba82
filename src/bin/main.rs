//! KT Exporter CLI
//!
//! Export JSON scene descriptions as Kerkythea XML.

use clap::{Parser, Subcommand};
use kt_exporter::{load_scene, AnimationFrame, ExportOptions, Exporter, MaterialLibrary};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kt-exporter")]
#[command(author, version, about = "Export 3D scenes as Kerkythea XML", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene description
    Export {
        /// Input JSON scene
        #[arg(short, long)]
        input: PathBuf,

        /// Output XML file; textures go to a folder next to it
        #[arg(short, long)]
        output: PathBuf,

        /// Write each component definition once with a placement list
        #[arg(long)]
        instanced: bool,

        /// Replace every material with plain white
        #[arg(long)]
        clay: bool,

        /// Give distorted texture projections their own texture files
        #[arg(long)]
        check_distortion: bool,

        /// Write UVs for untextured faces
        #[arg(long)]
        default_uvs: bool,

        /// Skip point and spot lights
        #[arg(long)]
        no_lights: bool,

        /// Skip geometry
        #[arg(long)]
        no_meshes: bool,

        /// Do not write texture files
        #[arg(long)]
        no_textures: bool,

        /// Model units to metres
        #[arg(long, default_value = "0.0254")]
        scale: f64,

        /// Saved kernel settings file
        #[arg(long)]
        render_settings: Option<PathBuf>,

        /// Viewport size for the current view (e.g. "1024x768")
        #[arg(long)]
        resolution: Option<String>,

        /// Animation frame, for animated lights
        #[arg(long, requires = "fps")]
        frame: Option<u32>,

        /// Animation frames per second
        #[arg(long, requires = "frame")]
        fps: Option<f64>,

        /// Material library (ZIP or directory)
        #[arg(long)]
        library: Option<PathBuf>,

        /// Library materials to attach as SCENE=LIBRARY pairs
        #[arg(long, value_parser = parse_attachment, requires = "library")]
        attach: Vec<(String, String)>,
    },

    /// List the materials of a library
    Library {
        /// Material library (ZIP or directory)
        #[arg(short, long)]
        path: PathBuf,
    },
}

fn parse_attachment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((scene, library)) if !scene.is_empty() && !library.is_empty() => {
            Ok((scene.to_string(), library.to_string()))
        }
        _ => Err(format!("Invalid attachment format: '{}'. Use scene=library", s)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            input,
            output,
            instanced,
            clay,
            check_distortion,
            default_uvs,
            no_lights,
            no_meshes,
            no_textures,
            scale,
            render_settings,
            resolution,
            frame,
            fps,
            library,
            attach,
        } => {
            let options = ExportOptions {
                export_meshes: !no_meshes,
                export_lights: !no_lights,
                clay,
                check_distortion,
                default_uvs,
                instanced,
                copy_textures: !no_textures,
                scale,
                render_settings,
                animation: frame.zip(fps).map(|(frame, fps)| AnimationFrame { frame, fps }),
                resolution,
                ..Default::default()
            };
            export(&input, &output, options, library, &attach)?;
        }
        Commands::Library { path } => {
            list_library(&path)?;
        }
    }

    Ok(())
}

fn export(
    input: &PathBuf,
    output: &PathBuf,
    options: ExportOptions,
    library: Option<PathBuf>,
    attach: &[(String, String)],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading scene from {:?}...", input);
    let mut scene = load_scene(input)?;
    println!(
        "  Found {} entities, {} definitions, {} materials",
        scene.entities.len(),
        scene.definitions.len(),
        scene.materials.len()
    );

    if let Some(library_path) = library {
        let library = MaterialLibrary::load(&library_path)?;
        for (scene_material, library_material) in attach {
            library.attach_to_scene(&mut scene, scene_material, library_material)?;
            println!("  Attached {} to {}", library_material, scene_material);
        }
    }

    let report = Exporter::with_options(options).export_to_path(&scene, output)?;
    println!("{}", report);

    Ok(())
}

fn list_library(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading material library from {:?}...", path);
    let library = MaterialLibrary::load(path)?;

    println!("\nMaterial Library Info:");
    println!("  Files: {}", library.files.len());
    for name in library.names() {
        println!("  {}", name);
    }

    Ok(())
}
