//! Error types for the scene exporter.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Output path or model name cannot be represented by the renderer.
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or process an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Failed to read a ZIP archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Scene description is malformed.
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    /// A texture side file could not be written.
    #[error("Failed to write texture {path:?}: {message}")]
    TextureWrite { path: PathBuf, message: String },

    /// A material library could not be read or parsed.
    #[error("Material library error: {0}")]
    MaterialLibrary(String),

    /// A material was not present in any loaded library.
    #[error("Material not found in library: {0}")]
    MaterialNotFound(String),
}
