//! Material library loading from ZIP files and directories.

use super::{LibraryFile, MaterialLibrary};
use crate::error::{ExportError, Result};
use std::io::Read;
use std::path::Path;

/// Load every `.xml` library below a directory, or inside a ZIP archive.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<MaterialLibrary> {
    let path = path.as_ref();

    let library = if path.is_dir() {
        load_from_directory(path)?
    } else {
        let data = std::fs::read(path)?;
        let base = path
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        load_from_bytes_with_base(&data, &base)?
    };

    if library.files.is_empty() {
        return Err(ExportError::MaterialLibrary(format!(
            "no .xml libraries found in {}",
            path.display()
        )));
    }
    log::info!("Loaded {} material libraries from {}", library.files.len(), path.display());
    Ok(library)
}

/// Load libraries from ZIP data. Texture paths are relative to the
/// archive's own folders.
pub fn load_from_bytes(data: &[u8]) -> Result<MaterialLibrary> {
    load_from_bytes_with_base(data, "")
}

fn load_from_bytes_with_base(data: &[u8], base: &str) -> Result<MaterialLibrary> {
    let cursor = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor)?;
    let mut library = MaterialLibrary::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() || !is_library_file(file.name()) {
            continue;
        }
        let name = file.name().to_string();

        let mut contents = String::new();
        if let Err(e) = file.read_to_string(&mut contents) {
            log::warn!("Skipping library {}: {}", name, e);
            continue;
        }

        let folder = match name.rsplit_once('/') {
            Some((folder, _)) => folder,
            None => "",
        };
        let directory = match (base.is_empty(), folder.is_empty()) {
            (true, _) => folder.to_string(),
            (false, true) => base.to_string(),
            (false, false) => format!("{}/{}", base, folder),
        };
        library.add_file(LibraryFile::new(name, directory, contents));
    }

    Ok(library)
}

fn load_from_directory(path: &Path) -> Result<MaterialLibrary> {
    let mut library = MaterialLibrary::new();
    load_files_recursive(path, &mut library)?;
    Ok(library)
}

fn load_files_recursive(dir: &Path, library: &mut MaterialLibrary) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            load_files_recursive(&path, library)?;
        } else if is_library_file(&path.to_string_lossy()) {
            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) => {
                    log::warn!("Skipping library {}: {}", path.display(), e);
                    continue;
                }
            };
            let directory = dir.to_string_lossy().replace('\\', "/");
            library.add_file(LibraryFile::new(
                path.to_string_lossy().into_owned(),
                directory,
                contents,
            ));
        }
    }
    Ok(())
}

fn is_library_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}
