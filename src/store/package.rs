//! Zip packaging and HTML discovery over artifact trees

use super::layout::SEMANTIC_DIFF_FILE;
use super::StoreError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Whether a file under the artifact directory belongs in the package
pub fn is_packaged(file_name: &str) -> bool {
    !(file_name.ends_with(".zip")
        || file_name.starts_with('.')
        || file_name == SEMANTIC_DIFF_FILE)
}

/// Zip every packaged file under `source_dir` into `zip_path`
///
/// The archive is written next to its destination under a hidden temporary
/// name and renamed into place, so readers never see a half-written zip.
/// Returns the number of files written.
pub fn write_package(source_dir: &Path, zip_path: &Path) -> Result<usize, StoreError> {
    let parent = zip_path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| StoreError::io(format!("create {}", parent.display()), e))?;

    let tmp_path = parent.join(format!(".package-{}.tmp", uuid::Uuid::new_v4()));
    let result = write_zip(source_dir, &tmp_path).and_then(|count| {
        fs::rename(&tmp_path, zip_path)
            .map_err(|e| StoreError::io(format!("publish {}", zip_path.display()), e))?;
        Ok(count)
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_zip(source_dir: &Path, zip_path: &Path) -> Result<usize, StoreError> {
    let file = File::create(zip_path)
        .map_err(|e| StoreError::io(format!("create {}", zip_path.display()), e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| StoreError::Archive(format!("walk artifact dir: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !is_packaged(&name) {
            debug!(file = %name, "Skipping file in package");
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| StoreError::Archive(e.to_string()))?;
        let archive_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        writer
            .start_file(archive_name, options)
            .map_err(|e| StoreError::Archive(e.to_string()))?;
        let mut input = File::open(entry.path())
            .map_err(|e| StoreError::io(format!("read {}", entry.path().display()), e))?;
        io::copy(&mut input, &mut writer)
            .map_err(|e| StoreError::io(format!("compress {}", entry.path().display()), e))?;
        count += 1;
    }

    writer
        .finish()
        .map_err(|e| StoreError::Archive(e.to_string()))?;
    Ok(count)
}

/// First `.html` file anywhere under `dir`
///
/// Entries are visited in file-name order so the pick is stable across runs.
pub fn find_html_file(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("html"))
                    .unwrap_or(false)
        })
        .map(|e| e.into_path())
}
