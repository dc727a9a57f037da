//! Zip export of generated files

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::domain::{FileTaskError, GeneratedFile, validate_relative_path};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Refusing to archive {filename}: {source}")]
    UnsafePath {
        filename: String,
        #[source]
        source: FileTaskError,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pack files into zip bytes, one entry per file at its relative path
///
/// Entry names always use `/` separators.
pub fn to_zip(files: &[GeneratedFile]) -> Result<Vec<u8>, ArchiveError> {
    debug!(count = files.len(), "to_zip: called");
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let relative = validate_relative_path(&file.filename).map_err(|source| ArchiveError::UnsafePath {
            filename: file.filename.clone(),
            source,
        })?;
        let name = entry_name(&relative);
        writer.start_file(name, options)?;
        writer.write_all(file.content.as_bytes())?;
    }

    let bytes = writer.finish()?.into_inner();
    info!(count = files.len(), bytes = bytes.len(), "Built project archive");
    Ok(bytes)
}

/// Filename -> bytes view of a zip, for inspection
pub fn read_zip(bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = BTreeMap::new();
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx)?;
        if entry.is_dir() {
            continue;
        }
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        entries.insert(entry.name().to_string(), content);
    }
    Ok(entries)
}

/// Write the zip for `files` to `path`
pub fn write_zip(path: &Path, files: &[GeneratedFile]) -> Result<(), ArchiveError> {
    let bytes = to_zip(files)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_zip_preserves_paths_and_content() {
        let files = vec![
            GeneratedFile::new("index.html", "<!doctype html>\n<title>Todo</title>\n"),
            GeneratedFile::new("css/style.css", "body { margin: 0; }"),
            GeneratedFile::new("notes.txt", "caf\u{e9} \u{1f680}"),
        ];

        let view = read_zip(&to_zip(&files).unwrap()).unwrap();

        assert_eq!(view.len(), 3);
        for file in &files {
            assert_eq!(view[&file.filename], file.content.as_bytes());
        }
    }

    #[test]
    fn test_empty_archive() {
        assert!(read_zip(&to_zip(&[]).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_unsafe_path_is_refused() {
        let files = vec![GeneratedFile::new("../escape.txt", "x")];
        assert!(matches!(to_zip(&files), Err(ArchiveError::UnsafePath { .. })));
    }

    #[test]
    fn test_write_zip_to_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/project.zip");
        write_zip(&path, &[GeneratedFile::new("a.js", "1")]).unwrap();

        let view = read_zip(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(view["a.js"], b"1");
    }
}
