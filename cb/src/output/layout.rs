//! Writing generated files under a project root

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{FileTaskError, GeneratedFile, validate_relative_path};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Refusing to write {filename}: {source}")]
    UnsafePath {
        filename: String,
        #[source]
        source: FileTaskError,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Maps generated files to locations under a project root
///
/// Files whose extension appears in `asset_dirs` land in that subdirectory
/// (e.g. `logo.png` -> `assets/logo.png`); everything else keeps its
/// relative path.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    by_extension: BTreeMap<String, String>,
}

impl ProjectLayout {
    /// `asset_dirs` is subdirectory -> extensions (without dots)
    pub fn new(root: impl Into<PathBuf>, asset_dirs: &BTreeMap<String, Vec<String>>) -> Self {
        let by_extension = asset_dirs
            .iter()
            .flat_map(|(dir, exts)| {
                exts.iter()
                    .map(move |ext| (ext.trim_start_matches('.').to_ascii_lowercase(), dir.clone()))
            })
            .collect();
        Self {
            root: root.into(),
            by_extension,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a file would be written to, relative to the root
    pub fn relative_path(&self, filename: &str) -> Result<PathBuf, LayoutError> {
        let relative = validate_relative_path(filename).map_err(|source| LayoutError::UnsafePath {
            filename: filename.to_string(),
            source,
        })?;

        let subdir = relative
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.by_extension.get(&e.to_ascii_lowercase()));

        match subdir {
            Some(dir) if !relative.starts_with(dir) => Ok(Path::new(dir).join(&relative)),
            _ => Ok(relative),
        }
    }

    /// Write one file, creating parent directories
    pub fn write(&self, file: &GeneratedFile) -> Result<PathBuf, LayoutError> {
        let path = self.root.join(self.relative_path(&file.filename)?);
        debug!(?path, bytes = file.content.len(), "ProjectLayout::write: called");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LayoutError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, &file.content).map_err(|source| LayoutError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Write every file; stops at the first failure
    pub fn write_all(&self, files: &[GeneratedFile]) -> Result<Vec<PathBuf>, LayoutError> {
        let written = files.iter().map(|f| self.write(f)).collect::<Result<Vec<_>, _>>()?;
        info!(count = written.len(), "Wrote project files to {}", self.root.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use tempfile::TempDir;

    fn layout(root: &Path) -> ProjectLayout {
        ProjectLayout::new(root, &OutputConfig::default().asset_dirs)
    }

    #[test]
    fn test_images_go_to_assets() {
        let layout = layout(Path::new("out"));
        assert_eq!(layout.relative_path("logo.PNG").unwrap(), PathBuf::from("assets/logo.PNG"));
        assert_eq!(layout.relative_path("assets/icon.svg").unwrap(), PathBuf::from("assets/icon.svg"));
        assert_eq!(layout.relative_path("src/app.js").unwrap(), PathBuf::from("src/app.js"));
    }

    #[test]
    fn test_escape_is_refused() {
        let layout = layout(Path::new("out"));
        assert!(matches!(
            layout.relative_path("../etc/passwd"),
            Err(LayoutError::UnsafePath { .. })
        ));
        assert!(layout.relative_path("/abs/file.txt").is_err());
    }

    #[test]
    fn test_write_all_preserves_content() {
        let temp = TempDir::new().unwrap();
        let layout = layout(temp.path());
        let files = vec![
            GeneratedFile::new("index.html", "<h1>Todo</h1>\n"),
            GeneratedFile::new("js/app.js", "console.log('hi');"),
        ];

        let written = layout.write_all(&files).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("js/app.js")).unwrap(),
            "console.log('hi');"
        );
        assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), "<h1>Todo</h1>\n");
    }
}
