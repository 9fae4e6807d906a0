use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Extensions of GLSL sources, one per stage plus the stage-less `glsl`.
pub const GLSL_EXTENSIONS: [&str; 7] = ["vert", "frag", "comp", "geom", "tesc", "tese", "glsl"];

/// Extension of native Metal shading language sources.
pub const METAL_EXTENSION: &str = "metal";

/// Errors that stop discovery altogether.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("shader root `{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to walk shader directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A shader source found under the discovery root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFile {
    /// Path relative to the root, always `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub filename: String,
    /// Extension without the leading dot.
    pub extension: String,
}

impl ShaderFile {
    pub fn is_glsl(&self) -> bool {
        GLSL_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn is_metal(&self) -> bool {
        self.extension == METAL_EXTENSION
    }
}

pub fn is_shader_extension(extension: &str) -> bool {
    extension == METAL_EXTENSION || GLSL_EXTENSIONS.contains(&extension)
}

/// Recursively collects every shader source under `root`, sorted by
/// relative path.
///
/// Files with other extensions are ignored, as is anything that is not a
/// regular file once followed (such as a symlink to a directory).
pub fn discover(root: &Path) -> Result<Vec<ShaderFile>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_owned()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            // Removed while we were walking it.
            Err(err) if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                debug!("skipping vanished path: {err}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let path = entry.path();
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !is_shader_extension(extension) || !path.is_file() {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };

        files.push(ShaderFile {
            relative_path: normalize(relative),
            absolute_path: path.to_owned(),
            filename: entry.file_name().to_string_lossy().into_owned(),
            extension: extension.to_owned(),
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn normalize(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "void main() {}").unwrap();
    }

    #[test]
    fn finds_shaders_recursively_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "vulkan/shader.vert");
        touch(dir.path(), "basic.frag");
        touch(dir.path(), "metal/deep/nested/shader.metal");
        touch(dir.path(), "common.glsl");

        let files = discover(dir.path()).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            relative,
            [
                "basic.frag",
                "common.glsl",
                "metal/deep/nested/shader.metal",
                "vulkan/shader.vert",
            ]
        );

        let metal = &files[2];
        assert_eq!(metal.filename, "shader.metal");
        assert_eq!(metal.extension, "metal");
        assert!(metal.is_metal());
        assert!(!metal.is_glsl());
        assert_eq!(
            metal.absolute_path,
            dir.path().join("metal/deep/nested/shader.metal")
        );
    }

    #[test]
    fn ignores_unrecognized_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        touch(dir.path(), "shader.wgsl");
        touch(dir.path(), "shader.vert.bak");
        touch(dir.path(), "Makefile");
        touch(dir.path(), "tess.tesc");

        let files = discover(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "tess.tesc");
        assert!(files[0].is_glsl());
    }

    #[test]
    fn directories_with_shader_extensions_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("looks_like.vert")).unwrap();
        touch(dir.path(), "looks_like.vert/real.frag");

        let files = discover(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "looks_like.vert/real.frag");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }

    #[test]
    fn empty_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path()).unwrap().is_empty());
    }
}
