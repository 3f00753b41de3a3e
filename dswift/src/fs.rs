use std::io;
use std::path::{Component, Path, PathBuf};

use crate::encoding::TextEncoding;
use crate::error::BuildError;

/// Read access to template files.
pub trait FileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Whether `path` names an existing file.
    fn exists(&self, path: &Path) -> bool;
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

/// Read and decode a text file. With no `encoding` given, it is detected.
pub fn read_text<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    encoding: Option<TextEncoding>,
) -> Result<(String, TextEncoding), BuildError> {
    let bytes = fs
        .read(path)
        .map_err(|e| BuildError::io("read", path, e))?;
    let encoding = match encoding {
        Some(encoding) => encoding,
        None => TextEncoding::detect(&bytes).ok_or_else(|| BuildError::UnknownEncoding {
            path: path.to_path_buf(),
        })?,
    };
    let text = encoding.decode(&bytes).ok_or_else(|| BuildError::Encoding {
        path: path.to_path_buf(),
        encoding,
    })?;
    Ok((text, encoding))
}

/// Make `path` absolute against the working directory and fold `.` and `..`.
pub fn absolute_path(path: &Path) -> Result<PathBuf, BuildError> {
    let absolute = std::path::absolute(path).map_err(|e| BuildError::io("resolve", path, e))?;
    Ok(normalize(&absolute))
}

/// Resolve an include reference against the directory of the including file.
pub fn resolve_include(including: &Path, reference: &str) -> PathBuf {
    let base = including.parent().unwrap_or_else(|| Path::new(""));
    normalize(&base.join(reference))
}

/// Lexically fold `.` and `..` components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let parent_is_normal =
                    matches!(out.components().next_back(), Some(Component::Normal(_)));
                if parent_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
