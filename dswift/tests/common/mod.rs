#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dswift::{FileSystem, GeneratorConfig, GeneratorProgram, SourceGenerator};
use semver::Version;

/// In-memory file system that counts reads per path.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: HashMap<PathBuf, Vec<u8>>,
    reads: Mutex<HashMap<PathBuf, usize>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, text: &str) -> Self {
        self.files.insert(PathBuf::from(path), text.as_bytes().to_vec());
        self
    }

    pub fn reads(&self, path: &str) -> usize {
        self.reads
            .lock()
            .unwrap()
            .get(Path::new(path))
            .copied()
            .unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        *self
            .reads
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default() += 1;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

pub fn config() -> GeneratorConfig {
    GeneratorConfig {
        tools_version: Version::new(1, 0, 16),
        banner: false,
    }
}

pub fn generator(fs: MemoryFileSystem) -> SourceGenerator<MemoryFileSystem> {
    SourceGenerator::with_file_system(fs, config())
}

/// Build `/project/main.dswift` from `source` with no other files present.
pub fn build(source: &str) -> Result<GeneratorProgram, dswift::BuildError> {
    let fs = MemoryFileSystem::new().with("/project/main.dswift", source);
    generator(fs).generate_program(Path::new("/project/main.dswift"), None)
}
