use std::error::Error;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use semver::Version;
use tracing::debug;

use crate::document::Document;
use crate::emitter::{self, EmitContext, GeneratorProgram};
use crate::encoding::TextEncoding;
use crate::error::BuildError;
use crate::fs::{self, FileSystem, OsFileSystem};
use crate::include::IncludeExpander;
use crate::naming;
use crate::parser::Parser;
use crate::version;

/// Settings shared by every build of a [`SourceGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Version checked against `dswift-tools-version` directives.
    pub tools_version: Version,
    /// Prefix generated output with a "do not edit" banner.
    pub banner: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            tools_version: version::current_tools_version(),
            banner: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Mark the written file read-only.
    pub read_only: bool,
}

/// Compiles and runs a generator program, returning the text it renders.
///
/// This is the boundary to the Swift toolchain; nothing in this crate
/// implements it.
pub trait ExecutionDriver {
    fn execute(&self, program: &GeneratorProgram) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Final rendered output of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    pub text: String,
    pub encoding: TextEncoding,
}

/// A template after version checks and include expansion.
#[derive(Debug, Clone)]
pub struct ExpandedTemplate {
    pub path: PathBuf,
    pub document: Document,
    pub encoding: TextEncoding,
}

/// Entry point: turns `.dswift` templates into generator programs.
#[derive(Debug, Clone, Default)]
pub struct SourceGenerator<F = OsFileSystem> {
    fs: F,
    config: GeneratorConfig,
}

impl SourceGenerator<OsFileSystem> {
    pub fn new(config: GeneratorConfig) -> Self {
        SourceGenerator {
            fs: OsFileSystem,
            config,
        }
    }
}

impl<F: FileSystem> SourceGenerator<F> {
    pub fn with_file_system(fs: F, config: GeneratorConfig) -> Self {
        SourceGenerator { fs, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    /// Read `template`, check its version directive and expand its includes.
    pub fn expand(
        &self,
        template: &Path,
        encoding: Option<TextEncoding>,
    ) -> Result<ExpandedTemplate, BuildError> {
        let path = fs::absolute_path(template)?;
        let (source, encoding) = fs::read_text(&self.fs, &path, encoding)?;
        let document =
            IncludeExpander::new(&self.fs, &self.config.tools_version).expand(&path, &source)?;
        Ok(ExpandedTemplate {
            path,
            document,
            encoding,
        })
    }

    /// Build the generator program for `template`.
    pub fn generate_program(
        &self,
        template: &Path,
        encoding: Option<TextEncoding>,
    ) -> Result<GeneratorProgram, BuildError> {
        debug!(template = %template.display(), "building generator program");
        let expanded = self.expand(template, encoding)?;

        let class_name = naming::generator_class_name(&expanded.path);
        let template_name = expanded
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let context = EmitContext {
            class_name: &class_name,
            template_name: &template_name,
            encoding: expanded.encoding,
            tools_version: &self.config.tools_version,
            banner: self.config.banner,
        };

        let program = emitter::emit(
            Parser::new(&expanded.document).blocks(),
            &expanded.document,
            &context,
        )?;
        debug!(
            template = %expanded.path.display(),
            class = %program.class_name,
            statements = program.statements.len(),
            "generator program built"
        );
        Ok(program)
    }

    /// Build and run the generator for `template`, returning the rendered text.
    pub fn generate_source(
        &self,
        template: &Path,
        encoding: Option<TextEncoding>,
        driver: &dyn ExecutionDriver,
    ) -> Result<GeneratedSource, BuildError> {
        let program = self.generate_program(template, encoding)?;
        let text = driver
            .execute(&program)
            .map_err(|source| BuildError::Execution {
                template: program.template.clone(),
                source,
            })?;
        Ok(GeneratedSource {
            text,
            encoding: program.encoding,
        })
    }

    /// Render `template` into `destination`.
    ///
    /// Nothing is written unless generation succeeds. An existing destination
    /// is replaced, never left half written.
    pub fn generate_source_to(
        &self,
        template: &Path,
        destination: &Path,
        encoding: Option<TextEncoding>,
        driver: &dyn ExecutionDriver,
        options: WriteOptions,
    ) -> Result<(), BuildError> {
        let generated = self.generate_source(template, encoding, driver)?;
        write_text(destination, &generated.text, generated.encoding, options)
    }
}

impl<F: FileSystem + Sync> SourceGenerator<F> {
    /// Build the generator programs of many templates in parallel.
    ///
    /// Results come back in the order of `templates`.
    pub fn generate_programs(
        &self,
        templates: &[PathBuf],
        encoding: Option<TextEncoding>,
    ) -> Vec<Result<GeneratorProgram, BuildError>> {
        templates
            .par_iter()
            .map(|template| self.generate_program(template, encoding))
            .collect()
    }
}

/// Replace `destination` with `text` encoded as `encoding`.
pub fn write_text(
    destination: &Path,
    text: &str,
    encoding: TextEncoding,
    options: WriteOptions,
) -> Result<(), BuildError> {
    if destination.exists() {
        set_read_only(destination, false)?;
        std::fs::remove_file(destination).map_err(|e| BuildError::io("remove", destination, e))?;
    }

    if let Err(e) = std::fs::write(destination, encoding.encode(text)) {
        let _ = std::fs::remove_file(destination);
        return Err(BuildError::io("write", destination, e));
    }

    if options.read_only {
        set_read_only(destination, true)?;
    }
    Ok(())
}

#[allow(clippy::permissions_set_readonly_false)]
fn set_read_only(path: &Path, read_only: bool) -> Result<(), BuildError> {
    let metadata = std::fs::metadata(path).map_err(|e| BuildError::io("inspect", path, e))?;
    let mut permissions = metadata.permissions();
    if permissions.readonly() == read_only {
        return Ok(());
    }
    permissions.set_readonly(read_only);
    std::fs::set_permissions(path, permissions)
        .map_err(|e| BuildError::io("change permissions of", path, e))
}
