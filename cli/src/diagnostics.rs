use std::collections::HashMap;
use std::path::{Path, PathBuf};

use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;

use dswift::fs::read_text;
use dswift::{BuildError, OsFileSystem};

/// Renders build errors to stderr against the template files they point into.
///
/// Templates are loaded the first time an error refers to them.
pub struct Diagnostics {
    files: SimpleFiles<String, String>,
    ids: HashMap<PathBuf, Option<usize>>,
    writer: StandardStream,
    config: term::Config,
}

impl Diagnostics {
    pub fn new(color_choice: ColorChoice) -> Self {
        Diagnostics {
            files: SimpleFiles::new(),
            ids: HashMap::new(),
            writer: StandardStream::stderr(color_choice),
            config: term::Config::default(),
        }
    }

    pub fn report(&mut self, error: &BuildError) {
        let diagnostic = error.to_diagnostic(|path| self.file_id(path));
        let _ = term::emit_to_write_style(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            &diagnostic,
        );
    }

    fn file_id(&mut self, path: &Path) -> Option<usize> {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }
        let id = match read_text(&OsFileSystem, path, None) {
            Ok((text, _)) => Some(self.files.add(path.display().to_string(), text)),
            Err(e) => {
                debug!(path = %path.display(), "cannot load file for diagnostics: {}", e);
                None
            }
        };
        self.ids.insert(path.to_path_buf(), id);
        id
    }
}
