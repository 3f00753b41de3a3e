pub mod block;
pub mod document;
pub mod emitter;
pub mod encoding;
pub mod error;
pub mod fs;
pub mod generator;
pub mod include;
pub mod naming;
pub mod parser;
pub mod version;

pub use block::Block;
pub use document::{Document, IncludeSite};
pub use emitter::{GeneratorProgram, Statement};
pub use encoding::TextEncoding;
pub use error::{BuildError, Location};
pub use fs::{FileSystem, OsFileSystem};
pub use generator::{
    ExecutionDriver, ExpandedTemplate, GeneratedSource, GeneratorConfig, SourceGenerator,
    WriteOptions,
};
pub use parser::{BlockKind, Parser};
