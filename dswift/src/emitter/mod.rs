//! Turns scanned blocks into a generator program.

mod swift;

use std::path::PathBuf;

use semver::Version;

use crate::block::Block;
use crate::document::Document;
use crate::encoding::TextEncoding;
use crate::error::BuildError;
use crate::parser::grammar::BlockKind;

pub use swift::escape_literal;

/// A statement of the generator's render method, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Append literal text.
    Literal(String),
    /// Statements copied verbatim from a code block.
    Code(String),
    /// Append the value of an expression.
    Print(String),
}

/// Everything the emitter needs besides the blocks themselves.
#[derive(Debug, Clone)]
pub struct EmitContext<'a> {
    pub class_name: &'a str,
    /// File name shown in the banner of the generated output.
    pub template_name: &'a str,
    pub encoding: TextEncoding,
    pub tools_version: &'a Version,
    pub banner: bool,
}

/// The emitted generator program.
#[derive(Debug, Clone)]
pub struct GeneratorProgram {
    pub class_name: String,
    pub template: PathBuf,
    /// Encoding the generated output is written with.
    pub encoding: TextEncoding,
    /// Declarations hoisted out of static blocks.
    pub declarations: Vec<String>,
    pub statements: Vec<Statement>,
    /// The compilable source of the program.
    pub source: String,
}

impl GeneratorProgram {
    /// The text the program renders when every code and print block
    /// contributes nothing: all literal appends joined together.
    pub fn static_text(&self) -> String {
        self.statements
            .iter()
            .filter_map(|s| match s {
                Statement::Literal(text) => Some(text.as_str()),
                Statement::Code(_) | Statement::Print(_) => None,
            })
            .collect()
    }
}

/// The banner written at the top of every generated file.
pub fn banner(template_name: &str, tools_version: &Version) -> String {
    format!(
        "// This file was generated from '{}' by dswift {}. Do not edit; changes will be lost.\n",
        template_name, tools_version
    )
}

/// Build the declarations and statements of a generator from `blocks`.
///
/// `document` is the include-expanded text the blocks were scanned from; it
/// locates errors.
pub fn plan<I>(
    blocks: I,
    document: &Document,
) -> Result<(Vec<String>, Vec<Statement>), BuildError>
where
    I: IntoIterator<Item = Result<Block, BuildError>>,
{
    let mut declarations = Vec::new();
    let mut statements = Vec::new();

    for block in blocks {
        let block = block?;
        match block.kind {
            BlockKind::Text => push_text(&mut statements, &block),
            BlockKind::Code => statements.push(Statement::Code(block.content)),
            BlockKind::Print => statements.push(Statement::Print(block.content.trim().to_string())),
            BlockKind::Static => declarations.push(block.content),
            BlockKind::Include => {
                return Err(document.error_at(block.range, |location| {
                    BuildError::FoundUnprocessedInclude { location }
                }));
            }
        }
    }

    Ok((declarations, statements))
}

/// Emit the generator program for `blocks`.
pub fn emit<I>(
    blocks: I,
    document: &Document,
    context: &EmitContext<'_>,
) -> Result<GeneratorProgram, BuildError>
where
    I: IntoIterator<Item = Result<Block, BuildError>>,
{
    let (declarations, mut statements) = plan(blocks, document)?;
    if context.banner {
        statements.insert(
            0,
            Statement::Literal(banner(context.template_name, context.tools_version)),
        );
    }

    let source = swift::render(context, &declarations, &statements);
    Ok(GeneratorProgram {
        class_name: context.class_name.to_string(),
        template: document.path().to_path_buf(),
        encoding: context.encoding,
        declarations,
        statements,
        source,
    })
}

/// Literal text is appended line by line with a line break between lines;
/// an empty last line appends nothing.
fn push_text(statements: &mut Vec<Statement>, block: &Block) {
    let lines: Vec<&str> = block.lines().collect();
    let last = lines.len().saturating_sub(1);
    for (index, line) in lines.into_iter().enumerate() {
        if index < last {
            statements.push(Statement::Literal(format!("{}\n", line)));
        } else if !line.is_empty() {
            statements.push(Statement::Literal(line.to_string()));
        }
    }
}
