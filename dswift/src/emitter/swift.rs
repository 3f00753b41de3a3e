use std::fmt::Write;

use crate::emitter::{EmitContext, Statement};

const OUTPUT: &str = "__dswiftOutput";
const ARGUMENTS: &str = "__dswiftArguments";
const INDENT: &str = "    ";

/// Escape `text` for use inside a Swift string literal.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Render the generator as a single `main.swift` unit.
pub(crate) fn render(
    context: &EmitContext<'_>,
    declarations: &[String],
    statements: &[Statement],
) -> String {
    let mut out = String::new();
    let class = context.class_name;

    line(
        &mut out,
        0,
        &format!(
            "// Generator for '{}'. Run with the destination path as its only argument.",
            context.template_name
        ),
    );
    line(&mut out, 0, "import Foundation");
    line(&mut out, 0, "");
    line(&mut out, 0, &format!("public class {} {{", class));

    for declaration in declarations {
        code(&mut out, 1, declaration);
        line(&mut out, 0, "");
    }

    line(&mut out, 1, "public init() { }");
    line(&mut out, 0, "");
    line(&mut out, 1, "public func generate() -> String {");
    line(&mut out, 2, &format!("var {}: String = \"\"", OUTPUT));
    for statement in statements {
        match statement {
            Statement::Literal(text) => {
                line(&mut out, 2, &format!("{} += \"{}\"", OUTPUT, escape_literal(text)));
            }
            Statement::Code(content) => code(&mut out, 2, content),
            Statement::Print(expression) if !expression.contains('\n') => {
                line(&mut out, 2, &format!("{} += \"\\({})\"", OUTPUT, expression));
            }
            Statement::Print(expression) => {
                line(&mut out, 2, &format!("{} += String(describing: (", OUTPUT));
                code(&mut out, 3, expression);
                line(&mut out, 2, "))");
            }
        }
    }
    line(&mut out, 2, &format!("return {}", OUTPUT));
    line(&mut out, 1, "}");
    line(&mut out, 0, "}");
    line(&mut out, 0, "");

    line(&mut out, 0, &format!("let {} = CommandLine.arguments", ARGUMENTS));
    line(&mut out, 0, &format!("guard {}.count == 2 else {{", ARGUMENTS));
    line(
        &mut out,
        1,
        &format!(
            concat!(
                "FileHandle.standardError.write(",
                "\"usage: \\({}[0]) <destination>\\n\".data(using: .utf8)!)"
            ),
            ARGUMENTS
        ),
    );
    line(&mut out, 1, "exit(1)");
    line(&mut out, 0, "}");
    line(&mut out, 0, "do {");
    line(
        &mut out,
        1,
        &format!(
            "try {}().generate().write(toFile: {}[1], atomically: true, encoding: {})",
            class,
            ARGUMENTS,
            context.encoding.swift_name()
        ),
    );
    line(&mut out, 0, "} catch {");
    line(
        &mut out,
        1,
        "FileHandle.standardError.write(\"\\(error)\\n\".data(using: .utf8)!)",
    );
    line(&mut out, 1, "exit(1)");
    line(&mut out, 0, "}");

    out
}

fn line(out: &mut String, level: usize, text: &str) {
    if !text.is_empty() {
        for _ in 0..level {
            out.push_str(INDENT);
        }
        out.push_str(text);
    }
    out.push('\n');
}

/// Copy user code line by line at `level`, leaving blank lines blank.
fn code(out: &mut String, level: usize, content: &str) {
    for source_line in content.split('\n') {
        let source_line = source_line.strip_suffix('\r').unwrap_or(source_line);
        line(out, level, source_line);
    }
}
