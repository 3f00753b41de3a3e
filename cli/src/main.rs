mod diagnostics;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::term::termcolor::ColorChoice;
use semver::Version;
use tracing::{debug, warn};
use walkdir::WalkDir;

use dswift::generator::write_text;
use dswift::version::parse_tools_version;
use dswift::{GeneratorConfig, SourceGenerator, TextEncoding, WriteOptions};

use diagnostics::Diagnostics;

const SUBCOMMANDS: &[&str] = &["emit", "check", "test", "help"];
/// Options whose value is a separate argument.
const VALUE_OPTIONS: &[&str] = &["--tools-version", "-j", "--jobs", "-o", "--output", "--encoding"];
const TEMPLATE_EXTENSION: &str = "dswift";

#[derive(Parser)]
#[command(name = "dswift", version, about = "Dynamic Swift template preprocessor")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log debug events (RUST_LOG is honoured as well)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Tools version to check `dswift-tools-version` directives against
    #[arg(long, global = true, value_parser = parse_tools_version)]
    tools_version: Option<Version>,

    /// Worker threads for building many templates (defaults to one per core)
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print or write the generator program of a template
    Emit(EmitArgs),

    /// Build every template under the given paths and report errors
    Check(CheckArgs),

    /// Run .test.dswift fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct EmitArgs {
    /// Template file to build
    template: PathBuf,

    /// Write the generator program here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Template encoding (detected from the byte-order mark when omitted)
    #[arg(long)]
    encoding: Option<TextEncoding>,

    /// Mark the written output read-only
    #[arg(long, requires = "output")]
    read_only: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Template files or directories to search for `.dswift` templates
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Template encoding (detected from the byte-order mark when omitted)
    #[arg(long)]
    encoding: Option<TextEncoding>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.dswift file or directory containing them
    path: PathBuf,

    /// Run only fixtures in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `dswift file.dswift` is shorthand for `dswift emit file.dswift`.
    let args = with_default_subcommand(std::env::args().collect());
    let cli = Cli::parse_from(&args);

    setup_logging(cli.verbose, cli.no_color);

    if let Some(jobs) = cli.jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
            warn!("could not configure {} worker threads: {}", jobs, e);
        }
    }

    let config = GeneratorConfig {
        tools_version: cli
            .tools_version
            .clone()
            .unwrap_or_else(dswift::version::current_tools_version),
        ..GeneratorConfig::default()
    };
    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let exit_code = match cli.command {
        Command::Emit(args) => do_emit(args, config, color_choice),
        Command::Check(args) => do_check(args, config, color_choice),
        Command::Test(args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                0
            } else {
                test_runner::run_tests(
                    &args.path,
                    cli.no_color,
                    &args.category,
                    cli.tools_version.as_ref(),
                )
            }
        }
    };
    process::exit(exit_code);
}

fn with_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let mut rest = args.iter().skip(1);
    let mut first_positional = None;
    while let Some(arg) = rest.next() {
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with('-') {
            first_positional = Some(arg);
            break;
        }
    }

    if first_positional.is_some_and(|first| !SUBCOMMANDS.contains(&first.as_str())) {
        args.insert(1, "emit".to_string());
    }
    args
}

fn setup_logging(verbose: bool, no_color: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn do_emit(args: EmitArgs, config: GeneratorConfig, color_choice: ColorChoice) -> i32 {
    let generator = SourceGenerator::new(config);
    let program = match generator.generate_program(&args.template, args.encoding) {
        Ok(program) => program,
        Err(error) => {
            Diagnostics::new(color_choice).report(&error);
            return 1;
        }
    };

    let Some(output) = args.output else {
        print!("{}", program.source);
        return 0;
    };

    let options = WriteOptions {
        read_only: args.read_only,
    };
    match write_text(&output, &program.source, TextEncoding::Utf8, options) {
        Ok(()) => {
            eprintln!("ok: wrote {} for {}", output.display(), args.template.display());
            0
        }
        Err(error) => {
            Diagnostics::new(color_choice).report(&error);
            1
        }
    }
}

fn do_check(args: CheckArgs, config: GeneratorConfig, color_choice: ColorChoice) -> i32 {
    let templates = discover_templates(&args.paths);
    if templates.is_empty() {
        eprintln!("error: no .{} templates found", TEMPLATE_EXTENSION);
        return 1;
    }
    debug!(count = templates.len(), "checking templates");

    let generator = SourceGenerator::new(config);
    let results = generator.generate_programs(&templates, args.encoding);

    let mut diagnostics = Diagnostics::new(color_choice);
    let mut failed = 0usize;
    for (template, result) in templates.iter().zip(&results) {
        match result {
            Ok(_) => eprintln!("ok: {}", template.display()),
            Err(error) => {
                failed += 1;
                diagnostics.report(error);
            }
        }
    }

    eprintln!();
    eprintln!(
        "checked {} template(s): {} ok, {} failed",
        templates.len(),
        templates.len() - failed,
        failed
    );
    if failed == 0 { 0 } else { 1 }
}

/// Expand `paths` into template files: files are taken as given, directories
/// are searched recursively. Fixture files are skipped.
fn discover_templates(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut templates = Vec::new();
    for path in paths {
        if path.is_file() {
            templates.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path) {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_template(entry.path()) => {
                    templates.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!("skipping unreadable entry: {}", e),
            }
        }
    }
    templates.sort();
    templates.dedup();
    templates
}

fn is_template(path: &Path) -> bool {
    let is_fixture = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(test_runner::FIXTURE_SUFFIX));
    !is_fixture && path.extension().is_some_and(|e| e == TEMPLATE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_template_defaults_to_emit() {
        assert_eq!(
            with_default_subcommand(args(&["dswift", "-v", "page.dswift"])),
            args(&["dswift", "emit", "-v", "page.dswift"])
        );
        assert_eq!(
            with_default_subcommand(args(&["dswift", "check", "src"])),
            args(&["dswift", "check", "src"])
        );
        assert_eq!(with_default_subcommand(args(&["dswift"])), args(&["dswift"]));
    }

    #[test]
    fn option_values_are_not_taken_for_the_template() {
        assert_eq!(
            with_default_subcommand(args(&["dswift", "--tools-version", "1.0.16", "check", "src"])),
            args(&["dswift", "--tools-version", "1.0.16", "check", "src"])
        );
        assert_eq!(
            with_default_subcommand(args(&["dswift", "-j", "4", "page.dswift"])),
            args(&["dswift", "emit", "-j", "4", "page.dswift"])
        );
        assert_eq!(
            with_default_subcommand(args(&["dswift", "-o", "Page.swift", "page.dswift"])),
            args(&["dswift", "emit", "-o", "Page.swift", "page.dswift"])
        );
        assert_eq!(
            with_default_subcommand(args(&["dswift", "--jobs=2", "test", "fixtures"])),
            args(&["dswift", "--jobs=2", "test", "fixtures"])
        );
    }

    #[test]
    fn rewritten_arguments_parse() {
        let cli = Cli::try_parse_from(with_default_subcommand(args(&[
            "dswift",
            "--tools-version",
            "1.0.16",
            "check",
            "src",
        ])))
        .unwrap();
        assert_eq!(cli.tools_version, Some(Version::new(1, 0, 16)));
        match cli.command {
            Command::Check(check) => assert_eq!(check.paths, [PathBuf::from("src")]),
            _ => panic!("expected the check subcommand"),
        }

        let rewritten = with_default_subcommand(args(&["dswift", "-j", "4", "page.dswift"]));
        let cli = Cli::try_parse_from(rewritten).unwrap();
        assert_eq!(cli.jobs, Some(4));
        assert!(matches!(
            cli.command,
            Command::Emit(ref emit) if emit.template == PathBuf::from("page.dswift")
        ));
    }

    #[test]
    fn fixtures_are_not_templates() {
        assert!(is_template(Path::new("a/page.dswift")));
        assert!(!is_template(Path::new("a/page.test.dswift")));
        assert!(!is_template(Path::new("a/page.swift")));
    }

    #[test]
    fn check_walks_directories() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.dswift"), "b").unwrap();
        std::fs::write(dir.path().join("nested/a.dswift"), "a").unwrap();
        std::fs::write(dir.path().join("nested/a.test.dswift"), "---\n---\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = discover_templates(&[dir.path().to_path_buf()]);
        assert_eq!(
            found,
            vec![dir.path().join("b.dswift"), dir.path().join("nested/a.dswift")]
        );
    }
}
