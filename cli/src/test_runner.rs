use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use codespan_reporting::term::termcolor::{
    Color, ColorChoice, ColorSpec, StandardStream, WriteColor,
};
use semver::Version;
use serde::Deserialize;
use walkdir::WalkDir;

use dswift::version::{current_tools_version, parse_tools_version};
use dswift::{
    BuildError, FileSystem, GeneratorConfig, GeneratorProgram, OsFileSystem, SourceGenerator,
};

pub const FIXTURE_SUFFIX: &str = ".test.dswift";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Tools version the template is built with. Defaults to the running one.
    #[serde(default)]
    pub tools_version: Option<String>,

    /// The build must fail with an error whose message contains this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// 1-based line of the innermost error location. Lines count from the
    /// first line after the frontmatter.
    #[serde(default)]
    pub expect_line: Option<usize>,

    /// Substrings the generator program source must contain.
    #[serde(default)]
    pub expect_contains: Vec<String>,

    /// Exact concatenation of the literal text the generator appends.
    #[serde(default)]
    pub expect_text: Option<String>,
}

/// Split a `.test.dswift` file into its TOML config and template body.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let (toml_str, rest) = if let Some(rest) = after_open.strip_prefix("---") {
        ("", rest)
    } else {
        let close_pos = after_open
            .find("\n---")
            .ok_or("missing closing --- frontmatter delimiter")?;
        (&after_open[..close_pos], &after_open[close_pos + 4..])
    };
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str.trim_end_matches('\r'))
            .map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, body))
}

/// Serves the fixture's template body in place of the fixture file itself;
/// every other path (included files) comes from disk.
struct FixtureFileSystem {
    path: PathBuf,
    body: Vec<u8>,
}

impl FileSystem for FixtureFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        if path == self.path {
            Ok(self.body.clone())
        } else {
            OsFileSystem.read(path)
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path == self.path || OsFileSystem.exists(path)
    }
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.trim_end_matches(FIXTURE_SUFFIX))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path, default_version: Option<&Version>) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };
    let (config, body) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    let tools_version = match &config.tools_version {
        Some(value) => match parse_tools_version(value) {
            Ok(version) => version,
            Err(e) => return fail(description, format!("invalid tools_version '{}': {}", value, e)),
        },
        None => default_version.cloned().unwrap_or_else(current_tools_version),
    };

    let absolute = match dswift::fs::absolute_path(path) {
        Ok(p) => p,
        Err(e) => return fail(description, e.to_string()),
    };
    let fs = FixtureFileSystem {
        path: absolute.clone(),
        body: body.as_bytes().to_vec(),
    };
    let generator = SourceGenerator::with_file_system(
        fs,
        GeneratorConfig {
            tools_version,
            banner: false,
        },
    );
    let result = generator.generate_program(&absolute, None);

    let outcome = match check_result(&config, result) {
        Some(reason) => TestOutcome::Fail(reason),
        None => TestOutcome::Pass,
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Compare a build result with the fixture's expectations. Returns `Some(reason)` on mismatch.
fn check_result(
    config: &TestConfig,
    result: Result<GeneratorProgram, BuildError>,
) -> Option<String> {
    match (&config.expect_error, result) {
        (Some(expected), Err(error)) => check_error(expected, config.expect_line, &error),
        (Some(expected), Ok(_)) => Some(format!(
            "expected error containing \"{}\", but the build succeeded",
            expected
        )),
        (None, Err(error)) => Some(format!("unexpected error: {}", describe(&error))),
        (None, Ok(program)) => check_program(config, &program),
    }
}

fn check_error(expected: &str, expected_line: Option<usize>, error: &BuildError) -> Option<String> {
    let message = describe(error);
    if !message.contains(expected) {
        return Some(format!(
            "expected error containing \"{}\", got: {}",
            expected, message
        ));
    }

    let expected_line = expected_line?;
    match error.root_cause().location() {
        Some(location) if location.line == expected_line => None,
        Some(location) => Some(format!(
            "expected error on line {}, but it is on line {} of {}",
            expected_line,
            location.line,
            location.path.display()
        )),
        None => Some(format!(
            "expected error on line {}, but the error has no location",
            expected_line
        )),
    }
}

fn check_program(config: &TestConfig, program: &GeneratorProgram) -> Option<String> {
    if let Some(expected) = &config.expect_text {
        let actual = program.static_text();
        if actual != *expected {
            return Some(format!(
                "text mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    let missing: Vec<&String> = config
        .expect_contains
        .iter()
        .filter(|needle| !program.source.contains(needle.as_str()))
        .collect();
    if !missing.is_empty() {
        let lines: Vec<String> = missing.iter().map(|m| format!("  - {:?}", m)).collect();
        return Some(format!(
            "generator program is missing:\n{}\n  program:\n{}",
            lines.join("\n"),
            program.source
        ));
    }

    None
}

/// The error message followed by each underlying cause.
fn describe(error: &BuildError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}

/// Discover fixtures grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(FIXTURE_SUFFIX));
        if !entry.file_type().is_file() || !is_fixture {
            continue;
        }
        let category = path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        categories.entry(category).or_default().push(path.to_path_buf());
    }
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

/// List available categories for the given fixture path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(cat), files.len());
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// Writes the progress and summary of a fixture run.
struct Reporter<W> {
    out: W,
}

fn fg(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec
}

impl<W: WriteColor> Reporter<W> {
    fn painted(&mut self, text: &str, spec: &ColorSpec) -> io::Result<()> {
        self.out.set_color(spec)?;
        write!(self.out, "{}", text)?;
        self.out.reset()
    }

    fn heading(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.set_color(ColorSpec::new().set_bold(true))?;
        write!(self.out, "{}", text)?;
        self.out.reset()?;
        writeln!(self.out)
    }

    fn outcome(&mut self, result: &TestResult) -> io::Result<()> {
        write!(self.out, "  ")?;
        match result.outcome {
            TestOutcome::Pass => self.painted("PASS", &fg(Color::Green))?,
            TestOutcome::Fail(_) => self.painted("FAIL", &fg(Color::Red))?,
        }
        writeln!(self.out, "  {}", result.label())
    }

    fn failures(&mut self, failures: &[TestResult]) -> io::Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        writeln!(self.out)?;
        writeln!(self.out, "failures:")?;
        for failure in failures {
            writeln!(self.out)?;
            writeln!(self.out, "  --- {} ---", failure.path.display())?;
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    writeln!(self.out, "  {}", line)?;
                }
            }
        }
        Ok(())
    }

    fn summary(&mut self, passed: usize, failed: usize) -> io::Result<()> {
        writeln!(self.out)?;
        write!(self.out, "test result: ")?;
        if failed == 0 {
            self.painted("ok", &fg(Color::Green))?;
            writeln!(self.out, ". {} passed, 0 failed", passed)
        } else {
            self.painted("FAILED", &fg(Color::Red))?;
            writeln!(
                self.out,
                ". {} passed, {} failed (of {})",
                passed,
                failed,
                passed + failed
            )
        }
    }
}

/// Select the categories to run; `requested` empty means all of them.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let mut found = false;
        for (cat, files) in all {
            if cat == request || cat.starts_with(&format!("{}/", request)) {
                selected.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                all.keys().map(|k| category_label(k)).collect::<Vec<_>>().join(", ")
            );
        }
    }
    selected
}

/// Run every fixture under `path` (or a single fixture file).
/// If `categories` is non-empty, only fixtures in those categories run.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(
    path: &Path,
    no_color: bool,
    categories: &[String],
    tools_version: Option<&Version>,
) -> i32 {
    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        let selected = select_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.clone()))
            .collect()
    };

    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let mut reporter = Reporter {
        out: StandardStream::stderr(color_choice),
    };
    match run_groups(&mut reporter, &groups, !path.is_file(), tools_version) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("error: cannot write test report: {}", e);
            1
        }
    }
}

/// Run `groups` and report on them. Returns whether every fixture passed.
fn run_groups<W: WriteColor>(
    reporter: &mut Reporter<W>,
    groups: &[(String, Vec<PathBuf>)],
    show_categories: bool,
    tools_version: Option<&Version>,
) -> io::Result<bool> {
    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in groups {
        if show_categories {
            reporter.heading(category_label(cat))?;
        }
        for file in files {
            let result = run_single_test(file, tools_version);
            reporter.outcome(&result)?;
            if matches!(result.outcome, TestOutcome::Pass) {
                passed += 1;
            } else {
                failures.push(result);
            }
        }
    }

    reporter.failures(&failures)?;
    reporter.summary(passed, failures.len())?;
    Ok(failures.is_empty())
}
