mod common;

use std::path::{Path, PathBuf};

use common::{MemoryFileSystem, config, generator};
use dswift::include::find_includes;
use dswift::{BuildError, Document, SourceGenerator, Statement};

const MAIN: &str = "/project/main.dswift";

fn build_with(fs: MemoryFileSystem) -> Result<dswift::GeneratorProgram, BuildError> {
    generator(fs).generate_program(Path::new(MAIN), None)
}

#[test]
fn include_is_replaced_by_marked_content() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "Hello <%= name %>!\n<%@include file=\"footer.dswift\" %>")
        .with("/project/footer.dswift", "Bye.");
    let program = build_with(fs).unwrap();

    assert_eq!(
        program.statements,
        vec![
            Statement::Literal("Hello ".into()),
            Statement::Print("name".into()),
            Statement::Literal("!\n".into()),
            Statement::Literal("// *** Begin Included 'footer.dswift' ***\n".into()),
            Statement::Literal("Bye.\n".into()),
            Statement::Literal("// *** End Include 'footer.dswift' ***\n".into()),
        ]
    );
}

#[test]
fn repeated_include_is_read_once_and_expands_identically() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "A<%@include file=\"part.txt\" %>B<%@include file=\"./part.txt\" %>C")
        .with("/project/part.txt", "X\n");
    let generator = generator(fs);
    let program = generator.generate_program(Path::new(MAIN), None).unwrap();

    assert_eq!(generator.file_system().reads("/project/part.txt"), 1);
    assert_eq!(
        program.static_text(),
        "A// *** Begin Included 'part.txt' ***\nX\n// *** End Include 'part.txt' ***\n\
         B// *** Begin Included './part.txt' ***\nX\n// *** End Include './part.txt' ***\nC"
    );
}

#[test]
fn nested_includes_resolve_relative_to_their_own_file() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "<%@include file=\"parts/outer.dswift\" %>")
        .with("/project/parts/outer.dswift", "outer\n<%@include file=\"../shared/inner.dswift\" %>")
        .with("/project/shared/inner.dswift", "inner\n");
    let text = build_with(fs).unwrap().static_text();

    assert!(text.contains("outer\n// *** Begin Included '../shared/inner.dswift' ***\ninner\n"));
}

#[test]
fn missing_include_names_both_paths() {
    let fs = MemoryFileSystem::new().with(MAIN, "top\n<%@include file=\"nope.txt\" %>");
    match build_with(fs).unwrap_err() {
        BuildError::IncludedFileNotFound {
            include_path,
            resolved,
            location,
        } => {
            assert_eq!(include_path, "nope.txt");
            assert_eq!(resolved, PathBuf::from("/project/nope.txt"));
            assert_eq!(location.path, PathBuf::from(MAIN));
            assert_eq!(location.line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn include_cycles_fail_instead_of_recursing() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "<%@include file=\"a.dswift\" %>")
        .with("/project/a.dswift", "a\n<%@include file=\"b.dswift\" %>")
        .with("/project/b.dswift", "b\n<%@include file=\"a.dswift\" %>");
    let error = build_with(fs).unwrap_err();

    assert_eq!(error.include_chain().len(), 2);
    match error.root_cause() {
        BuildError::CyclicInclude {
            include_path,
            chain,
            location,
        } => {
            assert_eq!(include_path, "a.dswift");
            assert_eq!(
                chain,
                &vec![
                    PathBuf::from(MAIN),
                    PathBuf::from("/project/a.dswift"),
                    PathBuf::from("/project/b.dswift"),
                    PathBuf::from("/project/a.dswift"),
                ]
            );
            assert_eq!(location.path, PathBuf::from("/project/b.dswift"));
            assert_eq!(location.line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn self_include_is_a_cycle() {
    let fs = MemoryFileSystem::new().with(MAIN, "<%@include file=\"main.dswift\" %>");
    assert!(matches!(
        build_with(fs).unwrap_err(),
        BuildError::CyclicInclude { .. }
    ));
}

#[test]
fn errors_inside_an_include_are_wrapped_with_the_include_site() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "one\ntwo\n<%@include file=\"bad.dswift\" %>")
        .with("/project/bad.dswift", "<%@include file=\"missing.dswift\" %>");
    let error = build_with(fs).unwrap_err();

    match &error {
        BuildError::FailedToIncludeFile {
            include_path,
            location,
            source,
        } => {
            assert_eq!(include_path, "bad.dswift");
            assert_eq!(location.line, 3);
            assert!(matches!(**source, BuildError::IncludedFileNotFound { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.to_string().contains("bad.dswift"));
}

#[test]
fn scanner_errors_point_into_the_included_file() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "line1\n<%@include file=\"inc.dswift\" %>\nafter\n")
        .with("/project/inc.dswift", "ok\n<% broken");
    let error = build_with(fs).unwrap_err();
    match error.root_cause() {
        BuildError::MissingClosingBlock { location, .. } => {
            assert_eq!(location.path, PathBuf::from("/project/inc.dswift"));
            assert_eq!(location.line, 2);
            assert_eq!(location.span, 3..5);
        }
        other => panic!("unexpected error: {other}"),
    }

    let chain = error.include_chain();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].path, PathBuf::from(MAIN));
    assert_eq!(chain[0].line, 2);
}

#[test]
fn scanner_errors_in_nested_includes_keep_every_include_site() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "a\n<%@include file=\"parts/outer.dswift\" %>\n")
        .with("/project/parts/outer.dswift", "x\ny\n<%@include file=\"inc.dswift\" %>")
        .with("/project/parts/inc.dswift", "<% broken");
    let error = build_with(fs).unwrap_err();

    match &error {
        BuildError::FailedToIncludeFile {
            include_path,
            source,
            ..
        } => {
            assert_eq!(include_path, "parts/outer.dswift");
            match &**source {
                BuildError::FailedToIncludeFile { include_path, .. } => {
                    assert_eq!(include_path, "inc.dswift");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }

    let chain: Vec<(PathBuf, usize)> = error
        .include_chain()
        .into_iter()
        .map(|site| (site.path.clone(), site.line))
        .collect();
    assert_eq!(
        chain,
        vec![
            (PathBuf::from(MAIN), 2),
            (PathBuf::from("/project/parts/outer.dswift"), 3),
        ]
    );
    assert!(matches!(
        error.root_cause(),
        BuildError::MissingClosingBlock { location, .. }
            if location.path == PathBuf::from("/project/parts/inc.dswift")
    ));
}

#[test]
fn scanner_errors_in_includes_show_the_include_site_in_diagnostics() {
    use codespan_reporting::diagnostic::LabelStyle;

    let fs = MemoryFileSystem::new()
        .with(MAIN, "a\n<%@include file=\"inc.dswift\" %>\n")
        .with("/project/inc.dswift", "<% broken");
    let error = build_with(fs).unwrap_err();

    let diagnostic = error.to_diagnostic(|path| match path.to_str() {
        Some(MAIN) => Some(0),
        Some("/project/inc.dswift") => Some(1),
        _ => None,
    });
    assert_eq!(diagnostic.labels.len(), 2);
    assert_eq!(diagnostic.labels[0].style, LabelStyle::Primary);
    assert_eq!(diagnostic.labels[0].file_id, 1);
    assert_eq!(diagnostic.labels[1].style, LabelStyle::Secondary);
    assert_eq!(diagnostic.labels[1].file_id, 0);
    assert_eq!(diagnostic.labels[1].range, 2..33);
    assert_eq!(diagnostic.labels[1].message, "included from here");
}

#[test]
fn errors_between_includes_have_no_include_chain() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "<%@include file=\"ok.dswift\" %>\n<%@include file=\"ok.dswift\" %>\n%>")
        .with("/project/ok.dswift", "fine\n");
    let error = build_with(fs).unwrap_err();
    assert!(error.include_chain().is_empty());
    match error {
        BuildError::MissingOpeningBlock { location } => assert_eq!(location.line, 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn a_cached_include_keeps_the_site_of_each_occurrence() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "<%@include file=\"a.dswift\" %>\n<%@include file=\"b.dswift\" %>\n")
        .with("/project/a.dswift", "<%@include file=\"shared.dswift\" %>")
        .with("/project/b.dswift", "b\n<%@include file=\"shared.dswift\" %>")
        .with("/project/shared.dswift", "shared body\n");
    let generator = generator(fs);
    let expanded = generator.expand(Path::new(MAIN), None).unwrap();
    assert_eq!(generator.file_system().reads("/project/shared.dswift"), 1);

    let sites_at = |offset: usize| -> Vec<(String, usize)> {
        expanded
            .document
            .include_sites(offset)
            .iter()
            .map(|site| (site.include_path.clone(), site.location.line))
            .collect()
    };
    let text = expanded.document.text();
    let first = text.find("shared body").unwrap();
    let second = text.rfind("shared body").unwrap();
    assert_ne!(first, second);

    assert_eq!(
        sites_at(first),
        vec![("a.dswift".to_string(), 1), ("shared.dswift".to_string(), 1)]
    );
    assert_eq!(
        sites_at(second),
        vec![("b.dswift".to_string(), 2), ("shared.dswift".to_string(), 2)]
    );
    assert!(sites_at(0).is_empty());
}

#[test]
fn scanner_errors_after_an_include_point_into_the_including_file() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "line1\n<%@include file=\"inc.dswift\" %>\nafter %>\n")
        .with("/project/inc.dswift", "ok\n");
    match build_with(fs).unwrap_err() {
        BuildError::MissingOpeningBlock { location } => {
            assert_eq!(location.path, PathBuf::from(MAIN));
            assert_eq!(location.line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn include_attribute_errors() {
    let cases = [
        ("<%@include %>", "MissingBlockAttribute"),
        ("<%@include file=\"a.txt %>", "AttributeMissingClosingQuote"),
        ("<%@include file=\"a\nb.txt\" %>", "InvalidIncludedFileFormat"),
        ("<%@include file=\"a.txt\"", "MissingClosingBlock"),
    ];
    for (source, expected) in cases {
        let error = build_with(MemoryFileSystem::new().with(MAIN, source)).unwrap_err();
        let name = match error {
            BuildError::MissingBlockAttribute { ref attribute, .. } => {
                assert_eq!(attribute, "file");
                "MissingBlockAttribute"
            }
            BuildError::AttributeMissingClosingQuote { .. } => "AttributeMissingClosingQuote",
            BuildError::InvalidIncludedFileFormat { .. } => "InvalidIncludedFileFormat",
            BuildError::MissingClosingBlock { .. } => "MissingClosingBlock",
            ref other => panic!("unexpected error for {source:?}: {other}"),
        };
        assert_eq!(name, expected, "for {source:?}");
    }
}

#[test]
fn find_includes_reports_spans_and_resolved_paths() {
    let document = Document::from_source(MAIN, "x<%@include file=\"sub/y.txt\" %>z");
    let includes = find_includes(&document).unwrap();
    assert_eq!(includes.len(), 1);
    assert_eq!(includes[0].include_range, 1..31);
    assert_eq!(includes[0].include_path, "sub/y.txt");
    assert_eq!(includes[0].absolute_path, PathBuf::from("/project/sub/y.txt"));
}

#[test]
fn includes_work_on_disk() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    std::fs::write(dir.path().join("header.dswift"), "// header for <%= title %>\n").unwrap();
    let main_path = dir.path().join("page.dswift");
    std::fs::write(&main_path, "<%@include file=\"header.dswift\" %>\nbody\n").unwrap();

    let generator = SourceGenerator::new(config());
    let program = generator.generate_program(&main_path, None).unwrap();
    assert!(program.statements.contains(&Statement::Print("title".into())));
    assert!(program.static_text().ends_with("// *** End Include 'header.dswift' ***\n\nbody\n"));
}

#[test]
fn includes_require_a_recent_enough_directive() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "// dswift-tools-version:1.0.0\n<%@include file=\"part.txt\" %>")
        .with("/project/part.txt", "x");
    match build_with(fs).unwrap_err() {
        BuildError::MinimumToolsVersionNotMet {
            expected,
            found,
            feature,
            location,
        } => {
            assert_eq!(expected, semver::Version::new(1, 0, 10));
            assert_eq!(found, semver::Version::new(1, 0, 0));
            assert_eq!(feature.as_deref(), Some("includes"));
            assert_eq!(location.line, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    let fs = MemoryFileSystem::new()
        .with(MAIN, "// dswift-tools-version:1.0.10\n<%@include file=\"part.txt\" %>")
        .with("/project/part.txt", "x");
    assert!(build_with(fs).is_ok());
}

#[test]
fn included_files_check_their_own_directive() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "<%@include file=\"new.dswift\" %>")
        .with("/project/new.dswift", "# dswift-tools-version: 9.0\nbody");
    let error = build_with(fs).unwrap_err();

    assert!(matches!(error, BuildError::FailedToIncludeFile { .. }));
    match error.root_cause() {
        BuildError::MinimumToolsVersionNotMet { expected, location, .. } => {
            assert_eq!(*expected, semver::Version::new(9, 0, 0));
            assert_eq!(location.path, PathBuf::from("/project/new.dswift"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn directive_of_an_included_file_is_not_copied() {
    let fs = MemoryFileSystem::new()
        .with(MAIN, "<%@include file=\"part.dswift\" %>")
        .with("/project/part.dswift", "// dswift-tools-version:1.0.0\npart\n");
    let text = build_with(fs).unwrap().static_text();
    assert!(!text.contains("dswift-tools-version"));
    assert!(text.contains("***\npart\n// ***"));
}
