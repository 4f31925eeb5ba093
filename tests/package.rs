// tests/package.rs

//! Package container loading, scoped mutation and building.

mod common;

use common::{setup_source_dir, source, write_package};
use fomm::{
    CopyInstruction, Error, Package, PackageBuilder, PackageFiles, PackageInfo, SourceMapper,
    Version,
};

#[test]
fn test_package_without_metadata_gets_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_package(temp_dir.path(), "Better Cities.fomod", &[("cities.esp", "x")]);

    let package = Package::open(&path).unwrap();
    let info = package.info();
    assert_eq!(info.name, "Better Cities");
    assert_eq!(info.author, "DEFAULT");
    assert_eq!(info.version, "1.0");
    assert_eq!(info.machine_version, Version::new(1, 0));
    assert_eq!(info.min_tool_version, Version::new4(0, 0, 0, 0));
    assert!(!package.has_script());
    assert!(!package.has_readme());
    assert!(!package.is_active());
}

#[test]
fn test_newer_minimum_version_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_package(
        temp_dir.path(),
        "cities.fomod",
        &[("fomod/info.xml", "<fomod><MinFommVersion>9.0.0.0</MinFommVersion></fomod>")],
    );

    let err = Package::open_with_tool_version(&path, &Version::new4(0, 14, 0, 0)).unwrap_err();
    assert!(err.is_incompatible());
    assert!(err.to_string().contains("9.0.0.0"));
}

#[test]
fn test_malformed_metadata_is_format_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    for (name, document) in [
        ("unknown.fomod", "<fomod><Homepage>x</Homepage></fomod>"),
        ("wrongroot.fomod", "<package><Name>x</Name></package>"),
        ("empty.fomod", "<?xml version=\"1.0\"?>"),
    ] {
        let path = write_package(temp_dir.path(), name, &[("fomod/info.xml", document)]);
        assert!(
            matches!(Package::open(&path), Err(Error::FormatError(_))),
            "{} should fail to load",
            name
        );
    }
}

#[test]
fn test_interrupted_mutation_keeps_script_and_readme() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_package(
        temp_dir.path(),
        "cities.fomod",
        &[
            ("fomod/script.cs", "original script"),
            ("readme - cities.txt", "original readme"),
        ],
    );

    let mut package = Package::open(&path).unwrap();
    let result = package.transaction(|tx| {
        tx.add("fomod/script.cs", "new script");
        tx.delete("readme - cities.txt");
        tx.add("readme - cities.rtf", "new readme");
        Err(Error::TransactionError("simulated failure".to_string()))
    });
    assert!(result.is_err());

    let reopened = Package::open(&path).unwrap();
    assert_eq!(reopened.script().unwrap().as_deref(), Some("original script"));
    assert_eq!(reopened.readme().unwrap().as_deref(), Some("original readme"));
    assert_eq!(reopened.readme_extension(), Some("txt"));
}

#[test]
fn test_commit_info_writes_only_changed_fields() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_package(temp_dir.path(), "cities.fomod", &[("cities.esp", "x")]);

    let mut package = Package::open(&path).unwrap();
    package.info_mut().author = "Arthmoor".to_string();
    package.commit_info(false, None).unwrap();

    let mut reopened = Package::open(&path).unwrap();
    let document = String::from_utf8(reopened.read_file("fomod/info.xml").unwrap()).unwrap();
    assert!(document.contains("<Author>Arthmoor</Author>"));
    assert!(!document.contains("<Name>"));
    assert!(!document.contains("<Version"));
    assert!(!document.contains("<MinFommVersion>"));
    assert_eq!(reopened.read_file("cities.esp").unwrap(), b"x");
}

#[test]
fn test_build_from_mapper_output() {
    let (temp_dir, cities) = setup_source_dir();
    let mut mapper = SourceMapper::new();
    mapper.add_path(None, &source(&cities)).unwrap();
    let docs = mapper.new_folder(None, "docs").unwrap();
    let notes = temp_dir.path().join("notes.txt");
    std::fs::write(&notes, b"notes").unwrap();
    mapper.add_path(Some(docs), &source(&notes)).unwrap();

    let mut info = PackageInfo::with_defaults("Better Cities");
    info.version = "2.1".to_string();
    info.machine_version = Version::new(2, 1);

    let output = temp_dir.path().join("out/Better Cities.fomod");
    let result = PackageBuilder::new(info)
        .with_instructions(mapper.copy_instructions())
        .with_instructions([CopyInstruction::new(source(&notes), "cities/NOTES.txt")])
        .with_readme("{\\rtf1 Better Cities}")
        .build(&output)
        .unwrap();
    assert_eq!(result.path, output);

    let mut package = Package::open(&output).unwrap();
    assert_eq!(package.info().machine_version, Version::new(2, 1));
    assert_eq!(package.readme().unwrap().as_deref(), Some("{\\rtf1 Better Cities}"));
    assert_eq!(package.read_file("cities/textures/city/wall.dds").unwrap(), b"wall");
    assert_eq!(package.read_file("docs/notes.txt").unwrap(), b"notes");
    assert_eq!(package.read_file("cities/notes.txt").unwrap(), b"notes");
    assert!(package.file_names().contains(&"readme - better cities.rtf".to_string()));
}
