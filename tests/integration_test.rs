use assert_cmd::Command;
use assert_cmd::cargo;
use h5p_registry::{
    DependencyResolver, Exporter, ImportSource, Importer, LibraryStore, ListFilter, RealRuntime,
};
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn manifest(name: &str, version: (u32, u32, u32), deps: &[(&str, u32, u32)]) -> Value {
    let deps: Vec<Value> = deps
        .iter()
        .map(|(n, major, minor)| json!({ "machineName": n, "majorVersion": major, "minorVersion": minor }))
        .collect();
    json!({
        "title": name,
        "machineName": name,
        "majorVersion": version.0,
        "minorVersion": version.1,
        "patchVersion": version.2,
        "runnable": 1,
        "preloadedDependencies": deps,
    })
}

fn create_zip(files: &[(String, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn library_entry(m: &Value) -> (String, String) {
    (
        format!(
            "{}-{}.{}/library.json",
            m["machineName"].as_str().unwrap(),
            m["majorVersion"],
            m["minorVersion"]
        ),
        m.to_string(),
    )
}

/// A column library with text and image children, text depending on fonts.
fn sample_archive() -> Vec<u8> {
    create_zip(&[
        library_entry(&manifest(
            "H5P.Column",
            (1, 13, 4),
            &[("H5P.Text", 1, 1), ("H5P.Image", 1, 1)],
        )),
        library_entry(&manifest("H5P.Text", (1, 1, 2), &[("H5P.Fonts", 1, 0)])),
        library_entry(&manifest("H5P.Image", (1, 1, 0), &[])),
        library_entry(&manifest("H5P.Fonts", (1, 0, 7), &[])),
        ("H5P.Text-1.1/scripts/text.js".to_string(), "var t;".to_string()),
    ])
}

struct Registry {
    root: TempDir,
}

impl Registry {
    fn new() -> Self {
        let registry = Self {
            root: tempdir().unwrap(),
        };
        for dir in [registry.libraries(), registry.temp(), registry.exports()] {
            fs::create_dir_all(dir).unwrap();
        }
        registry
    }

    fn libraries(&self) -> PathBuf {
        self.root.path().join("libraries")
    }

    fn temp(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    fn exports(&self) -> PathBuf {
        self.root.path().join("exports")
    }

    fn store(&self) -> LibraryStore<RealRuntime> {
        LibraryStore::open(RealRuntime, self.libraries()).unwrap()
    }

    fn import(&self, bytes: Vec<u8>) -> bool {
        let store = self.store();
        Importer::new(&store, self.temp()).import(&ImportSource::Bytes(bytes))
    }

    fn installed(&self) -> Vec<String> {
        let mut identities = self.store().list_identities(&ListFilter::default());
        identities.sort();
        identities
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(cargo::cargo_bin!("h5p-registry"));
        cmd.arg("--libraries-dir")
            .arg(self.libraries())
            .arg("--temp-dir")
            .arg(self.temp())
            .arg("--export-dir")
            .arg(self.exports());
        cmd
    }
}

fn dir_is_empty(path: &Path) -> bool {
    fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn test_export_then_import_round_trip() {
    let source = Registry::new();
    assert!(source.import(sample_archive()));

    let store = source.store();
    let closure = DependencyResolver::new(&store)
        .transitive_closure(&"H5P.Text 1.1".parse().unwrap());
    assert_eq!(closure.len(), 2);

    let archive = Exporter::new(&store, source.exports(), source.temp())
        .export(&"H5P.Column 1.13".parse().unwrap())
        .unwrap();
    assert_eq!(archive.file_name().unwrap(), "H5P.Column-1.13.4.h5p");

    let target = Registry::new();
    assert!(target.import(fs::read(&archive).unwrap()));

    assert_eq!(target.installed(), source.installed());
    assert_eq!(
        target.installed(),
        vec![
            "H5P.Column 1.13.4",
            "H5P.Fonts 1.0.7",
            "H5P.Image 1.1.0",
            "H5P.Text 1.1.2",
        ]
    );
    assert_eq!(
        fs::read_to_string(target.libraries().join("H5P.Text-1.1/scripts/text.js")).unwrap(),
        "var t;"
    );
}

#[test]
fn test_import_twice_is_idempotent() {
    let registry = Registry::new();
    assert!(registry.import(sample_archive()));
    let once = registry.installed();

    assert!(registry.import(sample_archive()));
    assert_eq!(registry.installed(), once);
    assert_eq!(fs::read_dir(registry.libraries()).unwrap().count(), 4);
    assert!(dir_is_empty(&registry.temp()));
}

#[test]
fn test_zip_slip_archive_is_rejected() {
    let registry = Registry::new();
    let archive = create_zip(&[
        library_entry(&manifest("H5P.Text", (1, 1, 0), &[])),
        ("../../etc/passwd".to_string(), "root::0:0".to_string()),
    ]);

    assert!(!registry.import(archive));
    assert!(dir_is_empty(&registry.libraries()));
    assert!(dir_is_empty(&registry.temp()));
}

#[test]
fn test_cli_import_and_deps() {
    let registry = Registry::new();
    let upload = registry.root.path().join("upload.h5p");
    fs::write(&upload, sample_archive()).unwrap();

    registry
        .cmd()
        .arg("import")
        .arg(&upload)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed H5P.Column-1.13"));

    registry
        .cmd()
        .args(["deps", "H5P.Column 1.13", "--transitive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("H5P.Fonts 1.0"))
        .stdout(predicate::str::contains("H5P.Image 1.1"));

    registry
        .cmd()
        .args(["deps", "H5P.Column 1.13", "--kind", "mandatory"])
        .assert()
        .success()
        .stdout(predicate::str::contains("H5P.Text 1.1"))
        .stdout(predicate::str::contains("H5P.Fonts").not());
}

#[test]
fn test_cli_export_writes_archive() {
    let registry = Registry::new();
    assert!(registry.import(sample_archive()));

    registry
        .cmd()
        .args(["export", "H5P.Text 1.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("H5P.Text-1.1.2.h5p"));

    assert!(registry.exports().join("H5P.Text-1.1.2.h5p").is_file());
}

#[test]
fn test_cli_check_reports_missing_dependency() {
    let registry = Registry::new();
    let archive = create_zip(&[library_entry(&manifest(
        "H5P.Column",
        (1, 13, 0),
        &[("X", 9, 9)],
    ))]);
    assert!(registry.import(archive));

    registry
        .cmd()
        .args(["check", "H5P.Column 1.13"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("X 9.9"));

    registry
        .cmd()
        .args(["check", "H5P.Column 1.13", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"kind\": \"missing_mandatory\""));
}

#[test]
fn test_cli_remove() {
    let registry = Registry::new();
    assert!(registry.import(sample_archive()));

    registry
        .cmd()
        .args(["remove", "H5P.Image 1.1"])
        .assert()
        .success();
    assert!(!registry.libraries().join("H5P.Image-1.1").exists());

    registry
        .cmd()
        .args(["remove", "H5P.Image 1.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn test_cli_rejects_malformed_library() {
    let registry = Registry::new();
    registry
        .cmd()
        .args(["export", "H5P.Text 1.x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed library identity"));
}

#[test]
fn test_cli_requires_subcommand() {
    Command::new(cargo::cargo_bin!("h5p-registry"))
        .assert()
        .failure();
}
