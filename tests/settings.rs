use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use listdata::config::{Settings, Verbosity};

#[test]
fn defaults_without_a_file() {
    let settings = Settings::load(None).expect("defaults");
    assert_eq!(settings.indent, "  ");
    assert_eq!(settings.cellid_offset, 0);
    assert_eq!(settings.float_precision, None);
}

#[test]
fn file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("listdata.toml");
    fs::write(
        &path,
        "indent = \"    \"\ncellid_offset = 1\nverbosity = \"verbose\"\nfloat_precision = 4\nmodel_ws = \"sim\"\n",
    )
    .unwrap();
    let settings = Settings::load(Some(&path)).expect("reads toml");
    assert_eq!(settings.indent, "    ");
    assert_eq!(settings.cellid_offset, 1);
    assert_eq!(settings.verbosity, Verbosity::Verbose);
    assert_eq!(settings.float_precision, Some(4));
    assert_eq!(settings.resolve(Path::new("wel.txt")), PathBuf::from("sim/wel.txt"));
}

#[test]
fn broken_file_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("listdata.toml");
    fs::write(&path, "cellid_offset = \"one\"\n").unwrap();
    assert!(Settings::load(Some(&path)).is_err());
}
