//! Config file loading and layering

use std::io::Write;

use tempfile::NamedTempFile;
use vtty::{Callbacks, ConfigPatch, VttyError};

#[test]
fn file_overrides_uri_and_backend_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "rows = 12").unwrap();
    writeln!(file, "convert_eol = false").unwrap();
    writeln!(file, "title = \"from file\"").unwrap();
    writeln!(file, "[extra]").unwrap();
    writeln!(file, "mood = \"calm\"").unwrap();

    let patch = ConfigPatch::load_file(file.path()).unwrap();
    let iface = vtty::create("echo://?rows=40&cols=50&mood=wild", &patch, Callbacks::new()).unwrap();
    let config = iface.config();

    assert_eq!(config.rows, 12);
    assert_eq!(config.cols, 50);
    assert!(!config.convert_eol);
    assert_eq!(config.extra.get("mood").map(String::as_str), Some("calm"));
    assert_eq!(iface.title(), "from file");
}

#[test]
fn broken_file_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "rows = [1, 2").unwrap();
    assert!(matches!(
        ConfigPatch::load_file(file.path()),
        Err(VttyError::Config(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ConfigPatch::load_file(&dir.path().join("absent.toml")),
        Err(VttyError::Io(_))
    ));
}
