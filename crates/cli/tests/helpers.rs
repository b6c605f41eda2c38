use std::path::Path;

use callsweep::{resolve_relative, sha256_file};
use tempfile::tempdir;

#[test]
fn sha256_file_matches_known_digest() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("abc.bin");
    std::fs::write(&path, b"abc").expect("write");
    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn sha256_file_errors_for_missing_file() {
    let tmp = tempdir().expect("tempdir");
    let err = sha256_file(&tmp.path().join("missing")).unwrap_err();
    assert!(err.to_string().contains("Failed to open binary for hashing"));
}

#[test]
fn resolve_relative_keeps_absolute_paths() {
    let base = Path::new("/specs");
    assert_eq!(resolve_relative(base, Path::new("bin/app")), Path::new("/specs/bin/app"));
    assert_eq!(resolve_relative(base, Path::new("/opt/app")), Path::new("/opt/app"));
}
