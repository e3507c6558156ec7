//! End-to-end tests for the `geosql` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// POINT(1 2), little endian
const POINT_WKB: &str = "0101000000000000000000f03f0000000000000040";

fn geosql() -> Command {
    Command::cargo_bin("geosql").unwrap()
}

/// The registry lists the OrientDB backend with every operation supported.
#[test]
fn test_drivers_lists_orientdb() {
    geosql()
        .arg("drivers")
        .assert()
        .success()
        .stdout(predicate::str::contains("OrientDB"))
        .stdout(predicate::str::contains("Supported"));
}

/// Crosses and Touches are absent from the OrientDB repertoire.
#[test]
fn test_capabilities() {
    geosql()
        .arg("capabilities")
        .assert()
        .success()
        .stdout(predicate::str::contains("DWithin"))
        .stdout(predicate::str::contains("Touches").not())
        .stdout(predicate::str::contains("Crosses").not());
}

#[test]
fn test_capabilities_unknown_driver() {
    geosql()
        .args(["capabilities", "--driver", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Driver 'nope' not found."));
}

#[test]
fn test_decode_hex() {
    geosql()
        .args(["decode", "--hex", POINT_WKB])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("POINT"));
}

/// A WKB file decodes the same as its hex form.
#[test]
fn test_decode_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("point.wkb");
    fs::write(&path, hex::decode(POINT_WKB)?)?;

    geosql()
        .args(["decode", "--file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("POINT"));
    Ok(())
}

#[test]
fn test_decode_needs_an_input() {
    geosql().arg("decode").assert().failure();
}

#[test]
fn test_decode_rejects_bad_hex() {
    geosql()
        .args(["decode", "--hex", "zz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid hex"));
}

#[test]
fn test_envelope() {
    geosql()
        .args(["envelope", "--hex", POINT_WKB])
        .assert()
        .success()
        .stdout("1 2 1 2\n");
}

#[test]
fn test_translate_contains() {
    geosql()
        .args(["translate", "--op", "contains", "--wkt", "POINT(1 2)"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("WHERE ST_Contains(geom, ST_GeomFromText('POINT"));
}

#[test]
fn test_translate_bbox() {
    geosql()
        .args(["translate", "--op", "bbox", "--property", "the_geom", "--bounds", "-1,-1,1,1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("WHERE ST_Intersects(the_geom,ST_GeomFromText('POLYGON"));
}

#[test]
fn test_translate_unsupported_operator() {
    geosql()
        .args(["translate", "--op", "touches", "--wkt", "POINT(1 2)"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Touches"));
}

#[test]
fn test_limit_with_offset() {
    geosql()
        .args(["limit", "--limit", "10", "--offset", "20", "--sql", "SELECT * FROM roads"])
        .assert()
        .success()
        .stdout("SELECT * FROM roads SKIP 20 LIMIT 10\n");
}
