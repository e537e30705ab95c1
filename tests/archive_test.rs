use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use chrono::{TimeZone, Utc};
use proxy_templater::archive::{
    collect_entries, produce_archive, write_archive, AssetKind,
};
use proxy_templater::error::Error;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "apiproxy/myproxy.xml", "<APIProxy/>");
    write(dir.path(), "apiproxy/policies/p1.xml", "<Policy>myproxy</Policy>");
    write(dir.path(), "apiproxy/proxies/default.xml", "<ProxyEndpoint/>");
    fs::create_dir_all(dir.path().join("apiproxy/resources")).unwrap();
    dir
}

fn entry_names(archive: &Path) -> BTreeSet<String> {
    let zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    zip.file_names().map(str::to_string).collect()
}

#[test]
fn test_archive_contains_every_file() {
    let tree = sample_tree();
    let out = TempDir::new().unwrap();
    let archive = write_archive(tree.path(), &out.path().join("bundle.zip")).unwrap();

    let expected: BTreeSet<String> = [
        "apiproxy/myproxy.xml",
        "apiproxy/policies/p1.xml",
        "apiproxy/proxies/default.xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(entry_names(&archive), expected);

    let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    let mut content = String::new();
    zip.by_name("apiproxy/policies/p1.xml").unwrap().read_to_string(&mut content).unwrap();
    assert_eq!(content, "<Policy>myproxy</Policy>");
}

#[test]
fn test_entries_are_sorted_relative_names() {
    let tree = sample_tree();
    let names: Vec<String> =
        collect_entries(tree.path()).unwrap().into_iter().map(|(_, name)| name).collect();
    assert_eq!(
        names,
        vec!["apiproxy/myproxy.xml", "apiproxy/policies/p1.xml", "apiproxy/proxies/default.xml"]
    );
}

#[test]
fn test_produce_archive_name() {
    let tree = sample_tree();
    let out = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 7, 12, 33, 31).unwrap();

    let archive =
        produce_archive(tree.path(), AssetKind::ApiProxy, "oauth", out.path(), &now).unwrap();
    assert_eq!(archive, out.path().join("apiproxy-oauth-2024Jun07T123331.zip"));
    assert!(archive.is_file());
}

#[test]
fn test_unwritable_destination() {
    let tree = sample_tree();
    let out = TempDir::new().unwrap();
    let target = out.path().join("missing-dir").join("bundle.zip");

    match write_archive(tree.path(), &target) {
        Err(Error::ArchiveWriteError { path, .. }) => assert_eq!(path, target),
        other => panic!("Expected ArchiveWriteError, got {:?}", other),
    }
}

#[test]
fn test_asset_kind_detection() {
    let dir = TempDir::new().unwrap();
    assert_eq!(AssetKind::detect(dir.path()), AssetKind::ApiProxy);

    fs::create_dir_all(dir.path().join("sharedflowbundle")).unwrap();
    assert_eq!(AssetKind::detect(dir.path()), AssetKind::SharedFlow);
    assert_eq!(AssetKind::SharedFlow.collection(), "sharedflows");
}
