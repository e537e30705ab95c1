use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use proxy_templater::config::parse_config;
use proxy_templater::error::Error;
use proxy_templater::ignore::{is_skipped, skip_patterns};
use proxy_templater::processor::{
    is_descriptor_candidate, materialize, rename_descriptor, render_in_place,
};
use proxy_templater::renderer::MiniJinjaRenderer;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_source() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "apiproxy/original.xml", b"<APIProxy name=\"{{= proxyname }}\"/>");
    write(root, "apiproxy/policies/p1.xml", b"<Policy>{{= proxyname }}</Policy>\n");
    write(root, "apiproxy/policies/p1.xml~", b"backup");
    write(root, "apiproxy/policies/#disabled.xml", b"disabled");
    write(root, "apiproxy/proxies/endpoint.xml", b"<BasePath>{{= basepath }}</BasePath>");
    write(root, "apiproxy/resources/logo.png", &[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe]);
    fs::create_dir_all(root.join("apiproxy/empty")).unwrap();
    dir
}

fn render_tree(source: &Path, dest: &Path) {
    let engine = MiniJinjaRenderer::default();
    let config =
        parse_config(Path::new("c.json"), r#"{"proxyname": "myproxy", "basepath": "/v1"}"#)
            .unwrap();
    let skip = skip_patterns().unwrap();
    materialize(source, dest, &skip, "myproxy", |path| render_in_place(&engine, &config, path))
        .unwrap();
}

#[test]
fn test_materialize_renders_and_renames() {
    let source = sample_source();
    let out = TempDir::new().unwrap();
    let dest = out.path().join("bundle");
    render_tree(source.path(), &dest);

    assert!(dest.join("apiproxy/myproxy.xml").exists());
    assert!(!dest.join("apiproxy/original.xml").exists());
    assert_eq!(
        fs::read_to_string(dest.join("apiproxy/myproxy.xml")).unwrap(),
        "<APIProxy name=\"myproxy\"/>"
    );
    assert_eq!(
        fs::read_to_string(dest.join("apiproxy/policies/p1.xml")).unwrap(),
        "<Policy>myproxy</Policy>\n"
    );
    assert_eq!(
        fs::read_to_string(dest.join("apiproxy/proxies/endpoint.xml")).unwrap(),
        "<BasePath>/v1</BasePath>"
    );
    assert!(dest.join("apiproxy/empty").is_dir());
}

#[test]
fn test_materialize_skips_backup_and_disabled_files() {
    let source = sample_source();
    let out = TempDir::new().unwrap();
    let dest = out.path().join("bundle");
    render_tree(source.path(), &dest);

    assert!(!dest.join("apiproxy/policies/p1.xml~").exists());
    assert!(!dest.join("apiproxy/policies/#disabled.xml").exists());
}

#[test]
fn test_binary_files_are_copied_verbatim() {
    let source = sample_source();
    let out = TempDir::new().unwrap();
    let dest = out.path().join("bundle");
    render_tree(source.path(), &dest);

    assert_eq!(
        fs::read(dest.join("apiproxy/resources/logo.png")).unwrap(),
        vec![0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe]
    );
}

#[test]
fn test_materialize_is_idempotent() {
    let source = sample_source();
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    render_tree(source.path(), first.path());
    render_tree(source.path(), second.path());

    assert!(!dir_diff::is_different(first.path(), second.path()).unwrap());
}

#[test]
fn test_callback_sees_every_copied_file() {
    let source = sample_source();
    let out = TempDir::new().unwrap();
    let seen = RefCell::new(Vec::<PathBuf>::new());
    let skip = skip_patterns().unwrap();
    materialize(source.path(), out.path(), &skip, "myproxy", |path| {
        seen.borrow_mut().push(path.strip_prefix(out.path()).unwrap().to_path_buf());
        Ok(())
    })
    .unwrap();

    let mut seen = seen.into_inner();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            PathBuf::from("apiproxy/original.xml"),
            PathBuf::from("apiproxy/policies/p1.xml"),
            PathBuf::from("apiproxy/proxies/endpoint.xml"),
            PathBuf::from("apiproxy/resources/logo.png"),
        ]
    );
}

#[test]
fn test_render_failure_aborts() {
    let source = TempDir::new().unwrap();
    write(source.path(), "apiproxy/bad.xml", b"{{= undefined_key }}");
    let out = TempDir::new().unwrap();
    let engine = MiniJinjaRenderer::default();
    let config = parse_config(Path::new("c.json"), r#"{"proxyname": "p"}"#).unwrap();
    let skip = skip_patterns().unwrap();

    let result = materialize(source.path(), out.path(), &skip, "p", |path| {
        render_in_place(&engine, &config, path)
    });
    match result {
        Err(Error::TemplateRenderError { path, .. }) => assert!(path.ends_with("apiproxy/bad.xml")),
        other => panic!("Expected TemplateRenderError, got {:?}", other),
    }
}

#[test]
fn test_rename_without_descriptor_is_noop() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "sharedflowbundle/common.xml", b"<SharedFlowBundle/>");

    assert!(rename_descriptor(dir.path(), "myproxy").unwrap().is_none());
    assert!(dir.path().join("sharedflowbundle/common.xml").exists());
}

#[test]
fn test_rename_keeps_already_named_descriptor() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "apiproxy/myproxy.xml", b"<APIProxy/>");

    let renamed = rename_descriptor(dir.path(), "myproxy").unwrap();
    assert_eq!(renamed, Some(dir.path().join("apiproxy/myproxy.xml")));
}

#[test]
fn test_rename_conflict() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "apiproxy/one.xml", b"<APIProxy/>");
    write(dir.path(), "apiproxy/two.xml", b"<APIProxy/>");

    match rename_descriptor(dir.path(), "myproxy") {
        Err(Error::ProxyDescriptorConflict { candidates }) => assert_eq!(candidates.len(), 2),
        other => panic!("Expected ProxyDescriptorConflict, got {:?}", other),
    }
}

#[test]
fn test_is_descriptor_candidate() {
    assert!(is_descriptor_candidate(Path::new("/tmp/x/apiproxy/proxy.xml")));
    assert!(!is_descriptor_candidate(Path::new("/tmp/x/apiproxy/policies/p1.xml")));
    assert!(!is_descriptor_candidate(Path::new("/tmp/x/apiproxy/readme.md")));
    assert!(!is_descriptor_candidate(Path::new("/tmp/x/sharedflowbundle/flow.xml")));
}

#[test]
fn test_skip_patterns() {
    let skip = skip_patterns().unwrap();
    assert!(is_skipped(&skip, Path::new("apiproxy/policies/p1.xml~")));
    assert!(is_skipped(&skip, Path::new("apiproxy/#p1.xml")));
    assert!(!is_skipped(&skip, Path::new("apiproxy/p#1.xml")));
    assert!(!is_skipped(&skip, Path::new("#dir/p1.xml")));
}
