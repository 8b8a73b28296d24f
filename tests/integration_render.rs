//! Integration tests for the render pipeline, driven through the binary.

use predicates::prelude::*;

mod common;
use common::{write_layered_project, TestProject};

use gok::lockfile;

#[test]
fn test_render_to_directory_with_lock_file() {
    let project = TestProject::new();
    write_layered_project(&project);

    project
        .gok()
        .args(["render", "-m", "gok-manifest.yaml", "-t", "web", "-o", "out"])
        .assert()
        .success();

    assert_eq!(project.read("out/web/static.txt"), "static content\n");

    // layered properties: overlay patched the base file
    let merged = project.read("out/web/server.properties");
    assert!(merged.contains("a=base"));
    assert!(merged.contains("b=overlay"));
    assert!(merged.contains("c=overlay"));

    // lock file at the work-tree root records every file with its hash
    let lock = lockfile::read(&project.path().join("out")).unwrap();
    assert!(lock.files.contains_key("web/static.txt"));
    assert!(lock.files.contains_key("web/server.properties"));
    let recorded = &lock.files["web/static.txt"].hash;
    let actual = lockfile::file_sha256(&project.path().join("out/web/static.txt")).unwrap();
    assert_eq!(recorded, &actual);
}

#[test]
fn test_render_refuses_existing_output_dir() {
    let project = TestProject::new();
    write_layered_project(&project);
    project.write("out/marker.txt", "already here");

    project
        .gok()
        .args(["render", "-m", "gok-manifest.yaml", "-t", "web", "-o", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_value_precedence_flag_wins() {
    let project = TestProject::new();
    project.write(
        "gok-manifest.yaml",
        "\
version: 1
values:
  my_value: '1'
targets:
  web:
    output: web
    values:
      my_value: '2'
    templates:
      - path: templates/t
        values:
          my_value: '3'
",
    );
    project.write(
        "templates/t/gok-template.yaml",
        "version: 1\nimports:\n  values:\n    my_value: {required: true}\n",
    );
    project.write("templates/t/value.templ.txt", "{{ values.my_value }}");
    project.write(
        "external.yaml",
        "version: 1\nvalues:\n  my_value: '4'\n",
    );

    project
        .gok()
        .args([
            "render",
            "-m",
            "gok-manifest.yaml",
            "-t",
            "web",
            "-f",
            "external.yaml",
            "-v",
            "my_value=5",
            "-o",
            "out",
        ])
        .assert()
        .success();

    assert_eq!(project.read("out/web/value.txt"), "5");
}

#[test]
fn test_target_scoped_override_only_hits_its_target() {
    let project = TestProject::new();
    project.write(
        "gok-manifest.yaml",
        "\
version: 1
values:
  port: '1000'
targets:
  one:
    output: one
    templates: [{path: templates/t}]
  two:
    output: two
    templates: [{path: templates/t}]
",
    );
    project.write(
        "templates/t/gok-template.yaml",
        "version: 1\nimports:\n  values:\n    port: {required: true}\n",
    );
    project.write("templates/t/port.templ.txt", "{{ values.port }}");

    project
        .gok()
        .args([
            "render",
            "-m",
            "gok-manifest.yaml",
            "-A",
            "-v",
            "@one.port=2000",
            "-o",
            "out",
        ])
        .assert()
        .success();

    assert_eq!(project.read("out/one/port.txt"), "2000");
    assert_eq!(project.read("out/two/port.txt"), "1000");
}

#[test]
fn test_render_archive_output() {
    let project = TestProject::new();
    write_layered_project(&project);

    project
        .gok()
        .args([
            "render",
            "-m",
            "gok-manifest.yaml",
            "--tags",
            "production",
            "-o",
            "build.tar.gz",
        ])
        .assert()
        .success();

    assert!(project.exists("build.tar.gz"));

    // the archive holds the work tree including the lock file
    let extracted = tempfile::tempdir().unwrap();
    gok::archive::extract(&project.path().join("build.tar.gz"), extracted.path()).unwrap();
    assert!(extracted.path().join("web/static.txt").exists());
    assert!(extracted.path().join("gok-lock.yaml").exists());

    let lock = lockfile::read(extracted.path()).unwrap();
    assert!(lock.files.contains_key("web/server.properties"));
}

#[test]
fn test_render_unknown_target_fails() {
    let project = TestProject::new();
    write_layered_project(&project);

    project
        .gok()
        .args(["render", "-m", "gok-manifest.yaml", "-t", "ghost", "-o", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_render_missing_required_value_fails() {
    let project = TestProject::new();
    project.write(
        "gok-manifest.yaml",
        "version: 1\ntargets:\n  web:\n    output: web\n    templates: [{path: templates/t}]\n",
    );
    project.write(
        "templates/t/gok-template.yaml",
        "version: 1\nimports:\n  values:\n    absent.value:\n      description: must come from somewhere\n      required: true\n",
    );
    project.write("templates/t/file.txt", "x");

    project
        .gok()
        .args(["render", "-m", "gok-manifest.yaml", "-t", "web", "-o", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.value"));
}

#[test]
fn test_render_deletions_and_inheritance() {
    let project = TestProject::new();
    project.write(
        "gok-manifest.yaml",
        "version: 1\ntargets:\n  srv:\n    output: srv\n    templates:\n      - path: templates/child\n",
    );
    // child inherits base, then deletes one of its files
    project.write(
        "templates/child/gok-template.yaml",
        "version: 1\nname: child\ninherits:\n  - path: ../base\n",
    );
    project.write(
        "templates/child/gok-deletions.yaml",
        "version: 1\ndeletions:\n  - path: unwanted.txt\n",
    );
    project.write("templates/child/own.txt", "child file\n");
    project.write("templates/base/unwanted.txt", "to be deleted\n");
    project.write("templates/base/wanted.txt", "stays\n");

    project
        .gok()
        .args(["render", "-m", "gok-manifest.yaml", "-t", "srv", "-o", "out"])
        .assert()
        .success();

    assert!(!project.exists("out/srv/unwanted.txt"));
    assert_eq!(project.read("out/srv/wanted.txt"), "stays\n");
    assert_eq!(project.read("out/srv/own.txt"), "child file\n");

    // deleted files do not appear in the lock file
    let lock = lockfile::read(&project.path().join("out")).unwrap();
    assert!(!lock.files.contains_key("srv/unwanted.txt"));
    assert!(lock.files.contains_key("srv/wanted.txt"));
}

#[test]
fn test_render_secrets_from_file() {
    let project = TestProject::new();
    project.write(
        "gok-manifest.yaml",
        "version: 1\ntargets:\n  web:\n    output: web\n    templates: [{path: templates/t}]\n",
    );
    project.write(
        "templates/t/gok-template.yaml",
        "version: 1\nimports:\n  secrets:\n    db.password: {required: true}\n",
    );
    project.write("templates/t/creds.templ.txt", "pw={{ secrets.db.password }}");
    project.write("secrets.yaml", "db:\n  password: v3ry-s3cret\n");

    project
        .gok()
        .args([
            "render",
            "-m",
            "gok-manifest.yaml",
            "-t",
            "web",
            "-s",
            "secrets.yaml",
            "-o",
            "out",
        ])
        .assert()
        .success()
        // the redacting writer masks the secret anywhere in log output
        .stderr(predicate::str::contains("v3ry-s3cret").not());

    assert_eq!(project.read("out/web/creds.txt"), "pw=v3ry-s3cret");
}

#[test]
fn test_flat_imports_dialect_rejected() {
    let project = TestProject::new();
    project.write(
        "gok-manifest.yaml",
        "version: 1\ntargets:\n  web:\n    output: web\n    templates: [{path: templates/t}]\n",
    );
    project.write(
        "templates/t/gok-template.yaml",
        "version: 1\nimports:\n  legacy.key:\n    required: true\n",
    );
    project.write("templates/t/file.txt", "x");

    project
        .gok()
        .args(["render", "-m", "gok-manifest.yaml", "-t", "web", "-o", "out"])
        .assert()
        .failure();
}

#[test]
fn test_lock_file_invariant_hashes_match_disk() {
    let project = TestProject::new();
    write_layered_project(&project);

    project
        .gok()
        .args(["render", "-m", "gok-manifest.yaml", "-A", "-o", "out"])
        .assert()
        .success();

    let out = project.path().join("out");
    let lock = lockfile::read(&out).unwrap();
    assert!(!lock.files.is_empty());
    for (path, entry) in &lock.files {
        let on_disk = lockfile::entry_path(&out, path);
        assert_eq!(entry.hash, lockfile::file_sha256(&on_disk).unwrap(), "hash mismatch for {path}");
        assert_eq!(entry.size, on_disk.metadata().unwrap().len(), "size mismatch for {path}");
    }

    // re-reading through the library round-trips
    let reread = lockfile::read(&out).unwrap();
    assert_eq!(reread.files.len(), lock.files.len());
}
