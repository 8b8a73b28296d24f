//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch project directory with a manifest and template tree, plus a
/// handle to run the `gok` binary inside it.
pub struct TestProject {
    root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("create test project dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write a file relative to the project root, creating parents.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Read a file relative to the project root.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root.path().join(rel)).unwrap()
    }

    /// True when the given relative path exists.
    pub fn exists(&self, rel: &str) -> bool {
        self.root.path().join(rel).exists()
    }

    /// A `gok` command with the project root as working directory.
    pub fn gok(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("gok").expect("gok binary builds");
        cmd.current_dir(self.root.path());
        cmd
    }
}

/// A small two-layer manifest used by several tests: a base template and an
/// overlay patching it.
pub const LAYERED_MANIFEST: &str = "\
version: 1
values:
  motd: global-motd
targets:
  web:
    output: web
    tags: [production]
    templates:
      - path: templates/base
      - path: templates/overlay
";

pub fn write_layered_project(project: &TestProject) {
    project.write("gok-manifest.yaml", LAYERED_MANIFEST);
    project.write("templates/base/server.properties", "a=base\nb=base\n");
    project.write("templates/base/static.txt", "static content\n");
    project.write(
        "templates/overlay/server.properties",
        "b=overlay\nc=overlay\n",
    );
}
