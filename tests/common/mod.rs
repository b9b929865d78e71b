//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, helper functions, and compose
//! snippets to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_base(composes::WORDPRESS).with_env("dev");
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::composes;
    pub use super::TestFixture;
}

/// Compose documents used across tests.
#[allow(dead_code)]
pub mod composes {
    /// Two services and one volume.
    pub const WORDPRESS: &str = r#"version: "3.7"
services:
  db:
    image: mysql:5.7
    environment:
      MYSQL_DATABASE: wordpress
      MYSQL_USER: wordpress
  wordpress:
    image: wordpress:latest
    ports:
      - "8000:80"
    environment:
      WORDPRESS_DB_HOST: db:3306
volumes:
  db_data: {}
"#;

    /// Not a compose document.
    pub const INVALID: &str = "services: [db, wordpress]\n";
}

/// A temporary project root: a base compose file plus environment
/// directories.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::from_testdata("reconcile-version");
///
/// let mut cmd = fixture.command();
/// cmd.arg("reconcile").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a fixture from a directory under `tests/testdata`.
    pub fn from_testdata(name: &str) -> Self {
        let fixture = Self::new();
        fixture
            .temp_dir
            .copy_from(testdata(name), &["**"])
            .expect("Failed to copy test data");
        fixture
    }

    /// Add a `docker-compose.yaml` with the given content.
    pub fn with_base(self, content: &str) -> Self {
        self.with_file("docker-compose.yaml", content)
    }

    /// Add an empty environment directory.
    pub fn with_env(self, name: &str) -> Self {
        self.temp_dir
            .child(name)
            .create_dir_all()
            .expect("Failed to create environment directory");
        self
    }

    /// Add an override document for `env`.
    pub fn with_override(self, env: &str, content: &str) -> Self {
        let path = format!("{}/docker-compose.kev.{}.yaml", env, env);
        self.with_file(&path, content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the override document of `env`.
    pub fn override_path(&self, env: &str) -> PathBuf {
        self.path()
            .join(env)
            .join(format!("docker-compose.kev.{}.yaml", env))
    }

    /// Read the override document of `env`.
    pub fn read_override(&self, env: &str) -> String {
        std::fs::read_to_string(self.override_path(env)).expect("Failed to read override")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command for the kev binary, rooted at this fixture.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kev");
        cmd.current_dir(self.path())
            .env_remove("KEV_ROOT")
            .env_remove("KEV_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of a directory under `tests/testdata`.
#[allow(dead_code)]
pub fn testdata(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_override() {
        let fixture = TestFixture::new().with_env("dev").with_override("dev", "version: '3.7'\n");
        assert!(fixture.override_path("dev").exists());
    }

    #[test]
    fn test_composes_are_valid_yaml() {
        serde_yaml::from_str::<serde_yaml::Value>(composes::WORDPRESS)
            .expect("Compose should be valid YAML");
    }
}
