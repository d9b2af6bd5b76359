//! Shared test utilities for lkb tests.
//!
//! The integration tests drive real stages against a temporary build tree,
//! with the external tools (curl, tar, make, qemu) replaced by stub
//! executables on a prepended PATH. PATH is process-global, so every test
//! using [`TestEnv`] must be `#[serial]`.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use lkb::config::{Config, DEFAULT_MIRROR};
use lkb::context::BuildContext;

/// Temporary build environment: a base directory laid out like a real
/// working directory, plus a stub-bin directory that shadows PATH.
pub struct TestEnv {
    /// Kept alive for the lifetime of the environment.
    pub _temp_dir: TempDir,
    /// Simulated working directory (contains `kernel/` and `config/`).
    pub base_dir: PathBuf,
    /// Directory of stub executables, prepended to PATH.
    pub bin_dir: PathBuf,
    saved_path: Option<String>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().join("base");
        let bin_dir = temp_dir.path().join("bin");

        fs::create_dir_all(base_dir.join("kernel")).expect("Failed to create kernel dir");
        fs::create_dir_all(base_dir.join("config")).expect("Failed to create config dir");
        fs::create_dir_all(&bin_dir).expect("Failed to create bin dir");

        fs::write(
            base_dir.join("config/example.kconfig"),
            "CONFIG_KCOV=y\nCONFIG_DEBUG_INFO=y\n",
        )
        .expect("Failed to write fragment");

        let saved_path = env::var("PATH").ok();
        let old = saved_path.clone().unwrap_or_default();
        env::set_var("PATH", format!("{}:{}", bin_dir.display(), old));

        Self {
            _temp_dir: temp_dir,
            base_dir,
            bin_dir,
            saved_path,
        }
    }

    /// Install a stub executable (a `#!/bin/sh` script) on the stub PATH.
    pub fn stub_tool(&self, name: &str, body: &str) {
        let path = self.bin_dir.join(name);
        write_executable(&path, &format!("#!/bin/sh\n{}\n", body));
    }

    /// Marker file a stub can touch so tests can assert whether it ran.
    pub fn marker(&self, name: &str) -> PathBuf {
        self.bin_dir.join(format!("{}.ran", name))
    }

    /// Context for a version-driven invocation against this environment.
    pub fn context_for_version(&self, version: &str) -> BuildContext {
        BuildContext::new(
            self.base_dir.clone(),
            Some(version.to_string()),
            None,
            None,
            None,
        )
        .expect("Failed to build context")
    }

    /// Config with compiled defaults, independent of the test process env.
    pub fn config(&self) -> Config {
        Config {
            mirror: DEFAULT_MIRROR.to_string(),
            memory: "2G".to_string(),
            cpus: 2,
            ssh_port: 10021,
            image_name: "bullseye.img".to_string(),
        }
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        match &self.saved_path {
            Some(path) => env::set_var("PATH", path),
            None => env::remove_var("PATH"),
        }
    }
}

/// Write a file and mark it executable.
#[allow(dead_code)]
pub fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).expect("Failed to write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to mark script executable");
}
