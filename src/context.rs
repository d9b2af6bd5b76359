//! Per-invocation build context.
//!
//! [`BuildContext`] is constructed once from user intent and stays immutable
//! while the pipeline runs; all mutable progress lives in [`SourceState`],
//! a small record the sequencer owns and the download stage fills in. The
//! durable record of progress is the filesystem, not these structs.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::ui::{self, Level};

/// Everything a stage needs to know about the current invocation.
///
/// The kernel source path is derived from exactly one of: an explicit path
/// supplied by the user, or a kernel version (placing the tree under
/// `<base>/kernel/linux-<version>/`).
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Kernel version, when the source is (to be) downloaded.
    pub version: Option<String>,
    /// Path to the kernel source tree.
    pub kernel_path: PathBuf,
    /// Path to the user configuration fragment.
    pub kconfig_path: PathBuf,
    /// Hostname handed to the image-creation script.
    pub hostname: String,
    /// Working directory all relative layout hangs off.
    pub base_dir: PathBuf,
    /// `<base>/kernel/` - archives and extracted sources.
    pub kernel_dir: PathBuf,
    /// `<kernel_path>/img/` - disk image, launch script, pidfile, log.
    pub img_dir: PathBuf,
    /// Generated launch script path (`runk.sh`).
    pub runk_path: PathBuf,
    /// Parallel build jobs, detected once at construction.
    pub nproc: usize,
}

impl BuildContext {
    /// Build a context from user intent.
    ///
    /// Errors when neither a version nor an explicit path was given; an
    /// explicit path wins over the version-derived location.
    pub fn new(
        base_dir: PathBuf,
        version: Option<String>,
        kernel_path: Option<PathBuf>,
        kconfig_path: Option<PathBuf>,
        hostname: Option<String>,
    ) -> Result<Self> {
        let kernel_dir = base_dir.join("kernel");

        let kernel_path = match (&kernel_path, &version) {
            (Some(path), _) => path.clone(),
            (None, Some(version)) => kernel_dir.join(format!("linux-{}", version)),
            (None, None) => {
                bail!("Please provide a kernel version with -k, or a kernel path with -p")
            }
        };

        let kconfig_path =
            kconfig_path.unwrap_or_else(|| base_dir.join("config/example.kconfig"));
        let img_dir = kernel_path.join("img");
        let runk_path = img_dir.join("runk.sh");

        Ok(Self {
            version,
            kernel_path,
            kconfig_path,
            hostname: hostname.unwrap_or_else(|| "localhost".to_string()),
            base_dir,
            kernel_dir,
            img_dir,
            runk_path,
            nproc: detect_nproc(),
        })
    }
}

/// Idempotency record for the download stage: which of its effects are
/// already present on disk. Owned by the sequencer, passed by value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceState {
    /// The tarball is present at the expected archive path.
    pub downloaded: bool,
    /// The source tree is present at the expected extraction path.
    pub extracted: bool,
}

fn detect_nproc() -> usize {
    match std::thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            ui::say(
                Level::Warn,
                &format!("Could not detect CPU count ({}), using 4 jobs", e),
            );
            4
        }
    }
}
