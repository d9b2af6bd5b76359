//! Kernel source acquisition: resolve a version to a tarball URL, download,
//! and extract, skipping whatever is already on disk.
//!
//! The stage is re-runnable: an existing archive is kept unless the user
//! confirms overwriting it, an existing source tree skips extraction, and a
//! failed download short-circuits extraction so a later re-invocation can
//! pick up where this one stopped.

use anyhow::{bail, Context, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::Config;
use crate::context::{BuildContext, SourceState};
use crate::process::Cmd;
use crate::ui::{self, Confirm, Level};

/// A version string that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelVersion {
    /// Major release series (3 through 6).
    pub major: u32,
    /// The full `major.minor[.patch]` string.
    pub full: String,
}

/// Validate a kernel version string.
///
/// Accepts `major.minor[.patch]` with major in 3..=6. Fails without any
/// filesystem or network side effect, so a typo is caught before anything
/// touches disk.
pub fn validate_version(version: &str) -> Result<KernelVersion> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^([3-6])\.\d+(?:\.\d+)?$").expect("version pattern is valid")
    });

    let captures = match pattern.captures(version) {
        Some(c) => c,
        None => bail!("Invalid or unsupported kernel version: '{}'", version),
    };

    let major = captures[1].parse().context("parsing major version")?;
    Ok(KernelVersion {
        major,
        full: version.to_string(),
    })
}

/// Canonical tarball URL for a validated version.
pub fn tarball_url(version: &KernelVersion, mirror: &str) -> String {
    format!(
        "{}/v{}.x/linux-{}.tar.xz",
        mirror, version.major, version.full
    )
}

/// Where the downloaded archive lives under `<base>/kernel/`.
pub fn archive_path(kernel_dir: &Path, version: &KernelVersion) -> PathBuf {
    kernel_dir.join(format!("linux-{}.tar.xz", version.full))
}

/// Where the archive extracts to under `<base>/kernel/`.
pub fn extracted_path(kernel_dir: &Path, version: &KernelVersion) -> PathBuf {
    kernel_dir.join(format!("linux-{}", version.full))
}

/// Acquire the kernel source for the context's version.
///
/// Returns the idempotency flags describing what is now on disk. A download
/// that ran but failed leaves `downloaded` false and skips extraction; this
/// is reported, not an error. Errors are reserved for invalid versions,
/// tools that could not be launched, and checksum mismatches.
pub fn acquire(
    ctx: &BuildContext,
    config: &Config,
    expected_sha256: Option<&str>,
    confirm: &mut dyn Confirm,
) -> Result<SourceState> {
    let version = match &ctx.version {
        Some(v) => v,
        None => bail!("A kernel version is required to download source (use -k)"),
    };
    let version = validate_version(version)?;

    let url = tarball_url(&version, &config.mirror);
    let archive = archive_path(&ctx.kernel_dir, &version);
    let srcdir = extracted_path(&ctx.kernel_dir, &version);

    fs::create_dir_all(&ctx.kernel_dir)
        .with_context(|| format!("Failed to create {}", ctx.kernel_dir.display()))?;

    let mut state = SourceState::default();

    if archive.is_file() {
        let keep = !confirm.confirm(&format!(
            "Archive for version {} already exists. Overwrite? [y/N]",
            version.full
        ));
        if keep {
            ui::say(
                Level::Info,
                &format!("Keeping existing archive {}", archive.display()),
            );
            state.downloaded = true;
        }
    }

    if !state.downloaded {
        ui::say(
            Level::Good,
            &format!("Downloading {} to {}", url, archive.display()),
        );
        let result = Cmd::new("curl")
            .args(["-s", "--fail"])
            .arg(&url)
            .arg("-o")
            .arg_path(&archive)
            .stream()?;
        if !result.success() {
            ui::say(
                Level::Warn,
                &format!(
                    "Download for kernel version {} failed (curl exit {}); check the version",
                    version.full,
                    result.code()
                ),
            );
            // No archive to extract; leave both flags unset.
            return Ok(state);
        }
        state.downloaded = true;
    }

    if let Some(expected) = expected_sha256 {
        verify_sha256(&archive, expected)?;
        ui::say(Level::Good, "Archive checksum verified");
    }

    if srcdir.is_dir() {
        ui::say(
            Level::Warn,
            &format!("Extracted directory already exists for version {}", version.full),
        );
        state.extracted = true;
    }

    if !state.extracted {
        ui::say(
            Level::Good,
            &format!("Extracting the tarball for {}", version.full),
        );
        Cmd::new("tar")
            .arg("xf")
            .arg_path(&archive)
            .arg("-C")
            .arg_path(&ctx.kernel_dir)
            .stream()?;
        if srcdir.is_dir() {
            state.extracted = true;
        } else {
            // Archive is on disk but its contents are not where the rest of
            // the pipeline expects them; left for the operator to inspect.
            ui::say(
                Level::Warn,
                &format!(
                    "Tarball is at {}, but extraction left nothing at {}",
                    archive.display(),
                    srcdir.display()
                ),
            );
        }
    }

    Ok(state)
}

/// Verify the SHA-256 digest of a file, in 1 MB chunks.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open {} for checksum", path.display()))?;
    let mut reader = std::io::BufReader::with_capacity(1024 * 1024, file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 1024 * 1024];

    loop {
        let n = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let actual = format!("{:x}", hasher.finalize());
    if actual != expected.to_lowercase() {
        bail!(
            "Checksum mismatch for {}\n  Expected: {}\n  Actual:   {}",
            path.display(),
            expected,
            actual
        );
    }
    Ok(())
}
