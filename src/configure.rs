//! Kernel configuration stage.
//!
//! Generates a baseline `.config` (defconfig + the KVM guest preset),
//! appends the user fragment verbatim, then lets `make olddefconfig`
//! resolve whatever the raw append left inconsistent. All semantic merging
//! belongs to the kernel build system; this stage moves bytes.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::context::BuildContext;
use crate::process::Cmd;
use crate::ui::{self, Level};

/// Run the configuration sequence against the kernel tree.
///
/// Returns the first nonzero exit code observed, or 0 when every command
/// passed. Later commands still run after an earlier nonzero exit; an
/// unreadable fragment is fatal (there is nothing meaningful to configure
/// without it).
pub fn configure(ctx: &BuildContext) -> Result<i32> {
    let mut first_failure = 0;

    for target in ["defconfig", "kvm_guest.config"] {
        let result = Cmd::new("make")
            .arg(target)
            .dir(&ctx.kernel_path)
            .stream()?;
        if !result.success() && first_failure == 0 {
            first_failure = result.code();
        }
    }

    append_fragment(&ctx.kconfig_path, &ctx.kernel_path.join(".config"))?;

    let result = Cmd::new("make")
        .arg("olddefconfig")
        .dir(&ctx.kernel_path)
        .stream()?;
    if !result.success() && first_failure == 0 {
        first_failure = result.code();
    }

    Ok(first_failure)
}

/// Append the fragment's raw contents to the generated config.
///
/// Not idempotent: running the stage twice appends the fragment twice.
/// `olddefconfig`'s last-definition-wins resolution is what makes the
/// merged result well defined.
pub fn append_fragment(fragment: &Path, config: &Path) -> Result<()> {
    ui::say(
        Level::Log,
        &format!("Appending {} to {}", fragment.display(), config.display()),
    );

    let contents = fs::read_to_string(fragment)
        .with_context(|| format!("Failed to read config fragment {}", fragment.display()))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config)
        .with_context(|| format!("Failed to open {} for append", config.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to append to {}", config.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_after_existing_content() {
        let dir = TempDir::new().unwrap();
        let fragment = dir.path().join("fragment");
        let config = dir.path().join(".config");
        fs::write(&fragment, "CONFIG_KCOV=y\n").unwrap();
        fs::write(&config, "CONFIG_64BIT=y\n").unwrap();

        append_fragment(&fragment, &config).unwrap();

        let merged = fs::read_to_string(&config).unwrap();
        assert_eq!(merged, "CONFIG_64BIT=y\nCONFIG_KCOV=y\n");
    }

    #[test]
    fn test_append_creates_missing_config() {
        let dir = TempDir::new().unwrap();
        let fragment = dir.path().join("fragment");
        let config = dir.path().join(".config");
        fs::write(&fragment, "CONFIG_KASAN=y\n").unwrap();

        append_fragment(&fragment, &config).unwrap();

        assert_eq!(fs::read_to_string(&config).unwrap(), "CONFIG_KASAN=y\n");
    }

    #[test]
    fn test_double_append_duplicates_lines() {
        let dir = TempDir::new().unwrap();
        let fragment = dir.path().join("fragment");
        let config = dir.path().join(".config");
        fs::write(&fragment, "CONFIG_KCOV=y\n").unwrap();

        append_fragment(&fragment, &config).unwrap();
        append_fragment(&fragment, &config).unwrap();

        let merged = fs::read_to_string(&config).unwrap();
        assert_eq!(merged.matches("CONFIG_KCOV=y").count(), 2);
    }

    #[test]
    fn test_missing_fragment_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = append_fragment(&dir.path().join("nope"), &dir.path().join(".config"))
            .unwrap_err();
        assert!(err.to_string().contains("config fragment"));
    }
}
