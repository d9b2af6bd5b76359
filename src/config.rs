//! Ambient configuration.
//!
//! Compiled defaults, overridable through environment variables (a `.env`
//! file is loaded in `main` before this runs). These knobs parameterize the
//! launch-script template and the download URL; everything else about an
//! invocation comes from the CLI.

use std::env;

/// Default kernel.org mirror base. Version directory and tarball name are
/// appended per release, e.g. `<base>/v5.x/linux-5.15.tar.xz`.
pub const DEFAULT_MIRROR: &str = "https://cdn.kernel.org/pub/linux/kernel";

/// lkb configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Mirror base URL for kernel tarballs (LKB_MIRROR).
    pub mirror: String,
    /// Guest memory for the launch script (LKB_MEMORY).
    pub memory: String,
    /// Guest CPU count for the launch script (LKB_CPUS).
    pub cpus: u32,
    /// Host port forwarded to guest SSH (LKB_SSH_PORT).
    pub ssh_port: u16,
    /// Disk image filename produced by the image script (LKB_IMAGE).
    pub image_name: String,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn load() -> Self {
        Self {
            mirror: env::var("LKB_MIRROR").unwrap_or_else(|_| DEFAULT_MIRROR.to_string()),
            memory: env::var("LKB_MEMORY").unwrap_or_else(|_| "2G".to_string()),
            cpus: env::var("LKB_CPUS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            ssh_port: env::var("LKB_SSH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10021),
            image_name: env::var("LKB_IMAGE").unwrap_or_else(|_| "bullseye.img".to_string()),
        }
    }

    /// Print the effective configuration.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  LKB_MIRROR:   {}", self.mirror);
        println!("  LKB_MEMORY:   {}", self.memory);
        println!("  LKB_CPUS:     {}", self.cpus);
        println!("  LKB_SSH_PORT: {}", self.ssh_port);
        println!("  LKB_IMAGE:    {}", self.image_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_lkb_env() {
        for key in [
            "LKB_MIRROR",
            "LKB_MEMORY",
            "LKB_CPUS",
            "LKB_SSH_PORT",
            "LKB_IMAGE",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_lkb_env();
        let config = Config::load();
        assert_eq!(config.mirror, DEFAULT_MIRROR);
        assert_eq!(config.memory, "2G");
        assert_eq!(config.cpus, 2);
        assert_eq!(config.ssh_port, 10021);
        assert_eq!(config.image_name, "bullseye.img");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_lkb_env();
        env::set_var("LKB_MEMORY", "4G");
        env::set_var("LKB_SSH_PORT", "2222");
        let config = Config::load();
        assert_eq!(config.memory, "4G");
        assert_eq!(config.ssh_port, 2222);
        clear_lkb_env();
    }

    #[test]
    #[serial]
    fn test_unparseable_numbers_fall_back() {
        clear_lkb_env();
        env::set_var("LKB_CPUS", "lots");
        let config = Config::load();
        assert_eq!(config.cpus, 2);
        clear_lkb_env();
    }
}
