//! Image stage: build the bootable disk image and generate the launch
//! script that pairs it with the compiled kernel.
//!
//! All filesystem and package work is delegated to the external
//! `create-image.sh` collaborator; this stage only places it, runs it, and
//! writes `runk.sh`. The launch script is a derived artifact: it is
//! regenerated on every run so it always reflects the current paths.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::context::BuildContext;
use crate::process::Cmd;
use crate::ui::{self, Level};

/// Kernel command line baked into the launch script: serial console, fixed
/// root device, early serial diagnostics, stable interface names, KASLR off
/// for debugging.
const BOOT_CMDLINE: &str = "console=ttyS0 root=/dev/sda earlyprintk=serial net.ifnames=0 nokaslr";

/// Parameters of the generated QEMU launch script.
///
/// Everything that varies between setups is a field here; the template in
/// [`LaunchScript::render`] hard-codes nothing but flag names.
#[derive(Debug, Clone)]
pub struct LaunchScript {
    /// Compiled kernel image (`arch/x86/boot/bzImage`).
    pub kernel_image: PathBuf,
    /// Raw-format disk image built by the image script.
    pub disk_image: PathBuf,
    /// Guest memory, e.g. `2G`.
    pub memory: String,
    /// Guest CPU count.
    pub cpus: u32,
    /// Host port forwarded to the guest SSH port.
    pub host_port: u16,
    /// Guest port the forward lands on.
    pub guest_port: u16,
    /// Where QEMU writes its PID.
    pub pidfile: PathBuf,
    /// Where emulator output is teed.
    pub log_file: PathBuf,
}

impl LaunchScript {
    /// Assemble the script parameters from context and configuration.
    pub fn from_parts(ctx: &BuildContext, config: &Config) -> Self {
        Self {
            kernel_image: ctx.kernel_path.join("arch/x86/boot/bzImage"),
            disk_image: ctx.img_dir.join(&config.image_name),
            memory: config.memory.clone(),
            cpus: config.cpus,
            host_port: config.ssh_port,
            guest_port: 22,
            pidfile: ctx.img_dir.join("vm.pid"),
            log_file: ctx.img_dir.join("vm.log"),
        }
    }

    /// Render the script text. `-s` opens the gdb remote stub on the QEMU
    /// default port; serial goes to the invoking terminal via -nographic.
    pub fn render(&self) -> String {
        format!(
            "#!/usr/bin/env bash\n\
             qemu-system-x86_64 \\\n\
             \t-m {memory} \\\n\
             \t-smp {cpus} \\\n\
             \t-kernel {kernel} \\\n\
             \t-append \"{cmdline}\" \\\n\
             \t-drive file={disk},format=raw \\\n\
             \t-net user,host=10.0.2.10,hostfwd=tcp:127.0.0.1:{host_port}-:{guest_port} \\\n\
             \t-net nic,model=e1000 \\\n\
             \t-nographic \\\n\
             \t-enable-kvm \\\n\
             \t-cpu host \\\n\
             \t-s \\\n\
             \t-pidfile {pidfile} \\\n\
             \t2>&1 | tee {log}\n",
            memory = self.memory,
            cpus = self.cpus,
            kernel = self.kernel_image.display(),
            cmdline = BOOT_CMDLINE,
            disk = self.disk_image.display(),
            host_port = self.host_port,
            guest_port = self.guest_port,
            pidfile = self.pidfile.display(),
            log = self.log_file.display(),
        )
    }

    /// Write the rendered script and mark it executable.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to mark {} executable", path.display()))?;
        Ok(())
    }
}

/// Build the disk image and write the launch script.
///
/// Returns the image script's exit code. The launch script is written even
/// when the image script failed: it depends only on paths, and a re-run of
/// just the image script can then be booted without repeating this stage.
pub fn build_image(ctx: &BuildContext, config: &Config) -> Result<i32> {
    ui::say(
        Level::Log,
        &format!("Building disk image (hostname: {})", ctx.hostname),
    );

    match fs::create_dir(&ctx.img_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            ui::say(Level::Warn, "Image directory exists, skipping...");
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create {}", ctx.img_dir.display()));
        }
    }

    let script_src = ctx.kernel_dir.join("create-image.sh");
    let script_dst = ctx.img_dir.join("create-image.sh");
    fs::copy(&script_src, &script_dst).with_context(|| {
        format!(
            "Failed to copy image script {} into {}",
            script_src.display(),
            ctx.img_dir.display()
        )
    })?;

    let result = Cmd::new(script_dst.to_string_lossy())
        .arg("-n")
        .arg(&ctx.hostname)
        .dir(&ctx.img_dir)
        .stream()?;
    if !result.success() {
        ui::say(
            Level::Warn,
            &format!("Image script exited with code {}", result.code()),
        );
    }

    let launch = LaunchScript::from_parts(ctx, config);
    launch.write(&ctx.runk_path)?;
    ui::say(
        Level::Good,
        &format!("runk.sh written to {}", ctx.runk_path.display()),
    );

    Ok(result.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn script_for(kernel: &str, img: &str) -> LaunchScript {
        LaunchScript {
            kernel_image: PathBuf::from(kernel).join("arch/x86/boot/bzImage"),
            disk_image: PathBuf::from(img).join("bullseye.img"),
            memory: "2G".to_string(),
            cpus: 2,
            host_port: 10021,
            guest_port: 22,
            pidfile: PathBuf::from(img).join("vm.pid"),
            log_file: PathBuf::from(img).join("vm.log"),
        }
    }

    #[test]
    fn test_render_flag_counts() {
        let script = script_for("/k", "/k/img");
        let text = script.render();

        assert_eq!(text.matches("-m 2G").count(), 1);
        assert_eq!(text.matches("-smp 2 ").count(), 1);
        assert_eq!(
            text.matches("hostfwd=tcp:127.0.0.1:10021-:22").count(),
            1
        );
    }

    #[test]
    fn test_render_fixed_shape() {
        let script = script_for("/k", "/k/img");
        let text = script.render();

        assert!(text.starts_with("#!/usr/bin/env bash\n"));
        assert!(text.contains("qemu-system-x86_64"));
        assert!(text.contains("-kernel /k/arch/x86/boot/bzImage"));
        assert!(text.contains("nokaslr"));
        assert!(text.contains("-drive file=/k/img/bullseye.img,format=raw"));
        assert!(text.contains("-net nic,model=e1000"));
        assert!(text.contains("-nographic"));
        assert!(text.contains("-enable-kvm"));
        assert!(text.contains("-cpu host"));
        assert!(text.contains("\t-s \\\n"));
        assert!(text.contains("-pidfile /k/img/vm.pid"));
        assert!(text.contains("2>&1 | tee /k/img/vm.log"));
    }

    #[test]
    fn test_render_respects_parameters() {
        let mut script = script_for("/k", "/k/img");
        script.memory = "4G".to_string();
        script.cpus = 8;
        script.host_port = 2222;
        let text = script.render();

        assert!(text.contains("-m 4G"));
        assert!(text.contains("-smp 8"));
        assert!(text.contains("hostfwd=tcp:127.0.0.1:2222-:22"));
        assert!(!text.contains("10021"));
    }

    #[test]
    fn test_write_is_executable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runk.sh");
        script_for("/k", "/k/img").write(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0, "script should be executable");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#!/usr/bin/env bash"));
    }
}
