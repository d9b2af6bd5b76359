//! lkb - Linux kernel build-and-boot pipeline.
//!
//! Downloads a mainline kernel, configures it for virtualized testing,
//! compiles it, builds a bootable disk image, and boots the pair under
//! QEMU. Stages are independent flags; `-a` chains them all.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lkb::config::Config;
use lkb::context::BuildContext;
use lkb::pipeline::{self, Intent};
use lkb::preflight;
use lkb::ui::{self, Confirm, Level, ScriptedConfirm, StdinConfirm};

#[derive(Parser)]
#[command(name = "lkb")]
#[command(about = "Linux kernel build-and-boot pipeline")]
#[command(
    after_help = "QUICK START:\n  lkb -k 5.15 -a    Download, configure, compile, image, run\n  lkb -p ./linux -c -m   Configure and compile an existing tree\n  lkb --preflight   Check that the required host tools are installed"
)]
struct Cli {
    /// Kernel version to download (e.g. 5.15)
    #[arg(short = 'k', long = "kernel", value_name = "VERSION")]
    kernel_version: Option<String>,

    /// Path to an existing kernel source tree (disables download)
    #[arg(short = 'p', long = "path", value_name = "PATH")]
    kernel_path: Option<PathBuf>,

    /// Configuration fragment appended to the generated .config
    /// (default: config/example.kconfig)
    #[arg(long, value_name = "PATH")]
    kconfig: Option<PathBuf>,

    /// Hostname handed to the image-creation script
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Expected SHA-256 of the downloaded archive
    #[arg(long, value_name = "HEX")]
    sha256: Option<String>,

    /// Download and extract the kernel source
    #[arg(short = 'd', long)]
    download: bool,

    /// Run the kernel configuration commands
    #[arg(short = 'c', long)]
    configure: bool,

    /// Compile the kernel
    #[arg(short = 'm', long)]
    compile: bool,

    /// Build the bootable disk image from the compiled kernel
    #[arg(short = 'i', long)]
    image: bool,

    /// Boot the image under QEMU
    #[arg(short = 'r', long)]
    run: bool,

    /// Do everything: download (or use the -p tree), configure, compile,
    /// build image, run
    #[arg(short = 'a', long)]
    all: bool,

    /// Check that the external tools the stages drive are installed
    #[arg(long)]
    preflight: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Answer yes to interactive prompts (unattended runs)
    #[arg(short = 'y', long)]
    yes: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load();

    if cli.show_config {
        config.print();
        return Ok(());
    }

    if cli.preflight {
        let report = preflight::check_host_tools();
        report.print();
        if !report.all_passed() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let intent = Intent {
        download: cli.download,
        configure: cli.configure,
        compile: cli.compile,
        image: cli.image,
        run: cli.run,
        all: cli.all,
    };
    let has_path = cli.kernel_path.is_some();

    let base_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    // Usage errors (neither -k nor -p) surface here, before any stage runs.
    let ctx = BuildContext::new(
        base_dir,
        cli.kernel_version,
        cli.kernel_path,
        cli.kconfig,
        Some(cli.hostname),
    )?;

    let stages = pipeline::plan(&intent, ctx.version.is_some(), has_path)?;
    if stages.is_empty() {
        ui::say(
            Level::Info,
            "No stages selected; use -d/-c/-m/-i/-r, or -a for everything",
        );
        return Ok(());
    }

    let mut confirm: Box<dyn Confirm> = if cli.yes {
        Box::new(ScriptedConfirm::new(true))
    } else {
        Box::new(StdinConfirm)
    };

    let reports = pipeline::execute(
        &ctx,
        &config,
        &stages,
        cli.sha256.as_deref(),
        confirm.as_mut(),
    );

    if !pipeline::all_passed(&reports) {
        std::process::exit(1);
    }
    Ok(())
}
