//! Run stage: boot the built kernel/image pair.
//!
//! Executes the generated launch script through bash with inherited stdio;
//! the script owns the terminal (serial console) until QEMU exits. Success
//! or failure is whatever the script reports.

use anyhow::{bail, Result};

use crate::context::BuildContext;
use crate::process::Cmd;
use crate::ui::{self, Level};

/// Execute `runk.sh` from the image directory. Returns its exit code.
pub fn run_image(ctx: &BuildContext) -> Result<i32> {
    if !ctx.runk_path.is_file() {
        bail!(
            "Launch script not found at {}. Run the image stage (-i) first.",
            ctx.runk_path.display()
        );
    }

    ui::say(
        Level::Log,
        &format!("Running image in {}", ctx.img_dir.display()),
    );

    let status = Cmd::new("bash")
        .arg_path(&ctx.runk_path)
        .dir(&ctx.img_dir)
        .run_interactive()?;

    Ok(status.code().unwrap_or(-1))
}
