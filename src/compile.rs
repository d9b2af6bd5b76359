//! Kernel compile stage: one long-running parallel `make`.
//!
//! A pass-through around the kernel build system; incremental behavior is
//! whatever `make` provides. The job count comes from the context's cached
//! CPU detection.

use anyhow::Result;

use crate::context::BuildContext;
use crate::process::Cmd;
use crate::ui::{self, Level};

/// Build the kernel tree with `make -j<nproc>`. Returns the exit code.
pub fn compile(ctx: &BuildContext) -> Result<i32> {
    ui::say(Level::Warn, "Building the kernel, this may take a while...");

    let result = Cmd::new("make")
        .arg("-j")
        .arg(ctx.nproc.to_string())
        .dir(&ctx.kernel_path)
        .stream()?;

    Ok(result.code())
}
