//! Host tool availability checks.
//!
//! The pipeline drives external tools; this verifies they exist before a
//! long run discovers the hard way. Required tools fail the check, tools
//! only some stages need produce warnings.

use std::path::Path;

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed - the pipeline will fail.
    Fail,
    /// Check passed but with a warning.
    Warn,
}

impl CheckResult {
    pub fn pass_with(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: Some(details.to_string()),
        }
    }

    pub fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            details: Some(details.to_string()),
        }
    }

    pub fn warn(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            details: Some(details.to_string()),
        }
    }
}

/// Results of all preflight checks.
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Returns true if all checks passed (no failures).
    pub fn all_passed(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    /// Count of failed checks.
    pub fn fail_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .count()
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let status_str = match check.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Fail => "FAIL",
                CheckStatus::Warn => "WARN",
            };
            print!("  [{}] {}", status_str, check.name);
            match &check.details {
                Some(details) => println!(": {}", details),
                None => println!(),
            }
        }

        println!();
        let failed = self.fail_count();
        println!(
            "Summary: {}/{} passed",
            self.checks.len() - failed,
            self.checks.len()
        );
        if failed > 0 {
            println!("         {} FAILED - the pipeline will not succeed", failed);
        }
    }
}

/// Check that the external tools the stages drive are installed.
pub fn check_host_tools() -> PreflightReport {
    let mut checks = Vec::new();

    let required = [
        ("curl", "Required to download kernel tarballs"),
        ("tar", "Required to extract kernel tarballs"),
        ("make", "Required to configure and compile the kernel"),
        ("bash", "Required to run the image and launch scripts"),
    ];
    for (tool, purpose) in required {
        checks.push(check_tool(tool, purpose, true));
    }

    checks.push(check_tool(
        "qemu-system-x86_64",
        "Required for the run stage (-r)",
        false,
    ));

    if Path::new("/dev/kvm").exists() {
        checks.push(CheckResult::pass_with("/dev/kvm", "KVM acceleration available"));
    } else {
        checks.push(CheckResult::warn(
            "/dev/kvm",
            "Not present - the launch script uses -enable-kvm and will not boot",
        ));
    }

    PreflightReport { checks }
}

/// Check if a tool exists in PATH.
fn check_tool(tool: &str, purpose: &str, required: bool) -> CheckResult {
    match which::which(tool) {
        Ok(path) => CheckResult::pass_with(tool, &path.to_string_lossy()),
        Err(_) => {
            let msg = format!("Not found in PATH. {}", purpose);
            if required {
                CheckResult::fail(tool, &msg)
            } else {
                CheckResult::warn(tool, &msg)
            }
        }
    }
}
