//! DevTools CLI execution and binary discovery.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use weapp_core::{Error, Result};

use crate::ProcessRunner;

/// Runs the WeChat DevTools CLI as a child process and captures its output.
/// Each invocation is an independent child; no queueing or mutual exclusion.
pub struct CliRunner;

#[async_trait]
impl ProcessRunner for CliRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<String> {
        debug!(program = %program.display(), ?args, "Running DevTools CLI");

        let output = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                Error::Process(format!("Failed to run {}: {}", program.display(), e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(stdout)
        } else {
            Err(Error::Process(format!(
                "{} exited with code {}\nstdout: {}\nstderr: {}",
                program.display(),
                output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                stdout.trim(),
                stderr.trim(),
            )))
        }
    }
}

/// Locate the WeChat DevTools CLI at its platform default install location.
pub fn find_devtools_cli() -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &["/Applications/wechatwebdevtools.app/Contents/MacOS/cli"]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files (x86)\Tencent\微信web开发者工具\cli.bat",
            r"C:\Program Files\Tencent\微信web开发者工具\cli.bat",
        ]
    } else {
        &["wechat-devtools-cli"]
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(PathBuf::from(candidate));
        }
        if !candidate.contains('/') && !candidate.contains('\\') {
            if let Ok(found) = which::which(candidate) {
                return Some(found);
            }
        }
    }
    None
}
