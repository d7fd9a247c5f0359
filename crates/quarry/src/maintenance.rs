//! External maintenance operation.
//!
//! An opaque operator-supplied command, run through the shell. Output
//! and exit status are logged; failures never change control flow.

use tokio::process::Command;
use tracing::{error, info, warn};

pub async fn run_maintenance(command: &str) {
    info!(command, "Executing maintenance command");

    #[cfg(unix)]
    let output = Command::new("sh").arg("-c").arg(command).output().await;
    #[cfg(windows)]
    let output = Command::new("cmd").arg("/C").arg(command).output().await;

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            error!(error = %err, "Failed to spawn maintenance command");
            return;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        info!("{}", stdout.trim());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        error!("{}", stderr.trim());
    }
    if !output.status.success() {
        warn!(status = %output.status, "Maintenance command returned an error code");
    }

    info!("Maintenance command finished");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_command_does_not_panic_or_propagate() {
        run_maintenance("exit 3").await;
    }

    #[tokio::test]
    async fn successful_command_runs_to_completion() {
        run_maintenance("echo maintenance-ok").await;
    }
}
