// ABOUTME: Image build via the docker CLI with streamed build output
// ABOUTME: Merges stdout and stderr into a single line stream for progress display

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::{ContainerError, Result};

/// Number of trailing output lines kept for the error message when a build
/// fails.
const ERROR_TAIL_LINES: usize = 20;

/// Build an image with `docker build`, invoking `progress` for every output
/// line. Docker writes build progress to stderr, so both streams are merged.
pub(crate) async fn build_image(
    context: &Path,
    dockerfile: &str,
    tag: &str,
    labels: &HashMap<String, String>,
    progress: &(dyn Fn(&str) + Send + Sync),
) -> Result<()> {
    let dockerfile_path = context.join(dockerfile);

    let mut cmd = Command::new("docker");
    cmd.arg("build")
        .arg("--progress=plain")
        .arg("-t")
        .arg(tag)
        .arg("-f")
        .arg(&dockerfile_path);
    for (key, value) in labels {
        cmd.arg("--label").arg(format!("{}={}", key, value));
    }
    cmd.arg(context)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(tag, dockerfile = %dockerfile_path.display(), "building image");

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take().ok_or_else(|| ContainerError::BuildFailed {
        detail: "failed to capture docker build stdout".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| ContainerError::BuildFailed {
        detail: "failed to capture docker build stderr".to_string(),
    })?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let tx_err = tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx_err.send(line).is_err() {
                break;
            }
        }
    });

    let mut tail: VecDeque<String> = VecDeque::with_capacity(ERROR_TAIL_LINES);
    while let Some(line) = rx.recv().await {
        if tail.len() == ERROR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.clone());
        progress(&line);
    }

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(ContainerError::BuildFailed {
            detail: tail.into_iter().collect::<Vec<_>>().join("\n"),
        })
    }
}
