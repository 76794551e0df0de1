use std::process::{Command, Output, Stdio};

use crate::error::{DeployError, DeployResult};

/// Run a command with extra environment variables and capture its
/// output. A non-zero exit code is not an error here; callers
/// inspect `Output::status` themselves.
pub fn capture(program: &str, args: &[&str], envs: &[(&str, &str)]) -> DeployResult<Output> {
    Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeployError::CommandNotFound(program.to_string())
            } else {
                DeployError::Io(e)
            }
        })
}

/// Run a shell snippet (via `sh -c`) and capture its output.
pub fn capture_shell(script: &str, envs: &[(&str, &str)]) -> DeployResult<Output> {
    capture("sh", &["-c", script], envs)
}

/// Merge stdout and stderr of a finished command into one string.
#[must_use]
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = stdout.trim_end().to_string();
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim_end());
    }
    text
}

/// Keep the last `max_lines` lines of `text`.
#[must_use]
pub fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[must_use]
pub fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}
