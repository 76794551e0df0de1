use std::path::{Path, PathBuf};

use crate::cmd;
use crate::error::{DeployError, DeployResult};
use crate::settings::DeploySettings;

/// Lines of build output kept in a report summary.
const SUMMARY_LINES: usize = 20;

/// What to build and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub scenes: Vec<String>,
    pub output: PathBuf,
    pub target: String,
}

impl BuildOptions {
    /// Options for a build of `settings` written below `project_dir`.
    #[must_use]
    pub fn from_settings(settings: &DeploySettings, project_dir: &Path) -> Self {
        let scenes = if settings.build_scene_name.trim().is_empty() {
            Vec::new()
        } else {
            vec![settings.build_scene_name.trim().to_string()]
        };
        Self {
            scenes,
            output: settings.local_build_dir(project_dir),
            target: settings.build_target.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildResult {
    Succeeded,
    Failed,
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub result: BuildResult,
    pub summary: String,
}

/// The host build pipeline.
pub trait BuildPipeline {
    fn build(&self, options: &BuildOptions) -> DeployResult<BuildReport>;
}

/// Runs a shell command as the build pipeline. The options are passed
/// in the environment:
///
/// - `WEBGL_DEPLOY_SCENES`: scene paths, one per line
/// - `WEBGL_DEPLOY_OUTPUT`: output folder
/// - `WEBGL_DEPLOY_TARGET`: target platform
pub struct ShellBuild {
    command: String,
}

impl ShellBuild {
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

impl BuildPipeline for ShellBuild {
    fn build(&self, options: &BuildOptions) -> DeployResult<BuildReport> {
        let scenes = options.scenes.join("\n");
        let output_dir = options.output.to_string_lossy().into_owned();

        eprintln!("Building {} -> {}...", options.target, output_dir);
        let output = cmd::capture_shell(
            &self.command,
            &[
                ("WEBGL_DEPLOY_SCENES", scenes.as_str()),
                ("WEBGL_DEPLOY_OUTPUT", output_dir.as_str()),
                ("WEBGL_DEPLOY_TARGET", options.target.as_str()),
            ],
        )?;

        let log = cmd::combined_output(&output);
        let result = if output.status.success() {
            BuildResult::Succeeded
        } else {
            BuildResult::Failed
        };
        let summary = format!(
            "{} ({})\n{}",
            cmd::format_command("sh", &["-c", &self.command]),
            output.status,
            cmd::tail(&log, SUMMARY_LINES)
        );

        Ok(BuildReport { result, summary })
    }
}

/// Build with `pipeline`, then run `on_success`. A failed build is
/// returned as [`DeployError::BuildFailed`] and `on_success` does not
/// run.
pub fn build<T>(
    pipeline: &dyn BuildPipeline,
    settings: &DeploySettings,
    project_dir: &Path,
    on_success: impl FnOnce() -> DeployResult<T>,
) -> DeployResult<T> {
    let options = BuildOptions::from_settings(settings, project_dir);
    let report = pipeline.build(&options)?;

    match report.result {
        BuildResult::Succeeded => {
            eprintln!("  Build succeeded");
            on_success()
        }
        BuildResult::Failed => {
            tracing::error!(summary = %report.summary, "build failed");
            Err(DeployError::BuildFailed(report.summary))
        }
    }
}
