use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::build::{self, BuildPipeline, ShellBuild};
use crate::error::{DeployError, DeployResult};
use crate::proxy;
use crate::purge::{self, CachePurger, Cloudflare};
use crate::remote::Connector;
use crate::settings::DeploySettings;
use crate::ssh::SshConnector;
use crate::transfer;

/// One discrete remote or local operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Deploy,
    UpdateProxy,
    PurgeCache,
}

impl Step {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Build => "Building the player",
            Self::Deploy => "Deploying build on the server",
            Self::UpdateProxy => "Updating nginx conf",
            Self::PurgeCache => "Purging data cache",
        }
    }

    fn validate(self, settings: &DeploySettings) -> DeployResult<()> {
        match self {
            Self::Build => settings.validate_for_build(),
            Self::Deploy => settings.validate_for_deploy(),
            Self::UpdateProxy => settings.validate_for_proxy(),
            Self::PurgeCache => settings.validate_for_purge(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user-triggered sequence of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    BuildAndDeploy,
    Deploy,
    UpdateProxy,
    PurgeCache,
}

impl Action {
    #[must_use]
    pub const fn steps(self) -> &'static [Step] {
        match self {
            Self::BuildAndDeploy => &[
                Step::Build,
                Step::Deploy,
                Step::UpdateProxy,
                Step::PurgeCache,
            ],
            Self::Deploy => &[Step::Deploy, Step::UpdateProxy, Step::PurgeCache],
            Self::UpdateProxy => &[Step::UpdateProxy],
            Self::PurgeCache => &[Step::PurgeCache],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded(String),
    Failed(String),
}

/// Progress of a finished step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    /// 1-based position in the sequence.
    pub index: usize,
    pub total: usize,
    pub outcome: StepOutcome,
}

impl StepReport {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.outcome, StepOutcome::Succeeded(_))
    }

    /// Share of the sequence completed once this step is done.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn fraction(&self) -> f32 {
        self.index as f32 / self.total.max(1) as f32
    }
}

/// Receives a report after every step, success or failure.
pub trait Progress {
    fn step_finished(&self, report: &StepReport);
}

/// Prints step reports to stderr.
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn step_finished(&self, report: &StepReport) {
        match &report.outcome {
            StepOutcome::Succeeded(detail) => eprintln!(
                "[{}/{}] {}: done ({detail})",
                report.index, report.total, report.step
            ),
            StepOutcome::Failed(error) => eprintln!(
                "[{}/{}] {}: FAILED ({error})",
                report.index, report.total, report.step
            ),
        }
    }
}

/// Cooperative cancellation, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one action run did.
#[derive(Debug)]
pub struct RunReport {
    pub action: Action,
    pub steps: Vec<StepReport>,
    /// The error that ended the run early, if any.
    pub error: Option<DeployError>,
}

impl RunReport {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Turn a failed run into its error.
    pub fn into_result(self) -> DeployResult<Vec<StepReport>> {
        match self.error {
            None => Ok(self.steps),
            Some(e) => Err(e),
        }
    }
}

/// Runs actions against one immutable settings snapshot.
pub struct Pipeline {
    settings: DeploySettings,
    project_dir: PathBuf,
    builder: Option<Box<dyn BuildPipeline>>,
    connector: Option<Box<dyn Connector>>,
    purger: Option<Box<dyn CachePurger>>,
    progress: Box<dyn Progress>,
    cancel: CancelToken,
}

impl Pipeline {
    #[must_use]
    pub fn new(settings: DeploySettings) -> Self {
        Self {
            settings,
            project_dir: PathBuf::from("."),
            builder: None,
            connector: None,
            purger: None,
            progress: Box::new(ConsoleProgress),
            cancel: CancelToken::new(),
        }
    }

    /// Wire the shell build, SSH connector, and Cloudflare purger from
    /// the settings.
    pub fn from_settings(settings: DeploySettings) -> DeployResult<Self> {
        let connector = SshConnector::from_settings(&settings);
        let purger = Cloudflare::from_settings(&settings)?;
        let builder = ShellBuild::new(&settings.build_command);

        Ok(Self::new(settings)
            .build_with(builder)
            .connect_with(connector)
            .purge_with(purger))
    }

    #[must_use]
    pub fn build_with(mut self, builder: impl BuildPipeline + 'static) -> Self {
        self.builder = Some(Box::new(builder));
        self
    }

    #[must_use]
    pub fn connect_with(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    #[must_use]
    pub fn purge_with(mut self, purger: impl CachePurger + 'static) -> Self {
        self.purger = Some(Box::new(purger));
        self
    }

    #[must_use]
    pub fn progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    /// Run every step of `action` in order, stopping at the first
    /// failure. Settings for all steps are checked before the first one
    /// starts.
    pub fn run(&self, action: Action) -> RunReport {
        let steps = action.steps();
        let mut report = RunReport {
            action,
            steps: Vec::with_capacity(steps.len()),
            error: None,
        };

        if let Err(e) = steps.iter().try_for_each(|s| s.validate(&self.settings)) {
            report.error = Some(e);
            return report;
        }

        for (i, step) in steps.iter().copied().enumerate() {
            if self.cancel.is_cancelled() {
                report.error = Some(DeployError::Cancelled(step.label().to_string()));
                break;
            }

            tracing::debug!(%step, "starting step");
            let result = self.execute(step);

            let outcome = match &result {
                Ok(detail) => StepOutcome::Succeeded(detail.clone()),
                Err(e) => StepOutcome::Failed(e.to_string()),
            };
            let step_report = StepReport {
                step,
                index: i + 1,
                total: steps.len(),
                outcome,
            };
            self.progress.step_finished(&step_report);
            report.steps.push(step_report);

            if let Err(e) = result {
                report.error = Some(e);
                break;
            }
        }

        report
    }

    fn execute(&self, step: Step) -> DeployResult<String> {
        match step {
            Step::Build => {
                let builder = self
                    .builder
                    .as_deref()
                    .ok_or_else(|| DeployError::Other("no build pipeline configured".into()))?;
                build::build(builder, &self.settings, &self.project_dir, || {
                    Ok(format!(
                        "output in {}",
                        self.settings.local_build_dir(&self.project_dir).display()
                    ))
                })
            }
            Step::Deploy => {
                let stats =
                    transfer::deploy(self.connector()?, &self.settings, &self.project_dir)?;
                Ok(format!(
                    "{} files, {} directories, {} bytes",
                    stats.files, stats.dirs, stats.bytes
                ))
            }
            Step::UpdateProxy => {
                let output = proxy::update_proxy_config(self.connector()?, &self.settings)?;
                if !output.is_empty() {
                    eprintln!("{output}");
                }
                Ok(format!(
                    "{} {}",
                    self.settings.proxy_directive(),
                    self.settings.remote_deploy_path()
                ))
            }
            Step::PurgeCache => {
                let purger = self
                    .purger
                    .as_deref()
                    .ok_or_else(|| DeployError::Other("no cache purger configured".into()))?;
                purge::purge_cache(purger, &self.settings)
            }
        }
    }

    fn connector(&self) -> DeployResult<&dyn Connector> {
        self.connector
            .as_deref()
            .ok_or_else(|| DeployError::Other("no remote connector configured".into()))
    }

    /// Describe what `action` would do without touching the network.
    pub fn dry_run(&self, action: Action) -> DeployResult<String> {
        use std::fmt::Write;

        let settings = &self.settings;
        let mut out = String::new();

        let _ = writeln!(out, "=== Dry run: no changes will be made ===");
        for (i, step) in action.steps().iter().enumerate() {
            let _ = writeln!(out, "{}. {step}", i + 1);
            match step {
                Step::Build => {
                    let _ = writeln!(out, "   sh -c {:?}", settings.build_command);
                    let _ = writeln!(
                        out,
                        "   target {}, scene {:?}, output {}",
                        settings.build_target,
                        settings.build_scene_name,
                        settings.build_folder_name
                    );
                }
                Step::Deploy => {
                    let _ = writeln!(
                        out,
                        "   upload {} -> {}@{}:{}",
                        settings.local_build_dir(&self.project_dir).display(),
                        settings.deploy_username,
                        settings.ip_server,
                        settings.remote_deploy_path()
                    );
                }
                Step::UpdateProxy => {
                    let template = proxy::load_template(settings)?;
                    let rendered = proxy::render(&template, settings)?;
                    let (available, _) = proxy::site_paths(settings);
                    let _ = writeln!(out, "   write {available}:");
                    for line in rendered.lines() {
                        let _ = writeln!(out, "     {line}");
                    }
                    let _ = writeln!(
                        out,
                        "   run as {}: {}",
                        settings.proxy_username,
                        proxy::activate_command(settings)
                    );
                }
                Step::PurgeCache => {
                    let _ = writeln!(out, "   purge {}", settings.purge_url());
                }
            }
        }

        Ok(out)
    }
}
