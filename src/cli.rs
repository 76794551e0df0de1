use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dialoguer::Input;

use crate::error::DeployResult;
use crate::pipeline::{Action, CancelToken, Pipeline};
use crate::settings::{DeploySettings, FIELD_GROUPS, LoadOutcome, SECRET_FIELDS, SettingsStore};

#[derive(Parser)]
#[command(name = "webgl-deploy", version)]
#[command(about = "Build a WebGL app, upload it, publish it behind nginx, purge the CDN")]
pub struct Cli {
    /// Settings file
    #[arg(
        long,
        short,
        global = true,
        env = "WEBGL_DEPLOY_CONFIG",
        default_value = "deploy.json"
    )]
    config: PathBuf,

    /// Project directory containing the build folder
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect or edit the deploy settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Build, deploy, update nginx, and purge the cache
    BuildDeploy {
        /// Preview the steps without executing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Deploy the existing build, update nginx, and purge the cache
    Deploy {
        /// Preview the steps without executing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate the nginx site and reload nginx
    UpdateProxy {
        /// Print the rendered config without uploading it
        #[arg(long)]
        dry_run: bool,
    },

    /// Purge the build artifact from the Cloudflare cache
    PurgeCache {
        /// Print the URL without purging it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print every field, grouped
    Show,

    /// Set one field and save
    Set {
        /// Field key as stored in the file (e.g. `ipServer`)
        field: String,

        /// New value
        value: String,
    },

    /// Prompt for every field, saving after each change
    Edit,
}

/// Parse the command line and dispatch.
pub fn run(cancel: CancelToken) -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = SettingsStore::new(&cli.config);

    match cli.command {
        Command::Settings { command } => match command {
            SettingsCommand::Show => {
                print!("{}", render_settings(&load_snapshot(&store)));
                Ok(())
            }
            SettingsCommand::Set { field, value } => {
                store.update_field(&field, &value)?;
                eprintln!("Saved {field} to {}", store.path().display());
                Ok(())
            }
            SettingsCommand::Edit => edit_settings(&store, store.load_for_edit()?),
        },
        Command::BuildDeploy { dry_run } => run_action(
            load_snapshot(&store),
            &cli.project_dir,
            cancel,
            Action::BuildAndDeploy,
            dry_run,
        ),
        Command::Deploy { dry_run } => run_action(
            load_snapshot(&store),
            &cli.project_dir,
            cancel,
            Action::Deploy,
            dry_run,
        ),
        Command::UpdateProxy { dry_run } => run_action(
            load_snapshot(&store),
            &cli.project_dir,
            cancel,
            Action::UpdateProxy,
            dry_run,
        ),
        Command::PurgeCache { dry_run } => run_action(
            load_snapshot(&store),
            &cli.project_dir,
            cancel,
            Action::PurgeCache,
            dry_run,
        ),
    }
}

/// Read-only load: a fallback to defaults is reported and accepted.
fn load_snapshot(store: &SettingsStore) -> DeploySettings {
    let outcome = store.load();
    if let LoadOutcome::Defaulted { reason, .. } = &outcome {
        eprintln!("Using default settings: {reason}");
    }
    outcome.into_settings()
}

fn run_action(
    settings: DeploySettings,
    project_dir: &Path,
    cancel: CancelToken,
    action: Action,
    dry_run: bool,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_settings(settings)?
        .project_dir(project_dir)
        .cancel_token(cancel);

    if dry_run {
        print!("{}", pipeline.dry_run(action)?);
        return Ok(());
    }

    let steps = pipeline.run(action).into_result()?;

    eprintln!();
    eprintln!("All {} steps completed.", steps.len());
    if matches!(action, Action::BuildAndDeploy | Action::Deploy) {
        let domain = pipeline.settings().domain.trim();
        match pipeline.settings().location() {
            Some(location) => eprintln!("Application available at: https://{domain}/{location}/"),
            None => eprintln!("Application available at: https://{domain}/"),
        }
    }
    Ok(())
}

fn is_secret(key: &str) -> bool {
    SECRET_FIELDS.iter().any(|s| *s == key)
}

fn display_value(key: &str, value: &str) -> String {
    if is_secret(key) && !value.is_empty() {
        "********".to_string()
    } else {
        value.to_string()
    }
}

/// Grouped, masked listing of every field plus the derived values.
#[must_use]
pub fn render_settings(settings: &DeploySettings) -> String {
    let mut out = String::new();

    for group in FIELD_GROUPS {
        out.push_str(group.title);
        out.push('\n');
        for (key, label) in group.fields {
            let value = settings.field(key).unwrap_or_default();
            out.push_str(&format!(
                "  {label:<24} {}\n",
                display_value(key, &value)
            ));
        }
        out.push('\n');
    }

    out.push_str("Derived\n");
    out.push_str(&format!(
        "  {:<24} {}\n",
        "Remote deploy path",
        settings.remote_deploy_path()
    ));
    out.push_str(&format!(
        "  {:<24} {}\n",
        "Proxy directive",
        settings.proxy_directive()
    ));
    out.push_str(&format!("  {:<24} {}\n", "Purge URL", settings.purge_url()));
    out
}

fn edit_settings(store: &SettingsStore, mut settings: DeploySettings) -> anyhow::Result<()> {
    for group in FIELD_GROUPS {
        eprintln!();
        eprintln!("{}", group.title);
        for (key, label) in group.fields {
            let current = settings.field(key).unwrap_or_default();
            let value: String = Input::new()
                .with_prompt(*label)
                .default(current.clone())
                .show_default(!is_secret(key))
                .allow_empty(true)
                .interact_text()?;

            if value != current {
                apply_edit(store, &mut settings, key, &value)?;
            }
        }
    }
    eprintln!();
    eprintln!("Settings saved to {}", store.path().display());
    Ok(())
}

/// Apply one field edit and persist the whole record.
fn apply_edit(
    store: &SettingsStore,
    settings: &mut DeploySettings,
    key: &str,
    value: &str,
) -> DeployResult<()> {
    settings.set_field(key, value)?;
    store.save(settings)
}
